// Ingestion of everything the engine consumes from its collaborators: the
// raw readings, the tariff catalog, the colour-calendar ledger and quota,
// the demand-forecast signal and the household context. Catalog validation
// happens here, before any computation runs.

use crate::core::calendar::{CalendarLedger, SeasonQuota};
use crate::core::forecast::ForecastThresholds;
use crate::core::normalize::MeterReading;
use crate::core::tariff::{CalendarColor, HouseholdContext, RateLabel, TariffFamily, TariffOffer};
use crate::errors::EngineError;
use anyhow::{bail, Context};
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;
use std::io::Read;
use tracing::debug;

/// What to do with a record the engine cannot process: abort the run, or
/// skip it and report it alongside the partial result.
#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq)]
#[serde(rename_all = "snake_case")]
pub enum ErrorMode {
    #[default]
    FailFast,
    BestEffort,
}

/// The JSON document a comparison run is fed with.
#[derive(Clone, Debug, Deserialize)]
pub struct ComparisonInput {
    pub readings: Vec<MeterReading>,
    pub catalog: Vec<TariffOfferInput>,
    pub household: HouseholdContext,
    pub calendar: CalendarInput,
    #[serde(default)]
    pub demand_forecast: IndexMap<NaiveDate, f64>,
    #[serde(default)]
    pub forecast_thresholds: ForecastThresholds,
    #[serde(default)]
    pub error_mode: ErrorMode,
    /// The ledger horizon. Defaults to the local date of the newest reading.
    #[serde(default)]
    pub today: Option<NaiveDate>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct CalendarInput {
    #[serde(default)]
    pub entries: Vec<LedgerEntryInput>,
    pub quota: SeasonQuota,
}

#[derive(Clone, Copy, Debug, Deserialize)]
pub struct LedgerEntryInput {
    pub date: NaiveDate,
    pub color: CalendarColor,
}

/// A catalog row as scraped sources deliver it: the family is a plain
/// string and the priced buckets are keyed by label name. Turning it into a
/// `TariffOffer` is where `UnsupportedFamily` and `LabelMismatch` surface.
#[derive(Clone, Debug, Deserialize)]
pub struct TariffOfferInput {
    pub id: String,
    pub family: String,
    #[serde(default)]
    pub winter_months: Vec<u32>,
    #[serde(default)]
    pub peak_days: Vec<NaiveDate>,
    pub subscription_price: f64,
    pub power_kva: f64,
    pub priced_buckets: IndexMap<String, f64>,
}

impl TariffOfferInput {
    pub fn into_offer(self) -> Result<TariffOffer, EngineError> {
        let Self {
            id,
            family,
            winter_months,
            peak_days,
            subscription_price,
            power_kva,
            priced_buckets,
        } = self;

        let family = match family.as_str() {
            "base" => TariffFamily::Base,
            "peak_off_peak" => TariffFamily::PeakOffPeak,
            "color_calendar" => TariffFamily::ColorCalendar,
            "special_peak_days" => TariffFamily::SpecialPeakDays { peak_days },
            "seasonal" => TariffFamily::Seasonal {
                winter_months,
                peak_days,
            },
            "weekend" => TariffFamily::Weekend,
            "weekend_night" => TariffFamily::WeekendNight,
            other => return Err(EngineError::UnsupportedFamily(other.to_string())),
        };

        let priced_buckets = priced_buckets
            .into_iter()
            .map(|(label, price)| {
                let label: RateLabel = label
                    .parse()
                    .map_err(|_| EngineError::LabelMismatch {
                        offer_id: id.clone(),
                    })?;
                Ok((label, price))
            })
            .collect::<Result<IndexMap<_, _>, EngineError>>()?;

        let offer = TariffOffer {
            id,
            family,
            subscription_price,
            power_kva,
            priced_buckets,
        };
        offer.validate()?;
        Ok(offer)
    }
}

/// A fully validated run: catalog converted and checked, ledger built, the
/// "today" horizon pinned. Everything downstream is pure computation.
#[derive(Clone, Debug)]
pub struct PreparedRun {
    pub readings: Vec<MeterReading>,
    pub catalog: Vec<TariffOffer>,
    pub household: HouseholdContext,
    pub ledger: CalendarLedger,
    pub demand_forecast: IndexMap<NaiveDate, f64>,
    pub forecast_thresholds: ForecastThresholds,
    pub error_mode: ErrorMode,
    pub today: NaiveDate,
}

pub fn ingest_for_processing(input: impl Read) -> anyhow::Result<PreparedRun> {
    let input: ComparisonInput =
        serde_json::from_reader(input).context("could not parse the comparison input document")?;
    prepare(input)
}

pub fn prepare(input: ComparisonInput) -> anyhow::Result<PreparedRun> {
    let catalog = input
        .catalog
        .into_iter()
        .map(|raw| {
            let offer = raw.into_offer()?;
            if offer.subscription_price < 0. || offer.priced_buckets.values().any(|price| *price < 0.)
            {
                bail!("offer '{}' carries a negative price", offer.id);
            }
            Ok(offer)
        })
        .collect::<anyhow::Result<Vec<_>>>()
        .context("validating the tariff catalog")?;

    let ledger = CalendarLedger::new(
        input
            .calendar
            .entries
            .iter()
            .map(|entry| (entry.date, entry.color)),
        input.calendar.quota,
    )
    .context("building the colour-calendar ledger")?;

    let today = match input.today {
        Some(today) => today,
        None => input
            .readings
            .iter()
            .map(|reading| reading.end_timestamp)
            .max()
            .map(|newest| newest.with_timezone(&input.household.timezone).date_naive())
            .context("'today' must be supplied when there are no readings")?,
    };

    debug!(
        readings = input.readings.len(),
        offers = catalog.len(),
        ledger_days = ledger.len(),
        %today,
        "prepared comparison input"
    );

    Ok(PreparedRun {
        readings: input.readings,
        catalog,
        household: input.household,
        ledger,
        demand_forecast: input.demand_forecast,
        forecast_thresholds: input.forecast_thresholds,
        error_mode: input.error_mode,
        today,
    })
}
