pub mod core;
pub mod errors;
pub mod input;
pub mod output;

use crate::core::aggregate::{fold, WindowKind};
use crate::core::calendar::ColorCalendar;
use crate::core::classify::RateClassifier;
use crate::core::cost::{price, CostResult};
use crate::core::forecast::TempoForecaster;
use crate::core::normalize::{normalize_readings, NormalizationOutcome, NormalizedInterval};
use crate::core::rank::{OfferRanker, Ranking};
use crate::core::tariff::{HouseholdContext, TariffOffer};
use crate::errors::EngineError;
use crate::input::{ingest_for_processing, ErrorMode, PreparedRun};
use std::io::Read;
use tracing::info;

/// Run the whole comparison pipeline over one input document: normalize the
/// readings, classify them per candidate family, aggregate the most recent
/// rolling year and rank every compatible offer by total cost.
pub fn run_comparison(input: impl Read) -> anyhow::Result<Ranking> {
    run_prepared(ingest_for_processing(input)?)
}

/// The pipeline proper, over an already validated input. Pure computation:
/// everything the run needs was snapshotted during ingestion.
pub fn run_prepared(run: PreparedRun) -> anyhow::Result<Ranking> {
    let PreparedRun {
        readings,
        catalog,
        household,
        ledger,
        demand_forecast,
        forecast_thresholds,
        error_mode,
        today,
    } = run;

    let NormalizationOutcome { intervals, skipped } = normalize_readings(readings);
    if error_mode == ErrorMode::FailFast {
        if let Some(error) = skipped.first() {
            return Err(error.clone().into());
        }
    }

    let forecaster = TempoForecaster::new(ledger.quota(), &forecast_thresholds, &demand_forecast);
    let calendar = ColorCalendar::new(&ledger, forecaster, today);
    let classifier = RateClassifier::new(&household, &calendar);
    let ranker = OfferRanker::new(classifier, &household);

    let mut ranking = ranker.rank(&intervals, &catalog);
    if error_mode == ErrorMode::FailFast {
        if let Some(error) = ranking.skipped.first() {
            return Err(error.clone().into());
        }
    }

    let mut all_skipped = skipped;
    all_skipped.append(&mut ranking.skipped);
    ranking.skipped = all_skipped;

    info!(
        ranked = ranking.entries.len(),
        skipped = ranking.skipped.len(),
        "comparison run finished"
    );
    Ok(ranking)
}

/// Billing display for a single offer: price each calendar month of the
/// series under that offer. Unlike ranking, billing has no partial-data
/// mode; the first unusable interval fails the computation.
pub fn price_offer_monthly(
    intervals: &[NormalizedInterval],
    offer: &TariffOffer,
    household: &HouseholdContext,
    calendar: &ColorCalendar,
) -> Result<Vec<CostResult>, EngineError> {
    let classifier = RateClassifier::new(household, calendar);
    let outcome = classifier.classify_sequence(intervals, &offer.family);
    if let Some(error) = outcome.skipped.into_iter().next() {
        return Err(error);
    }
    fold(&outcome.classified, WindowKind::CalendarMonth, household.timezone)
        .iter()
        .map(|bucket| price(bucket, offer, household.subscribed_power_kva))
        .collect()
}
