// This module models the tariff catalog: rate labels, the per-family tariff
// shapes and the offers built from them. Each family is a variant of a sum
// type carrying only the fields its classification rule needs, so an offer
// cannot hold field combinations its family does not define.

use crate::errors::EngineError;
use chrono::{NaiveDate, NaiveTime};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// Day colour in a colour-calendar (TEMPO-style) tariff, cheapest first.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, EnumString, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum CalendarColor {
    Blue,
    White,
    Red,
}

/// A rate bucket tag. Every tariff family draws its labels from a fixed
/// subset of this alphabet; classification always lands on exactly one.
#[derive(
    Clone, Copy, Debug, Deserialize, Display, EnumIter, EnumString, Eq, Hash, Ord, PartialEq,
    PartialOrd, Serialize,
)]
#[strum(serialize_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum RateLabel {
    Base,
    OffPeak,
    Peak,
    BlueOffPeak,
    BluePeak,
    WhiteOffPeak,
    WhitePeak,
    RedOffPeak,
    RedPeak,
    Normal,
    PeakDay,
    WinterOffPeak,
    WinterPeak,
    SummerOffPeak,
    SummerPeak,
}

impl RateLabel {
    pub(crate) fn for_color(color: CalendarColor, off_peak: bool) -> Self {
        match (color, off_peak) {
            (CalendarColor::Blue, true) => Self::BlueOffPeak,
            (CalendarColor::Blue, false) => Self::BluePeak,
            (CalendarColor::White, true) => Self::WhiteOffPeak,
            (CalendarColor::White, false) => Self::WhitePeak,
            (CalendarColor::Red, true) => Self::RedOffPeak,
            (CalendarColor::Red, false) => Self::RedPeak,
        }
    }

    pub(crate) fn for_season(winter: bool, off_peak: bool) -> Self {
        match (winter, off_peak) {
            (true, true) => Self::WinterOffPeak,
            (true, false) => Self::WinterPeak,
            (false, true) => Self::SummerOffPeak,
            (false, false) => Self::SummerPeak,
        }
    }
}

/// A local-time window, start inclusive and end exclusive. Windows may wrap
/// midnight (`22:00` to `06:00`).
#[derive(Clone, Copy, Debug, Deserialize, PartialEq, Serialize)]
pub struct TimeWindow {
    pub start: NaiveTime,
    pub end: NaiveTime,
}

impl TimeWindow {
    pub fn new(start: NaiveTime, end: NaiveTime) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: NaiveTime) -> bool {
        if self.start <= self.end {
            time >= self.start && time < self.end
        } else {
            time >= self.start || time < self.end
        }
    }
}

/// The tariff family: how the tariff cuts time into rate buckets.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
#[serde(tag = "family", rename_all = "snake_case")]
pub enum TariffFamily {
    /// A single price for every kWh.
    Base,
    /// Off-peak windows each day, peak the rest of the time.
    PeakOffPeak,
    /// Day colour from the colour calendar crossed with off-peak/peak.
    ColorCalendar,
    /// A fixed yearly list of contractual peak days at a premium rate.
    SpecialPeakDays { peak_days: Vec<NaiveDate> },
    /// Winter/summer pricing crossed with off-peak/peak, with an optional
    /// peak-day override on top.
    Seasonal {
        winter_months: Vec<u32>,
        #[serde(default)]
        peak_days: Vec<NaiveDate>,
    },
    /// Off-peak all weekend, peak on weekdays.
    Weekend,
    /// Off-peak all weekend and during a nightly window on weekdays.
    WeekendNight,
}

impl TariffFamily {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Base => "base",
            Self::PeakOffPeak => "peak_off_peak",
            Self::ColorCalendar => "color_calendar",
            Self::SpecialPeakDays { .. } => "special_peak_days",
            Self::Seasonal { .. } => "seasonal",
            Self::Weekend => "weekend",
            Self::WeekendNight => "weekend_night",
        }
    }

    /// The exact label alphabet this family classifies into, and therefore
    /// the exact key set an offer of this family must price.
    pub fn alphabet(&self) -> Vec<RateLabel> {
        match self {
            Self::Base => vec![RateLabel::Base],
            Self::PeakOffPeak | Self::Weekend | Self::WeekendNight => {
                vec![RateLabel::OffPeak, RateLabel::Peak]
            }
            Self::ColorCalendar => vec![
                RateLabel::BlueOffPeak,
                RateLabel::BluePeak,
                RateLabel::WhiteOffPeak,
                RateLabel::WhitePeak,
                RateLabel::RedOffPeak,
                RateLabel::RedPeak,
            ],
            Self::SpecialPeakDays { .. } => vec![RateLabel::Normal, RateLabel::PeakDay],
            Self::Seasonal { peak_days, .. } => {
                let mut labels = vec![
                    RateLabel::WinterOffPeak,
                    RateLabel::WinterPeak,
                    RateLabel::SummerOffPeak,
                    RateLabel::SummerPeak,
                ];
                if !peak_days.is_empty() {
                    labels.push(RateLabel::PeakDay);
                }
                labels
            }
        }
    }
}

/// One offer from the tariff catalog. `priced_buckets` keys must exactly
/// match the family alphabet; `validate` checks that invariant.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct TariffOffer {
    pub id: String,
    #[serde(flatten)]
    pub family: TariffFamily,
    /// Subscription fee per month.
    pub subscription_price: f64,
    pub power_kva: f64,
    pub priced_buckets: IndexMap<RateLabel, f64>,
}

impl TariffOffer {
    pub fn validate(&self) -> Result<(), EngineError> {
        let alphabet = self.family.alphabet();
        let matches = self.priced_buckets.len() == alphabet.len()
            && alphabet
                .iter()
                .all(|label| self.priced_buckets.contains_key(label));
        if !matches {
            return Err(EngineError::LabelMismatch {
                offer_id: self.id.clone(),
            });
        }
        Ok(())
    }
}

/// Per-household configuration the catalog does not carry: the subscribed
/// power, the current contract, and the off-peak/night windows the meter
/// operator assigned to this delivery point.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct HouseholdContext {
    pub subscribed_power_kva: f64,
    #[serde(default)]
    pub current_offer_id: Option<String>,
    #[serde(default = "default_timezone")]
    pub timezone: Tz,
    #[serde(default)]
    pub off_peak_windows: Vec<TimeWindow>,
    #[serde(default)]
    pub night_window: Option<TimeWindow>,
}

fn default_timezone() -> Tz {
    chrono_tz::Europe::Paris
}
