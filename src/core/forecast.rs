// Probabilistic day-colour forecaster for the colour-calendar family. For a
// future day it combines the national demand-forecast signal, two
// externally-tuned polynomial boundaries and the remaining season quotas
// into a single predicted colour plus an advisory confidence.

use crate::core::calendar::{ColorCalendarEntry, EntryConfidence, SeasonQuota};
use crate::core::tariff::CalendarColor;
use crate::errors::EngineError;
use chrono::{Datelike, NaiveDate, Weekday};
use indexmap::IndexMap;
use strum_macros::Display;

/// Months in which non-blue days may be drawn. Outside of them the rule is
/// deterministic: every day is blue.
const HEATING_SEASON_MONTHS: [u32; 5] = [11, 12, 1, 2, 3];

/// Advisory confidence band, derived from how far ahead the prediction is.
#[derive(Clone, Copy, Debug, Display, Eq, PartialEq)]
#[strum(serialize_all = "snake_case")]
pub enum ConfidenceLevel {
    High,
    Medium,
    Low,
}

impl ConfidenceLevel {
    /// Probability mass placed on the predicted colour.
    fn mass(self) -> f64 {
        match self {
            Self::High => 0.9,
            Self::Medium => 0.7,
            Self::Low => 0.5,
        }
    }
}

/// Per-colour probability mass for a forecast day.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorDistribution {
    pub blue: f64,
    pub white: f64,
    pub red: f64,
}

impl ColorDistribution {
    fn certain(color: CalendarColor) -> Self {
        Self::concentrated(color, 1.)
    }

    /// Put `mass` on `color` and split the remainder evenly over the other
    /// two colours.
    fn concentrated(color: CalendarColor, mass: f64) -> Self {
        let rest = (1. - mass) / 2.;
        match color {
            CalendarColor::Blue => Self {
                blue: mass,
                white: rest,
                red: rest,
            },
            CalendarColor::White => Self {
                blue: rest,
                white: mass,
                red: rest,
            },
            CalendarColor::Red => Self {
                blue: rest,
                white: rest,
                red: mass,
            },
        }
    }

    pub fn probability(&self, color: CalendarColor) -> f64 {
        match color {
            CalendarColor::Blue => self.blue,
            CalendarColor::White => self.white,
            CalendarColor::Red => self.red,
        }
    }
}

/// A quadratic boundary in the normalized demand signal:
/// `a·x² + b·x + c`. The coefficient triples are external tuning
/// parameters; the engine only evaluates them.
#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub struct PolynomialThreshold {
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl PolynomialThreshold {
    pub fn evaluate(&self, x: f64) -> f64 {
        self.a * x * x + self.b * x + self.c
    }
}

#[derive(Clone, Copy, Debug, PartialEq, serde::Deserialize)]
pub struct ForecastThresholds {
    pub white_red_boundary: PolynomialThreshold,
    pub red_boundary: PolynomialThreshold,
}

impl Default for ForecastThresholds {
    fn default() -> Self {
        // flat boundaries, used when no tuned coefficients are supplied
        Self {
            white_red_boundary: PolynomialThreshold {
                a: 0.,
                b: 0.,
                c: 0.55,
            },
            red_boundary: PolynomialThreshold {
                a: 0.,
                b: 0.,
                c: 0.85,
            },
        }
    }
}

/// The forecaster proper. Reads the quota snapshot, never mutates it.
#[derive(Clone, Debug)]
pub struct TempoForecaster<'a> {
    quota: &'a SeasonQuota,
    thresholds: &'a ForecastThresholds,
    demand_signal: &'a IndexMap<NaiveDate, f64>,
}

impl<'a> TempoForecaster<'a> {
    pub fn new(
        quota: &'a SeasonQuota,
        thresholds: &'a ForecastThresholds,
        demand_signal: &'a IndexMap<NaiveDate, f64>,
    ) -> Self {
        Self {
            quota,
            thresholds,
            demand_signal,
        }
    }

    /// Predict the colour of a future day. A day with no demand-forecast
    /// signal cannot be resolved and is reported as unknown rather than
    /// defaulted.
    pub fn forecast(&self, date: NaiveDate) -> Result<ColorCalendarEntry, EngineError> {
        let level = self.confidence_level(date);

        // weekends and days outside the heating season are blue by rule
        if is_weekend(date) || !is_heating_season(date) {
            return Ok(ColorCalendarEntry {
                date,
                color: CalendarColor::Blue,
                confidence: EntryConfidence::Forecast {
                    level,
                    distribution: ColorDistribution::certain(CalendarColor::Blue),
                },
            });
        }

        let signal = self
            .demand_signal
            .get(&date)
            .copied()
            .ok_or(EngineError::UnknownCalendarDay(date))?
            .clamp(0., 1.);

        let preferred = if signal > self.thresholds.red_boundary.evaluate(signal) {
            CalendarColor::Red
        } else if signal > self.thresholds.white_red_boundary.evaluate(signal) {
            CalendarColor::White
        } else {
            CalendarColor::Blue
        };
        let color = self.cheapest_with_quota(preferred);

        Ok(ColorCalendarEntry {
            date,
            color,
            confidence: EntryConfidence::Forecast {
                level,
                distribution: ColorDistribution::concentrated(color, level.mass()),
            },
        })
    }

    /// Fall through to the next cheaper colour while the preferred one has
    /// no quota left. Blue is never rationed.
    fn cheapest_with_quota(&self, preferred: CalendarColor) -> CalendarColor {
        let mut color = preferred;
        if color == CalendarColor::Red && self.quota.remaining(CalendarColor::Red) == 0 {
            color = CalendarColor::White;
        }
        if color == CalendarColor::White && self.quota.remaining(CalendarColor::White) == 0 {
            color = CalendarColor::Blue;
        }
        color
    }

    fn confidence_level(&self, date: NaiveDate) -> ConfidenceLevel {
        let days_remaining = (self.quota.season_end - date).num_days();
        if days_remaining <= 1 {
            ConfidenceLevel::High
        } else if days_remaining <= 3 {
            ConfidenceLevel::Medium
        } else {
            ConfidenceLevel::Low
        }
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}

fn is_heating_season(date: NaiveDate) -> bool {
    HEATING_SEASON_MONTHS.contains(&date.month())
}
