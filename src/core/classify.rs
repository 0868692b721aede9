// Classification of normalized intervals into rate buckets. The canonical
// boundary rule: an interval is placed by its midpoint, converted to the
// household's local time; rate windows include their start and exclude
// their end.

use crate::core::calendar::ColorCalendar;
use crate::core::normalize::NormalizedInterval;
use crate::core::tariff::{HouseholdContext, RateLabel, TariffFamily};
use crate::errors::EngineError;
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use tracing::{debug, warn};

/// A normalized interval with the single rate bucket it belongs to under
/// one tariff family.
#[derive(Clone, Debug, PartialEq)]
pub struct ClassifiedInterval {
    pub interval: NormalizedInterval,
    pub label: RateLabel,
}

/// The classification counterpart of `NormalizationOutcome`: what could be
/// labelled, and the per-interval errors for what could not.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ClassificationOutcome {
    pub classified: Vec<ClassifiedInterval>,
    pub skipped: Vec<EngineError>,
}

#[derive(Clone, Debug)]
pub struct RateClassifier<'a> {
    household: &'a HouseholdContext,
    calendar: &'a ColorCalendar<'a>,
}

impl<'a> RateClassifier<'a> {
    pub fn new(household: &'a HouseholdContext, calendar: &'a ColorCalendar<'a>) -> Self {
        Self {
            household,
            calendar,
        }
    }

    /// Assign exactly one label from the family's alphabet. Deterministic:
    /// the same interval always lands on the same label.
    pub fn classify(
        &self,
        interval: &NormalizedInterval,
        family: &TariffFamily,
    ) -> Result<RateLabel, EngineError> {
        let midpoint = interval.midpoint().with_timezone(&self.household.timezone);
        let local_date = midpoint.date_naive();
        let local_time = midpoint.time();

        Ok(match family {
            TariffFamily::Base => RateLabel::Base,
            TariffFamily::PeakOffPeak => {
                if self.in_off_peak_window(local_time) {
                    RateLabel::OffPeak
                } else {
                    RateLabel::Peak
                }
            }
            TariffFamily::ColorCalendar => {
                let color = self.calendar.lookup(local_date)?.color;
                RateLabel::for_color(color, self.in_off_peak_window(local_time))
            }
            TariffFamily::SpecialPeakDays { peak_days } => {
                if peak_days.contains(&local_date) {
                    RateLabel::PeakDay
                } else {
                    RateLabel::Normal
                }
            }
            TariffFamily::Seasonal {
                winter_months,
                peak_days,
            } => {
                if peak_days.contains(&local_date) {
                    RateLabel::PeakDay
                } else {
                    RateLabel::for_season(
                        winter_months.contains(&local_date.month()),
                        self.in_off_peak_window(local_time),
                    )
                }
            }
            TariffFamily::Weekend => {
                if is_weekend(local_date) {
                    RateLabel::OffPeak
                } else {
                    RateLabel::Peak
                }
            }
            TariffFamily::WeekendNight => {
                let night = self
                    .household
                    .night_window
                    .is_some_and(|window| window.contains(local_time));
                if is_weekend(local_date) || night {
                    RateLabel::OffPeak
                } else {
                    RateLabel::Peak
                }
            }
        })
    }

    /// Classify a whole series, reporting per-interval failures instead of
    /// aborting. The caller decides whether a failure is fatal.
    pub fn classify_sequence(
        &self,
        intervals: &[NormalizedInterval],
        family: &TariffFamily,
    ) -> ClassificationOutcome {
        let mut classified = Vec::with_capacity(intervals.len());
        let mut skipped = vec![];
        for interval in intervals {
            match self.classify(interval, family) {
                Ok(label) => classified.push(ClassifiedInterval {
                    interval: interval.clone(),
                    label,
                }),
                Err(error) => {
                    warn!(%error, family = family.name(), "could not classify an interval");
                    skipped.push(error);
                }
            }
        }
        debug!(
            family = family.name(),
            classified = classified.len(),
            skipped = skipped.len(),
            "classified interval series"
        );
        ClassificationOutcome {
            classified,
            skipped,
        }
    }

    fn in_off_peak_window(&self, time: NaiveTime) -> bool {
        self.household
            .off_peak_windows
            .iter()
            .any(|window| window.contains(time))
    }
}

fn is_weekend(date: NaiveDate) -> bool {
    matches!(date.weekday(), Weekday::Sat | Weekday::Sun)
}
