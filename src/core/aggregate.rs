// Exactly-once aggregation of classified intervals into billing windows.
// Buckets are created lazily as intervals fold in, so a period with no data
// never shows up; the fold neither drops nor double-counts an interval,
// which keeps the total energy of the buckets equal to the total energy of
// the input.

use crate::core::classify::ClassifiedInterval;
use crate::core::tariff::RateLabel;
use crate::core::units::{DAYS_PER_YEAR, MONTHS_PER_YEAR};
use chrono::{DateTime, Datelike, Days, NaiveDate, Utc};
use chrono_tz::Tz;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowKind {
    CalendarMonth,
    RollingYear,
}

/// The identity of one aggregation bucket. Rolling windows count backwards:
/// index 0 ends the day before the newest reading, index 1 covers the 365
/// days before that, and so on.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BucketPeriod {
    Month { year: i32, month: u32 },
    RollingYear { index: u32 },
}

impl BucketPeriod {
    /// How many months of subscription fee the bucket carries.
    pub fn subscription_months(&self) -> f64 {
        match self {
            Self::Month { .. } => 1.,
            Self::RollingYear { .. } => MONTHS_PER_YEAR as f64,
        }
    }
}

impl fmt::Display for BucketPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Month { year, month } => write!(f, "{year:04}-{month:02}"),
            Self::RollingYear { index } => write!(f, "Y-{index}"),
        }
    }
}

/// Per-label energy for one period.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct AggregationBucket {
    pub period: BucketPeriod,
    pub per_label_kwh: IndexMap<RateLabel, f64>,
}

impl AggregationBucket {
    pub fn kwh(&self, label: RateLabel) -> f64 {
        self.per_label_kwh.get(&label).copied().unwrap_or(0.)
    }

    pub fn total_kwh(&self) -> f64 {
        self.per_label_kwh.values().sum()
    }
}

/// Fold a classified series into buckets of the requested kind, ordered by
/// period. Bucket membership is decided by the local date of the interval's
/// start.
pub fn fold(
    intervals: &[ClassifiedInterval],
    window_kind: WindowKind,
    timezone: Tz,
) -> Vec<AggregationBucket> {
    let Some(newest_end) = intervals.iter().map(|entry| entry.interval.end).max() else {
        return vec![];
    };
    // The most recent rolling window ends the day before the newest
    // reading's (end-stamped) local date.
    let window_end = local_date(newest_end, timezone) - Days::new(1);

    let mut buckets: IndexMap<BucketPeriod, IndexMap<RateLabel, f64>> = IndexMap::new();
    for entry in intervals {
        let start_date = local_date(entry.interval.start, timezone);
        let period = match window_kind {
            WindowKind::CalendarMonth => BucketPeriod::Month {
                year: start_date.year(),
                month: start_date.month(),
            },
            WindowKind::RollingYear => BucketPeriod::RollingYear {
                index: rolling_window_index(start_date, window_end),
            },
        };
        *buckets
            .entry(period)
            .or_default()
            .entry(entry.label)
            .or_insert(0.) += entry.interval.energy_kwh;
    }
    buckets.sort_keys();

    debug!(
        ?window_kind,
        buckets = buckets.len(),
        intervals = intervals.len(),
        "folded classified intervals"
    );

    buckets
        .into_iter()
        .map(|(period, per_label_kwh)| AggregationBucket {
            period,
            per_label_kwh,
        })
        .collect()
}

fn local_date(instant: DateTime<Utc>, timezone: Tz) -> NaiveDate {
    instant.with_timezone(&timezone).date_naive()
}

fn rolling_window_index(start_date: NaiveDate, window_end: NaiveDate) -> u32 {
    let days_back = (window_end - start_date).num_days();
    if days_back < 0 {
        // intervals from the newest (partial) day belong to the current window
        0
    } else {
        (days_back / DAYS_PER_YEAR as i64) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::normalize::NormalizedInterval;
    use approx::assert_relative_eq;
    use chrono::TimeDelta;
    use chrono_tz::Tz;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn utc(value: &str) -> DateTime<Utc> {
        value.parse().unwrap()
    }

    fn classified(start: &str, hours: i64, energy_kwh: f64, label: RateLabel) -> ClassifiedInterval {
        let start = utc(start);
        ClassifiedInterval {
            interval: NormalizedInterval {
                start,
                end: start + TimeDelta::hours(hours),
                energy_kwh,
            },
            label,
        }
    }

    /// One day-long interval per date, end-stamped at the next midnight.
    fn daily_series(first_day: &str, days: u64) -> Vec<ClassifiedInterval> {
        let first: NaiveDate = first_day.parse().unwrap();
        (0..days)
            .map(|offset| {
                let day = first + Days::new(offset);
                classified(
                    &format!("{day}T00:00:00Z"),
                    24,
                    1.,
                    RateLabel::Base,
                )
            })
            .collect()
    }

    #[rstest]
    fn should_return_no_buckets_for_no_intervals() {
        assert_eq!(fold(&[], WindowKind::CalendarMonth, Tz::UTC), vec![]);
    }

    #[rstest]
    fn should_bucket_by_local_month_of_the_start() {
        let intervals = [
            classified("2024-05-15T10:00:00Z", 1, 2., RateLabel::Base),
            // 22:30 UTC on 31 May is already 00:30 on 1 June in Paris
            classified("2024-05-31T22:30:00Z", 1, 3., RateLabel::Base),
        ];
        let buckets = fold(&intervals, WindowKind::CalendarMonth, chrono_tz::Europe::Paris);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].period, BucketPeriod::Month { year: 2024, month: 5 });
        assert_relative_eq!(buckets[0].total_kwh(), 2.);
        assert_eq!(buckets[1].period, BucketPeriod::Month { year: 2024, month: 6 });
        assert_relative_eq!(buckets[1].total_kwh(), 3.);
    }

    #[rstest]
    fn should_not_emit_buckets_for_gap_months() {
        let intervals = [
            classified("2024-01-15T10:00:00Z", 1, 1., RateLabel::Base),
            classified("2024-04-15T10:00:00Z", 1, 1., RateLabel::Base),
        ];
        let buckets = fold(&intervals, WindowKind::CalendarMonth, Tz::UTC);
        assert_eq!(buckets.len(), 2);
    }

    #[rstest]
    fn should_sum_energy_per_label_within_a_bucket() {
        let intervals = [
            classified("2024-05-15T10:00:00Z", 1, 2., RateLabel::Peak),
            classified("2024-05-15T23:00:00Z", 1, 1., RateLabel::OffPeak),
            classified("2024-05-16T10:00:00Z", 1, 4., RateLabel::Peak),
        ];
        let buckets = fold(&intervals, WindowKind::CalendarMonth, Tz::UTC);
        assert_eq!(buckets.len(), 1);
        assert_relative_eq!(buckets[0].kwh(RateLabel::Peak), 6.);
        assert_relative_eq!(buckets[0].kwh(RateLabel::OffPeak), 1.);
    }

    #[rstest]
    fn should_produce_a_single_window_for_exactly_one_year_of_data() {
        let intervals = daily_series("2023-06-01", 365);
        let buckets = fold(&intervals, WindowKind::RollingYear, Tz::UTC);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].period, BucketPeriod::RollingYear { index: 0 });
        assert_relative_eq!(buckets[0].total_kwh(), 365.);
    }

    #[rstest]
    fn should_spill_the_oldest_day_into_the_next_window_on_day_366() {
        let intervals = daily_series("2023-06-01", 366);
        let buckets = fold(&intervals, WindowKind::RollingYear, Tz::UTC);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].period, BucketPeriod::RollingYear { index: 0 });
        assert_relative_eq!(buckets[0].total_kwh(), 365.);
        assert_eq!(buckets[1].period, BucketPeriod::RollingYear { index: 1 });
        assert_relative_eq!(buckets[1].total_kwh(), 1.);
    }

    #[rstest]
    #[case(WindowKind::CalendarMonth)]
    #[case(WindowKind::RollingYear)]
    fn should_conserve_total_energy_across_buckets(#[case] window_kind: WindowKind) {
        let mut intervals = daily_series("2023-03-10", 400);
        intervals.push(classified("2024-04-13T06:00:00Z", 1, 0.25, RateLabel::Peak));
        intervals.push(classified("2024-04-13T07:00:00Z", 1, 0.75, RateLabel::OffPeak));

        let input_total: f64 = intervals
            .iter()
            .map(|entry| entry.interval.energy_kwh)
            .sum();
        let buckets = fold(&intervals, window_kind, Tz::UTC);
        let bucket_total: f64 = buckets.iter().map(AggregationBucket::total_kwh).sum();
        assert_relative_eq!(bucket_total, input_total, max_relative = 1e-12);
    }

    #[rstest]
    fn should_order_buckets_by_period() {
        let intervals = [
            classified("2024-04-15T10:00:00Z", 1, 1., RateLabel::Base),
            classified("2024-01-15T10:00:00Z", 1, 1., RateLabel::Base),
            classified("2024-02-15T10:00:00Z", 1, 1., RateLabel::Base),
        ];
        let buckets = fold(&intervals, WindowKind::CalendarMonth, Tz::UTC);
        let months: Vec<_> = buckets.iter().map(|bucket| bucket.period).collect();
        assert_eq!(
            months,
            vec![
                BucketPeriod::Month { year: 2024, month: 1 },
                BucketPeriod::Month { year: 2024, month: 2 },
                BucketPeriod::Month { year: 2024, month: 4 },
            ]
        );
    }
}
