// This module turns raw end-stamped meter readings into normalized energy
// intervals. Unit conversion lives here and nowhere else: downstream
// components only ever see energy in kWh.

use crate::core::units::{watt_hours_to_kwh, watts_to_kwh, SECONDS_PER_HOUR};
use crate::errors::EngineError;
use chrono::{DateTime, TimeDelta, Utc};
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

/// A raw metered reading as supplied by the upstream data source. Readings
/// are stamped with the *end* instant of the interval they cover, and the
/// interval length is declared separately as an ISO-8601 duration token.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct MeterReading {
    pub end_timestamp: DateTime<Utc>,
    pub raw_value: f64,
    pub unit: ReadingUnit,
    pub nominal_interval: String,
}

#[derive(Clone, Copy, Debug, Deserialize, Eq, PartialEq)]
pub enum ReadingUnit {
    /// Mean power over the interval, in watts.
    W,
    /// Energy accumulated over the interval, in watt-hours.
    Wh,
}

/// An interval with reconstructed boundaries and its energy in kWh.
///
/// Invariant: `end - start` equals the declared interval duration and
/// `energy_kwh >= 0`.
#[derive(Clone, Debug, PartialEq)]
pub struct NormalizedInterval {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub energy_kwh: f64,
}

impl NormalizedInterval {
    pub fn duration(&self) -> TimeDelta {
        self.end - self.start
    }

    /// The instant halfway through the interval. Classification works on the
    /// midpoint rather than the start so that an interval split by a rate
    /// window boundary is not systematically biased to one side.
    pub fn midpoint(&self) -> DateTime<Utc> {
        self.start + self.duration() / 2
    }
}

/// Everything a normalization pass produced: the usable intervals, ordered
/// by start time, plus the per-reading errors that were encountered. The
/// caller decides whether a non-empty `skipped` list aborts the run.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct NormalizationOutcome {
    pub intervals: Vec<NormalizedInterval>,
    pub skipped: Vec<EngineError>,
}

/// Normalize a batch of raw readings. The input may arrive in any order and
/// may contain duplicates; duplicates are collapsed by their reconstructed
/// `(start, end)` key with the last occurrence winning.
pub fn normalize_readings(
    readings: impl IntoIterator<Item = MeterReading>,
) -> NormalizationOutcome {
    let mut deduped: IndexMap<(DateTime<Utc>, DateTime<Utc>), f64> = IndexMap::new();
    let mut skipped: Vec<EngineError> = vec![];

    for reading in readings {
        match normalize_reading(&reading) {
            Ok(interval) => {
                deduped.insert((interval.start, interval.end), interval.energy_kwh);
            }
            Err(error) => {
                warn!(%error, "could not normalize a meter reading");
                skipped.push(error);
            }
        }
    }

    let mut intervals: Vec<NormalizedInterval> = deduped
        .into_iter()
        .map(|((start, end), energy_kwh)| NormalizedInterval {
            start,
            end,
            energy_kwh,
        })
        .collect();
    intervals.sort_by_key(|interval| (interval.start, interval.end));

    debug!(
        intervals = intervals.len(),
        skipped = skipped.len(),
        "normalized meter readings"
    );

    NormalizationOutcome { intervals, skipped }
}

fn normalize_reading(reading: &MeterReading) -> Result<NormalizedInterval, EngineError> {
    let duration = parse_interval_duration(&reading.nominal_interval)?;
    if reading.raw_value < 0. {
        return Err(EngineError::NegativeEnergy {
            end: reading.end_timestamp,
            value: reading.raw_value,
        });
    }

    // Subtraction happens on UTC instants. Doing this on local wall-clock
    // values would skew intervals straddling a daylight-saving transition
    // by an hour.
    let start = reading.end_timestamp - duration;
    let duration_hours = duration.num_seconds() as f64 / SECONDS_PER_HOUR as f64;

    let energy_kwh = match reading.unit {
        ReadingUnit::W => watts_to_kwh(reading.raw_value, duration_hours),
        ReadingUnit::Wh => watt_hours_to_kwh(reading.raw_value),
    };

    Ok(NormalizedInterval {
        start,
        end: reading.end_timestamp,
        energy_kwh,
    })
}

/// Parse the subset of ISO-8601 durations that meter sources actually emit
/// (`P1D`, `PT30M`, `PT1H`, `PT1H30M`, ...). Anything else, including a
/// zero-length duration, is a `MalformedDuration`.
pub(crate) fn parse_interval_duration(token: &str) -> Result<TimeDelta, EngineError> {
    let malformed = || EngineError::MalformedDuration(token.to_string());

    let rest = token.strip_prefix('P').ok_or_else(malformed)?;
    let (date_part, time_part) = match rest.split_once('T') {
        Some((date, time)) => (date, Some(time)),
        None => (rest, None),
    };

    let mut seconds = parse_duration_components(date_part, &[('D', 86_400)], token)?;
    if let Some(time_part) = time_part {
        seconds += parse_duration_components(
            time_part,
            &[('H', 3_600), ('M', 60), ('S', 1)],
            token,
        )?;
    }

    if seconds <= 0 {
        return Err(malformed());
    }
    Ok(TimeDelta::seconds(seconds))
}

fn parse_duration_components(
    part: &str,
    units: &[(char, i64)],
    token: &str,
) -> Result<i64, EngineError> {
    let malformed = || EngineError::MalformedDuration(token.to_string());

    let mut seconds = 0i64;
    let mut digits = String::new();
    let mut next_unit = 0usize;
    for character in part.chars() {
        if character.is_ascii_digit() {
            digits.push(character);
            continue;
        }
        // Units must appear at most once, in their declared order.
        let unit_idx = units[next_unit..]
            .iter()
            .position(|(unit, _)| *unit == character)
            .map(|offset| next_unit + offset)
            .ok_or_else(malformed)?;
        if digits.is_empty() {
            return Err(malformed());
        }
        let value: i64 = digits.parse().map_err(|_| malformed())?;
        seconds += value * units[unit_idx].1;
        digits.clear();
        next_unit = unit_idx + 1;
    }
    if !digits.is_empty() {
        // trailing digits without a unit designator
        return Err(malformed());
    }
    Ok(seconds)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use pretty_assertions::assert_eq;
    use rstest::*;

    fn utc(timestamp: &str) -> DateTime<Utc> {
        timestamp.parse().unwrap()
    }

    fn reading(end: &str, raw_value: f64, unit: ReadingUnit, interval: &str) -> MeterReading {
        MeterReading {
            end_timestamp: utc(end),
            raw_value,
            unit,
            nominal_interval: interval.to_string(),
        }
    }

    #[rstest]
    #[case("PT30M", 1_800)]
    #[case("PT1H", 3_600)]
    #[case("PT1H30M", 5_400)]
    #[case("P1D", 86_400)]
    #[case("P1DT6H", 108_000)]
    #[case("PT90S", 90)]
    fn should_parse_duration_tokens(#[case] token: &str, #[case] expected_seconds: i64) {
        assert_eq!(
            parse_interval_duration(token).unwrap(),
            TimeDelta::seconds(expected_seconds)
        );
    }

    #[rstest]
    #[case("")]
    #[case("30M")]
    #[case("P")]
    #[case("PT")]
    #[case("PT0S")]
    #[case("PTM")]
    #[case("PT30")]
    #[case("PT30X")]
    #[case("PT1M30H")]
    #[case("P1D2D")]
    fn should_reject_malformed_duration_tokens(#[case] token: &str) {
        assert_eq!(
            parse_interval_duration(token).unwrap_err(),
            EngineError::MalformedDuration(token.to_string())
        );
    }

    #[rstest]
    fn should_recover_start_from_end_and_duration() {
        let outcome = normalize_readings([reading(
            "2024-06-01T10:30:00Z",
            1_000.,
            ReadingUnit::W,
            "PT30M",
        )]);
        let interval = &outcome.intervals[0];
        assert_eq!(interval.start, utc("2024-06-01T10:00:00Z"));
        assert_eq!(interval.end, utc("2024-06-01T10:30:00Z"));
        assert_eq!(interval.duration(), TimeDelta::minutes(30));
    }

    #[rstest]
    fn should_integrate_power_readings_and_pass_energy_readings_through() {
        let outcome = normalize_readings([
            // 1 kW mean power over half an hour -> 0.5 kWh
            reading("2024-06-01T10:30:00Z", 1_000., ReadingUnit::W, "PT30M"),
            // 500 Wh accumulated -> 0.5 kWh regardless of duration
            reading("2024-06-01T11:00:00Z", 500., ReadingUnit::Wh, "PT30M"),
        ]);
        assert!(outcome.skipped.is_empty());
        assert_relative_eq!(outcome.intervals[0].energy_kwh, 0.5);
        assert_relative_eq!(outcome.intervals[1].energy_kwh, 0.5);
    }

    #[rstest]
    fn should_collapse_duplicates_with_the_last_write_winning() {
        let outcome = normalize_readings([
            reading("2024-06-01T10:30:00Z", 100., ReadingUnit::Wh, "PT30M"),
            reading("2024-06-01T11:00:00Z", 200., ReadingUnit::Wh, "PT30M"),
            reading("2024-06-01T10:30:00Z", 300., ReadingUnit::Wh, "PT30M"),
        ]);
        assert_eq!(outcome.intervals.len(), 2);
        assert_relative_eq!(outcome.intervals[0].energy_kwh, 0.3);
        assert_relative_eq!(outcome.intervals[1].energy_kwh, 0.2);
    }

    #[rstest]
    fn should_order_intervals_by_start_regardless_of_input_order() {
        let outcome = normalize_readings([
            reading("2024-06-01T11:00:00Z", 200., ReadingUnit::Wh, "PT30M"),
            reading("2024-06-01T10:30:00Z", 100., ReadingUnit::Wh, "PT30M"),
        ]);
        assert_eq!(outcome.intervals[0].start, utc("2024-06-01T10:00:00Z"));
        assert_eq!(outcome.intervals[1].start, utc("2024-06-01T10:30:00Z"));
    }

    #[rstest]
    fn should_report_negative_readings_without_dropping_the_rest() {
        let outcome = normalize_readings([
            reading("2024-06-01T10:30:00Z", -5., ReadingUnit::Wh, "PT30M"),
            reading("2024-06-01T11:00:00Z", 200., ReadingUnit::Wh, "PT30M"),
        ]);
        assert_eq!(outcome.intervals.len(), 1);
        assert_eq!(
            outcome.skipped,
            vec![EngineError::NegativeEnergy {
                end: utc("2024-06-01T10:30:00Z"),
                value: -5.,
            }]
        );
    }

    #[rstest]
    fn should_use_absolute_arithmetic_across_a_dst_transition() {
        // Europe/Paris jumped 02:00 -> 03:00 on 2024-03-31. 01:30 UTC is
        // 03:30 local; half an hour earlier is 01:00 UTC, not a local
        // wall-clock subtraction landing in the skipped hour.
        let outcome = normalize_readings([reading(
            "2024-03-31T01:30:00Z",
            600.,
            ReadingUnit::W,
            "PT30M",
        )]);
        let interval = &outcome.intervals[0];
        assert_eq!(interval.start, utc("2024-03-31T01:00:00Z"));
        assert_eq!(interval.duration(), TimeDelta::minutes(30));
        assert_relative_eq!(interval.energy_kwh, 0.3);
    }

    #[rstest]
    fn should_keep_the_midpoint_inside_the_interval() {
        let outcome = normalize_readings([reading(
            "2024-06-01T23:15:00Z",
            100.,
            ReadingUnit::Wh,
            "PT30M",
        )]);
        assert_eq!(outcome.intervals[0].midpoint(), utc("2024-06-01T23:00:00Z"));
    }
}
