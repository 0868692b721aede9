// This module holds the colour-calendar ledger: the append-only historical
// record of observed day colours and the per-season day quotas. Dates up to
// today must resolve from the ledger; future dates are delegated to the
// forecaster. A day that cannot be resolved is an error, never a guess.

use crate::core::forecast::{ColorDistribution, ConfidenceLevel, TempoForecaster};
use crate::core::tariff::CalendarColor;
use crate::errors::EngineError;
use chrono::NaiveDate;
use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

/// Remaining days per colour for the running season (a season runs
/// September through August). The cheapest colour is never rationed, so it
/// may be absent from the map.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct SeasonQuota {
    pub season_id: String,
    pub season_end: NaiveDate,
    remaining: IndexMap<CalendarColor, u32>,
}

impl SeasonQuota {
    pub fn new(
        season_id: String,
        season_end: NaiveDate,
        remaining: IndexMap<CalendarColor, u32>,
    ) -> Self {
        Self {
            season_id,
            season_end,
            remaining,
        }
    }

    pub fn remaining(&self, color: CalendarColor) -> u32 {
        self.remaining.get(&color).copied().unwrap_or(0)
    }

    fn consume(&mut self, color: CalendarColor) {
        if let Some(remaining) = self.remaining.get_mut(&color) {
            if *remaining == 0 {
                warn!(season = %self.season_id, %color, "season quota already exhausted");
            } else {
                *remaining -= 1;
            }
        }
    }
}

/// A resolved calendar day.
#[derive(Clone, Debug, PartialEq)]
pub struct ColorCalendarEntry {
    pub date: NaiveDate,
    pub color: CalendarColor,
    pub confidence: EntryConfidence,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EntryConfidence {
    /// The colour was observed and recorded in the ledger.
    Known,
    /// The colour is a model prediction for an upcoming day. The level and
    /// distribution are advisory only; cost computation uses the resolved
    /// colour and nothing else.
    Forecast {
        level: ConfidenceLevel,
        distribution: ColorDistribution,
    },
}

/// The historical record of observed day colours plus the running quota.
/// Append-only: `record` never overwrites an existing day.
#[derive(Clone, Debug, PartialEq)]
pub struct CalendarLedger {
    entries: IndexMap<NaiveDate, CalendarColor>,
    quota: SeasonQuota,
}

impl CalendarLedger {
    pub fn new(
        entries: impl IntoIterator<Item = (NaiveDate, CalendarColor)>,
        quota: SeasonQuota,
    ) -> Result<Self, EngineError> {
        let mut deduped: IndexMap<NaiveDate, CalendarColor> = IndexMap::new();
        for (date, color) in entries {
            if deduped.insert(date, color).is_some() {
                return Err(EngineError::DuplicateLedgerDay(date));
            }
        }
        deduped.sort_keys();
        Ok(Self {
            entries: deduped,
            quota,
        })
    }

    /// Append a newly-observed day and consume its quota. This is the only
    /// mutation the calendar supports and it happens outside the pure
    /// comparison pipeline.
    pub fn record(&mut self, date: NaiveDate, color: CalendarColor) -> Result<(), EngineError> {
        if self.entries.contains_key(&date) {
            return Err(EngineError::DuplicateLedgerDay(date));
        }
        self.entries.insert(date, color);
        self.entries.sort_keys();
        self.quota.consume(color);
        debug!(%date, %color, "recorded observed calendar day");
        Ok(())
    }

    pub fn color_for(&self, date: NaiveDate) -> Option<CalendarColor> {
        self.entries.get(&date).copied()
    }

    pub fn quota(&self) -> &SeasonQuota {
        &self.quota
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// The day→colour lookup the classifier consults: ledger first, forecaster
/// for days after `today`.
#[derive(Clone, Debug)]
pub struct ColorCalendar<'a> {
    ledger: &'a CalendarLedger,
    forecaster: TempoForecaster<'a>,
    today: NaiveDate,
}

impl<'a> ColorCalendar<'a> {
    pub fn new(ledger: &'a CalendarLedger, forecaster: TempoForecaster<'a>, today: NaiveDate) -> Self {
        Self {
            ledger,
            forecaster,
            today,
        }
    }

    /// Resolve one day. A recorded day always wins, even in the future; a
    /// past day missing from the ledger is `UnknownCalendarDay`.
    pub fn lookup(&self, date: NaiveDate) -> Result<ColorCalendarEntry, EngineError> {
        if let Some(color) = self.ledger.color_for(date) {
            return Ok(ColorCalendarEntry {
                date,
                color,
                confidence: EntryConfidence::Known,
            });
        }
        if date <= self.today {
            return Err(EngineError::UnknownCalendarDay(date));
        }
        self.forecaster.forecast(date)
    }
}
