use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;
use thiserror::Error;

/// Failure kinds raised by the engine. All of them are local validation
/// failures: the engine performs no I/O and never retries anything.
#[derive(Clone, Debug, Error, PartialEq, Serialize)]
pub enum EngineError {
    #[error("Malformed interval duration token '{0}'")]
    MalformedDuration(String),
    #[error("Negative energy value {value} in the reading ending at {end}")]
    NegativeEnergy { end: DateTime<Utc>, value: f64 },
    #[error("No calendar entry could be resolved for {0}")]
    UnknownCalendarDay(NaiveDate),
    #[error("Tariff family '{0}' is not supported by this engine")]
    UnsupportedFamily(String),
    #[error("Offer '{offer_id}' prices a label set that does not match its family's alphabet")]
    LabelMismatch { offer_id: String },
    #[error("Offer '{offer_id}' is sold for {offer_kva} kVA but the household subscribes {subscribed_kva} kVA")]
    IncompatiblePower {
        offer_id: String,
        offer_kva: f64,
        subscribed_kva: f64,
    },
    #[error("The calendar ledger already holds an entry for {0}")]
    DuplicateLedgerDay(NaiveDate),
}
