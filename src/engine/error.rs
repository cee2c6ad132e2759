use chrono::NaiveDate;
use ulid::Ulid;

use crate::model::SlotTime;

#[derive(Debug)]
pub enum EngineError {
    /// Bad input rejected before any write.
    Validation(&'static str),
    /// The requested (date, time) cannot be booked. Covers both a genuine
    /// slot conflict and a shadow-banned commit — the two are deliberately
    /// indistinguishable, including in the message.
    SlotUnavailable { date: NaiveDate, time: SlotTime },
    NotFound(&'static str, Ulid),
    LimitExceeded(&'static str),
    /// Persistence failure; safe for the caller to retry.
    WalError(String),
}

impl std::fmt::Display for EngineError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineError::Validation(msg) => write!(f, "invalid request: {msg}"),
            EngineError::SlotUnavailable { date, time } => {
                write!(f, "{time} on {date} is not available")
            }
            EngineError::NotFound(kind, id) => write!(f, "{kind} not found: {id}"),
            EngineError::LimitExceeded(msg) => write!(f, "limit exceeded: {msg}"),
            EngineError::WalError(e) => write!(f, "WAL error: {e}"),
        }
    }
}

impl std::error::Error for EngineError {}
