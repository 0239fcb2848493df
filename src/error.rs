//! Error types for triage-engine.
//!
//! Only contract violations and infrastructure failures live here. Lock
//! contention is reported through result enums in [`crate::lock`], never
//! through `Error`.

use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid time range: deadline {deadline} is not after receipt {received_at}")]
    InvalidTimeRange {
        received_at: DateTime<Utc>,
        deadline: DateTime<Utc>,
    },

    #[error("empty {0} id")]
    EmptyId(&'static str),

    #[error("document type weight {0} is outside 0..=10")]
    InvalidWeight(u8),

    #[error("invalid lease duration: {0:?}")]
    InvalidLease(std::time::Duration),

    #[error("invalid triage policy: {0}")]
    InvalidPolicy(String),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
