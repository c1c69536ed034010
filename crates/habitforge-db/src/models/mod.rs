//! Database models for persistent storage.
//!
//! Records are stored flat: enums become strings and timestamps become
//! milliseconds since the Unix epoch.

mod habit;
mod user;

pub use habit::*;
pub use user::*;

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};

pub(crate) fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

pub(crate) fn from_millis(ms: i64) -> Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or_else(|| Error::Corrupt(format!("timestamp {} out of range", ms)))
}
