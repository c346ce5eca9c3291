use time::format_description::well_known::Rfc3339;
use time::{OffsetDateTime, UtcOffset};

use crate::error::AppError;

/// Source of "now" for every mutating operation.
///
/// The store never reads the wall clock itself; callers pass a clock so tests can pin time.
pub trait Clock {
    fn now_utc(&self) -> OffsetDateTime;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_utc(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock(pub OffsetDateTime);

impl Clock for FixedClock {
    fn now_utc(&self) -> OffsetDateTime {
        self.0
    }
}

/// Canonical stored form: RFC3339 UTC, whole seconds (`2026-01-01T09:00:00Z`).
///
/// Fixed width keeps `ORDER BY created_date` lexical order identical to chronological order.
pub fn format_ts(dt: OffsetDateTime) -> Result<String, AppError> {
    let utc = dt.to_offset(UtcOffset::UTC);
    let whole = utc.replace_nanosecond(0).map_err(|e| {
        AppError::new("TS_FORMAT_FAILED", "Failed to truncate timestamp")
            .with_details(e.to_string())
    })?;
    whole.format(&Rfc3339).map_err(|e| {
        AppError::new("TS_FORMAT_FAILED", "Failed to format timestamp").with_details(e.to_string())
    })
}

pub fn parse_ts(field: &str, raw: &str) -> Result<OffsetDateTime, AppError> {
    OffsetDateTime::parse(raw, &Rfc3339).map_err(|e| {
        AppError::new("TS_PARSE_FAILED", format!("Failed to parse stored {field}"))
            .with_details(format!("value={raw}; err={e}"))
    })
}

pub fn now_ts(clock: &dyn Clock) -> Result<String, AppError> {
    format_ts(clock.now_utc())
}
