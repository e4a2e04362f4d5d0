//! Wall-clock helpers and ingest timestamp parsing.
//!
//! Sensor feeds report `time_of_ingest` either as RFC 3339 with an explicit
//! offset or as a naive ISO 8601 date-time. Naive values are UTC.

use chrono::{DateTime, NaiveDateTime, Utc};

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Current instant in UTC.
#[must_use]
pub fn now_utc() -> DateTime<Utc> {
    Utc::now()
}

/// Parse an ingest timestamp and normalize it to UTC.
///
/// Naive values are read as UTC. Offset values keep their instant, so
/// `18:00:00+02:00` becomes `16:00:00Z`, not `18:00:00Z`.
///
/// Returns `None` when the value matches none of the accepted shapes.
#[must_use]
pub fn parse_ingest_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(with_offset) = DateTime::parse_from_rfc3339(value) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NAIVE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(value, fmt).ok())
        .map(|naive| naive.and_utc())
}
