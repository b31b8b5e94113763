use std::sync::LazyLock;

use chrono::{NaiveDate, NaiveTime};
use regex::Regex;
use tracing::debug;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
pub const TIME_FORMAT: &str = "%H:%M";

static DATE_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("date pattern compiles"));
static TIME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{2}:\d{2}$").expect("time pattern compiles"));

/// Parse a `YYYY-MM-DD` wire date. The shape is checked before the calendar.
pub fn validate_date(value: &str) -> Result<NaiveDate, String> {
    if !DATE_PATTERN.is_match(value) {
        debug!("Rejected malformed date {:?}", value);
        return Err(format!("Date must be in YYYY-MM-DD format, got {:?}", value));
    }

    NaiveDate::parse_from_str(value, DATE_FORMAT)
        .map_err(|_| format!("Date {:?} is not a valid calendar date", value))
}

/// Parse an `HH:MM` 24h wire time.
pub fn validate_time(value: &str) -> Result<NaiveTime, String> {
    if !TIME_PATTERN.is_match(value) {
        debug!("Rejected malformed time {:?}", value);
        return Err(format!("Time must be in HH:MM format, got {:?}", value));
    }

    NaiveTime::parse_from_str(value, TIME_FORMAT)
        .map_err(|_| format!("Time {:?} is not a valid 24h time", value))
}

/// Accepts both `HH:MM` and the `HH:MM:SS` form the database returns.
pub fn parse_stored_time(value: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(value, "%H:%M:%S")
        .or_else(|_| NaiveTime::parse_from_str(value, TIME_FORMAT))
        .map_err(|_| format!("Unrecognised time value {:?}", value))
}
