//! Rendering and parsing of the `Date` header value.

use chrono::{DateTime, NaiveDateTime, Utc};

use crate::constants::DATE_FORMAT;

/// Render an instant as a `Date` header value, truncated to whole seconds.
#[must_use]
pub fn format_http_date(instant: &DateTime<Utc>) -> String {
    instant.format(DATE_FORMAT).to_string()
}

/// Parse a `Date` header value. Returns `None` when it does not follow
/// [`DATE_FORMAT`], including a weekday that disagrees with the date.
#[must_use]
pub fn parse_http_date(value: &str) -> Option<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_FORMAT)
        .ok()
        .map(|naive| naive.and_utc())
}
