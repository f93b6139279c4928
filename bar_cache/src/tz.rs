//! Timestamp storage and display helpers.
//!
//! What this module provides:
//! - [`to_rfc3339_millis`] / [`parse_ts_to_utc`]: the on-disk representation of every
//!   timestamp column. Fixed width (millisecond precision, `Z` suffix) so that
//!   lexicographic order in SQLite equals chronological order and `MAX(ts)` is the
//!   newest bar.
//! - [`parse_display_tz`] / [`to_display`] / [`format_display`]: rendering instants in the
//!   configured display zone (e.g. "US/Eastern"). Storage and cache arithmetic stay in UTC;
//!   local time only exists at the CLI edge.
//!
//! Examples
//! - "2024-03-10T09:30:00-05:00" parses to 14:30Z and is stored as "2024-03-10T14:30:00.000Z".
//! - 2024-07-01 13:30Z displays as "2024-07-01 09:30 EDT" in US/Eastern.

use chrono::{DateTime, SecondsFormat, Utc};
use chrono_tz::Tz;

/// RFC-3339 with offset -> UTC.
pub fn parse_ts_to_utc(s: &str) -> Result<DateTime<Utc>, chrono::ParseError> {
    Ok(DateTime::parse_from_rfc3339(s)?.with_timezone(&Utc))
}

/// Format a UTC datetime as an RFC-3339 string with millisecond precision.
pub fn to_rfc3339_millis(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Parse an IANA zone name, including legacy links such as "US/Eastern".
pub fn parse_display_tz(name: &str) -> Result<Tz, String> {
    name.trim()
        .parse::<Tz>()
        .map_err(|_| format!("unknown time zone: {name:?}"))
}

pub fn to_display(dt: DateTime<Utc>, tz: Tz) -> DateTime<Tz> {
    dt.with_timezone(&tz)
}

/// Human-readable local rendering; intraday bars keep the clock time and zone
/// abbreviation, daily and wider bars show the date only.
pub fn format_display(dt: DateTime<Utc>, tz: Tz, intraday: bool) -> String {
    let local = to_display(dt, tz);
    if intraday {
        local.format("%Y-%m-%d %H:%M %Z").to_string()
    } else {
        local.format("%Y-%m-%d").to_string()
    }
}
