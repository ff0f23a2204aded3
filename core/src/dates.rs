//! Lenient calendar-date handling for billing fields.
//!
//! Unparsable values degrade to `None`. Callers decide whether to log.

use chrono::{Months, NaiveDate, NaiveDateTime};

/// Formats tried in order when no configuration is supplied.
/// `%m/%d/%Y` matches the upload template (`1/14/2025`).
pub const DEFAULT_DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%dT%H:%M:%S",
    "%Y%m%d",
];

/// Storage format for dates written to SQLite and CSV.
pub const STORAGE_FORMAT: &str = "%Y-%m-%d";

/// Sentinels that mean "no value" rather than "bad value".
const NULL_TOKENS: &[&str] = &["", "nat", "nan", "none", "null"];

pub fn is_blank(raw: &str) -> bool {
    let t = raw.trim().to_ascii_lowercase();
    NULL_TOKENS.contains(&t.as_str())
}

pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    parse_date_with(raw, DEFAULT_DATE_FORMATS)
}

pub fn parse_date_with<S: AsRef<str>>(raw: &str, formats: &[S]) -> Option<NaiveDate> {
    if is_blank(raw) {
        return None;
    }
    let raw = raw.trim();
    formats.iter().map(AsRef::as_ref).find_map(|fmt| {
        if fmt.contains("%H") {
            NaiveDateTime::parse_from_str(raw, fmt).ok().map(|dt| dt.date())
        } else {
            NaiveDate::parse_from_str(raw, fmt).ok()
        }
    })
}

/// Same day next month, clamped to the last day when the target month is
/// shorter (Jan 31 -> Feb 28).
pub fn add_one_month(date: NaiveDate) -> Option<NaiveDate> {
    date.checked_add_months(Months::new(1))
}

pub fn format_date(date: Option<NaiveDate>) -> Option<String> {
    date.map(|d| d.format(STORAGE_FORMAT).to_string())
}
