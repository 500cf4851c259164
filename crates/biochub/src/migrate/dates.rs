//! Lenient parsing of snapshot text columns

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

const DATETIME_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"];

/// Parse a snapshot timestamp. Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.f]`,
/// `YYYY-MM-DDTHH:MM:SS[.f]` and plain dates (midnight UTC). Naive values are
/// taken as UTC.
pub fn parse_datetime(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

/// Outcome of reading an optional date column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateField {
    Absent,
    Valid(DateTime<Utc>),
    Malformed,
}

impl DateField {
    pub fn read(raw: Option<&str>) -> Self {
        match raw.map(str::trim).filter(|s| !s.is_empty()) {
            None => DateField::Absent,
            Some(value) => parse_datetime(value).map_or(DateField::Malformed, DateField::Valid),
        }
    }

    pub fn value(self) -> Option<DateTime<Utc>> {
        match self {
            DateField::Valid(dt) => Some(dt),
            _ => None,
        }
    }

    pub fn is_malformed(self) -> bool {
        self == DateField::Malformed
    }
}

/// SQLite has no boolean type; hubs store flags as `1`/`0` or words.
pub fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "t" | "yes" => Some(true),
        "0" | "false" | "f" | "no" => Some(false),
        _ => None,
    }
}

/// File size in bytes. Only plain digit strings are accepted.
pub fn parse_size(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if raw.is_empty() || !raw.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    raw.parse().ok()
}
