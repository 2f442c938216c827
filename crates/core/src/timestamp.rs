//! Timestamp parsing for reading keys and `createdAt_time` values.
//!
//! The ingest process writes keys like `2024-01-01_00:00:00` (an ISO-8601
//! timestamp with `T` replaced by `_`, since some stores reject certain key
//! characters) and values without a zone designator. Naive timestamps are
//! interpreted as UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

use crate::types::Timestamp;

const NAIVE_FORMATS: [&str; 2] = ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M"];

/// Replace the `_` date/time separator used in store keys with `T`.
pub fn normalize_key(key: &str) -> String {
    key.trim().replace('_', "T")
}

/// Parse a reading timestamp or key.
///
/// Accepts RFC 3339, naive `YYYY-MM-DDTHH:MM[:SS[.fff]]` and bare dates, with
/// either `T` or `_` as separator. Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let normalized = normalize_key(raw);

    if let Ok(dt) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(&normalized, format) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(&normalized, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> Timestamp {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, s).unwrap()
    }

    #[test]
    fn parses_rfc3339_with_offset() {
        assert_eq!(
            parse_timestamp("2024-01-01T02:00:00+02:00"),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
    }

    #[test]
    fn parses_naive_as_utc() {
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00"),
            Some(utc(2024, 1, 1, 0, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2024-01-01T00:00:00.250").map(|t| t.timestamp_millis() % 1000),
            Some(250)
        );
    }

    #[test]
    fn parses_underscore_key() {
        assert_eq!(
            parse_timestamp("2024-03-05_14:30:00"),
            Some(utc(2024, 3, 5, 14, 30, 0))
        );
    }

    #[test]
    fn parses_minute_precision_and_bare_date() {
        assert_eq!(parse_timestamp("2024-03-05T14:30"), Some(utc(2024, 3, 5, 14, 30, 0)));
        assert_eq!(parse_timestamp("2024-03-05"), Some(utc(2024, 3, 5, 0, 0, 0)));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(parse_timestamp("reading-17"), None);
        assert_eq!(parse_timestamp(""), None);
    }
}
