//! Datetime parsing shared by type inference, resampling and charting

use chrono::{DateTime, NaiveDate, NaiveDateTime};

const DATETIME_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

const DATE_FORMATS: [&str; 2] = ["%Y-%m-%d", "%Y/%m/%d"];

/// Parse a string as a datetime
///
/// Accepts RFC 3339 (offset normalised to UTC), ISO-like datetimes with `T`
/// or a space separator, and plain dates (midnight).
pub fn parse_datetime(s: &str) -> Option<NaiveDateTime> {
    let s = s.trim();
    // Fast reject: every accepted format starts with a 4-digit year
    if s.len() < 8 || !s.as_bytes()[..4].iter().all(u8::is_ascii_digit) {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }

    for fmt in DATETIME_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    for fmt in DATE_FORMATS {
        if let Ok(d) = NaiveDate::parse_from_str(s, fmt) {
            return d.and_hms_opt(0, 0, 0);
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, Timelike};

    #[test]
    fn test_parse_plain_date() {
        let dt = parse_datetime("2024-03-15").unwrap();
        assert_eq!((dt.year(), dt.month(), dt.day()), (2024, 3, 15));
        assert_eq!(dt.hour(), 0);

        assert!(parse_datetime("2024/03/15").is_some());
    }

    #[test]
    fn test_parse_datetime_variants() {
        assert!(parse_datetime("2024-03-15T10:30:00").is_some());
        assert!(parse_datetime("2024-03-15 10:30:00.250").is_some());
        assert!(parse_datetime("2024-03-15 10:30").is_some());

        let dt = parse_datetime("2024-03-15T10:30:00+02:00").unwrap();
        assert_eq!(dt.hour(), 8);
    }

    #[test]
    fn test_rejects_non_dates() {
        assert!(parse_datetime("east").is_none());
        assert!(parse_datetime("12345").is_none());
        assert!(parse_datetime("2024").is_none());
        assert!(parse_datetime("2024-13-45").is_none());
    }
}
