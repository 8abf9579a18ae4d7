//! Timestamp parsing to UTC.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

/// Naive formats, interpreted as UTC.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
];

/// Offset-carrying formats not covered by RFC 3339.
const OFFSET_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%:z",
    "%Y-%m-%d %H:%M:%S%.f%:z",
    "%Y-%m-%d %H:%M:%S%#z",
];

/// Parse a timestamp string to UTC.
///
/// Accepts RFC 3339 (`2021-01-01T00:00:00+01:00`, `...Z`), the same with a
/// space separator, naive date-times (`2021-01-01T00:00`, as served by the
/// weather archive) and plain dates. Naive values are taken to be UTC.
/// Returns `None` when nothing matches.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    for fmt in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(s, fmt) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(naive.and_utc());
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn parses_rfc3339_with_offset_to_utc() {
        let ts = parse_timestamp("2021-01-01T01:00:00+01:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap());

        let zulu = parse_timestamp("2021-06-30T23:00:00Z").unwrap();
        assert_eq!(zulu, Utc.with_ymd_and_hms(2021, 6, 30, 23, 0, 0).unwrap());
    }

    #[test]
    fn parses_space_separated_offset() {
        let ts = parse_timestamp("2021-03-01 12:00:00+00:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2021, 3, 1, 12, 0, 0).unwrap());
    }

    #[test]
    fn parses_naive_archive_format_as_utc() {
        let ts = parse_timestamp("2021-07-01T05:00").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2021, 7, 1, 5, 0, 0).unwrap());

        let ts = parse_timestamp(" 2021-07-01 05:30:00 ").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2021, 7, 1, 5, 30, 0).unwrap());
    }

    #[test]
    fn parses_plain_date_at_midnight() {
        let ts = parse_timestamp("2022-02-28").unwrap();
        assert_eq!(ts, Utc.with_ymd_and_hms(2022, 2, 28, 0, 0, 0).unwrap());
    }

    #[test]
    fn rejects_garbage() {
        assert!(parse_timestamp("").is_none());
        assert!(parse_timestamp("yesterday").is_none());
        assert!(parse_timestamp("2021-13-01T00:00").is_none());
    }
}
