use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};

// Stored timestamps are naive UTC ISO-8601 strings. Fixed-width formatting keeps them
// lexicographically comparable in SQL.
const STORED_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6f";

const NAIVE_FORMATS: [&str; 3] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
];

/// Parses a stored or caller-supplied timestamp into naive UTC.
///
/// Accepts RFC 3339 (offset is normalized to UTC), naive ISO-8601 with or without
/// fractional seconds, and bare dates (midnight). Returns `None` for anything else.
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc).naive_utc());
    }

    for fmt in NAIVE_FORMATS {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(dt);
        }
    }

    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
}

pub fn to_stored(now: DateTime<Utc>) -> String {
    now.naive_utc().format(STORED_FORMAT).to_string()
}

/// Hours from `now` until `at`. Negative when `at` is in the past.
pub fn hours_until(at: NaiveDateTime, now: NaiveDateTime) -> f64 {
    (at - now).num_milliseconds() as f64 / 3_600_000.0
}

/// Inclusive end-of-day bound for a date-only filter value.
pub fn end_of_day_bound(raw: &str) -> String {
    let s = raw.trim();
    if s.contains('T') {
        s.to_string()
    } else {
        format!("{s}T23:59:59")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn naive(y: i32, m: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, m, d)
            .unwrap()
            .and_hms_opt(h, mi, s)
            .unwrap()
    }

    #[test]
    fn parses_naive_iso_strings() {
        assert_eq!(
            parse_timestamp("2027-06-15T08:00:00"),
            Some(naive(2027, 6, 15, 8, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2027-06-15T08:00:00.250000").map(|d| d.and_utc().timestamp_millis()),
            Some(naive(2027, 6, 15, 8, 0, 0).and_utc().timestamp_millis() + 250)
        );
        assert_eq!(
            parse_timestamp("2027-06-15 08:00:00"),
            Some(naive(2027, 6, 15, 8, 0, 0))
        );
    }

    #[test]
    fn normalizes_offsets_to_utc() {
        assert_eq!(
            parse_timestamp("2027-06-15T10:00:00+02:00"),
            Some(naive(2027, 6, 15, 8, 0, 0))
        );
        assert_eq!(
            parse_timestamp("2027-06-15T08:00:00Z"),
            Some(naive(2027, 6, 15, 8, 0, 0))
        );
    }

    #[test]
    fn bare_date_is_midnight() {
        assert_eq!(parse_timestamp("2027-06-15"), Some(naive(2027, 6, 15, 0, 0, 0)));
    }

    #[test]
    fn garbage_is_none() {
        assert_eq!(parse_timestamp(""), None);
        assert_eq!(parse_timestamp("next tuesday"), None);
        assert_eq!(parse_timestamp("2027-13-45T00:00:00"), None);
    }

    #[test]
    fn stored_format_round_trips_and_sorts() {
        let now = Utc.with_ymd_and_hms(2026, 10, 19, 12, 0, 0).unwrap();
        let s = to_stored(now);
        assert_eq!(s, "2026-10-19T12:00:00.000000");
        assert_eq!(parse_timestamp(&s), Some(now.naive_utc()));
        assert!(s.as_str() < "2026-10-19T12:00:01");
    }

    #[test]
    fn end_of_day_only_for_date_values() {
        assert_eq!(end_of_day_bound("2027-06-17"), "2027-06-17T23:59:59");
        assert_eq!(end_of_day_bound("2027-06-17T10:00:00"), "2027-06-17T10:00:00");
    }

    #[test]
    fn hours_until_is_signed() {
        let now = naive(2026, 1, 1, 0, 0, 0);
        assert_eq!(hours_until(naive(2026, 1, 1, 6, 30, 0), now), 6.5);
        assert_eq!(hours_until(naive(2025, 12, 31, 23, 0, 0), now), -1.0);
    }
}
