//! Quota-day boundary — maps an instant to a calendar date in the
//! anchor timezone.
//!
//! All daily counters roll over when this date changes, independent of
//! the host's system timezone. Pure functions, unit-testable without
//! touching the wall clock.

use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Build the anchor offset from whole hours east of UTC.
/// Out-of-range values fall back to UTC rather than panicking.
pub fn anchor_offset(utc_offset_hours: i32) -> FixedOffset {
    FixedOffset::east_opt(utc_offset_hours * 3600)
        .unwrap_or_else(|| FixedOffset::east_opt(0).unwrap())
}

/// The quota day an instant belongs to.
///
/// Two instants share a key iff they fall on the same local calendar
/// date in the anchor timezone. Monotonic in the instant.
pub fn quota_day(instant: DateTime<Utc>, anchor: FixedOffset) -> NaiveDate {
    instant.with_timezone(&anchor).date_naive()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn same_local_date_same_key() {
        let tz = anchor_offset(6);
        // 00:30 and 17:59 local on the same UTC+6 day
        let a = at(2026, 3, 10, 18, 30); // Mar 11 00:30 local
        let b = at(2026, 3, 11, 11, 59); // Mar 11 17:59 local
        assert_eq!(quota_day(a, tz), quota_day(b, tz));
    }

    #[test]
    fn local_midnight_is_the_boundary() {
        let tz = anchor_offset(6);
        // 17:59:xx UTC is 23:59 local; 18:00 UTC is 00:00 local next day
        let before = at(2026, 3, 10, 17, 59);
        let after = at(2026, 3, 10, 18, 0);
        assert_ne!(quota_day(before, tz), quota_day(after, tz));
        assert_eq!(
            quota_day(after, tz),
            quota_day(before, tz).succ_opt().unwrap()
        );
    }

    #[test]
    fn utc_midnight_is_not_the_boundary() {
        let tz = anchor_offset(6);
        let before = at(2026, 3, 10, 23, 30);
        let after = at(2026, 3, 11, 0, 30);
        assert_eq!(quota_day(before, tz), quota_day(after, tz));
    }

    #[test]
    fn monotonic() {
        let tz = anchor_offset(6);
        let mut prev = quota_day(at(2026, 1, 1, 0, 0), tz);
        for day in 1..60 {
            let t = at(2026, 1, 1, 0, 0) + chrono::Duration::hours(day * 7);
            let key = quota_day(t, tz);
            assert!(key >= prev);
            prev = key;
        }
    }

    #[test]
    fn bad_offset_falls_back_to_utc() {
        let tz = anchor_offset(99);
        assert_eq!(tz.local_minus_utc(), 0);
    }
}
