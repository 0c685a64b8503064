//! Civil-day and epoch-microsecond helpers.
//!
//! Sample times throughout the crate are microseconds since the Unix
//! epoch; the outer unit of work is a civil calendar day at UTC.

use chrono::{DateTime, NaiveDate, Utc};

/// Microseconds in one civil day.
pub const DAY_US: i64 = 86_400_000_000;

/// Epoch microseconds at 00:00:00 UTC of `date`.
pub fn day_start_us(date: NaiveDate) -> i64 {
    let midnight = date.and_hms_opt(0, 0, 0).expect("midnight is always valid");
    midnight.and_utc().timestamp_micros()
}

/// Epoch microseconds at 24:00:00 UTC of `date` (exclusive day end).
pub fn day_end_us(date: NaiveDate) -> i64 {
    day_start_us(date) + DAY_US
}

/// Convert epoch microseconds to a UTC datetime, for log and report
/// rendering.
pub fn us_to_utc(us: i64) -> DateTime<Utc> {
    DateTime::from_timestamp_micros(us).expect("microsecond timestamp in range")
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    #[test]
    fn day_bounds_span_one_day() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        assert_eq!(day_end_us(date) - day_start_us(date), DAY_US);
    }

    #[test]
    fn epoch_day_starts_at_zero() {
        let date = NaiveDate::from_ymd_opt(1970, 1, 1).unwrap();
        assert_eq!(day_start_us(date), 0);
        assert_eq!(day_end_us(date), DAY_US);
    }

    #[test]
    fn us_to_utc_preserves_time_of_day() {
        let date = NaiveDate::from_ymd_opt(2026, 2, 20).unwrap();
        let us = day_start_us(date) + 12 * 3_600_000_000 + 345;
        let dt = us_to_utc(us);
        assert_eq!(dt.hour(), 12);
        assert_eq!(dt.timestamp_micros(), us);
    }

    #[test]
    fn consecutive_days_abut() {
        let a = NaiveDate::from_ymd_opt(2026, 2, 28).unwrap();
        let b = NaiveDate::from_ymd_opt(2026, 3, 1).unwrap();
        assert_eq!(day_end_us(a), day_start_us(b));
    }
}
