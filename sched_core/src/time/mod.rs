pub mod mjd;

pub use mjd::{datetime_to_mjd, mjd_to_datetime};

use chrono::{DateTime, Duration, Utc};

/// Signed number of seconds from `from` to `to`, at microsecond resolution.
pub fn seconds_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    let delta = to - from;
    match delta.num_microseconds() {
        Some(us) => us as f64 / 1e6,
        None => delta.num_milliseconds() as f64 / 1e3,
    }
}

/// Shift an instant by a (possibly fractional, possibly negative) number of seconds.
pub fn offset_by_seconds(t: DateTime<Utc>, seconds: f64) -> DateTime<Utc> {
    t + Duration::microseconds((seconds * 1e6).round() as i64)
}

/// Midpoint of an interval.
pub fn midpoint(start: DateTime<Utc>, end: DateTime<Utc>) -> DateTime<Utc> {
    start + (end - start) / 2
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_between_and_offset() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let t1 = offset_by_seconds(t0, 90.5);
        assert!((seconds_between(t0, t1) - 90.5).abs() < 1e-9);
        assert!((seconds_between(t1, t0) + 90.5).abs() < 1e-9);
    }

    #[test]
    fn test_midpoint() {
        let t0 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let t1 = Utc.with_ymd_and_hms(2024, 3, 1, 12, 10, 0).unwrap();
        assert_eq!(midpoint(t0, t1), Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap());
    }
}
