use chrono::{DateTime, Utc};

/// MJD of the Unix epoch (1970-01-01T00:00:00Z).
const MJD_UNIX_EPOCH: f64 = 40587.0;
const SECONDS_PER_DAY: f64 = 86400.0;

/// Convert a Modified Julian Date to a UTC instant.
///
/// Access tables produced upstream carry their timestamps in MJD; this is the
/// entry point for turning them into window boundaries.
///
/// # Arguments
/// * `mjd` - Modified Julian Date value
///
/// # Returns
/// * `Some(DateTime<Utc>)` for representable dates, `None` otherwise
///
/// # Example
/// ```
/// use constellation_sched::time::mjd_to_datetime;
/// let dt = mjd_to_datetime(40587.5).unwrap();
/// assert_eq!(dt.to_rfc3339(), "1970-01-01T12:00:00+00:00");
/// ```
pub fn mjd_to_datetime(mjd: f64) -> Option<DateTime<Utc>> {
    if !mjd.is_finite() {
        return None;
    }
    let total_seconds = (mjd - MJD_UNIX_EPOCH) * SECONDS_PER_DAY;
    let whole = total_seconds.floor();
    let nanos = ((total_seconds - whole) * 1e9).round() as u32;
    DateTime::from_timestamp(whole as i64, nanos.min(999_999_999))
}

/// Convert a UTC instant to a Modified Julian Date
///
/// # Arguments
/// * `dt` - instant in UTC
///
/// # Returns
/// * `f64` - Modified Julian Date value
pub fn datetime_to_mjd(dt: &DateTime<Utc>) -> f64 {
    let seconds = dt.timestamp() as f64 + f64::from(dt.timestamp_subsec_nanos()) / 1e9;
    seconds / SECONDS_PER_DAY + MJD_UNIX_EPOCH
}
