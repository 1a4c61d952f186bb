//! Read-side estimators over the observation log.
//!
//! Both estimators are monitoring signals rather than correctness-critical
//! reads: a log that cannot be read is reported as "no data" (with a
//! warning) instead of an error.

use tidal_core::CalendarBucket;
use tracing::warn;

use crate::store::ObservationLog;

/// Width of the trailing window used for the request rate.
pub const RATE_WINDOW_SECS: f64 = 60.0;

/// Count observations strictly newer than `now - 60s`.
pub fn requests_per_minute(log: &dyn ObservationLog, now: f64) -> u64 {
    let cutoff = now - RATE_WINDOW_SECS;
    match log.scan(&|r| r.timestamp > cutoff) {
        Ok(recent) => recent.len() as u64,
        Err(e) => {
            warn!(error = %e, "observation log unreadable, reporting zero rate");
            0
        }
    }
}

/// Mean `observed_requests` over records in exactly this bucket.
///
/// `None` means the bucket has no history yet, which is different from a
/// history of zero traffic.
pub fn historical_average(log: &dyn ObservationLog, bucket: CalendarBucket) -> Option<f64> {
    let matches = match log.scan(&|r| r.bucket() == bucket) {
        Ok(m) => m,
        Err(e) => {
            warn!(
                error = %e,
                day_of_week = bucket.day_of_week,
                hour = bucket.hour,
                "observation log unreadable, no historical average"
            );
            return None;
        }
    };

    if matches.is_empty() {
        return None;
    }
    let total: f64 = matches.iter().map(|r| r.observed_requests as f64).sum();
    Some(total / matches.len() as f64)
}
