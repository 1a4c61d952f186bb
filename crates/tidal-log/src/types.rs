//! Observation record type.

use serde::{Deserialize, Serialize};
use tidal_core::CalendarBucket;

/// One served prediction: when it happened, which seasonal bucket it fell
/// into, how many requests it represented and what the model predicted.
///
/// Records are immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ObservationRecord {
    /// Seconds since the unix epoch.
    pub timestamp: f64,
    /// 0 = Monday.
    pub day_of_week: u8,
    pub hour: u8,
    pub observed_requests: u64,
    /// Post-floor traffic estimate (never negative).
    pub predicted_traffic: f64,
}

impl ObservationRecord {
    pub fn new(
        timestamp: f64,
        bucket: CalendarBucket,
        observed_requests: u64,
        predicted_traffic: f64,
    ) -> Self {
        Self {
            timestamp,
            day_of_week: bucket.day_of_week,
            hour: bucket.hour,
            observed_requests,
            predicted_traffic,
        }
    }

    pub fn bucket(&self) -> CalendarBucket {
        CalendarBucket {
            day_of_week: self.day_of_week,
            hour: self.hour,
        }
    }
}
