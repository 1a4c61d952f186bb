//! Feature vectors and calendar buckets.
//!
//! Predictors consume a fixed 16-slot vector: fourteen load slots followed
//! by the normalized day-of-week (`dow / 6`) and hour (`hour / 23`). Every
//! load slot holds `log1p(max(1, load))`; the two time slots are not
//! log-transformed. The prediction service's default vector and the control
//! loop's vector are both built by [`FeatureVector::from_load`], so a given
//! load and bucket always produce the same input regardless of the caller.

use chrono::{DateTime, Datelike, Local, Timelike};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Total number of entries in a feature vector.
pub const FEATURE_COUNT: usize = 16;

/// Number of leading entries that encode request load.
pub const LOAD_SLOTS: usize = FEATURE_COUNT - 2;

/// A caller-supplied row could not be turned into a feature vector.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FeatureError {
    #[error("feature vector must have {expected} entries, got {actual}")]
    WrongLength { expected: usize, actual: usize },

    #[error("feature {index} is not a finite number")]
    NotFinite { index: usize },
}

/// A (day-of-week, hour) seasonal bucket in local time. Monday is day 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CalendarBucket {
    pub day_of_week: u8,
    pub hour: u8,
}

impl CalendarBucket {
    /// Build a bucket, rejecting out-of-range values.
    pub fn new(day_of_week: u8, hour: u8) -> Option<Self> {
        (day_of_week <= 6 && hour <= 23).then_some(Self { day_of_week, hour })
    }

    /// The bucket a local timestamp falls into.
    pub fn at(time: &DateTime<Local>) -> Self {
        Self {
            day_of_week: time.weekday().num_days_from_monday() as u8,
            hour: time.hour() as u8,
        }
    }

    /// Day of week scaled to [0, 1].
    pub fn dow_norm(&self) -> f64 {
        f64::from(self.day_of_week) / 6.0
    }

    /// Hour scaled to [0, 1].
    pub fn hour_norm(&self) -> f64 {
        f64::from(self.hour) / 23.0
    }
}

/// Fixed-length predictor input.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FeatureVector([f64; FEATURE_COUNT]);

impl FeatureVector {
    /// Canonical vector for an observed load (requests) in a bucket.
    ///
    /// Loads below one request are encoded as one.
    pub fn from_load(load: f64, bucket: CalendarBucket) -> Self {
        let encoded = if load.is_nan() { 1.0 } else { load.max(1.0) }.ln_1p();
        let mut values = [encoded; FEATURE_COUNT];
        values[LOAD_SLOTS] = bucket.dow_norm();
        values[LOAD_SLOTS + 1] = bucket.hour_norm();
        Self(values)
    }

    /// The vector used when a caller supplies no features: one observed request.
    pub fn default_for(bucket: CalendarBucket) -> Self {
        Self::from_load(1.0, bucket)
    }

    pub fn as_slice(&self) -> &[f64] {
        &self.0
    }

    pub fn to_vec(&self) -> Vec<f64> {
        self.0.to_vec()
    }
}

impl TryFrom<Vec<f64>> for FeatureVector {
    type Error = FeatureError;

    fn try_from(row: Vec<f64>) -> Result<Self, Self::Error> {
        Self::try_from(row.as_slice())
    }
}

impl TryFrom<&[f64]> for FeatureVector {
    type Error = FeatureError;

    fn try_from(row: &[f64]) -> Result<Self, Self::Error> {
        let values: [f64; FEATURE_COUNT] =
            row.try_into().map_err(|_| FeatureError::WrongLength {
                expected: FEATURE_COUNT,
                actual: row.len(),
            })?;
        if let Some(index) = values.iter().position(|v| !v.is_finite()) {
            return Err(FeatureError::NotFinite { index });
        }
        Ok(Self(values))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn bucket_from_local_time() {
        // 2024-03-06 is a Wednesday.
        let t = Local.with_ymd_and_hms(2024, 3, 6, 9, 30, 0).unwrap();
        let bucket = CalendarBucket::at(&t);
        assert_eq!(bucket, CalendarBucket { day_of_week: 2, hour: 9 });
    }

    #[test]
    fn bucket_rejects_out_of_range() {
        assert!(CalendarBucket::new(7, 0).is_none());
        assert!(CalendarBucket::new(0, 24).is_none());
        assert!(CalendarBucket::new(6, 23).is_some());
    }

    #[test]
    fn from_load_layout() {
        let bucket = CalendarBucket::new(3, 23).unwrap();
        let v = FeatureVector::from_load(99.0, bucket);
        let s = v.as_slice();

        assert_eq!(s.len(), FEATURE_COUNT);
        for slot in &s[..LOAD_SLOTS] {
            assert!((slot - 100f64.ln()).abs() < 1e-12);
        }
        assert_eq!(s[14], 0.5);
        assert_eq!(s[15], 1.0);
    }

    #[test]
    fn from_load_floors_at_one_request() {
        let bucket = CalendarBucket::new(0, 0).unwrap();
        assert_eq!(
            FeatureVector::from_load(0.0, bucket),
            FeatureVector::from_load(1.0, bucket)
        );
        assert_eq!(
            FeatureVector::from_load(f64::NAN, bucket),
            FeatureVector::default_for(bucket)
        );
        assert_eq!(FeatureVector::default_for(bucket).as_slice()[0], 2f64.ln());
    }

    #[test]
    fn try_from_checks_length() {
        let err = FeatureVector::try_from(vec![1.0; 3]).unwrap_err();
        assert_eq!(
            err,
            FeatureError::WrongLength {
                expected: 16,
                actual: 3
            }
        );
        assert!(FeatureVector::try_from(vec![1.0; 16]).is_ok());
    }

    #[test]
    fn try_from_rejects_non_finite() {
        let mut row = vec![0.5; 16];
        row[4] = f64::INFINITY;
        assert_eq!(
            FeatureVector::try_from(row).unwrap_err(),
            FeatureError::NotFinite { index: 4 }
        );
    }
}
