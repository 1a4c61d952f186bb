//! PredictionService: the prediction contract.
//!
//! One call to [`PredictionService::predict`]:
//! 1. counts the request,
//! 2. uses the caller's batch or builds the default vector for "now",
//! 3. evaluates the predictor on the first row,
//! 4. maps the log-scale output back to traffic (`expm1`) floored at zero,
//! 5. appends an observation; the call only succeeds once it is durable.

use std::sync::Arc;

use tidal_core::{CalendarBucket, Clock, FeatureVector, SystemClock};
use tidal_log::{ObservationLog, ObservationRecord, historical_average, requests_per_minute};
use tidal_metrics::TrafficMetrics;
use tracing::{debug, warn};

use crate::error::{PredictError, PredictResult};
use crate::model::Predictor;

/// Result of a successful prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prediction {
    /// Non-negative traffic estimate.
    pub predicted_traffic: f64,
    /// Requests this observation stands for (batch length, or 1).
    pub observed_requests: u64,
    pub bucket: CalendarBucket,
    pub timestamp: f64,
}

/// Serves predictions and owns the write side of the observation log.
pub struct PredictionService {
    predictor: Option<Arc<dyn Predictor>>,
    log: Arc<dyn ObservationLog>,
    metrics: Arc<TrafficMetrics>,
    clock: Arc<dyn Clock>,
}

impl PredictionService {
    pub fn new(log: Arc<dyn ObservationLog>, predictor: Option<Arc<dyn Predictor>>) -> Self {
        Self {
            predictor,
            log,
            metrics: Arc::new(TrafficMetrics::new()),
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_metrics(mut self, metrics: Arc<TrafficMetrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn has_model(&self) -> bool {
        self.predictor.is_some()
    }

    pub fn metrics(&self) -> &Arc<TrafficMetrics> {
        &self.metrics
    }

    /// Calendar bucket for the service clock's current time.
    pub fn current_bucket(&self) -> CalendarBucket {
        CalendarBucket::at(&self.clock.now())
    }

    /// Predict traffic for an optional batch of feature rows.
    ///
    /// Only the first row of a batch is evaluated; the batch length becomes
    /// the observation's request count.
    pub fn predict(&self, batch: Option<Vec<FeatureVector>>) -> PredictResult<Prediction> {
        self.metrics.record_request();

        let now = self.clock.now();
        let timestamp = tidal_core::clock::epoch_secs(&now);
        let bucket = CalendarBucket::at(&now);

        let (features, observed_requests) = match batch {
            Some(rows) => {
                let first = rows
                    .first()
                    .copied()
                    .ok_or_else(|| PredictError::InvalidFeatures("empty batch".into()))?;
                (first, rows.len() as u64)
            }
            None => (FeatureVector::default_for(bucket), 1),
        };

        let Some(predictor) = &self.predictor else {
            warn!("prediction requested but no model is loaded");
            return Err(PredictError::ModelUnavailable);
        };

        let raw = predictor.predict(&features)?;
        let predicted_traffic = to_traffic_scale(raw);

        let record =
            ObservationRecord::new(timestamp, bucket, observed_requests, predicted_traffic);
        self.log.append(&record)?;

        debug!(
            raw,
            predicted_traffic,
            observed_requests,
            day_of_week = bucket.day_of_week,
            hour = bucket.hour,
            "prediction served"
        );

        Ok(Prediction {
            predicted_traffic,
            observed_requests,
            bucket,
            timestamp,
        })
    }

    /// Observations logged in the trailing minute.
    pub fn requests_per_minute(&self) -> u64 {
        requests_per_minute(self.log.as_ref(), self.clock.epoch_secs())
    }

    /// Mean observed requests for a bucket, `None` without history.
    pub fn historical_average(&self, bucket: CalendarBucket) -> Option<f64> {
        historical_average(self.log.as_ref(), bucket)
    }
}

/// Invert the `log1p` target transform and floor at zero.
///
/// The model can emit small negatives near zero traffic; those, and NaN,
/// report as 0. Overflow saturates at `f64::MAX`.
fn to_traffic_scale(log_value: f64) -> f64 {
    let traffic = log_value.exp_m1();
    if traffic.is_nan() {
        return 0.0;
    }
    traffic.clamp(0.0, f64::MAX)
}
