//! Traffic source capability: request rate, predictions and seasonal
//! history, as seen by the control loop.
//!
//! [`HttpSource`](crate::http::HttpSource) talks to a remote prediction
//! service; [`LocalSource`] calls an in-process
//! [`PredictionService`] when both run in one daemon.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use tidal_core::{CalendarBucket, FeatureVector};
use tidal_predict::PredictionService;

use crate::error::{AutoscaleError, AutoscaleResult};

/// Boxed future returned by traffic source calls.
pub type SourceFuture<'a, T> = Pin<Box<dyn Future<Output = AutoscaleResult<T>> + Send + 'a>>;

pub trait TrafficSource: Send + Sync {
    /// Requests observed in the trailing minute.
    fn requests_per_minute(&self) -> SourceFuture<'_, u64>;

    /// Traffic estimate for one feature vector.
    fn predict(&self, features: FeatureVector) -> SourceFuture<'_, f64>;

    /// Seasonal average for a bucket; `Ok(None)` when there is no history.
    fn historical_average(&self, bucket: CalendarBucket) -> SourceFuture<'_, Option<f64>>;
}

/// In-process source backed by a shared prediction service.
///
/// Service calls touch the observation log, so they run on the blocking
/// thread pool.
#[derive(Clone)]
pub struct LocalSource {
    service: Arc<PredictionService>,
}

impl LocalSource {
    pub fn new(service: Arc<PredictionService>) -> Self {
        Self { service }
    }

    async fn blocking<T, F>(&self, call: &'static str, f: F) -> AutoscaleResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&PredictionService) -> AutoscaleResult<T> + Send + 'static,
    {
        let service = Arc::clone(&self.service);
        tokio::task::spawn_blocking(move || f(&service))
            .await
            .map_err(|e| AutoscaleError::remote(call, e))?
    }
}

impl TrafficSource for LocalSource {
    fn requests_per_minute(&self) -> SourceFuture<'_, u64> {
        Box::pin(self.blocking("traffic rate", |s| Ok(s.requests_per_minute())))
    }

    fn predict(&self, features: FeatureVector) -> SourceFuture<'_, f64> {
        Box::pin(self.blocking("predict", move |s| {
            s.predict(Some(vec![features]))
                .map(|p| p.predicted_traffic)
                .map_err(|e| AutoscaleError::remote("predict", e))
        }))
    }

    fn historical_average(&self, bucket: CalendarBucket) -> SourceFuture<'_, Option<f64>> {
        Box::pin(self.blocking("historical average", move |s| {
            Ok(s.historical_average(bucket))
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tidal_log::{ObservationLog, ObservationRecord, ObservationStore};
    use tidal_predict::{LinearModel, Predictor};

    fn source(predictor: Option<Arc<dyn Predictor>>) -> (LocalSource, ObservationStore) {
        let store = ObservationStore::open_in_memory().unwrap();
        let service = PredictionService::new(Arc::new(store.clone()), predictor);
        (LocalSource::new(Arc::new(service)), store)
    }

    #[tokio::test]
    async fn predict_goes_through_service_and_logs() {
        let model: Arc<dyn Predictor> = Arc::new(LinearModel::new([0.0; 16], 3f64.ln_1p()));
        let (src, store) = source(Some(model));

        let bucket = CalendarBucket::new(1, 1).unwrap();
        let traffic = src.predict(FeatureVector::from_load(5.0, bucket)).await.unwrap();
        assert!((traffic - 3.0).abs() < 1e-9);
        assert_eq!(store.len().unwrap(), 1);
        assert_eq!(src.requests_per_minute().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn predict_without_model_is_remote_failure() {
        let (src, _) = source(None);
        let bucket = CalendarBucket::new(1, 1).unwrap();
        let err = src
            .predict(FeatureVector::default_for(bucket))
            .await
            .unwrap_err();
        assert!(matches!(err, AutoscaleError::RemoteCallFailed { call: "predict", .. }));
    }

    #[tokio::test]
    async fn historical_average_passthrough() {
        let (src, store) = source(None);
        let bucket = CalendarBucket::new(2, 9).unwrap();
        assert_eq!(src.historical_average(bucket).await.unwrap(), None);

        store.append(&ObservationRecord::new(1.0, bucket, 4, 0.0)).unwrap();
        assert_eq!(src.historical_average(bucket).await.unwrap(), Some(4.0));
    }
}
