//! Scripted collaborators for unit tests.

use std::sync::Mutex;
use std::time::Duration;

use tidal_core::{CalendarBucket, FeatureVector};

use crate::error::AutoscaleError;
use crate::orchestrator::{Orchestrator, OrchestratorFuture};
use crate::source::{SourceFuture, TrafficSource};

/// Orchestrator whose replica count only changes when a test says so.
#[derive(Default)]
pub struct MockOrchestrator {
    pub replicas: Mutex<Option<u32>>,
    pub failing: Mutex<bool>,
    pub set_calls: Mutex<Vec<u32>>,
}

impl MockOrchestrator {
    pub fn with_replicas(n: u32) -> Self {
        let mock = Self::default();
        *mock.replicas.lock().unwrap() = Some(n);
        mock
    }

    pub fn set_calls(&self) -> Vec<u32> {
        self.set_calls.lock().unwrap().clone()
    }

    pub fn fail_sets(&self, fail: bool) {
        *self.failing.lock().unwrap() = fail;
    }
}

impl Orchestrator for MockOrchestrator {
    fn current_replicas(&self) -> OrchestratorFuture<'_, u32> {
        let replicas = *self.replicas.lock().unwrap();
        Box::pin(async move {
            replicas.ok_or_else(|| AutoscaleError::remote("read replicas", "api unavailable"))
        })
    }

    fn set_replicas(&self, replicas: u32) -> OrchestratorFuture<'_, ()> {
        let fail = *self.failing.lock().unwrap();
        Box::pin(async move {
            if fail {
                return Err(AutoscaleError::ScaleCommandFailed("forbidden".into()));
            }
            self.set_calls.lock().unwrap().push(replicas);
            Ok(())
        })
    }
}

/// Traffic source with scripted answers; `None` means the call fails.
pub struct MockSource {
    pub rate: Mutex<Option<u64>>,
    pub prediction: Mutex<Option<f64>>,
    pub history: Mutex<Option<Option<f64>>>,
    /// Delay before answering `predict`.
    pub predict_delay: Mutex<Duration>,
    pub predicted_with: Mutex<Vec<FeatureVector>>,
}

impl MockSource {
    pub fn new(rate: Option<u64>, prediction: Option<f64>, history: Option<f64>) -> Self {
        Self {
            rate: Mutex::new(rate),
            prediction: Mutex::new(prediction),
            history: Mutex::new(Some(history)),
            predict_delay: Mutex::new(Duration::ZERO),
            predicted_with: Mutex::new(Vec::new()),
        }
    }

    pub fn set_prediction(&self, prediction: Option<f64>) {
        *self.prediction.lock().unwrap() = prediction;
    }
}

impl TrafficSource for MockSource {
    fn requests_per_minute(&self) -> SourceFuture<'_, u64> {
        let rate = *self.rate.lock().unwrap();
        Box::pin(async move { rate.ok_or_else(|| AutoscaleError::remote("traffic rate", "refused")) })
    }

    fn predict(&self, features: FeatureVector) -> SourceFuture<'_, f64> {
        self.predicted_with.lock().unwrap().push(features);
        let prediction = *self.prediction.lock().unwrap();
        let delay = *self.predict_delay.lock().unwrap();
        Box::pin(async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            prediction.ok_or_else(|| AutoscaleError::remote("predict", "HTTP 500"))
        })
    }

    fn historical_average(&self, _bucket: CalendarBucket) -> SourceFuture<'_, Option<f64>> {
        let history = *self.history.lock().unwrap();
        Box::pin(async move {
            history.ok_or_else(|| AutoscaleError::remote("historical average", "refused"))
        })
    }
}
