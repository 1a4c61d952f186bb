//! Predictor capability and the linear model artifact backend.

use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tidal_core::{FEATURE_COUNT, FeatureVector};
use tracing::{info, warn};

use crate::error::{PredictError, PredictResult};

/// Maps a feature vector to a log-scale (`log1p`) traffic estimate.
///
/// Implementations are invoked synchronously and may be shared across
/// request handlers.
pub trait Predictor: Send + Sync {
    fn predict(&self, features: &FeatureVector) -> PredictResult<f64>;
}

/// A linear regression over the 16 features, trained offline on
/// `log1p(traffic)`.
///
/// Stored on disk as JSON:
///
/// ```json
/// { "weights": [0.1, 0.1, ..., 0.3], "intercept": 0.5 }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LinearModel {
    weights: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(weights: [f64; FEATURE_COUNT], intercept: f64) -> Self {
        Self {
            weights: weights.to_vec(),
            intercept,
        }
    }

    /// Parse and validate a JSON artifact.
    pub fn from_json(bytes: &[u8]) -> PredictResult<Self> {
        let model: LinearModel =
            serde_json::from_slice(bytes).map_err(|e| PredictError::Artifact(e.to_string()))?;
        if model.weights.len() != FEATURE_COUNT {
            return Err(PredictError::Artifact(format!(
                "expected {FEATURE_COUNT} weights, found {}",
                model.weights.len()
            )));
        }
        if !model.intercept.is_finite() || model.weights.iter().any(|w| !w.is_finite()) {
            return Err(PredictError::Artifact("non-finite coefficient".into()));
        }
        Ok(model)
    }

    pub fn load(path: &Path) -> PredictResult<Self> {
        let bytes = std::fs::read(path)
            .map_err(|e| PredictError::Artifact(format!("{}: {e}", path.display())))?;
        Self::from_json(&bytes)
    }
}

impl Predictor for LinearModel {
    fn predict(&self, features: &FeatureVector) -> PredictResult<f64> {
        let dot: f64 = self
            .weights
            .iter()
            .zip(features.as_slice())
            .map(|(w, x)| w * x)
            .sum();
        Ok(dot + self.intercept)
    }
}

/// Load the model artifact if one is configured and present.
///
/// A missing file is not an error: the service starts without a model and
/// answers every prediction with `ModelUnavailable` until restarted with
/// one. A file that exists but cannot be parsed is an error.
pub fn load_predictor(path: Option<&Path>) -> PredictResult<Option<Arc<dyn Predictor>>> {
    let Some(path) = path else {
        warn!("no model path configured, predictions unavailable");
        return Ok(None);
    };
    if !path.exists() {
        warn!(?path, "model artifact not found, predictions unavailable");
        return Ok(None);
    }
    let model = LinearModel::load(path)?;
    info!(?path, "model artifact loaded");
    Ok(Some(Arc::new(model)))
}
