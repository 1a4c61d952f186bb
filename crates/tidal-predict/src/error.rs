//! Prediction error types.

use thiserror::Error;

/// Errors surfaced by the prediction service.
#[derive(Debug, Error)]
pub enum PredictError {
    #[error("no model loaded")]
    ModelUnavailable,

    #[error("invalid features: {0}")]
    InvalidFeatures(String),

    #[error("model evaluation failed: {0}")]
    Model(String),

    #[error("bad model artifact: {0}")]
    Artifact(String),

    #[error("observation log error: {0}")]
    Log(#[from] tidal_log::LogError),
}

impl From<tidal_core::FeatureError> for PredictError {
    fn from(e: tidal_core::FeatureError) -> Self {
        PredictError::InvalidFeatures(e.to_string())
    }
}

pub type PredictResult<T> = Result<T, PredictError>;
