//! Autoscaler error types.

use thiserror::Error;

/// Errors raised by the autoscaler's collaborators.
///
/// None of these escape the control loop: each is logged and replaced by a
/// documented fallback.
#[derive(Debug, Error)]
pub enum AutoscaleError {
    #[error("{call} failed: {reason}")]
    RemoteCallFailed { call: &'static str, reason: String },

    #[error("scale command failed: {0}")]
    ScaleCommandFailed(String),

    #[error("invalid endpoint: {0}")]
    InvalidEndpoint(String),
}

impl AutoscaleError {
    pub(crate) fn remote(call: &'static str, reason: impl ToString) -> Self {
        AutoscaleError::RemoteCallFailed {
            call,
            reason: reason.to_string(),
        }
    }
}

pub type AutoscaleResult<T> = Result<T, AutoscaleError>;
