//! tidal-api: HTTP surface of the prediction service.
//!
//! # API Routes
//!
//! | Method | Path | Description |
//! |---|---|---|
//! | GET | `/` | Liveness banner |
//! | POST | `/predict` | Predict traffic for an optional feature batch |
//! | GET | `/traffic` | Requests observed in the trailing minute |
//! | GET | `/history/{dow}/{hour}` | Seasonal average for a calendar bucket |
//! | GET | `/metrics` | Prometheus exposition |

pub mod handlers;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tidal_metrics::TrafficMetrics;
use tidal_predict::PredictionService;

/// Shared state for API handlers.
#[derive(Clone)]
pub struct ApiState {
    pub service: Arc<PredictionService>,
}

/// Build the prediction service router.
pub fn build_router(service: Arc<PredictionService>) -> Router {
    let state = ApiState { service };

    Router::new()
        .route("/", get(handlers::home))
        .route("/predict", post(handlers::predict))
        .route("/traffic", get(handlers::traffic))
        .route("/history/{dow}/{hour}", get(handlers::history))
        .route("/metrics", get(handlers::prometheus_metrics))
        .with_state(state)
}

/// Router exposing only `/metrics`, for processes that run the control
/// loop without the prediction service.
pub fn metrics_router(metrics: Arc<TrafficMetrics>) -> Router {
    Router::new()
        .route("/metrics", get(handlers::metrics_only))
        .with_state(metrics)
}
