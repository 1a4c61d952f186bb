//! HTTP handlers.
//!
//! Success bodies are plain JSON objects (`{"predictions": [...]}`,
//! `{"requests_per_minute": n}`); failures are `{"error": "..."}` with a
//! non-2xx status.

use std::sync::Arc;

use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use tracing::warn;

use tidal_core::{CalendarBucket, FeatureVector};
use tidal_metrics::{TrafficMetrics, render_prometheus};
use tidal_predict::PredictError;

use crate::ApiState;

/// Body of `POST /predict`. Every field is optional.
#[derive(Debug, Default, Deserialize)]
pub struct PredictRequest {
    pub data: Option<Vec<Vec<f64>>>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct PredictResponse {
    pub predictions: Vec<f64>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TrafficResponse {
    pub requests_per_minute: u64,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct HistoryResponse {
    pub day_of_week: u8,
    pub hour: u8,
    /// `null` when the bucket has no observations yet.
    pub average: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
struct ErrorBody {
    error: String,
}

fn error_response(msg: &str, status: StatusCode) -> impl IntoResponse {
    (
        status,
        Json(ErrorBody {
            error: msg.to_string(),
        }),
    )
}

fn status_for(e: &PredictError) -> StatusCode {
    match e {
        PredictError::ModelUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        PredictError::InvalidFeatures(_) => StatusCode::BAD_REQUEST,
        PredictError::Model(_) | PredictError::Artifact(_) | PredictError::Log(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Decode an optional feature batch. An empty body or a body without
/// `data` means "use the default vector".
fn parse_batch(body: &[u8]) -> Result<Option<Vec<FeatureVector>>, String> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }
    let req: PredictRequest =
        serde_json::from_slice(body).map_err(|e| format!("malformed request body: {e}"))?;
    req.data
        .map(|rows| {
            rows.into_iter()
                .map(|row| FeatureVector::try_from(row).map_err(|e| e.to_string()))
                .collect::<Result<Vec<_>, _>>()
        })
        .transpose()
}

// ── Prediction ─────────────────────────────────────────────────

/// GET /
pub async fn home() -> &'static str {
    "Tidal traffic predictor running!"
}

/// POST /predict
pub async fn predict(State(state): State<ApiState>, body: Bytes) -> impl IntoResponse {
    let batch = match parse_batch(&body) {
        Ok(batch) => batch,
        Err(msg) => return error_response(&msg, StatusCode::BAD_REQUEST).into_response(),
    };

    match state.service.predict(batch) {
        Ok(p) => Json(PredictResponse {
            predictions: vec![p.predicted_traffic],
        })
        .into_response(),
        Err(e) => {
            warn!(error = %e, "prediction failed");
            error_response(&e.to_string(), status_for(&e)).into_response()
        }
    }
}

// ── Traffic ────────────────────────────────────────────────────

/// GET /traffic
pub async fn traffic(State(state): State<ApiState>) -> impl IntoResponse {
    Json(TrafficResponse {
        requests_per_minute: state.service.requests_per_minute(),
    })
}

/// GET /history/:dow/:hour
pub async fn history(
    State(state): State<ApiState>,
    Path((dow, hour)): Path<(u8, u8)>,
) -> impl IntoResponse {
    let Some(bucket) = CalendarBucket::new(dow, hour) else {
        return error_response(
            &format!("bucket out of range: day_of_week={dow} hour={hour}"),
            StatusCode::BAD_REQUEST,
        )
        .into_response();
    };

    Json(HistoryResponse {
        day_of_week: dow,
        hour,
        average: state.service.historical_average(bucket),
    })
    .into_response()
}

// ── Prometheus ─────────────────────────────────────────────────

fn prometheus_response(metrics: &TrafficMetrics) -> impl IntoResponse + use<> {
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        render_prometheus(metrics),
    )
}

/// GET /metrics
pub async fn prometheus_metrics(State(state): State<ApiState>) -> impl IntoResponse {
    prometheus_response(state.service.metrics())
}

/// GET /metrics on the metrics-only router.
pub async fn metrics_only(State(metrics): State<Arc<TrafficMetrics>>) -> impl IntoResponse {
    prometheus_response(&metrics)
}
