//! Remote traffic source over plain HTTP/1.1.
//!
//! Each call opens a fresh connection to the prediction service: connect,
//! handshake, drive the connection in the background, send one request.
//! Timeouts are applied by the caller.

use bytes::Bytes;
use http::{Method, Request, Uri};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use tracing::debug;

use tidal_core::{CalendarBucket, FeatureVector};

use crate::error::{AutoscaleError, AutoscaleResult};
use crate::source::{SourceFuture, TrafficSource};

#[derive(Deserialize)]
struct PredictResponse {
    predictions: Vec<f64>,
}

#[derive(Deserialize)]
struct TrafficResponse {
    requests_per_minute: u64,
}

#[derive(Deserialize)]
struct HistoryResponse {
    average: Option<f64>,
}

/// Client for the prediction service's HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSource {
    /// `host:port` of the service.
    authority: String,
}

impl HttpSource {
    /// Build a client from a base URL such as `http://traffic-server:5000`.
    pub fn new(base_url: &str) -> AutoscaleResult<Self> {
        let uri: Uri = base_url
            .parse()
            .map_err(|e| AutoscaleError::InvalidEndpoint(format!("{base_url}: {e}")))?;
        if uri.scheme_str() != Some("http") {
            return Err(AutoscaleError::InvalidEndpoint(format!(
                "{base_url}: only http:// is supported"
            )));
        }
        let host = uri
            .host()
            .ok_or_else(|| AutoscaleError::InvalidEndpoint(format!("{base_url}: missing host")))?;
        let port = uri.port_u16().unwrap_or(80);
        Ok(Self {
            authority: format!("{host}:{port}"),
        })
    }

    pub fn authority(&self) -> &str {
        &self.authority
    }

    async fn send<T: DeserializeOwned>(
        &self,
        call: &'static str,
        method: Method,
        path: &str,
        body: Bytes,
    ) -> AutoscaleResult<T> {
        let stream = tokio::net::TcpStream::connect(&self.authority)
            .await
            .map_err(|e| AutoscaleError::remote(call, e))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| AutoscaleError::remote(call, e))?;

        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = Request::builder()
            .method(method)
            .uri(path)
            .header("host", &self.authority)
            .header("user-agent", "tidal-autoscale/0.1")
            .header("content-type", "application/json")
            .body(Full::new(body))
            .map_err(|e| AutoscaleError::remote(call, e))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| AutoscaleError::remote(call, e))?;
        let status = resp.status();
        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| AutoscaleError::remote(call, e))?
            .to_bytes();

        if !status.is_success() {
            debug!(%status, path, "prediction service returned non-2xx");
            return Err(AutoscaleError::remote(
                call,
                format!("HTTP {status}: {}", String::from_utf8_lossy(&bytes)),
            ));
        }

        serde_json::from_slice(&bytes).map_err(|e| AutoscaleError::remote(call, e))
    }
}

impl TrafficSource for HttpSource {
    fn requests_per_minute(&self) -> SourceFuture<'_, u64> {
        Box::pin(async move {
            let resp: TrafficResponse = self
                .send("traffic rate", Method::GET, "/traffic", Bytes::new())
                .await?;
            Ok(resp.requests_per_minute)
        })
    }

    fn predict(&self, features: FeatureVector) -> SourceFuture<'_, f64> {
        Box::pin(async move {
            let body = serde_json::json!({ "data": [features.to_vec()] });
            let resp: PredictResponse = self
                .send("predict", Method::POST, "/predict", Bytes::from(body.to_string()))
                .await?;
            resp.predictions
                .first()
                .copied()
                .ok_or_else(|| AutoscaleError::remote("predict", "empty predictions list"))
        })
    }

    fn historical_average(&self, bucket: CalendarBucket) -> SourceFuture<'_, Option<f64>> {
        Box::pin(async move {
            let path = format!("/history/{}/{}", bucket.day_of_week, bucket.hour);
            let resp: HistoryResponse = self
                .send("historical average", Method::GET, &path, Bytes::new())
                .await?;
            Ok(resp.average)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tidal_log::{ObservationLog, ObservationRecord, ObservationStore};
    use tidal_predict::{LinearModel, PredictionService, Predictor};

    #[test]
    fn parses_base_url() {
        let src = HttpSource::new("http://traffic-server:5000").unwrap();
        assert_eq!(src.authority(), "traffic-server:5000");

        let src = HttpSource::new("http://localhost").unwrap();
        assert_eq!(src.authority(), "localhost:80");
    }

    #[test]
    fn rejects_unsupported_urls() {
        assert!(HttpSource::new("https://secure:443").is_err());
        assert!(HttpSource::new("/just/a/path").is_err());
    }

    /// Serve the real API router on an ephemeral port.
    async fn spawn_service(
        predictor: Option<Arc<dyn Predictor>>,
    ) -> (HttpSource, ObservationStore) {
        let store = ObservationStore::open_in_memory().unwrap();
        let service = PredictionService::new(Arc::new(store.clone()), predictor);
        let router = tidal_api::build_router(Arc::new(service));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        (HttpSource::new(&format!("http://{addr}")).unwrap(), store)
    }

    #[tokio::test]
    async fn round_trip_against_api() {
        let model: Arc<dyn Predictor> = Arc::new(LinearModel::new([0.0; 16], 9f64.ln_1p()));
        let (src, store) = spawn_service(Some(model)).await;

        let bucket = CalendarBucket::new(2, 9).unwrap();
        let traffic = src.predict(FeatureVector::from_load(4.0, bucket)).await.unwrap();
        assert!((traffic - 9.0).abs() < 1e-9);
        assert_eq!(store.len().unwrap(), 1);

        assert_eq!(src.requests_per_minute().await.unwrap(), 1);

        store.append(&ObservationRecord::new(1.0, bucket, 6, 0.0)).unwrap();
        let avg = src.historical_average(bucket).await.unwrap();
        assert!(avg.is_some());
    }

    #[tokio::test]
    async fn non_2xx_is_remote_failure() {
        let (src, _) = spawn_service(None).await;
        let bucket = CalendarBucket::new(0, 0).unwrap();
        let err = src.predict(FeatureVector::default_for(bucket)).await.unwrap_err();
        match err {
            AutoscaleError::RemoteCallFailed { call, reason } => {
                assert_eq!(call, "predict");
                assert!(reason.contains("503"), "{reason}");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn connection_refused_is_remote_failure() {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let src = HttpSource::new(&format!("http://{addr}")).unwrap();
        assert!(matches!(
            src.requests_per_minute().await,
            Err(AutoscaleError::RemoteCallFailed { .. })
        ));
    }
}
