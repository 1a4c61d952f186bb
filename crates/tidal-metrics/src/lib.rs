//! tidal-metrics: observability for the prediction service and the
//! control loop.
//!
//! # Architecture
//!
//! ```text
//! TrafficMetrics (Arc-shared)
//!   ├── record_request()         ← PredictionService, once per predict call
//!   ├── set_predicted_traffic()  ← Controller, blended estimate per tick
//!   └── set_current_replicas()   ← Controller, replica count per tick
//!
//! Prometheus exposition
//!   └── render_prometheus() → text/plain for /metrics endpoint
//! ```

pub mod prometheus;
pub mod registry;

pub use prometheus::render_prometheus;
pub use registry::{MetricsSnapshot, TrafficMetrics};
