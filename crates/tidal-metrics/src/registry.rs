//! Counter and gauges shared between the service and the control loop.
//!
//! Everything is a plain atomic: handlers and the loop update metrics on
//! the hot path without taking a lock. Float gauges are stored as their
//! IEEE-754 bit pattern.

use std::sync::atomic::{AtomicU64, Ordering};

use tracing::trace;

/// Process-wide traffic metrics.
#[derive(Debug, Default)]
pub struct TrafficMetrics {
    /// Prediction requests served (including failed ones).
    requests_total: AtomicU64,
    /// Latest blended traffic estimate, as `f64::to_bits`.
    predicted_traffic: AtomicU64,
    /// Latest observed replica count.
    current_replicas: AtomicU64,
}

/// Point-in-time copy of every metric.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsSnapshot {
    pub requests_total: u64,
    pub predicted_traffic: f64,
    pub current_replicas: u32,
}

impl TrafficMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one prediction request.
    pub fn record_request(&self) {
        let total = self.requests_total.fetch_add(1, Ordering::Relaxed) + 1;
        trace!(total, "prediction request counted");
    }

    pub fn set_predicted_traffic(&self, value: f64) {
        self.predicted_traffic
            .store(value.to_bits(), Ordering::Relaxed);
    }

    pub fn set_current_replicas(&self, replicas: u32) {
        self.current_replicas
            .store(u64::from(replicas), Ordering::Relaxed);
    }

    pub fn requests_total(&self) -> u64 {
        self.requests_total.load(Ordering::Relaxed)
    }

    pub fn predicted_traffic(&self) -> f64 {
        f64::from_bits(self.predicted_traffic.load(Ordering::Relaxed))
    }

    pub fn current_replicas(&self) -> u32 {
        self.current_replicas.load(Ordering::Relaxed) as u32
    }

    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            requests_total: self.requests_total(),
            predicted_traffic: self.predicted_traffic(),
            current_replicas: self.current_replicas(),
        }
    }
}
