//! Prometheus text exposition format.
//!
//! Renders [`TrafficMetrics`] for scraping by a Prometheus server or
//! compatible agent.

use crate::registry::TrafficMetrics;

/// Render all metrics into Prometheus text format.
pub fn render_prometheus(metrics: &TrafficMetrics) -> String {
    let snap = metrics.snapshot();
    let mut out = String::new();

    out.push_str("# HELP tidal_http_requests_total Total prediction requests.\n");
    out.push_str("# TYPE tidal_http_requests_total counter\n");
    out.push_str(&format!("tidal_http_requests_total {}\n", snap.requests_total));

    out.push_str("# HELP tidal_predicted_traffic Blended predicted traffic.\n");
    out.push_str("# TYPE tidal_predicted_traffic gauge\n");
    out.push_str(&format!("tidal_predicted_traffic {:.2}\n", snap.predicted_traffic));

    out.push_str("# HELP tidal_current_replicas Current replica count of the scaled workload.\n");
    out.push_str("# TYPE tidal_current_replicas gauge\n");
    out.push_str(&format!("tidal_current_replicas {}\n", snap.current_replicas));

    out
}
