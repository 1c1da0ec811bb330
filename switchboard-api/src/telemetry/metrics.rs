//! Prometheus Metrics Definitions
//!
//! Every switchboard metric with its labels. Exposed at `/metrics` for
//! Prometheus scraping.

use axum::{http::StatusCode, response::IntoResponse};
use once_cell::sync::Lazy;
use prometheus::{
    register_counter_vec, register_gauge, register_histogram, register_histogram_vec, CounterVec,
    Encoder, Gauge, Histogram, HistogramVec, TextEncoder,
};

use crate::error::{ApiError, ApiResult};

/// HTTP request latency buckets (seconds). Transfers and holds wait on
/// platform polling, so the tail reaches tens of seconds.
const HTTP_LATENCY_BUCKETS: &[f64] = &[
    0.005, 0.010, 0.025, 0.050, 0.100, 0.250, 0.500, 1.0, 2.5, 5.0, 10.0, 20.0, 30.0,
];

/// Hold duration buckets (seconds), 5s to 30min.
const HOLD_DURATION_BUCKETS: &[f64] = &[5.0, 15.0, 30.0, 60.0, 120.0, 300.0, 600.0, 1800.0];

/// Global metrics instance - initialized once at startup
pub static METRICS: Lazy<ApiResult<SwitchboardMetrics>> = Lazy::new(SwitchboardMetrics::new);

fn registration(name: &str, e: prometheus::Error) -> ApiError {
    ApiError::internal_error(format!("Failed to register {}: {}", name, e))
}

/// Container for all switchboard metrics.
#[derive(Clone)]
pub struct SwitchboardMetrics {
    /// labels: method, path, status
    pub http_requests_total: CounterVec,

    /// labels: method, path
    pub http_request_duration_seconds: HistogramVec,

    /// Task assignment-status transitions - labels: from, to
    pub task_transitions_total: CounterVec,

    /// labels: mode (cold/warm/complete), outcome
    pub transfers_total: CounterVec,

    /// Completed hold sessions with a known start.
    pub hold_duration_seconds: Histogram,

    /// Reconciliation waits - labels: resource, outcome (ready/exhausted/error)
    pub reconciliation_polls_total: CounterVec,

    /// Platform callbacks - labels: route, outcome
    pub webhooks_total: CounterVec,

    /// Current push-channel connections
    pub websocket_connections: Gauge,
}

impl SwitchboardMetrics {
    /// Create and register all metrics with Prometheus.
    pub fn new() -> ApiResult<Self> {
        Ok(Self {
            http_requests_total: register_counter_vec!(
                "switchboard_http_requests_total",
                "Total number of HTTP requests",
                &["method", "path", "status"]
            )
            .map_err(|e| registration("http_requests_total", e))?,

            http_request_duration_seconds: register_histogram_vec!(
                "switchboard_http_request_duration_seconds",
                "HTTP request duration in seconds",
                &["method", "path"],
                HTTP_LATENCY_BUCKETS.to_vec()
            )
            .map_err(|e| registration("http_request_duration_seconds", e))?,

            task_transitions_total: register_counter_vec!(
                "switchboard_task_transitions_total",
                "Task assignment status transitions applied by this service",
                &["from", "to"]
            )
            .map_err(|e| registration("task_transitions_total", e))?,

            transfers_total: register_counter_vec!(
                "switchboard_transfers_total",
                "Transfer operations by mode and outcome",
                &["mode", "outcome"]
            )
            .map_err(|e| registration("transfers_total", e))?,

            hold_duration_seconds: register_histogram!(
                "switchboard_hold_duration_seconds",
                "Duration of completed hold sessions in seconds",
                HOLD_DURATION_BUCKETS.to_vec()
            )
            .map_err(|e| registration("hold_duration_seconds", e))?,

            reconciliation_polls_total: register_counter_vec!(
                "switchboard_reconciliation_polls_total",
                "Bounded waits on platform resources by outcome",
                &["resource", "outcome"]
            )
            .map_err(|e| registration("reconciliation_polls_total", e))?,

            webhooks_total: register_counter_vec!(
                "switchboard_webhooks_total",
                "Platform callbacks received",
                &["route", "outcome"]
            )
            .map_err(|e| registration("webhooks_total", e))?,

            websocket_connections: register_gauge!(
                "switchboard_websocket_connections",
                "Current number of active WebSocket connections"
            )
            .map_err(|e| registration("websocket_connections", e))?,
        })
    }

    pub fn record_http_request(&self, method: &str, path: &str, status: u16, duration_secs: f64) {
        let status_str = status.to_string();
        self.http_requests_total
            .with_label_values(&[method, path, &status_str])
            .inc();
        self.http_request_duration_seconds
            .with_label_values(&[method, path])
            .observe(duration_secs);
    }

    pub fn record_task_transition(&self, from: &str, to: &str) {
        self.task_transitions_total
            .with_label_values(&[from, to])
            .inc();
    }

    pub fn record_transfer(&self, mode: &str, success: bool) {
        let outcome = if success { "success" } else { "error" };
        self.transfers_total
            .with_label_values(&[mode, outcome])
            .inc();
    }

    pub fn observe_hold(&self, duration_secs: f64) {
        self.hold_duration_seconds.observe(duration_secs);
    }

    pub fn record_poll(&self, resource: &str, outcome: &str) {
        self.reconciliation_polls_total
            .with_label_values(&[resource, outcome])
            .inc();
    }

    pub fn record_webhook(&self, route: &str, outcome: &str) {
        self.webhooks_total
            .with_label_values(&[route, outcome])
            .inc();
    }

    pub fn ws_connected(&self) {
        self.websocket_connections.inc();
    }

    pub fn ws_disconnected(&self) {
        self.websocket_connections.dec();
    }
}

/// Handler for GET /metrics endpoint.
#[utoipa::path(
    get,
    path = "/metrics",
    tag = "Observability",
    responses(
        (status = 200, description = "Prometheus metrics in text format", content_type = "text/plain"),
        (status = 500, description = "Failed to encode metrics"),
    ),
)]
pub async fn metrics_handler() -> impl IntoResponse {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    match encoder.encode(&metric_families, &mut buffer) {
        Ok(_) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            buffer,
        ),
        Err(e) => {
            tracing::error!(error = %e, "Failed to encode metrics");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                [("content-type", "text/plain")],
                format!("Failed to encode metrics: {}", e).into_bytes(),
            )
        }
    }
}
