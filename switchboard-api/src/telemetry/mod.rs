//! Switchboard Telemetry - Observability Infrastructure
//!
//! Structured logging through `tracing` and Prometheus metrics for the API
//! layer. Works standalone; no collector is required.

pub mod metrics;
pub mod middleware;
pub mod tracer;

pub use metrics::{metrics_handler, SwitchboardMetrics, METRICS};
pub use middleware::observability_middleware;
pub use tracer::{init_tracing, TelemetryConfig};
