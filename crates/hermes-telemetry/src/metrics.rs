//! Prometheus metrics for Hermes dispatch.
//!
//! # Standard Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `hermes_http_requests_total` | Counter | `status` | HTTP requests dispatched |
//! | `hermes_http_dispatch_duration_seconds` | Histogram | - | HTTP dispatch latency |
//! | `hermes_ws_frames_total` | Counter | `kind` | WebSocket frames dispatched |
//! | `hermes_ws_errors_total` | Counter | `handled` | WebSocket callback failures |
//! | `hermes_in_flight_messages` | Gauge | - | Messages currently being processed |
//!
//! Recording functions are cheap no-ops until a recorder is installed, so
//! dispatchers call them unconditionally.

use std::sync::OnceLock;
use std::time::Duration;

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

use crate::error::TelemetryError;
use crate::TelemetryResult;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,

    /// Histogram buckets for dispatch duration, in seconds.
    pub duration_buckets: Vec<f64>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            // 1ms .. 10s
            duration_buckets: vec![
                0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
            ],
        }
    }
}

/// Installs the global Prometheus recorder.
///
/// No HTTP listener is started; the host renders the registry itself with
/// [`render_metrics`].
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if the buckets are invalid or a
/// recorder is already installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .set_buckets(&config.duration_buckets)
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;

    let _ = METRICS_HANDLE.set(handle);
    register_metric_descriptions();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if metrics are not initialized.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

fn register_metric_descriptions() {
    describe_counter!(
        "hermes_http_requests_total",
        "Total number of HTTP requests dispatched"
    );
    describe_histogram!(
        "hermes_http_dispatch_duration_seconds",
        "HTTP dispatch duration in seconds"
    );
    describe_counter!(
        "hermes_ws_frames_total",
        "Total number of WebSocket frames dispatched"
    );
    describe_counter!(
        "hermes_ws_errors_total",
        "WebSocket callback failures, by whether onError handled them"
    );
    describe_gauge!(
        "hermes_in_flight_messages",
        "Number of inbound messages currently being processed"
    );
}

/// Records a completed HTTP dispatch.
pub fn record_http_dispatch(status_code: u16, duration: Duration) {
    counter!(
        "hermes_http_requests_total",
        "status" => status_code.to_string()
    )
    .increment(1);

    histogram!("hermes_http_dispatch_duration_seconds").record(duration.as_secs_f64());
}

/// Records a dispatched WebSocket frame.
///
/// `kind` is one of `open`, `text`, `binary`, `pong` or `close`.
pub fn record_ws_frame(kind: &'static str) {
    counter!("hermes_ws_frames_total", "kind" => kind).increment(1);
}

/// Records a WebSocket callback failure.
pub fn record_ws_error(handled: bool) {
    counter!(
        "hermes_ws_errors_total",
        "handled" => handled.to_string()
    )
    .increment(1);
}

/// Guard that tracks one in-flight message.
///
/// Increments `hermes_in_flight_messages` on creation and decrements it on
/// drop, including on panic.
pub struct InFlightGuard {
    _private: (),
}

impl InFlightGuard {
    /// Creates a new guard and increments the in-flight gauge.
    #[must_use]
    pub fn new() -> Self {
        gauge!("hermes_in_flight_messages").increment(1.0);
        Self { _private: () }
    }
}

impl Default for InFlightGuard {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        gauge!("hermes_in_flight_messages").decrement(1.0);
    }
}
