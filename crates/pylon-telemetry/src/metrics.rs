//! Contract enforcement metrics.
//!
//! Recording goes through the `metrics` facade, so counters are no-ops until
//! a recorder is installed. [`init_metrics`] installs a Prometheus recorder
//! without an HTTP listener; the host decides how to expose
//! [`render_metrics`].
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `pylon_request_rejections_total` | Counter | `status` | Requests rejected before the handler |
//! | `pylon_response_violations_total` | Counter | `operation` | Responses that broke the contract |
//! | `pylon_validation_panics_total` | Counter | `stage` | Validator panics that were contained |

use crate::error::TelemetryError;
use crate::TelemetryResult;
use metrics::{counter, describe_counter};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use std::sync::OnceLock;

/// Request rejection counter name.
pub const REQUEST_REJECTIONS: &str = "pylon_request_rejections_total";
/// Response violation counter name.
pub const RESPONSE_VIOLATIONS: &str = "pylon_response_violations_total";
/// Contained validator panic counter name.
pub const VALIDATION_PANICS: &str = "pylon_validation_panics_total";

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Metrics configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether to install the Prometheus recorder.
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

/// Installs the Prometheus recorder and registers metric descriptions.
///
/// Calling it again after a successful install is a no-op.
///
/// # Errors
///
/// Returns `TelemetryError::MetricsInit` if another recorder is installed.
pub fn init_metrics(config: &MetricsConfig) -> TelemetryResult<()> {
    if !config.enabled || METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new()
        .install_recorder()
        .map_err(|e| TelemetryError::MetricsInit(e.to_string()))?;
    let _ = METRICS_HANDLE.set(handle);

    register_metrics();
    Ok(())
}

/// Renders metrics in Prometheus text format.
///
/// Returns `None` if [`init_metrics`] has not installed the recorder.
#[must_use]
pub fn render_metrics() -> Option<String> {
    METRICS_HANDLE.get().map(PrometheusHandle::render)
}

/// Registers descriptions for every Pylon metric.
pub fn register_metrics() {
    describe_counter!(
        REQUEST_REJECTIONS,
        "Requests rejected by contract validation before reaching the handler"
    );
    describe_counter!(
        RESPONSE_VIOLATIONS,
        "Responses that did not conform to the contract"
    );
    describe_counter!(
        VALIDATION_PANICS,
        "Panics raised inside validation and contained by the middleware"
    );
}

/// Records a request rejected with `status`.
pub fn record_request_rejection(status: u16) {
    counter!(REQUEST_REJECTIONS, "status" => status.to_string()).increment(1);
}

/// Records a response violation for `operation`.
pub fn record_response_violation(operation: &str) {
    counter!(RESPONSE_VIOLATIONS, "operation" => operation.to_string()).increment(1);
}

/// Records a contained validator panic (`stage` is `request` or `response`).
pub fn record_validation_panic(stage: &'static str) {
    counter!(VALIDATION_PANICS, "stage" => stage).increment(1);
}
