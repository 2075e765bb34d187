//! Telemetry error types.

use thiserror::Error;

/// Errors raised while installing logging or metrics.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The Prometheus recorder could not be installed.
    #[error("failed to install metrics recorder: {0}")]
    MetricsInit(String),

    /// The subscriber could not be installed, or the filter is invalid.
    #[error("failed to initialize logging: {0}")]
    LoggingInit(String),
}
