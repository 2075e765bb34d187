//! Observability for Pylon.
//!
//! This crate provides the logging and metrics side of contract enforcement:
//!
//! - **Logging**: structured JSON or pretty logs via `tracing-subscriber`
//! - **Metrics**: rejection and violation counters via the `metrics` facade,
//!   with an optional Prometheus recorder
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Description |
//! |--------|------|--------|-------------|
//! | `pylon_request_rejections_total` | Counter | `status` | Requests rejected before the handler |
//! | `pylon_response_violations_total` | Counter | `operation` | Responses that broke the contract |
//! | `pylon_validation_panics_total` | Counter | `stage` | Validator panics caught at the boundary |
//!
//! # Example
//!
//! ```rust,ignore
//! use pylon_telemetry::{init_telemetry, LogConfig, TelemetryConfig};
//!
//! init_telemetry(&TelemetryConfig::new(LogConfig::production()))?;
//!
//! // later, from a /metrics handler
//! let body = pylon_telemetry::metrics::render_metrics().unwrap_or_default();
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod error;
pub mod logging;
pub mod metrics;

pub use config::TelemetryConfig;
pub use error::TelemetryError;
pub use logging::{init_logging, LogConfig};
pub use metrics::{
    init_metrics, record_request_rejection, record_response_violation, record_validation_panic,
    render_metrics, MetricsConfig,
};

/// Result type for telemetry operations.
pub type TelemetryResult<T> = Result<T, TelemetryError>;

/// Initializes logging, then metrics.
///
/// # Errors
///
/// Returns `TelemetryError` if either subsystem fails to initialize.
pub fn init_telemetry(config: &TelemetryConfig) -> TelemetryResult<()> {
    init_logging(&config.logging)?;
    init_metrics(&config.metrics)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_with_everything_disabled() {
        let config = TelemetryConfig::default()
            .without_logging()
            .without_metrics();

        assert!(init_telemetry(&config).is_ok());
    }
}
