//! Combined telemetry configuration.

use crate::logging::LogConfig;
use crate::metrics::MetricsConfig;

/// Logging and metrics settings, installed together by
/// [`init_telemetry`](crate::init_telemetry).
#[derive(Debug, Clone, Default)]
pub struct TelemetryConfig {
    /// Subscriber settings.
    pub logging: LogConfig,

    /// Recorder settings.
    pub metrics: MetricsConfig,
}

impl TelemetryConfig {
    /// Uses `logging` with the default metrics recorder.
    #[must_use]
    pub fn new(logging: LogConfig) -> Self {
        Self {
            logging,
            metrics: MetricsConfig::default(),
        }
    }

    /// Leaves the `metrics` facade without a recorder.
    #[must_use]
    pub fn without_metrics(mut self) -> Self {
        self.metrics.enabled = false;
        self
    }

    /// Leaves the global subscriber untouched.
    #[must_use]
    pub fn without_logging(mut self) -> Self {
        self.logging.enabled = false;
        self
    }
}
