//! Configuration sections.

use pylon_contract::ValidationConfig;
use pylon_middleware::FailurePolicy;
use pylon_telemetry::LogConfig;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Where the contract comes from.
///
/// # Example
///
/// ```
/// use pylon_config::ContractSection;
///
/// let section = ContractSection {
///     path: Some("openapi.yaml".into()),
///     server_base_path: Some("/v1".to_string()),
/// };
/// assert!(section.path.is_some());
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ContractSection {
    /// Path to the OpenAPI document (YAML or JSON).
    #[serde(default)]
    pub path: Option<PathBuf>,

    /// Overrides the base path taken from the document's `servers`.
    #[serde(default)]
    pub server_base_path: Option<String>,
}

/// Which checks run and what happens when they fail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct ValidationSection {
    /// Validate requests before the handler.
    #[serde(default = "default_true")]
    pub validate_requests: bool,

    /// Validate responses after the handler.
    #[serde(default = "default_true")]
    pub validate_responses: bool,

    /// Enforce declared security requirements.
    #[serde(default = "default_true")]
    pub validate_security: bool,

    /// Panic on any failure; overrides `failure_policy`.
    #[serde(default)]
    pub strict_test_mode: bool,

    /// What to do on failure.
    #[serde(default)]
    pub failure_policy: FailurePolicy,

    /// Upper bound on captured response bytes. Unbounded when unset.
    #[serde(default)]
    pub max_capture_bytes: Option<usize>,
}

impl Default for ValidationSection {
    fn default() -> Self {
        Self {
            validate_requests: true,
            validate_responses: true,
            validate_security: true,
            strict_test_mode: false,
            failure_policy: FailurePolicy::default(),
            max_capture_bytes: None,
        }
    }
}

impl ValidationSection {
    /// The policy actually applied: strict test mode wins.
    #[must_use]
    pub fn effective_policy(&self) -> FailurePolicy {
        if self.strict_test_mode {
            FailurePolicy::AssertFatal
        } else {
            self.failure_policy
        }
    }

    /// Converts to the validator switches.
    #[must_use]
    pub fn to_validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            validate_requests: self.validate_requests,
            validate_responses: self.validate_responses,
            validate_security: self.validate_security,
            max_capture_bytes: self.max_capture_bytes,
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per event.
    #[default]
    Json,
    /// Multi-line human-readable output.
    Pretty,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(deny_unknown_fields)]
pub struct LoggingSection {
    /// Install a subscriber at all.
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Filter directive (e.g. "info", "pylon_middleware=debug").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            enabled: true,
            level: default_log_level(),
            format: LogFormat::Json,
        }
    }
}

impl LoggingSection {
    /// Converts to the telemetry crate's logging configuration.
    #[must_use]
    pub fn to_log_config(&self) -> LogConfig {
        let base = match self.format {
            LogFormat::Json => LogConfig::production(),
            LogFormat::Pretty => LogConfig::development(),
        };
        LogConfig {
            enabled: self.enabled,
            level: self.level.clone(),
            ..base
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "info".to_string()
}
