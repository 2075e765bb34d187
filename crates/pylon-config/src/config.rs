//! Main configuration types.
//!
//! This module provides the top-level [`PylonConfig`] struct and its builder.

use serde::{Deserialize, Serialize};

use crate::{ContractSection, LogFormat, LoggingSection, ValidationSection};

/// Complete Pylon configuration.
///
/// Use [`ConfigLoader`](crate::ConfigLoader) to load it from files and
/// environment variables.
///
/// # Example
///
/// ```
/// use pylon_config::PylonConfig;
///
/// let config = PylonConfig::default();
/// assert!(config.validation.validate_requests);
/// assert!(config.contract.path.is_none());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(deny_unknown_fields)]
pub struct PylonConfig {
    /// Contract source.
    #[serde(default)]
    pub contract: ContractSection,

    /// Validation switches and failure policy.
    #[serde(default)]
    pub validation: ValidationSection,

    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingSection,
}

impl PylonConfig {
    /// Create a new configuration builder.
    #[must_use]
    pub fn builder() -> PylonConfigBuilder {
        PylonConfigBuilder::new()
    }

    /// Pretty debug logs, every check on, failures rejected rather than fatal.
    #[must_use]
    pub fn development() -> Self {
        Self {
            contract: ContractSection::default(),
            validation: ValidationSection::default(),
            logging: LoggingSection {
                enabled: true,
                level: "debug".to_string(),
                format: LogFormat::Pretty,
            },
        }
    }

    /// JSON logs at info, requests validated, responses reported.
    #[must_use]
    pub fn production() -> Self {
        Self {
            contract: ContractSection::default(),
            validation: ValidationSection::default(),
            logging: LoggingSection::default(),
        }
    }

    /// Validate the configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if:
    /// - the contract path is empty
    /// - the server base path does not start with `/`
    /// - `max_capture_bytes` is zero
    /// - the log level is not a valid filter directive
    pub fn validate(&self) -> Result<(), crate::ConfigError> {
        if let Some(path) = &self.contract.path {
            if path.as_os_str().is_empty() {
                return Err(crate::ConfigError::invalid_value(
                    "contract.path",
                    "must not be empty",
                ));
            }
        }

        if let Some(base) = &self.contract.server_base_path {
            if !base.starts_with('/') {
                return Err(crate::ConfigError::invalid_value(
                    "contract.server_base_path",
                    format!("'{base}' must start with '/'"),
                ));
            }
        }

        if self.validation.max_capture_bytes == Some(0) {
            return Err(crate::ConfigError::invalid_value(
                "validation.max_capture_bytes",
                "must be greater than zero; leave unset for no limit",
            ));
        }

        if self.logging.enabled {
            pylon_telemetry::logging::create_env_filter(&self.logging.level).map_err(|e| {
                crate::ConfigError::invalid_value("logging.level", e.to_string())
            })?;
        }

        Ok(())
    }
}

/// Builder for [`PylonConfig`].
#[derive(Debug, Default)]
pub struct PylonConfigBuilder {
    contract: Option<ContractSection>,
    validation: Option<ValidationSection>,
    logging: Option<LoggingSection>,
}

impl PylonConfigBuilder {
    /// Create a new builder with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the contract section.
    #[must_use]
    pub fn contract(mut self, contract: ContractSection) -> Self {
        self.contract = Some(contract);
        self
    }

    /// Set the validation section.
    #[must_use]
    pub fn validation(mut self, validation: ValidationSection) -> Self {
        self.validation = Some(validation);
        self
    }

    /// Set the logging section.
    #[must_use]
    pub fn logging(mut self, logging: LoggingSection) -> Self {
        self.logging = Some(logging);
        self
    }

    /// Build the configuration.
    #[must_use]
    pub fn build(self) -> PylonConfig {
        PylonConfig {
            contract: self.contract.unwrap_or_default(),
            validation: self.validation.unwrap_or_default(),
            logging: self.logging.unwrap_or_default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pylon_middleware::FailurePolicy;

    #[test]
    fn test_default_is_valid() {
        assert!(PylonConfig::default().validate().is_ok());
    }

    #[test]
    fn test_presets() {
        let dev = PylonConfig::development();
        assert_eq!(dev.logging.format, LogFormat::Pretty);
        assert_eq!(dev.logging.level, "debug");
        assert!(dev.validation.validate_responses);
        assert!(!dev.validation.strict_test_mode);

        let prod = PylonConfig::production();
        assert_eq!(prod.logging.format, LogFormat::Json);
        assert!(prod.validation.validate_requests);
        assert_eq!(prod.validation.effective_policy(), FailurePolicy::RejectClient);
    }

    #[test]
    fn test_builder() {
        let config = PylonConfig::builder()
            .contract(ContractSection {
                path: Some("api.yaml".into()),
                server_base_path: None,
            })
            .build();
        assert_eq!(config.contract.path.as_deref(), Some(std::path::Path::new("api.yaml")));
        assert_eq!(config.logging, LoggingSection::default());
    }

    #[test]
    fn test_relative_base_path_is_invalid() {
        let config = PylonConfig::builder()
            .contract(ContractSection {
                path: None,
                server_base_path: Some("v1".to_string()),
            })
            .build();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_capture_limit_is_invalid() {
        let config = PylonConfig::builder()
            .validation(ValidationSection {
                max_capture_bytes: Some(0),
                ..Default::default()
            })
            .build();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("max_capture_bytes"));
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let result: Result<PylonConfig, _> = toml::from_str("[server]\nport = 8080\n");
        assert!(result.is_err());
    }
}
