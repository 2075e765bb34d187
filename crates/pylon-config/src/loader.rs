//! Configuration loader with layered approach.
//!
//! This module provides the [`ConfigLoader`] for loading configuration from
//! multiple sources: defaults, files, and environment variables.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::{ConfigError, LogFormat, PylonConfig};

/// Configuration loader with layered approach.
///
/// Later layers override earlier ones:
/// 1. Default values (or a preset)
/// 2. Configuration file (TOML or JSON) or string
/// 3. Environment variables (`PREFIX__SECTION__KEY`)
///
/// # Example
///
/// ```no_run
/// use pylon_config::ConfigLoader;
///
/// # fn main() -> Result<(), pylon_config::ConfigError> {
/// let config = ConfigLoader::new()
///     .with_file("pylon.toml")?
///     .with_env_prefix("PYLON")
///     .load()?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct ConfigLoader {
    config: PylonConfig,
    env_prefix: Option<String>,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Create a new configuration loader starting from defaults.
    #[must_use]
    pub fn new() -> Self {
        Self {
            config: PylonConfig::default(),
            env_prefix: None,
        }
    }

    /// Start with development preset configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use pylon_config::ConfigLoader;
    ///
    /// let config = ConfigLoader::new().with_development().load().unwrap();
    /// assert_eq!(config.logging.level, "debug");
    /// ```
    #[must_use]
    pub fn with_development(mut self) -> Self {
        self.config = PylonConfig::development();
        self
    }

    /// Start with production preset configuration.
    #[must_use]
    pub fn with_production(mut self) -> Self {
        self.config = PylonConfig::production();
        self
    }

    /// Load configuration from a file.
    ///
    /// The format is chosen by extension: `.toml` or `.json`.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file is missing, unreadable, malformed,
    /// or contains unknown fields.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::file_not_found(path));
        }

        let content = fs::read_to_string(path).map_err(|e| ConfigError::read_error(path, e))?;
        self.config = Self::parse_file(&content, path)?;

        Ok(self)
    }

    /// Load configuration from a file if it exists.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file exists but cannot be loaded.
    pub fn with_optional_file<P: AsRef<Path>>(self, path: P) -> Result<Self, ConfigError> {
        if path.as_ref().exists() {
            self.with_file(path)
        } else {
            Ok(self)
        }
    }

    /// Load configuration from a string in `format` ("toml" or "json").
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if parsing fails.
    ///
    /// # Example
    ///
    /// ```
    /// use pylon_config::ConfigLoader;
    ///
    /// let toml = r#"
    ///     [validation]
    ///     strict_test_mode = true
    /// "#;
    ///
    /// let config = ConfigLoader::new().with_string(toml, "toml").unwrap().load().unwrap();
    /// assert!(config.validation.strict_test_mode);
    /// ```
    pub fn with_string(mut self, content: &str, format: &str) -> Result<Self, ConfigError> {
        self.config = match format.to_lowercase().as_str() {
            "toml" => toml::from_str(content)?,
            "json" => serde_json::from_str(content)?,
            _ => return Err(ConfigError::UnsupportedFormat(format.to_string())),
        };
        Ok(self)
    }

    /// Set environment variable prefix for overrides.
    ///
    /// With prefix `PYLON`:
    /// - `PYLON__CONTRACT__PATH=/etc/pylon/openapi.yaml`
    /// - `PYLON__VALIDATION__FAILURE_POLICY=ignore`
    /// - `PYLON__LOGGING__FORMAT=pretty`
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = Some(prefix.to_uppercase());
        self
    }

    /// Load a `.env` file into the process environment, if one exists.
    #[must_use]
    pub fn with_dotenv(self) -> Self {
        // Missing .env is fine.
        let _ = dotenvy::dotenv();
        self
    }

    /// Apply environment overrides and validate.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if an override cannot be parsed or the result
    /// fails validation.
    pub fn load(mut self) -> Result<PylonConfig, ConfigError> {
        if let Some(prefix) = self.env_prefix.take() {
            self.apply_env_overrides(&prefix)?;
        }

        self.config.validate()?;
        Ok(self.config)
    }

    /// Finalize without environment overrides or validation.
    #[must_use]
    pub fn load_unvalidated(self) -> PylonConfig {
        self.config
    }

    fn parse_file(content: &str, path: &Path) -> Result<PylonConfig, ConfigError> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase);

        match extension.as_deref() {
            Some("toml") => Ok(toml::from_str(content)?),
            Some("json") => Ok(serde_json::from_str(content)?),
            _ => Err(ConfigError::UnsupportedFormat(path.display().to_string())),
        }
    }

    fn apply_env_overrides(&mut self, prefix: &str) -> Result<(), ConfigError> {
        let marker = format!("{prefix}__");
        let mut vars: Vec<(String, String)> =
            env::vars().filter(|(k, _)| k.starts_with(&marker)).collect();
        vars.sort();

        for (key, value) in vars {
            self.apply_env_var(&key, &value, prefix)?;
        }
        Ok(())
    }

    fn apply_env_var(&mut self, key: &str, value: &str, prefix: &str) -> Result<(), ConfigError> {
        let rest = key
            .strip_prefix(prefix)
            .and_then(|k| k.strip_prefix("__"))
            .ok_or_else(|| ConfigError::env_override(key, "invalid key format"))?;

        let boolean = || {
            parse_bool(value).ok_or_else(|| ConfigError::env_override(key, "expected boolean"))
        };
        let optional = || (!value.is_empty()).then(|| value.to_string());

        let parts: Vec<&str> = rest.split("__").collect();
        match parts.as_slice() {
            ["CONTRACT", "PATH"] => {
                self.config.contract.path = optional().map(PathBuf::from);
            }
            ["CONTRACT", "SERVER_BASE_PATH"] => {
                self.config.contract.server_base_path = optional();
            }

            ["VALIDATION", "VALIDATE_REQUESTS"] => {
                self.config.validation.validate_requests = boolean()?;
            }
            ["VALIDATION", "VALIDATE_RESPONSES"] => {
                self.config.validation.validate_responses = boolean()?;
            }
            ["VALIDATION", "VALIDATE_SECURITY"] => {
                self.config.validation.validate_security = boolean()?;
            }
            ["VALIDATION", "STRICT_TEST_MODE"] => {
                self.config.validation.strict_test_mode = boolean()?;
            }
            ["VALIDATION", "FAILURE_POLICY"] => {
                self.config.validation.failure_policy = value
                    .parse()
                    .map_err(|e| ConfigError::env_override(key, format!("{e}")))?;
            }
            ["VALIDATION", "MAX_CAPTURE_BYTES"] => {
                self.config.validation.max_capture_bytes =
                    if value.is_empty() || value.eq_ignore_ascii_case("none") {
                        None
                    } else {
                        Some(value.parse().map_err(|_| {
                            ConfigError::env_override(key, "expected integer or 'none'")
                        })?)
                    };
            }

            ["LOGGING", "ENABLED"] => {
                self.config.logging.enabled = boolean()?;
            }
            ["LOGGING", "LEVEL"] => {
                self.config.logging.level = value.to_string();
            }
            ["LOGGING", "FORMAT"] => {
                self.config.logging.format = match value.to_lowercase().as_str() {
                    "json" => LogFormat::Json,
                    "pretty" => LogFormat::Pretty,
                    _ => {
                        return Err(ConfigError::env_override(
                            key,
                            "expected 'json' or 'pretty'",
                        ))
                    }
                };
            }

            _ => {
                return Err(ConfigError::env_override(key, "unknown configuration key"));
            }
        }

        Ok(())
    }
}

/// Parse a boolean from a string.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
