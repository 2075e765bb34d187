//! Configuration for contract validation.
//!
//! This module provides the switches that decide which parts of the
//! contract are enforced.

use serde::{Deserialize, Serialize};

/// Configuration for validation behavior.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Whether to validate incoming requests.
    pub validate_requests: bool,
    /// Whether to validate outgoing responses.
    pub validate_responses: bool,
    /// Whether to check security requirements on requests.
    pub validate_security: bool,
    /// Maximum response bytes captured for validation. `None` is unbounded.
    pub max_capture_bytes: Option<usize>,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            validate_requests: true,
            validate_responses: true,
            validate_security: true,
            max_capture_bytes: None,
        }
    }
}

impl ValidationConfig {
    /// Validate everything, with no capture limit.
    pub fn strict() -> Self {
        Self::default()
    }

    /// Validate nothing.
    pub fn permissive() -> Self {
        Self {
            validate_requests: false,
            validate_responses: false,
            validate_security: false,
            max_capture_bytes: None,
        }
    }

    /// Validate requests only.
    pub fn request_only() -> Self {
        Self {
            validate_responses: false,
            ..Self::default()
        }
    }

    /// Sets the capture limit.
    pub fn with_max_capture_bytes(mut self, limit: usize) -> Self {
        self.max_capture_bytes = Some(limit);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ValidationConfig::default();
        assert!(config.validate_requests);
        assert!(config.validate_responses);
        assert!(config.validate_security);
        assert_eq!(config.max_capture_bytes, None);
    }

    #[test]
    fn test_presets() {
        assert!(!ValidationConfig::permissive().validate_requests);
        assert!(!ValidationConfig::request_only().validate_responses);
        assert_eq!(
            ValidationConfig::strict()
                .with_max_capture_bytes(1024)
                .max_capture_bytes,
            Some(1024)
        );
    }

    #[test]
    fn test_partial_deserialize() {
        let config: ValidationConfig =
            serde_json::from_str(r#"{"validate_security": false}"#).unwrap();
        assert!(config.validate_requests);
        assert!(!config.validate_security);
    }
}
