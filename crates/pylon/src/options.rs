//! Options accepted by [`build`](crate::build).

use pylon_contract::{FormatRegistry, ValidationConfig};
use pylon_middleware::FailurePolicy;

/// How the contract stage should behave.
///
/// ```
/// use pylon::{FailurePolicy, Options};
///
/// let options = Options::default().strict();
/// assert_eq!(options.effective_policy(), FailurePolicy::AssertFatal);
/// ```
#[derive(Debug, Clone)]
pub struct Options {
    /// Turn every validation failure into a panic. Meant for test suites.
    pub strict_test_mode: bool,
    /// Explicit policy. Ignored when `strict_test_mode` is set.
    pub policy: Option<FailurePolicy>,
    /// Check requests before the handler runs.
    pub validate_requests: bool,
    /// Check responses after the handler has produced them.
    pub validate_responses: bool,
    /// Check security requirements on requests.
    pub validate_security: bool,
    /// Response bytes captured for validation. `None` is unbounded.
    pub max_capture_bytes: Option<usize>,
    /// String formats known to schema validation.
    pub formats: FormatRegistry,
    /// Replaces the base path derived from the document's `servers`.
    pub server_base_path: Option<String>,
}

impl Default for Options {
    fn default() -> Self {
        Self {
            strict_test_mode: false,
            policy: None,
            validate_requests: true,
            validate_responses: true,
            validate_security: true,
            max_capture_bytes: None,
            formats: FormatRegistry::default(),
            server_base_path: None,
        }
    }
}

impl Options {
    /// Enables strict test mode.
    pub fn strict(mut self) -> Self {
        self.strict_test_mode = true;
        self
    }

    /// Sets the failure policy.
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = Some(policy);
        self
    }

    /// Caps how much of a response body is captured.
    pub fn with_max_capture_bytes(mut self, limit: usize) -> Self {
        self.max_capture_bytes = Some(limit);
        self
    }

    /// Registers an extra string format.
    pub fn with_format<F>(mut self, name: impl Into<String>, validator: F) -> Self
    where
        F: Fn(&str) -> bool + Send + Sync + 'static,
    {
        self.formats.register(name, validator);
        self
    }

    /// The policy the stage will run with.
    #[must_use]
    pub fn effective_policy(&self) -> FailurePolicy {
        if self.strict_test_mode {
            FailurePolicy::AssertFatal
        } else {
            self.policy.unwrap_or_default()
        }
    }

    /// The validation switches, as the contract stage takes them.
    #[must_use]
    pub fn validation_config(&self) -> ValidationConfig {
        ValidationConfig {
            validate_requests: self.validate_requests,
            validate_responses: self.validate_responses,
            validate_security: self.validate_security,
            max_capture_bytes: self.max_capture_bytes,
        }
    }
}
