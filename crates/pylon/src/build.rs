//! Building the contract stage from a document or a configuration.

use std::sync::Arc;

use pylon_config::{ConfigError, PylonConfig};
use pylon_contract::ContractLoader;
use pylon_middleware::ContractValidationMiddleware;
use pylon_telemetry::TelemetryConfig;
use tracing::debug;

use crate::{BuildError, Options};

/// Loads `document` and returns a contract stage configured by `options`.
///
/// The document is parsed, every `$ref` resolved and every schema compiled
/// here, once. The returned stage is immutable and can serve any number of
/// requests concurrently.
///
/// ```
/// use pylon::{build, FailurePolicy, Options};
///
/// let doc = br#"{"openapi":"3.0.3","info":{"title":"t","version":"1"},"paths":{}}"#;
/// let stage = build(doc, Options::default().strict()).unwrap();
/// assert_eq!(stage.policy(), FailurePolicy::AssertFatal);
/// ```
pub fn build(document: &[u8], options: Options) -> Result<ContractValidationMiddleware, BuildError> {
    let policy = options.effective_policy();
    let config = options.validation_config();

    let mut loader = ContractLoader::new().with_formats(options.formats);
    if let Some(base_path) = options.server_base_path {
        loader = loader.with_base_path(base_path);
    }
    let contract = loader.load(document)?;

    debug!(
        title = %contract.info().title,
        %policy,
        validate_requests = config.validate_requests,
        validate_responses = config.validate_responses,
        "contract stage built"
    );

    Ok(ContractValidationMiddleware::new(Arc::new(contract))
        .with_config(config)
        .with_policy(policy))
}

/// Builds the contract stage described by a loaded configuration.
///
/// The configuration is validated first and must name a contract file.
pub fn from_config(config: &PylonConfig) -> Result<ContractValidationMiddleware, BuildError> {
    config.validate()?;

    let path = config.contract.path.as_ref().ok_or_else(|| {
        ConfigError::invalid_value("contract.path", "required to build the contract stage")
    })?;
    let document = std::fs::read(path).map_err(|source| BuildError::Io {
        path: path.clone(),
        source,
    })?;

    let validation = &config.validation;
    let options = Options {
        strict_test_mode: validation.strict_test_mode,
        policy: Some(validation.failure_policy),
        validate_requests: validation.validate_requests,
        validate_responses: validation.validate_responses,
        validate_security: validation.validate_security,
        max_capture_bytes: validation.max_capture_bytes,
        server_base_path: config.contract.server_base_path.clone(),
        ..Options::default()
    };
    build(&document, options)
}

/// Installs logging from the configuration and the Prometheus recorder.
pub fn init_telemetry(config: &PylonConfig) -> Result<(), BuildError> {
    pylon_telemetry::init_telemetry(&TelemetryConfig::new(config.logging.to_log_config()))?;
    Ok(())
}
