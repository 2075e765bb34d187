//! Errors raised while building the contract stage.

use std::path::PathBuf;
use thiserror::Error;

/// Why a [`ContractValidationMiddleware`](pylon_middleware::ContractValidationMiddleware)
/// could not be built. Startup should stop on any of these.
#[derive(Debug, Error)]
pub enum BuildError {
    /// The document could not be loaded as a contract.
    #[error(transparent)]
    Contract(#[from] pylon_contract::ContractError),

    /// The configuration is invalid or names no contract.
    #[error(transparent)]
    Config(#[from] pylon_config::ConfigError),

    /// The contract file could not be read.
    #[error("failed to read contract {path}: {source}")]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Telemetry could not be initialized.
    #[error(transparent)]
    Telemetry(#[from] pylon_telemetry::TelemetryError),
}
