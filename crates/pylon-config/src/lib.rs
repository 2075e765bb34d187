//! Typed configuration for Pylon.
//!
//! - TOML and JSON configuration files
//! - Environment variable overrides
//! - Strict validation (fails on unknown fields)
//! - Layered configuration (defaults → file → env)
//!
//! # Example
//!
//! ```no_run
//! use pylon_config::ConfigLoader;
//!
//! # fn main() -> Result<(), pylon_config::ConfigError> {
//! let config = ConfigLoader::new()
//!     .with_dotenv()
//!     .with_optional_file("pylon.toml")?
//!     .with_env_prefix("PYLON")
//!     .load()?;
//!
//! println!("policy: {}", config.validation.effective_policy());
//! # Ok(())
//! # }
//! ```
//!
//! # Configuration File Format
//!
//! ```toml
//! [contract]
//! path = "openapi.yaml"
//! server_base_path = "/v1"
//!
//! [validation]
//! validate_requests = true
//! validate_responses = true
//! validate_security = true
//! strict_test_mode = false
//! failure_policy = "reject_client"
//! max_capture_bytes = 1048576
//!
//! [logging]
//! enabled = true
//! level = "info"
//! format = "json"
//! ```

#![warn(missing_docs)]

mod config;
mod error;
mod loader;
mod schema;

pub use config::*;
pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use schema::*;
