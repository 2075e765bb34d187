//! Middleware stages.
//!
//! - [`request_id`]: assigns the id violations are logged under
//! - [`contract`]: resolves, validates and reports against the contract

pub mod contract;
pub mod request_id;

pub use contract::ContractValidationMiddleware;
pub use request_id::RequestIdMiddleware;
