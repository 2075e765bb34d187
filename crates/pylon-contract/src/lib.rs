//! Pylon Contract - OpenAPI contract model
//!
//! This crate loads an OpenAPI 3.x document into an immutable [`Contract`]
//! and provides everything needed to enforce it per request:
//!
//! - [`RouteResolver`] maps method + path to a declared [`Operation`]
//! - [`RequestValidator`] checks parameters, security and request bodies
//! - [`ResponseValidator`] checks status, headers and response bodies
//! - [`decode`] turns a [`ValidationError`] into a client-facing [`DecodedError`]
//!
//! # Architecture
//!
//! ```text
//!   document bytes ──► ContractLoader ──► Contract (Arc, immutable)
//!                       │ parse                 │
//!                       │ resolve $ref          ├── RouteResolver
//!                       │ compile schemas       └── Operations
//!                       ▼                             │
//!                  FormatRegistry          RequestValidator / ResponseValidator
//!                                                     │
//!                                             ValidationError ──► decode ──► DecodedError
//! ```
//!
//! # Example
//!
//! ```ignore
//! use pylon_contract::{Contract, RequestValidationInput, RequestValidator};
//!
//! let contract = Contract::from_slice(include_bytes!("openapi.yaml"))?;
//! let (parts, body) = request.into_parts();
//!
//! let route = contract.resolve(&parts.method, parts.uri.path())?;
//! let input = RequestValidationInput::new(route, &parts);
//! RequestValidator::default().validate(&input, &body)?;
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod contract;
pub mod decode;
pub mod document;
pub mod error;
pub mod formats;
pub mod media;
pub mod operation;
pub mod params;
pub mod resolver;
pub mod schema;
pub mod validation;

// Re-exports for convenience
pub use config::ValidationConfig;
pub use contract::{Contract, ContractInfo, ContractLoader};
pub use decode::{decode, decode_or_internal, DecodeError, DecodedError};
pub use document::ParameterLocation;
pub use error::{
    ContractError, ContractResult, FieldError, SchemaViolation, ValidationError,
    ViolationLocation,
};
pub use formats::FormatRegistry;
pub use operation::{Operation, Parameter, RequestBody, Response, SecurityRequirement};
pub use params::PathParameters;
pub use resolver::{RouteMatch, RouteResolver};
pub use schema::CompiledSchema;
pub use validation::{
    RequestValidationInput, RequestValidator, ResponseValidationInput, ResponseValidator,
};
