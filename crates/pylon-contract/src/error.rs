//! Contract error types.
//!
//! Two families live here: [`ContractError`] for anything that goes wrong
//! while loading a document (fatal, startup-time) and [`ValidationError`],
//! the closed taxonomy every per-request failure is translated into before
//! it reaches the [decoder](crate::decode).

use std::fmt;

use thiserror::Error;

use crate::document::ParameterLocation;

/// Result type for contract loading.
pub type ContractResult<T> = Result<T, ContractError>;

/// Errors that can occur while loading a contract document.
#[derive(Debug, Error)]
pub enum ContractError {
    /// The document is neither valid JSON nor valid YAML, or does not have
    /// the shape of an OpenAPI document.
    #[error("failed to parse contract document: {0}")]
    Parse(String),

    /// The document is not an OpenAPI 3.x document.
    #[error("unsupported contract version: {0}")]
    UnsupportedVersion(String),

    /// A path template could not be compiled.
    #[error("invalid path template '{template}': {reason}")]
    InvalidPath {
        /// The offending template.
        template: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A `$ref` points at something that does not exist or is not local.
    #[error("unresolved reference: {reference}")]
    UnresolvedReference {
        /// The reference string.
        reference: String,
    },

    /// A schema failed to compile.
    #[error("schema at {location} failed to compile: {reason}")]
    SchemaCompile {
        /// Where the schema was declared (e.g. `GET /items/{id} parameter id`).
        location: String,
        /// Compiler message.
        reason: String,
    },

    /// Two operations declare the same `operationId`.
    #[error("duplicate operationId '{0}'")]
    DuplicateOperationId(String),

    /// An operation references a security scheme that is not declared.
    #[error("unknown security scheme '{0}'")]
    UnknownSecurityScheme(String),
}

/// A single field-level failure reported by the schema engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// JSON pointer to the failing value (empty for the root).
    pub path: String,
    /// Error message.
    pub message: String,
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.path.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.path, self.message)
        }
    }
}

/// Where a schema violation was found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViolationLocation {
    /// A request parameter.
    Parameter {
        /// Parameter location.
        location: ParameterLocation,
        /// Parameter name.
        name: String,
    },
    /// The operation's security requirements.
    Security,
    /// The request body (including its content type).
    RequestBody,
    /// The response status code.
    ResponseStatus,
    /// A declared response header.
    ResponseHeader {
        /// Header name.
        name: String,
    },
    /// The response body (including its content type).
    ResponseBody,
}

/// A request or response value that does not conform to the contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaViolation {
    /// Where the violation was found.
    pub location: ViolationLocation,
    /// Human-readable cause.
    pub cause: String,
    /// Suggested HTTP status for request-side violations.
    pub status: Option<u16>,
    /// Field-level details from the schema engine, if any.
    pub errors: Vec<FieldError>,
}

impl SchemaViolation {
    /// Creates a violation with a cause and a suggested status.
    pub fn new(location: ViolationLocation, cause: impl Into<String>, status: u16) -> Self {
        Self {
            location,
            cause: cause.into(),
            status: Some(status),
            errors: Vec::new(),
        }
    }

    /// Creates a violation with no suggested status (response side).
    pub fn unstatused(location: ViolationLocation, cause: impl Into<String>) -> Self {
        Self {
            location,
            cause: cause.into(),
            status: None,
            errors: Vec::new(),
        }
    }

    /// Attaches field-level details.
    pub fn with_errors(mut self, errors: Vec<FieldError>) -> Self {
        self.errors = errors;
        self
    }
}

impl fmt::Display for SchemaViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.cause)
    }
}

/// Closed taxonomy of per-request validation failures.
///
/// Resolver and validator adapters translate every failure into one of these
/// variants; nothing else crosses into the pipeline.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ValidationError {
    /// No declared path template matches the request path.
    #[error("no matching operation was found for {method} {path}")]
    RouteNotFound {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// A template matches the path but not with this method.
    #[error("method {method} is not allowed for {path}")]
    MethodNotAllowed {
        /// Request method.
        method: String,
        /// Request path.
        path: String,
    },

    /// A value does not conform to its declared schema.
    #[error("{0}")]
    SchemaViolation(SchemaViolation),

    /// A failure that could not be classified.
    #[error("{0}")]
    Unrecognized(String),
}

impl ValidationError {
    /// Returns the suggested HTTP status, if the failure carries one.
    pub fn suggested_status(&self) -> Option<u16> {
        match self {
            Self::RouteNotFound { .. } => Some(404),
            Self::MethodNotAllowed { .. } => Some(405),
            Self::SchemaViolation(violation) => violation.status,
            Self::Unrecognized(_) => None,
        }
    }

    /// Returns the schema violation, if this is one.
    pub fn as_violation(&self) -> Option<&SchemaViolation> {
        match self {
            Self::SchemaViolation(violation) => Some(violation),
            _ => None,
        }
    }
}

impl From<SchemaViolation> for ValidationError {
    fn from(violation: SchemaViolation) -> Self {
        Self::SchemaViolation(violation)
    }
}
