//! Translation of validation failures into client-facing errors.
//!
//! This is the only place client-facing error text is produced. Anything
//! that cannot be classified becomes `500 internal server error`; the raw
//! error is logged, never sent.

use std::fmt;

use serde::Serialize;
use thiserror::Error;
use tracing::warn;

use crate::error::ValidationError;

/// Title used for every failure that cannot be decoded.
pub const INTERNAL_ERROR_TITLE: &str = "internal server error";
/// Title for [`ValidationError::RouteNotFound`].
pub const ROUTE_NOT_FOUND_TITLE: &str = "no matching operation was found";
/// Title for [`ValidationError::MethodNotAllowed`].
pub const METHOD_NOT_ALLOWED_TITLE: &str = "method not allowed";

/// A client-facing error: a valid HTTP status and a non-empty title.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedError {
    status: u16,
    title: String,
}

/// Why a validation error could not be decoded.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The error is not one the decoder knows how to present.
    #[error("unrecognized validation error: {0}")]
    Unrecognized(String),

    /// The decoded status or title is not usable.
    #[error("malformed decoded error (status {status}, title {title:?})")]
    Malformed {
        /// Offending status.
        status: u16,
        /// Offending title.
        title: String,
    },
}

#[derive(Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
}

impl DecodedError {
    /// Creates a decoded error, rejecting invalid statuses and empty titles.
    pub fn new(status: u16, title: impl Into<String>) -> Result<Self, DecodeError> {
        let title = title.into();
        if !(100..=599).contains(&status) || title.trim().is_empty() {
            return Err(DecodeError::Malformed { status, title });
        }
        Ok(Self { status, title })
    }

    /// The fixed `500 internal server error`.
    pub fn internal() -> Self {
        Self {
            status: 500,
            title: INTERNAL_ERROR_TITLE.to_string(),
        }
    }

    /// HTTP status code.
    pub fn status(&self) -> u16 {
        self.status
    }

    /// Client-facing title.
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The abort body: `{"error": <title>}`.
    pub fn to_json(&self) -> Vec<u8> {
        serde_json::to_vec(&ErrorBody { error: &self.title })
            .unwrap_or_else(|_| br#"{"error":"internal server error"}"#.to_vec())
    }
}

impl fmt::Display for DecodedError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.status, self.title)
    }
}

/// Maps a validation failure to a client-facing error.
pub fn decode(err: &ValidationError) -> Result<DecodedError, DecodeError> {
    match err {
        ValidationError::RouteNotFound { .. } => DecodedError::new(404, ROUTE_NOT_FOUND_TITLE),
        ValidationError::MethodNotAllowed { .. } => {
            DecodedError::new(405, METHOD_NOT_ALLOWED_TITLE)
        }
        ValidationError::SchemaViolation(violation) => {
            DecodedError::new(violation.status.unwrap_or(400), violation.cause.clone())
        }
        ValidationError::Unrecognized(message) => Err(DecodeError::Unrecognized(message.clone())),
    }
}

/// Like [`decode`], but falls back to `500 internal server error`.
pub fn decode_or_internal(err: &ValidationError) -> DecodedError {
    decode(err).unwrap_or_else(|decode_err| {
        warn!(error = %err, reason = %decode_err, "could not decode validation error");
        DecodedError::internal()
    })
}
