//! Test error types.

use thiserror::Error;

/// Errors that can occur while building or sending a test request.
#[derive(Debug, Error)]
pub enum TestError {
    /// Request building failed.
    #[error("request build error: {0}")]
    RequestBuild(String),

    /// A header name or value could not be parsed.
    #[error("invalid header: {0}")]
    InvalidHeader(String),

    /// Reading the response body failed.
    #[error("body read error: {0}")]
    BodyRead(String),

    /// JSON serialization or deserialization failed.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Form or query encoding failed.
    #[error("form encoding error: {0}")]
    Form(#[from] serde_urlencoded::ser::Error),
}
