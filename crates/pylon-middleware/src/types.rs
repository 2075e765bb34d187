//! Common types used throughout the middleware pipeline.
//!
//! Requests and responses are standard `http` types over a boxed body, so any
//! hyper or tower server can drive the pipeline and streaming handlers pass
//! through untouched.

use bytes::Bytes;
use http_body_util::{BodyExt, Empty, Full};

/// Error type carried by boxed bodies.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// A boxed HTTP body.
pub type BoxBody = http_body_util::combinators::BoxBody<Bytes, BoxError>;

/// The HTTP request type used in the middleware pipeline.
pub type Request = http::Request<BoxBody>;

/// The HTTP response type used in the middleware pipeline.
pub type Response = http::Response<BoxBody>;

/// Boxes a complete in-memory body.
pub fn full(bytes: impl Into<Bytes>) -> BoxBody {
    Full::new(bytes.into())
        .map_err(|never| match never {})
        .boxed()
}

/// An empty body.
pub fn empty() -> BoxBody {
    Empty::<Bytes>::new()
        .map_err(|never| match never {})
        .boxed()
}

/// Extension trait for building error responses.
pub trait ResponseExt {
    /// Creates a response with the given status and no body.
    fn status_only(status: http::StatusCode) -> Response;

    /// Creates the JSON abort response `{"error": title}`.
    fn json_error(status: http::StatusCode, body: Vec<u8>) -> Response;
}

impl ResponseExt for Response {
    fn status_only(status: http::StatusCode) -> Response {
        let mut response = http::Response::new(empty());
        *response.status_mut() = status;
        response
    }

    fn json_error(status: http::StatusCode, body: Vec<u8>) -> Response {
        let mut response = http::Response::new(full(body));
        *response.status_mut() = status;
        response.headers_mut().insert(
            http::header::CONTENT_TYPE,
            http::HeaderValue::from_static("application/json"),
        );
        response
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http::StatusCode;

    #[tokio::test]
    async fn test_json_error_response() {
        let response = Response::json_error(StatusCode::NOT_FOUND, br#"{"error":"x"}"#.to_vec());
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            response.headers().get(http::header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert_eq!(&body[..], br#"{"error":"x"}"#);
    }

    #[tokio::test]
    async fn test_status_only_has_empty_body() {
        let response = Response::status_only(StatusCode::from_u16(499).unwrap());
        assert_eq!(response.status().as_u16(), 499);
        let body = response.into_body().collect().await.unwrap().to_bytes();
        assert!(body.is_empty());
    }
}
