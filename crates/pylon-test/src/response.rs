//! Test response wrapper.

use crate::error::TestError;
use bytes::Bytes;
use http::{header, HeaderMap, HeaderValue, StatusCode};
use http_body_util::BodyExt;
use pylon_middleware::Response;
use serde::de::DeserializeOwned;
use std::fmt;

/// A fully collected response with helpers for assertions.
///
/// Collecting the body to its end is what lets the contract stage check the
/// response, so any violation has been reported by the time one of these
/// exists.
pub struct TestResponse {
    status: StatusCode,
    headers: HeaderMap,
    body: Bytes,
}

impl TestResponse {
    /// Collects a pipeline response.
    pub async fn from_http(response: Response) -> Result<Self, TestError> {
        let (parts, body) = response.into_parts();
        let body = body
            .collect()
            .await
            .map_err(|e| TestError::BodyRead(e.to_string()))?
            .to_bytes();

        Ok(Self {
            status: parts.status,
            headers: parts.headers,
            body,
        })
    }

    /// Creates a test response from raw parts.
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
        }
    }

    /// Returns the status code.
    #[must_use]
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the status code as a u16.
    #[must_use]
    pub fn status_code(&self) -> u16 {
        self.status.as_u16()
    }

    /// Returns true if the status is 2xx.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    /// Returns true if the status is 4xx.
    #[must_use]
    pub fn is_client_error(&self) -> bool {
        self.status.is_client_error()
    }

    /// Returns a reference to the headers.
    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Gets a header value by name.
    #[must_use]
    pub fn header(&self, name: impl AsRef<str>) -> Option<&HeaderValue> {
        self.headers.get(name.as_ref())
    }

    /// Gets a header value as a string.
    #[must_use]
    pub fn header_str(&self, name: impl AsRef<str>) -> Option<&str> {
        self.header(name).and_then(|v| v.to_str().ok())
    }

    /// Returns the Content-Type header value.
    #[must_use]
    pub fn content_type(&self) -> Option<&str> {
        self.header_str(header::CONTENT_TYPE.as_str())
    }

    /// Returns the raw body bytes.
    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// Returns the body as a string.
    pub fn text(&self) -> Result<String, TestError> {
        String::from_utf8(self.body.to_vec())
            .map_err(|e| TestError::BodyRead(format!("invalid UTF-8: {e}")))
    }

    /// Deserializes the body as JSON.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T, TestError> {
        Ok(serde_json::from_slice(&self.body)?)
    }

    /// Deserializes the body as a JSON value.
    pub fn json_value(&self) -> Result<serde_json::Value, TestError> {
        self.json()
    }

    /// The `error` member of a rejection body, if this is one.
    #[must_use]
    pub fn error_message(&self) -> Option<String> {
        let value: serde_json::Value = serde_json::from_slice(&self.body).ok()?;
        value.get("error")?.as_str().map(str::to_string)
    }

    /// Asserts the status code.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status(&self, expected: StatusCode) -> &Self {
        assert_eq!(
            self.status, expected,
            "expected status {}, got {} with body {:?}",
            expected, self.status, self.body
        );
        self
    }

    /// Asserts the status code as a u16.
    ///
    /// # Panics
    ///
    /// Panics if the status code doesn't match.
    pub fn assert_status_code(&self, expected: u16) -> &Self {
        assert_eq!(
            self.status.as_u16(),
            expected,
            "expected status {}, got {} with body {:?}",
            expected,
            self.status.as_u16(),
            self.body
        );
        self
    }

    /// Asserts a rejection: the status and the exact `{"error": ...}` body.
    ///
    /// # Panics
    ///
    /// Panics if the status or the message doesn't match.
    pub fn assert_rejected(&self, status: StatusCode, message: impl AsRef<str>) -> &Self {
        self.assert_status(status);
        assert_eq!(
            self.error_message().as_deref(),
            Some(message.as_ref()),
            "rejection message mismatch"
        );
        self
    }

    /// Asserts that a header exists with the expected value.
    ///
    /// # Panics
    ///
    /// Panics if the header doesn't exist or doesn't match.
    pub fn assert_header(&self, name: impl AsRef<str>, expected: impl AsRef<str>) -> &Self {
        let name = name.as_ref();
        let actual = self
            .header_str(name)
            .unwrap_or_else(|| panic!("header '{name}' not found"));
        assert_eq!(actual, expected.as_ref(), "header '{name}' mismatch");
        self
    }

    /// Asserts that the body is exactly `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the bytes differ.
    pub fn assert_body_bytes(&self, expected: impl AsRef<[u8]>) -> &Self {
        assert_eq!(self.body.as_ref(), expected.as_ref(), "body mismatch");
        self
    }

    /// Asserts that the JSON body equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the body is not JSON or doesn't match.
    pub fn assert_json_eq(&self, expected: &serde_json::Value) -> &Self {
        let actual = self
            .json_value()
            .unwrap_or_else(|e| panic!("body is not JSON: {e}"));
        assert_eq!(&actual, expected, "JSON body mismatch");
        self
    }

    /// Asserts that a dotted JSON path (`items.0.id`) equals `expected`.
    ///
    /// # Panics
    ///
    /// Panics if the path is missing or the value doesn't match.
    pub fn assert_json_field(&self, path: impl AsRef<str>, expected: &serde_json::Value) -> &Self {
        let path = path.as_ref();
        let json = self
            .json_value()
            .unwrap_or_else(|e| panic!("body is not JSON: {e}"));
        let actual =
            json_path(&json, path).unwrap_or_else(|| panic!("JSON path '{path}' not found in {json}"));
        assert_eq!(actual, expected, "JSON field '{path}' mismatch");
        self
    }
}

impl fmt::Debug for TestResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TestResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .field("body_len", &self.body.len())
            .finish()
    }
}

fn json_path<'a>(value: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = value;
    for segment in path.split('.').filter(|s| !s.is_empty()) {
        current = match segment.parse::<usize>() {
            Ok(index) => current.get(index)?,
            Err(_) => current.get(segment)?,
        };
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn response(status: u16, body: &str) -> TestResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::CONTENT_TYPE,
            HeaderValue::from_static("application/json"),
        );
        TestResponse::new(
            StatusCode::from_u16(status).unwrap(),
            headers,
            Bytes::from(body.to_string()),
        )
    }

    #[test]
    fn test_status_helpers() {
        let ok = response(201, "{}");
        assert!(ok.is_success());
        assert_eq!(ok.status_code(), 201);

        let rejected = response(404, "{}");
        assert!(rejected.is_client_error());
        assert!(!rejected.is_success());
    }

    #[test]
    fn test_error_message() {
        let rejected = response(400, r#"{"error":"request body has an error"}"#);
        assert_eq!(
            rejected.error_message().as_deref(),
            Some("request body has an error")
        );
        rejected.assert_rejected(StatusCode::BAD_REQUEST, "request body has an error");

        assert_eq!(response(200, "[1,2]").error_message(), None);
        assert_eq!(response(200, "not json").error_message(), None);
    }

    #[test]
    fn test_json_field_paths() {
        let r = response(200, r#"{"items":[{"id":"a"},{"id":"b"}]}"#);
        r.assert_json_field("items.1.id", &json!("b"));
        assert!(json_path(&r.json_value().unwrap(), "items.5").is_none());
    }

    #[test]
    fn test_assert_header_and_body() {
        let r = response(200, r#"{"id":1}"#);
        r.assert_header("content-type", "application/json")
            .assert_body_bytes(br#"{"id":1}"#)
            .assert_json_eq(&json!({"id": 1}));
    }

    #[test]
    #[should_panic(expected = "expected status 200")]
    fn test_assert_status_panics() {
        response(500, "{}").assert_status(StatusCode::OK);
    }
}
