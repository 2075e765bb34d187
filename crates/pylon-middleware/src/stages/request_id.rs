//! Request correlation.
//!
//! Assigns every request the id that contract rejections and response
//! violations are logged under. An incoming `X-Request-ID` is honoured only
//! when the middleware is told to trust it and it parses as a UUID; otherwise
//! a fresh UUID v7 is generated. The id is echoed on the response and the
//! rest of the chain runs inside a `request` span carrying it.

use crate::context::{MiddlewareContext, RequestId};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::types::{Request, Response};
use http::HeaderValue;
use tracing::{info_span, Instrument};
use uuid::Uuid;

/// The header name for request ID propagation.
pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Middleware that generates or propagates request IDs.
#[derive(Debug, Clone, Default)]
pub struct RequestIdMiddleware {
    /// Whether to trust incoming request ID headers.
    trust_incoming: bool,
}

impl RequestIdMiddleware {
    /// Always generates a fresh id.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuses a well-formed incoming `X-Request-ID`.
    #[must_use]
    pub fn trust_incoming() -> Self {
        Self {
            trust_incoming: true,
        }
    }

    fn incoming(&self, request: &Request) -> Option<RequestId> {
        if !self.trust_incoming {
            return None;
        }
        request
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
            .map(RequestId::from_uuid)
    }
}

impl Middleware for RequestIdMiddleware {
    fn name(&self) -> &'static str {
        "request_id"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        let request_id = self.incoming(&request).unwrap_or_else(RequestId::new);
        ctx.set_request_id(request_id);

        let span = info_span!(
            "request",
            request_id = %request_id,
            method = %request.method(),
            path = request.uri().path(),
        );

        Box::pin(
            async move {
                let mut response = next.run(ctx, request).await;
                if let Ok(value) = HeaderValue::from_str(&request_id.to_string()) {
                    response.headers_mut().insert(REQUEST_ID_HEADER, value);
                }
                response
            }
            .instrument(span),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{empty, full};
    use http::StatusCode;

    fn request_with_id(id: Option<&str>) -> Request {
        let mut builder = http::Request::builder().uri("/items");
        if let Some(id) = id {
            builder = builder.header(REQUEST_ID_HEADER, id);
        }
        builder.body(empty()).unwrap()
    }

    fn ok<'a>() -> Next<'a> {
        Next::handler(|_ctx, _req| Box::pin(async { http::Response::new(full("ok")) }))
    }

    fn echoed(response: &Response) -> String {
        response
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string()
    }

    #[tokio::test]
    async fn test_generated_id_is_stored_and_echoed() {
        let mut ctx = MiddlewareContext::new();
        let response = RequestIdMiddleware::new()
            .process(&mut ctx, request_with_id(None), ok())
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(echoed(&response), ctx.request_id().to_string());
    }

    #[tokio::test]
    async fn test_untrusted_incoming_id_is_replaced() {
        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        let mut ctx = MiddlewareContext::new();
        let response = RequestIdMiddleware::new()
            .process(&mut ctx, request_with_id(Some(incoming)), ok())
            .await;

        assert_ne!(echoed(&response), incoming);
    }

    #[tokio::test]
    async fn test_trusted_incoming_id_is_kept() {
        let incoming = "01234567-89ab-7def-8123-456789abcdef";
        let mut ctx = MiddlewareContext::new();
        let response = RequestIdMiddleware::trust_incoming()
            .process(&mut ctx, request_with_id(Some(incoming)), ok())
            .await;

        assert_eq!(echoed(&response), incoming);
        assert_eq!(ctx.request_id().to_string(), incoming);
    }

    #[tokio::test]
    async fn test_malformed_incoming_id_is_replaced() {
        let mut ctx = MiddlewareContext::new();
        let response = RequestIdMiddleware::trust_incoming()
            .process(&mut ctx, request_with_id(Some("not-a-uuid")), ok())
            .await;

        assert!(Uuid::parse_str(&echoed(&response)).is_ok());
    }
}
