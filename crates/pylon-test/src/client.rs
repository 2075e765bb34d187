//! In-memory test client.

use crate::error::TestError;
use crate::request::{TestRequest, TestRequestBuilder};
use crate::response::TestResponse;
use http::{header, HeaderValue, Method, StatusCode};
use http_body_util::BodyExt;
use pylon_contract::Contract;
use pylon_middleware::types::full;
use pylon_middleware::{
    BoxFuture, ContractValidationMiddleware, ContractViolation, FailurePolicy, Pipeline,
    RecordingSink, RequestIdMiddleware, Response, ResponseExt,
};
use std::future::Future;
use std::sync::Arc;

/// Handler function type for the test client.
pub type TestHandler = Arc<dyn Fn(TestRequest) -> BoxFuture<'static, Response> + Send + Sync>;

/// Sends requests through a [`Pipeline`] to an in-process handler.
///
/// No socket is bound. The response body is always collected to the end so
/// the contract stage gets to check it before the call returns.
///
/// ```
/// use http::StatusCode;
/// use pylon_test::{json_response, TestClient};
///
/// # tokio_test::block_on(async {
/// let client = TestClient::new(|req| async move {
///     json_response(StatusCode::OK, &serde_json::json!({"path": req.uri.path()}))
/// });
/// let response = client.get("/ping").send().await;
/// assert_eq!(response.status_code(), 200);
/// # });
/// ```
#[must_use]
pub struct TestClient {
    pipeline: Arc<Pipeline>,
    handler: TestHandler,
    sink: Option<RecordingSink>,
    default_headers: Vec<(String, String)>,
}

impl TestClient {
    /// Creates a client with no stages in front of `handler`.
    pub fn new<F, Fut>(handler: F) -> Self
    where
        F: Fn(TestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self::with_pipeline(Pipeline::builder().build(), handler)
    }

    /// Creates a client that runs `pipeline` in front of `handler`.
    pub fn with_pipeline<F, Fut>(pipeline: Pipeline, handler: F) -> Self
    where
        F: Fn(TestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        Self {
            pipeline: Arc::new(pipeline),
            handler: Arc::new(move |req| -> BoxFuture<'static, Response> {
                Box::pin(handler(req))
            }),
            sink: None,
            default_headers: Vec::new(),
        }
    }

    /// Creates a client enforcing `contract` with the given policy.
    ///
    /// Requests get an id, then go through contract validation. Violations
    /// land in a [`RecordingSink`] readable through [`violations`](Self::violations).
    pub fn for_contract<F, Fut>(contract: Arc<Contract>, policy: FailurePolicy, handler: F) -> Self
    where
        F: Fn(TestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let sink = RecordingSink::new();
        let middleware = ContractValidationMiddleware::new(contract)
            .with_policy(policy)
            .with_sink(sink.clone());
        Self::for_middleware(middleware, handler).with_sink(sink)
    }

    /// Creates a client around an already configured contract stage.
    ///
    /// Violations go wherever the stage's sink sends them.
    pub fn for_middleware<F, Fut>(middleware: ContractValidationMiddleware, handler: F) -> Self
    where
        F: Fn(TestRequest) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Response> + Send + 'static,
    {
        let pipeline = Pipeline::builder()
            .stage(RequestIdMiddleware::new())
            .stage(middleware)
            .build();
        Self::with_pipeline(pipeline, handler)
    }

    /// A client whose handler replies `200 {"method": ..., "path": ...}`.
    pub fn echo() -> Self {
        Self::new(|req| async move {
            json_response(
                StatusCode::OK,
                &serde_json::json!({
                    "method": req.method.as_str(),
                    "path": req.uri.path(),
                }),
            )
        })
    }

    /// Records violations in `sink`, exposed through [`violations`](Self::violations).
    pub fn with_sink(mut self, sink: RecordingSink) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Adds a header sent with every request.
    pub fn with_default_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.default_headers.push((name.into(), value.into()));
        self
    }

    /// Violations reported so far, oldest first.
    #[must_use]
    pub fn violations(&self) -> Vec<ContractViolation> {
        self.sink
            .as_ref()
            .map(RecordingSink::violations)
            .unwrap_or_default()
    }

    /// The stage names requests pass through.
    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.pipeline.stage_names()
    }

    /// Creates a GET request builder.
    pub fn get(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::GET, uri)
    }

    /// Creates a POST request builder.
    pub fn post(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::POST, uri)
    }

    /// Creates a PUT request builder.
    pub fn put(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PUT, uri)
    }

    /// Creates a PATCH request builder.
    pub fn patch(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::PATCH, uri)
    }

    /// Creates a DELETE request builder.
    pub fn delete(&self, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        self.request(Method::DELETE, uri)
    }

    /// Creates a request builder with any method.
    pub fn request(&self, method: Method, uri: impl AsRef<str>) -> TestClientRequest<'_> {
        TestClientRequest::new(self, TestRequestBuilder::new(method, uri))
    }

    /// Sends a built request and collects the response.
    pub async fn send_request(&self, request: TestRequest) -> Result<TestResponse, TestError> {
        let handler = Arc::clone(&self.handler);
        let request = request.into_http_request()?;

        let response = self
            .pipeline
            .process(
                pylon_middleware::MiddlewareContext::new(),
                request,
                move |ctx, req| {
                    let operation_id = ctx.operation_id().map(str::to_string);
                    let fut: BoxFuture<'static, Response> = Box::pin(async move {
                        let (parts, body) = req.into_parts();
                        let body = match body.collect().await {
                            Ok(collected) => collected.to_bytes(),
                            Err(_) => return Response::status_only(StatusCode::BAD_REQUEST),
                        };
                        handler(TestRequest {
                            method: parts.method,
                            uri: parts.uri,
                            headers: parts.headers,
                            body,
                            operation_id,
                        })
                        .await
                    });
                    fut
                },
            )
            .await;

        TestResponse::from_http(response).await
    }
}

/// Builds a JSON response for use in handlers.
pub fn json_response(status: StatusCode, value: &serde_json::Value) -> Response {
    raw_response(status, "application/json", value.to_string())
}

/// Builds a response with an explicit content type and body.
pub fn raw_response(
    status: StatusCode,
    content_type: &'static str,
    body: impl Into<bytes::Bytes>,
) -> Response {
    let mut response = http::Response::new(full(body));
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// A request builder bound to a test client.
pub struct TestClientRequest<'a> {
    client: &'a TestClient,
    builder: TestRequestBuilder,
}

impl<'a> TestClientRequest<'a> {
    fn new(client: &'a TestClient, mut builder: TestRequestBuilder) -> Self {
        for (name, value) in &client.default_headers {
            builder = builder.header(name, value);
        }
        Self { client, builder }
    }

    /// Sets a header on the request.
    pub fn header(mut self, name: impl AsRef<str>, value: impl AsRef<str>) -> Self {
        self.builder = self.builder.header(name, value);
        self
    }

    /// Sets the Content-Type header.
    pub fn content_type(mut self, content_type: impl AsRef<str>) -> Self {
        self.builder = self.builder.content_type(content_type);
        self
    }

    /// Sets the Authorization header with a Bearer token.
    pub fn bearer_token(mut self, token: impl AsRef<str>) -> Self {
        self.builder = self.builder.bearer_token(token);
        self
    }

    /// Appends query parameters.
    pub fn query<T: serde::Serialize>(mut self, params: &T) -> Self {
        self.builder = self.builder.query(params);
        self
    }

    /// Sets the raw request body.
    pub fn body(mut self, body: impl Into<bytes::Bytes>) -> Self {
        self.builder = self.builder.body(body);
        self
    }

    /// Sets the request body as JSON.
    pub fn json<T: serde::Serialize>(mut self, value: &T) -> Self {
        self.builder = self.builder.json(value);
        self
    }

    /// Sends the request.
    ///
    /// # Panics
    ///
    /// Panics if the request could not be built or the body could not be
    /// read. Use [`try_send`](Self::try_send) to get the error instead.
    pub async fn send(self) -> TestResponse {
        match self.try_send().await {
            Ok(response) => response,
            Err(e) => panic!("test request failed: {e}"),
        }
    }

    /// Sends the request and returns a Result.
    pub async fn try_send(self) -> Result<TestResponse, TestError> {
        let request = self.builder.build()?;
        self.client.send_request(request).await
    }
}
