//! Contract enforcement.
//!
//! [`ContractValidationMiddleware`] is the single entry point per request:
//!
//! ```text
//! resolve ──fail──▶ decode ──▶ {"error": title}
//!    │
//! buffer body ──▶ request gate ──fail──▶ decode ──▶ {"error": title}
//!    │
//! handler ──▶ CapturingBody ──(after last byte)──▶ response gate ──fail──▶ sink
//! ```
//!
//! Requests that break the contract never reach the handler (unless the
//! policy is [`FailurePolicy::Ignore`]). Responses that break it are reported,
//! never altered.

use crate::capture::{self, CapturedResponse, CapturingBody};
use crate::context::{MiddlewareContext, RequestId};
use crate::middleware::{BoxFuture, Middleware, Next};
use crate::policy::FailurePolicy;
use crate::report::{ContractViolation, SharedSink, TracingSink, ViolationSink};
use crate::types::{full, Request, Response, ResponseExt};
use bytes::Bytes;
use http::StatusCode;
use http_body_util::BodyExt;
use pylon_contract::{
    decode_or_internal, Contract, RequestValidationInput, RequestValidator,
    ResponseValidationInput, ResponseValidator, ValidationConfig, ValidationError,
};
use pylon_telemetry::metrics::{
    record_request_rejection, record_validation_panic,
};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::{debug, error, warn};

/// Status used when the client went away or its body could not be read.
pub const CLIENT_CLOSED_REQUEST: u16 = 499;

/// Validates requests and responses against a [`Contract`].
#[derive(Clone)]
pub struct ContractValidationMiddleware {
    contract: Arc<Contract>,
    config: ValidationConfig,
    policy: FailurePolicy,
    sink: SharedSink,
    request_validator: RequestValidator,
    response_validator: ResponseValidator,
}

impl std::fmt::Debug for ContractValidationMiddleware {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContractValidationMiddleware")
            .field("contract", &self.contract.info().title)
            .field("config", &self.config)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ContractValidationMiddleware {
    /// Enforces `contract` with the default configuration, policy and sink.
    #[must_use]
    pub fn new(contract: Arc<Contract>) -> Self {
        let config = ValidationConfig::default();
        Self {
            contract,
            request_validator: RequestValidator::new(&config),
            response_validator: ResponseValidator::new(),
            config,
            policy: FailurePolicy::default(),
            sink: Arc::new(TracingSink),
        }
    }

    /// Sets which checks run.
    #[must_use]
    pub fn with_config(mut self, config: ValidationConfig) -> Self {
        self.request_validator = RequestValidator::new(&config);
        self.config = config;
        self
    }

    /// Sets the failure policy.
    #[must_use]
    pub fn with_policy(mut self, policy: FailurePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets where response violations go.
    #[must_use]
    pub fn with_sink(mut self, sink: impl ViolationSink) -> Self {
        self.sink = Arc::new(sink);
        self
    }

    /// Sets a shared violation sink.
    #[must_use]
    pub fn with_shared_sink(mut self, sink: SharedSink) -> Self {
        self.sink = sink;
        self
    }

    /// The enforced contract.
    #[must_use]
    pub fn contract(&self) -> &Arc<Contract> {
        &self.contract
    }

    /// The active configuration.
    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// The active failure policy.
    #[must_use]
    pub fn policy(&self) -> FailurePolicy {
        self.policy
    }

    fn reject(&self, ctx: &MiddlewareContext, err: &ValidationError) -> Response {
        let decoded = decode_or_internal(err);
        warn!(
            request_id = %ctx.request_id(),
            operation_id = ctx.operation_id().unwrap_or_default(),
            status = decoded.status(),
            cause = %err,
            "request rejected"
        );
        record_request_rejection(decoded.status());

        let status =
            StatusCode::from_u16(decoded.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        Response::json_error(status, decoded.to_json())
    }

    /// Runs the request gate; a panic inside it counts as unrecognized.
    fn check_request(
        &self,
        input: &RequestValidationInput,
        body: &[u8],
    ) -> Result<(), ValidationError> {
        catch_unwind(AssertUnwindSafe(|| self.request_validator.validate(input, body)))
            .unwrap_or_else(|_| {
                record_validation_panic("request");
                Err(ValidationError::Unrecognized(
                    "request validation panicked".to_string(),
                ))
            })
    }

    fn response_gate(&self, input: RequestValidationInput, request_id: RequestId) -> ResponseGate {
        ResponseGate {
            validator: self.response_validator,
            policy: self.policy,
            sink: Arc::clone(&self.sink),
            input,
            request_id,
        }
    }
}

impl Middleware for ContractValidationMiddleware {
    fn name(&self) -> &'static str {
        "contract_validation"
    }

    fn process<'a>(
        &'a self,
        ctx: &'a mut MiddlewareContext,
        request: Request,
        next: Next<'a>,
    ) -> BoxFuture<'a, Response> {
        Box::pin(async move {
            let route = match self.contract.resolve(request.method(), request.uri().path()) {
                Ok(route) => route,
                Err(err) if self.policy == FailurePolicy::Ignore => {
                    warn!(
                        request_id = %ctx.request_id(),
                        cause = %err,
                        "request does not match the contract; passing through"
                    );
                    return next.run(ctx, request).await;
                }
                Err(err) => return self.reject(ctx, &err),
            };
            ctx.set_operation_id(route.operation.id().to_string());
            debug!(
                request_id = %ctx.request_id(),
                operation_id = route.operation.id(),
                "request resolved"
            );

            let request_id = ctx.request_id();
            let cancel = ctx.cancellation().clone();
            let (parts, body) = request.into_parts();
            let input = RequestValidationInput::new(route, &parts);

            let body = if self.config.validate_requests {
                let bytes: Bytes = tokio::select! {
                    biased;
                    () = cancel.cancelled() => {
                        debug!(%request_id, "request cancelled while reading body");
                        return client_closed();
                    }
                    collected = body.collect() => match collected {
                        Ok(collected) => collected.to_bytes(),
                        Err(err) => {
                            debug!(%request_id, error = %err, "failed to read request body");
                            return client_closed();
                        }
                    },
                };

                if let Err(err) = self.check_request(&input, &bytes) {
                    match self.policy {
                        FailurePolicy::Ignore => warn!(
                            %request_id,
                            operation_id = input.operation_id(),
                            cause = %err,
                            "request does not conform to contract; passing through"
                        ),
                        FailurePolicy::RejectClient => return self.reject(ctx, &err),
                        FailurePolicy::AssertFatal => self.policy.assert_request(&err),
                    }
                }
                full(bytes)
            } else {
                body
            };

            let request = Request::from_parts(parts, body);
            let response = tokio::select! {
                biased;
                () = cancel.cancelled() => {
                    debug!(%request_id, "request cancelled while handler was running");
                    return client_closed();
                }
                response = next.run(ctx, request) => response,
            };

            if !self.config.validate_responses {
                return response;
            }

            let gate = self.response_gate(input, request_id);
            let (parts, body) = response.into_parts();
            let mut body = CapturingBody::new(
                body,
                parts.status,
                parts.headers.clone(),
                self.config.max_capture_bytes,
                Box::new(move |captured| gate.run(&captured)),
            );
            capture::complete_if_finished(&mut body);

            Response::from_parts(parts, body.boxed())
        })
    }
}

fn client_closed() -> Response {
    Response::status_only(
        StatusCode::from_u16(CLIENT_CLOSED_REQUEST).unwrap_or(StatusCode::BAD_REQUEST),
    )
}

/// Everything the response gate needs once the body has been forwarded.
struct ResponseGate {
    validator: ResponseValidator,
    policy: FailurePolicy,
    sink: SharedSink,
    input: RequestValidationInput,
    request_id: RequestId,
}

impl ResponseGate {
    fn run(&self, captured: &CapturedResponse) {
        let observed = ResponseValidationInput {
            status: captured.status.as_u16(),
            headers: &captured.headers,
            body: captured.body(),
            truncated: captured.truncated,
        };

        let outcome = catch_unwind(AssertUnwindSafe(|| {
            self.validator.validate(&self.input, &observed)
        }));

        if captured.truncated {
            warn!(
                request_id = %self.request_id,
                operation_id = self.input.operation_id(),
                status = observed.status,
                "response body exceeded capture limit"
            );
        }

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                // Raised here, outside the unwind boundary, so a test
                // harness polling the body sees it.
                self.policy.assert_response(&err);
                self.sink.report(ContractViolation {
                    operation_id: self.input.operation_id().to_string(),
                    status: observed.status,
                    cause: err.to_string(),
                    request_id: self.request_id,
                });
            }
            Err(_) => {
                error!(
                    request_id = %self.request_id,
                    operation_id = self.input.operation_id(),
                    status = observed.status,
                    "response validation panicked"
                );
                record_validation_panic("response");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::RecordingSink;
    use crate::types::empty;
    use parking_lot::Mutex;

    const DOC: &str = r#"
openapi: "3.0.3"
info:
  title: Items
  version: "1.0"
paths:
  /items/{id}:
    get:
      operationId: getItem
      parameters:
        - name: id
          in: path
          required: true
          schema:
            type: string
            format: uuid
      responses:
        "200":
          description: ok
          content:
            application/json:
              schema:
                type: object
                required: [id]
                properties:
                  id:
                    type: string
"#;

    const ID: &str = "2f1d1b6e-59a4-4b1c-9d5a-0c9a3b6c1e2f";

    fn middleware(sink: &RecordingSink) -> ContractValidationMiddleware {
        let contract = Contract::from_slice(DOC.as_bytes()).unwrap();
        ContractValidationMiddleware::new(Arc::new(contract)).with_sink(sink.clone())
    }

    fn get(path: &str) -> Request {
        http::Request::builder().uri(path).body(empty()).unwrap()
    }

    fn json_handler<'a>(body: &'static str, calls: Arc<Mutex<u32>>) -> Next<'a> {
        Next::handler(move |_ctx, _req| {
            *calls.lock() += 1;
            Box::pin(async move {
                http::Response::builder()
                    .header(http::header::CONTENT_TYPE, "application/json")
                    .body(full(body))
                    .unwrap()
            })
        })
    }

    async fn body_of(response: Response) -> Bytes {
        response.into_body().collect().await.unwrap().to_bytes()
    }

    #[tokio::test]
    async fn test_valid_exchange_passes_through() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();

        let response = mw
            .process(
                &mut ctx,
                get(&format!("/items/{ID}")),
                json_handler(r#"{"id":"x"}"#, Arc::clone(&calls)),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_of(response).await[..], br#"{"id":"x"}"#);
        assert_eq!(*calls.lock(), 1);
        assert_eq!(ctx.operation_id(), Some("getItem"));
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_invalid_parameter_is_rejected_before_handler() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();

        let response = mw
            .process(
                &mut ctx,
                get("/items/not-a-uuid"),
                json_handler(r#"{"id":"x"}"#, Arc::clone(&calls)),
            )
            .await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body: serde_json::Value = serde_json::from_slice(&body_of(response).await).unwrap();
        assert!(body["error"]
            .as_str()
            .unwrap()
            .starts_with("parameter \"id\" in path has an error"));
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_unknown_route_is_404() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();

        let response = mw
            .process(&mut ctx, get("/nope"), json_handler("{}", Arc::clone(&calls)))
            .await;

        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            &body_of(response).await[..],
            br#"{"error":"no matching operation was found"}"#
        );
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_response_violation_is_reported_not_altered() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();

        let response = mw
            .process(
                &mut ctx,
                get(&format!("/items/{ID}")),
                json_handler(r#"{"id":123}"#, Arc::clone(&calls)),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(&body_of(response).await[..], br#"{"id":123}"#);

        let violations = sink.violations();
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].operation_id, "getItem");
        assert_eq!(violations[0].status, 200);
        assert_eq!(violations[0].request_id, ctx.request_id());
    }

    #[tokio::test]
    async fn test_ignore_policy_lets_invalid_request_through() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink).with_policy(FailurePolicy::Ignore);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();

        let response = mw
            .process(
                &mut ctx,
                get("/items/not-a-uuid"),
                json_handler(r#"{"id":"x"}"#, Arc::clone(&calls)),
            )
            .await;

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(*calls.lock(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_request_is_499_without_handler() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();
        ctx.cancellation().cancel();

        let response = mw
            .process(
                &mut ctx,
                get(&format!("/items/{ID}")),
                json_handler(r#"{"id":"x"}"#, Arc::clone(&calls)),
            )
            .await;

        assert_eq!(response.status().as_u16(), CLIENT_CLOSED_REQUEST);
        assert!(body_of(response).await.is_empty());
        assert_eq!(*calls.lock(), 0);
    }

    #[tokio::test]
    async fn test_cancelled_while_handler_runs_is_499() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink);
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();
        let token = ctx.cancellation().clone();

        let started = Arc::clone(&calls);
        let handler = Next::handler(move |_ctx, _req| {
            *started.lock() += 1;
            Box::pin(std::future::pending::<Response>())
        });

        let cancel_once_started = async {
            while *calls.lock() == 0 {
                tokio::task::yield_now().await;
            }
            token.cancel();
        };

        let (response, ()) = tokio::join!(
            mw.process(&mut ctx, get(&format!("/items/{ID}")), handler),
            cancel_once_started
        );

        assert_eq!(response.status().as_u16(), CLIENT_CLOSED_REQUEST);
        assert!(body_of(response).await.is_empty());
        assert_eq!(*calls.lock(), 1);
        assert!(sink.is_empty());
    }

    #[tokio::test]
    async fn test_response_validation_can_be_disabled() {
        let sink = RecordingSink::new();
        let mw = middleware(&sink).with_config(ValidationConfig::request_only());
        let calls = Arc::new(Mutex::new(0));
        let mut ctx = MiddlewareContext::new();

        let response = mw
            .process(
                &mut ctx,
                get(&format!("/items/{ID}")),
                json_handler(r#"{"id":123}"#, Arc::clone(&calls)),
            )
            .await;

        assert_eq!(&body_of(response).await[..], br#"{"id":123}"#);
        assert!(sink.is_empty());
    }
}
