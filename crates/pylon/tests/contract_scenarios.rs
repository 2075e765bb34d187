//! Contract scenarios driven end to end through the facade.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use http::StatusCode;
use pylon::{build, ContractValidationMiddleware, FailurePolicy, Options};
use pylon_test::{json_response, raw_response, RecordingSink, TestClient};
use serde_json::json;

const ITEMS: &str = r#"
openapi: 3.0.3
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
          description: the item
          content:
            application/json:
              schema:
                type: object
                required: [id]
                properties:
                  id:
                    type: string
"#;

const ITEM_ID: &str = "3f1c0a9e-8d2b-4c7a-b1e5-6a9f2d4c8b70";

struct Harness {
    client: TestClient,
    calls: Arc<AtomicUsize>,
    sink: RecordingSink,
}

fn stage(options: Options, sink: &RecordingSink) -> ContractValidationMiddleware {
    build(ITEMS.as_bytes(), options)
        .expect("items contract loads")
        .with_sink(sink.clone())
}

fn harness(options: Options, reply: &'static str) -> Harness {
    let sink = RecordingSink::new();
    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);

    let client = TestClient::for_middleware(stage(options, &sink), move |_req| {
        counter.fetch_add(1, Ordering::SeqCst);
        async move { raw_response(StatusCode::OK, "application/json", reply) }
    })
    .with_sink(sink.clone());

    Harness {
        client,
        calls,
        sink,
    }
}

#[tokio::test]
async fn test_invalid_uuid_is_rejected_before_handler() {
    let h = harness(Options::default(), r#"{"id":"x"}"#);

    let response = h.client.get("/items/not-a-uuid").send().await;

    assert!(response.is_client_error());
    let cause = response.error_message().expect("rejection body");
    assert!(
        cause.starts_with("parameter \"id\" in path has an error"),
        "unexpected cause: {cause}"
    );
    assert_eq!(response.json_value().unwrap(), json!({ "error": cause }));
    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn test_valid_request_and_response_pass_through_silently() {
    let reply = r#"{"id":"3f1c0a9e-8d2b-4c7a-b1e5-6a9f2d4c8b70"}"#;
    let h = harness(Options::default(), reply);

    let response = h.client.get(format!("/items/{ITEM_ID}")).send().await;

    response
        .assert_status(StatusCode::OK)
        .assert_body_bytes(reply);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn test_type_mismatch_in_response_is_reported_not_altered() {
    let h = harness(Options::default(), r#"{"id": 123}"#);

    let response = h.client.get(format!("/items/{ITEM_ID}")).send().await;

    response
        .assert_status(StatusCode::OK)
        .assert_body_bytes(r#"{"id": 123}"#);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);

    let violations = h.sink.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(violations[0].operation_id, "getItem");
    assert_eq!(violations[0].status, 200);
    assert!(
        violations[0]
            .cause
            .starts_with("response body doesn't match schema"),
        "unexpected cause: {}",
        violations[0].cause
    );
    assert_eq!(
        response.header_str("x-request-id"),
        Some(violations[0].request_id.to_string().as_str())
    );
}

#[tokio::test]
async fn test_unknown_path_and_method() {
    let h = harness(Options::default(), "{}");

    h.client
        .get("/widgets")
        .send()
        .await
        .assert_rejected(StatusCode::NOT_FOUND, "no matching operation was found");
    h.client
        .delete(format!("/items/{ITEM_ID}"))
        .send()
        .await
        .assert_rejected(StatusCode::METHOD_NOT_ALLOWED, "method not allowed");

    assert_eq!(h.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_ignore_policy_lets_invalid_request_through() {
    let h = harness(
        Options::default().with_policy(FailurePolicy::Ignore),
        r#"{"id":"x"}"#,
    );

    let response = h.client.get("/items/not-a-uuid").send().await;

    response.assert_status(StatusCode::OK);
    assert_eq!(h.calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
#[should_panic(expected = "could not validate response")]
async fn test_strict_mode_panics_on_bad_response() {
    let h = harness(Options::default().strict(), r#"{"id": 123}"#);
    h.client.get(format!("/items/{ITEM_ID}")).send().await;
}

#[tokio::test]
async fn test_loading_twice_behaves_the_same() {
    let first = harness(Options::default(), r#"{"id": 123}"#);
    let second = harness(Options::default(), r#"{"id": 123}"#);

    for path in ["/items/not-a-uuid".to_string(), format!("/items/{ITEM_ID}")] {
        let a = first.client.get(&path).send().await;
        let b = second.client.get(&path).send().await;
        assert_eq!(a.status(), b.status());
        assert_eq!(a.body(), b.body());
    }

    let a = first.sink.violations();
    let b = second.sink.violations();
    assert_eq!(a.len(), b.len());
    assert_eq!(a[0].cause, b[0].cause);
}

#[tokio::test]
async fn test_response_validation_can_be_disabled() {
    let options = Options {
        validate_responses: false,
        ..Options::default()
    };
    let h = harness(options, r#"{"id": 123}"#);

    h.client
        .get(format!("/items/{ITEM_ID}"))
        .send()
        .await
        .assert_status(StatusCode::OK);
    assert!(h.sink.is_empty());
}

#[tokio::test]
async fn test_handler_error_status_is_undeclared() {
    let sink = RecordingSink::new();
    let client = TestClient::for_middleware(stage(Options::default(), &sink), |_req| async {
        json_response(StatusCode::INTERNAL_SERVER_ERROR, &json!({"oops": true}))
    });

    client
        .get(format!("/items/{ITEM_ID}"))
        .send()
        .await
        .assert_status(StatusCode::INTERNAL_SERVER_ERROR)
        .assert_json_eq(&json!({"oops": true}));

    let violations = sink.violations();
    assert_eq!(violations.len(), 1);
    assert_eq!(
        violations[0].cause,
        "status code 500 is not declared for this operation"
    );
}
