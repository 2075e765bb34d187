//! # Pylon Test
//!
//! In-memory testing for services guarded by Pylon. Requests go through a
//! real [`Pipeline`](pylon_middleware::Pipeline), contract stage included,
//! and responses are collected in full so response checks run before the
//! test looks at the result.
//!
//! ## Example
//!
//! ```ignore
//! use pylon_test::{json_response, TestClient};
//! use pylon_middleware::FailurePolicy;
//!
//! #[tokio::test]
//! async fn test_get_pet() {
//!     let client = TestClient::for_contract(contract, FailurePolicy::RejectClient, |_req| async {
//!         json_response(StatusCode::OK, &json!({"name": "Rex"}))
//!     });
//!
//!     client.get("/pets/7").send().await.assert_status(StatusCode::OK);
//!     assert!(client.violations().is_empty());
//! }
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod client;
mod error;
mod request;
mod response;

pub use client::{json_response, raw_response, TestClient, TestClientRequest, TestHandler};
pub use error::TestError;
pub use pylon_middleware::{ContractViolation, RecordingSink};
pub use request::{TestRequest, TestRequestBuilder};
pub use response::TestResponse;
