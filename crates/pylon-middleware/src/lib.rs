//! # Pylon Middleware
//!
//! Contract enforcement as a middleware chain over `http::Request` and
//! `http::Response`.
//!
//! ```text
//! Request → RequestId → ContractValidation ──────────▶ Handler
//!                             │ resolve / request gate     │
//!                             ▼                            ▼
//!                      {"error": title}      CapturingBody → response gate → ViolationSink
//! ```
//!
//! | Module       | Purpose                                              |
//! |--------------|------------------------------------------------------|
//! | [`stages`]   | Request id propagation and contract validation       |
//! | [`capture`]  | Forward-and-capture response body wrapper            |
//! | [`report`]   | Violation events and sinks                           |
//! | [`policy`]   | Ignore / reject / assert on failures                 |
//! | [`pipeline`] | Ordered chain of stages in front of a handler        |
//!
//! ## Example
//!
//! ```
//! use pylon_middleware::{FailurePolicy, Pipeline, RequestIdMiddleware};
//!
//! let pipeline = Pipeline::builder().stage(RequestIdMiddleware::new()).build();
//! assert_eq!(pipeline.stage_names(), vec!["request_id"]);
//! assert_eq!(FailurePolicy::default(), FailurePolicy::RejectClient);
//! ```

#![warn(missing_docs)]
#![forbid(unsafe_code)]

pub mod capture;
pub mod context;
pub mod middleware;
pub mod pipeline;
pub mod policy;
pub mod report;
pub mod stages;
pub mod types;

pub use capture::{CapturedResponse, CapturingBody};
pub use context::{MiddlewareContext, RequestId};
pub use middleware::{BoxFuture, Middleware, Next};
pub use pipeline::{Pipeline, PipelineBuilder};
pub use policy::FailurePolicy;
pub use report::{ContractViolation, RecordingSink, TracingSink, ViolationSink};
pub use stages::{ContractValidationMiddleware, RequestIdMiddleware};
pub use types::{BoxBody, BoxError, Request, Response, ResponseExt};
