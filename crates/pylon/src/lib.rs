//! # Pylon
//!
//! OpenAPI contract enforcement as HTTP middleware.
//!
//! Pylon loads an OpenAPI 3.x document once and then, for every request:
//!
//! - resolves the request to a declared operation, or answers 404/405
//! - validates parameters, security and body before the handler runs
//! - streams the handler's response to the client while capturing it, and
//!   reports any contract violation once the body has been sent
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use pylon::prelude::*;
//!
//! let stage = pylon::build(include_bytes!("openapi.yaml"), Options::default())?;
//! let pipeline = Pipeline::builder()
//!     .stage(RequestIdMiddleware::new())
//!     .stage(stage)
//!     .build();
//!
//! // per request, from the host server
//! let response = pipeline.process(MiddlewareContext::new(), request, handler).await;
//! ```
//!
//! ## Architecture
//!
//! ```text
//! Request → RequestId → ContractValidation → Handler
//!                          │                    │
//!                          ▼                    ▼
//!                 {"error": title}     CapturingBody → response check → ViolationSink
//! ```
//!
//! | Crate              | Role                                              |
//! |--------------------|---------------------------------------------------|
//! | [`contract`]       | Document loading, route resolution, validators    |
//! | [`middleware`]     | Pipeline, contract stage, capture, sinks, policy  |
//! | [`config`]         | Typed configuration with file and env layering    |
//! | [`telemetry`]      | Logging subscriber and metrics recorder           |

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod build;
mod error;
mod options;

pub use build::{build, from_config, init_telemetry};
pub use error::BuildError;
pub use options::Options;

pub use pylon_config as config;
pub use pylon_contract as contract;
pub use pylon_middleware as middleware;
pub use pylon_telemetry as telemetry;

pub use pylon_middleware::{ContractValidationMiddleware, FailurePolicy};

/// Prelude module for convenient imports.
///
/// ```rust,ignore
/// use pylon::prelude::*;
/// ```
pub mod prelude {
    pub use crate::{build, from_config, BuildError, Options};

    pub use pylon_config::{ConfigLoader, PylonConfig};

    pub use pylon_contract::{Contract, ContractLoader, FormatRegistry, ValidationConfig};

    pub use pylon_middleware::{
        ContractValidationMiddleware, ContractViolation, FailurePolicy, Middleware,
        MiddlewareContext, Next, Pipeline, RecordingSink, Request, RequestIdMiddleware, Response,
        TracingSink, ViolationSink,
    };
}
