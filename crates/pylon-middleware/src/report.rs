//! Response violation reporting.
//!
//! A response that breaks the contract is never altered; it is reported. Each
//! failing response produces exactly one [`ContractViolation`], delivered to a
//! [`ViolationSink`]. [`TracingSink`] is the default and writes one
//! `tracing::error!` event plus a counter increment.

use crate::context::RequestId;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tracing::error;

/// One contract violation observed on a response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContractViolation {
    /// Operation the request resolved to.
    pub operation_id: String,
    /// Status the handler responded with.
    pub status: u16,
    /// Human-readable cause.
    pub cause: String,
    /// Request the response belongs to.
    pub request_id: RequestId,
}

/// Receives response violations.
///
/// Implementations must be cheap; they are called on the response path once
/// the last body byte has been forwarded.
pub trait ViolationSink: Send + Sync + 'static {
    /// Reports one violation.
    fn report(&self, violation: ContractViolation);
}

/// Shared sink handle.
pub type SharedSink = Arc<dyn ViolationSink>;

/// Logs violations at error level and counts them.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

impl ViolationSink for TracingSink {
    fn report(&self, violation: ContractViolation) {
        error!(
            operation_id = %violation.operation_id,
            status = violation.status,
            cause = %violation.cause,
            request_id = %violation.request_id,
            "response does not conform to contract"
        );
        pylon_telemetry::record_response_violation(&violation.operation_id);
    }
}

/// Keeps every violation in memory, for tests.
#[derive(Debug, Clone, Default)]
pub struct RecordingSink {
    seen: Arc<Mutex<Vec<ContractViolation>>>,
}

impl RecordingSink {
    /// Creates an empty sink.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a copy of everything reported so far.
    #[must_use]
    pub fn violations(&self) -> Vec<ContractViolation> {
        self.seen.lock().clone()
    }

    /// Number of violations reported so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.seen.lock().len()
    }

    /// Whether nothing has been reported.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.seen.lock().is_empty()
    }

    /// Forgets everything reported so far.
    pub fn clear(&self) {
        self.seen.lock().clear();
    }
}

impl ViolationSink for RecordingSink {
    fn report(&self, violation: ContractViolation) {
        self.seen.lock().push(violation);
    }
}
