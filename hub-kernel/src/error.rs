//! Errors raised while building or driving the hub.
//!
//! Dispatch itself never returns these; failures inside a request become a
//! failed [`ResponseEnvelope`](crate::ResponseEnvelope).

use hub_registry::{RegistryError, ValidationReport};
use thiserror::Error;

/// Result alias for hub construction and detached dispatch.
pub type HubResult<T> = Result<T, HubError>;

/// Errors produced outside of a single request's outcome.
#[derive(Debug, Error)]
pub enum HubError {
    /// Strict startup validation found errors.
    #[error("startup validation failed with {} error(s)", .report.errors().count())]
    StartupRejected {
        /// Full report for operators.
        report: Box<ValidationReport>,
    },

    /// Registry rejected a definition.
    #[error(transparent)]
    Registry(#[from] RegistryError),

    /// Detached dispatch task stopped without producing a response.
    #[error("dispatch task failed: {reason}")]
    TaskFailed {
        /// Join error description.
        reason: String,
    },
}
