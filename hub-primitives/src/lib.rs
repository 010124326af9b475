//! Core shared types for the method and tool hub.
//!
//! Everything here is plain data: validated names, request identifiers, the
//! closed classification vocabulary, and the explicit payload contracts that
//! parameter extraction and payload binding operate on.

#![warn(missing_docs, clippy::pedantic)]

mod classification;
mod contract;
mod error;
mod ids;
mod kind;
mod names;
mod parameter;

/// Closed classification vocabulary attached to every method.
pub use classification::{
    Capability, Classification, ClassificationConflict, ClassificationOverride, Complexity,
    Domain, IntegrationTier, Maturity, Subdomain,
};
/// Explicit payload contracts and the binding results they produce.
pub use contract::{BoundPayload, Constraints, Contract, FieldSchema, FieldViolation, ParamType};
/// Error type and result alias shared across the hub.
pub use error::{Error, Result};
/// Unique identifier for a single dispatched request.
pub use ids::RequestId;
/// Machine-readable failure taxonomy.
pub use kind::ErrorKind;
/// Validated identifiers for methods and tools.
pub use names::{MethodName, ToolName};
/// Parameter descriptors derived from request contracts.
pub use parameter::ParameterDescriptor;
