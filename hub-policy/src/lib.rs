//! Policy evaluation for method dispatch.
//!
//! Methods declare what they need (authentication, a resource context,
//! permissions, a timeout). The [`DeclaredPolicyEngine`] checks those
//! declarations against the caller; additional engines can layer their own
//! rules on top without the hub knowing how the decision is made.

#![warn(missing_docs, clippy::pedantic)]

pub mod context;
pub mod contracts;
pub mod decision;
pub mod engine;

pub use context::CallerContext;
pub use contracts::{DEFAULT_TIMEOUT, MethodPolicy, PolicyRequest};
pub use decision::{DecisionKind, PolicyDecision};
pub use engine::{DeclaredPolicyEngine, PolicyEngine, PolicyError, PolicyResult};
