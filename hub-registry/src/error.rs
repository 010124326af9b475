//! Errors produced by registration, lookup, and method execution.

use std::fmt::{self, Display, Formatter};

use hub_policy::PolicyError;
use hub_primitives::ErrorKind;
use thiserror::Error;

/// Result alias for registry operations.
pub type RegistryResult<T> = Result<T, RegistryError>;

/// Which table an entry lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    /// Method registry.
    Method,
    /// Tool registry.
    Tool,
}

impl Display for EntryKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method => f.write_str("method"),
            Self::Tool => f.write_str("tool"),
        }
    }
}

/// Errors produced by method and tool registration.
#[derive(Debug, Error)]
pub enum RegistryError {
    /// Requested entry does not exist.
    #[error("{kind} `{name}` is not registered")]
    NotFound {
        /// Table that was searched.
        kind: EntryKind,
        /// Name of the missing entry.
        name: String,
    },

    /// Strict mode refused to replace an existing entry.
    #[error("{kind} `{name}` is already registered and strict mode forbids replacing it")]
    DuplicateName {
        /// Table the collision happened in.
        kind: EntryKind,
        /// Name of the offending entry.
        name: String,
    },

    /// Tool references a method that is not registered.
    #[error("tool `{tool}` references unknown method `{method}`")]
    UnknownMethod {
        /// Tool name.
        tool: String,
        /// Dangling method name.
        method: String,
    },

    /// Method implementation could not be resolved.
    #[error("method `{method}` has no resolvable implementation: {reason}")]
    UnresolvedImplementation {
        /// Method name.
        method: String,
        /// Human-readable reason.
        reason: String,
    },

    /// Definition failed validation.
    #[error("invalid definition: {reason}")]
    InvalidDefinition {
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Name or contract failed primitive validation.
    #[error(transparent)]
    Primitive(#[from] hub_primitives::Error),

    /// Method policy failed validation.
    #[error(transparent)]
    Policy(#[from] PolicyError),
}

impl RegistryError {
    /// Creates an invalid-definition error from the supplied reason.
    #[must_use]
    pub fn invalid(reason: impl Into<String>) -> Self {
        Self::InvalidDefinition {
            reason: reason.into(),
        }
    }

    /// Maps the error onto the shared failure taxonomy.
    #[must_use]
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateName { .. } => ErrorKind::DuplicateName,
            Self::UnknownMethod { .. } => ErrorKind::MissingMethod,
            Self::UnresolvedImplementation { .. }
            | Self::InvalidDefinition { .. }
            | Self::Primitive(_)
            | Self::Policy(_) => ErrorKind::Validation,
        }
    }
}

/// Result alias for method implementations.
pub type MethodResult<T> = Result<T, MethodError>;

/// Errors returned by method implementations.
#[derive(Debug, Error)]
pub enum MethodError {
    /// Implementation failed while doing its work.
    #[error("{reason}")]
    Execution {
        /// Human-readable error returned by the implementation.
        reason: String,
    },
    /// Implementation rejected a payload the contract accepted.
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// Human-readable reason.
        reason: String,
    },
}

impl MethodError {
    /// Creates an execution error from the supplied reason.
    #[must_use]
    pub fn execution(reason: impl Into<String>) -> Self {
        Self::Execution {
            reason: reason.into(),
        }
    }

    /// Creates an invalid-input error from the supplied reason.
    #[must_use]
    pub fn invalid_input(reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            reason: reason.into(),
        }
    }
}
