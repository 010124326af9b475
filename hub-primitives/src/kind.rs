//! Failure taxonomy shared by validation reports and response envelopes.

use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

/// Machine-readable category of a registry, validation, or dispatch failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// A method or tool name did not resolve.
    #[serde(rename = "NotFoundError")]
    NotFound,
    /// A strict re-registration collided with an existing entry.
    #[serde(rename = "DuplicateNameError")]
    DuplicateName,
    /// A tool (or declaration) references a method that is not registered.
    #[serde(rename = "MissingMethodError")]
    MissingMethod,
    /// A declared parameter disagrees with the inherited one.
    #[serde(rename = "ParameterDriftError")]
    ParameterDrift,
    /// A classification override disagrees with the method classification.
    #[serde(rename = "ClassificationDriftWarning")]
    ClassificationDrift,
    /// An enabled method is not reachable through any valid tool.
    #[serde(rename = "OrphanedMethodWarning")]
    OrphanedMethod,
    /// Caller context does not satisfy the method policy.
    #[serde(rename = "PolicyViolationError")]
    PolicyViolation,
    /// Payload does not satisfy the request contract.
    #[serde(rename = "ValidationError")]
    Validation,
    /// Implementation exceeded its declared timeout.
    #[serde(rename = "TimeoutError")]
    Timeout,
    /// Implementation returned an error or panicked.
    #[serde(rename = "ExecutionError")]
    Execution,
}

impl ErrorKind {
    /// Returns the wire name used in reports and envelopes.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NotFound => "NotFoundError",
            Self::DuplicateName => "DuplicateNameError",
            Self::MissingMethod => "MissingMethodError",
            Self::ParameterDrift => "ParameterDriftError",
            Self::ClassificationDrift => "ClassificationDriftWarning",
            Self::OrphanedMethod => "OrphanedMethodWarning",
            Self::PolicyViolation => "PolicyViolationError",
            Self::Validation => "ValidationError",
            Self::Timeout => "TimeoutError",
            Self::Execution => "ExecutionError",
        }
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
