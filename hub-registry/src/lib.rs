//! Registries for service methods and agent-invocable tools.
//!
//! Methods are registered in code with an explicit request contract and a
//! bound implementation. Tools reference exactly one method and inherit its
//! parameters; [`DriftValidator`] reconciles the two tables and produces a
//! [`ValidationReport`] instead of failing on the first problem.

#![warn(missing_docs, clippy::pedantic)]

pub mod error;
pub mod extract;
pub mod inheritance;
pub mod method;
pub mod report;
pub mod tool;
pub mod validation;

pub use error::{EntryKind, MethodError, MethodResult, RegistryError, RegistryResult};
pub use extract::{extract, extract_contract};
pub use inheritance::{
    EffectiveParameter, ParamShape, ParameterDrift, ParameterOrigin, ToolIssue, ToolResolution,
};
pub use method::{
    ImplementationCatalog, ImplementationRef, MethodBuilder, MethodDefinition, MethodFilter,
    MethodHandler, MethodInvocation, MethodListing, MethodRegistry, RegistrationOutcome,
    Visibility,
};
pub use report::{Category, Finding, Severity, Subject, SubjectKind, ValidationReport};
pub use tool::{DeclaredParameter, ToolDefinition, ToolRegistry, ToolRegistryConfig};
pub use validation::{DriftValidator, MethodDeclaration, ValidationMode, ValidationOptions};
