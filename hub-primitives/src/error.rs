//! Shared error definitions for hub primitives.

use thiserror::Error;

/// Result alias used throughout the hub primitives.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while constructing primitive hub types.
#[derive(Debug, Error)]
pub enum Error {
    /// The provided request identifier is blank.
    #[error("invalid request id `{value}`: request id cannot be blank")]
    InvalidRequestId {
        /// The rejected token.
        value: String,
    },

    /// Method or tool name failed validation.
    #[error("invalid name `{name}`: {reason}")]
    InvalidName {
        /// The offending name.
        name: String,
        /// Human-readable reason for rejection.
        reason: String,
    },

    /// Contract definition failed validation.
    #[error("invalid contract `{contract}`: {reason}")]
    InvalidContract {
        /// Name of the contract being built.
        contract: String,
        /// Human-readable reason for rejection.
        reason: String,
    },
}
