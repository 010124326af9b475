//! Request identifier types.

use std::fmt::{self, Display, Formatter};
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{Error, Result};

/// Opaque token identifying a single dispatched request.
///
/// Callers may supply any non-blank string; the hub echoes it unchanged.
/// Requests without one get a random UUID.
#[derive(Clone, Debug, Eq, Hash, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RequestId(String);

impl RequestId {
    /// Wraps a caller-supplied token.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidRequestId`] when the token is blank.
    pub fn new(value: impl Into<String>) -> Result<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            return Err(Error::InvalidRequestId { value });
        }
        Ok(Self(value))
    }

    /// Generates a random UUID v4 identifier.
    #[must_use]
    pub fn random() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::random()
    }
}

impl Display for RequestId {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<Uuid> for RequestId {
    fn from(value: Uuid) -> Self {
        Self(value.to_string())
    }
}

impl TryFrom<String> for RequestId {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::new(value)
    }
}

impl From<RequestId> for String {
    fn from(value: RequestId) -> Self {
        value.0
    }
}

impl FromStr for RequestId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn random_ids_are_uuids() {
        let id = RequestId::random();
        assert!(Uuid::parse_str(id.as_str()).is_ok());
        assert_ne!(id, RequestId::random());
    }

    #[test]
    fn caller_tokens_round_trip_unchanged() {
        let id: RequestId = serde_json::from_str("\"req-123\"").expect("deserialize");
        assert_eq!(id.as_str(), "req-123");
        assert_eq!(serde_json::to_string(&id).expect("serialize"), "\"req-123\"");
        assert_eq!("req-123".parse::<RequestId>().expect("parse"), id);
    }

    #[test]
    fn rejects_blank_tokens() {
        let err = "  ".parse::<RequestId>().expect_err("should fail");
        assert!(matches!(err, Error::InvalidRequestId { .. }));
        assert!(serde_json::from_str::<RequestId>("\"\"").is_err());
    }
}
