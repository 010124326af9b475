//! Validated identifiers for methods and tools.

use std::borrow::Borrow;
use std::fmt::{self, Display, Formatter};

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

const MAX_METHOD_NAME_LEN: usize = 128;
const MAX_TOOL_NAME_LEN: usize = 96;
const MIN_METHOD_SEGMENTS: usize = 3;

/// Dotted method identifier of the form `domain.subdomain.capability_verb`.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct MethodName(String);

impl MethodName {
    /// Creates a method name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the name is empty, too long, has fewer
    /// than three dotted segments, or contains unsupported characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_method_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the method name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Identifier of an agent-invocable tool. Tools live in their own namespace.
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ToolName(String);

impl ToolName {
    /// Creates a tool name after validating its format.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidName`] if the name is empty, too long, or
    /// contains unsupported characters.
    pub fn new(name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        validate_tool_name(&name)?;
        Ok(Self(name))
    }

    /// Returns the tool name as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

macro_rules! name_conversions {
    ($ty:ident) => {
        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl AsRef<str> for $ty {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl Borrow<str> for $ty {
            fn borrow(&self) -> &str {
                &self.0
            }
        }

        impl From<$ty> for String {
            fn from(value: $ty) -> Self {
                value.0
            }
        }

        impl TryFrom<String> for $ty {
            type Error = Error;

            fn try_from(value: String) -> Result<Self> {
                Self::new(value)
            }
        }

        impl TryFrom<&str> for $ty {
            type Error = Error;

            fn try_from(value: &str) -> Result<Self> {
                Self::new(value)
            }
        }
    };
}

name_conversions!(MethodName);
name_conversions!(ToolName);

fn invalid(name: &str, reason: impl Into<String>) -> Error {
    Error::InvalidName {
        name: name.into(),
        reason: reason.into(),
    }
}

fn validate_method_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "method name cannot be empty"));
    }

    if name.len() > MAX_METHOD_NAME_LEN {
        return Err(invalid(
            name,
            format!("method name length must be <= {MAX_METHOD_NAME_LEN}"),
        ));
    }

    let segments: Vec<&str> = name.split('.').collect();
    if segments.len() < MIN_METHOD_SEGMENTS {
        return Err(invalid(
            name,
            "method name must look like `domain.subdomain.capability_verb`",
        ));
    }

    for segment in segments {
        if segment.is_empty() {
            return Err(invalid(name, "method name segments cannot be empty"));
        }
        if !segment
            .chars()
            .all(|c| matches!(c, 'a'..='z' | '0'..='9' | '_'))
        {
            return Err(invalid(
                name,
                "method name segments must contain lowercase alphanumeric or underscore",
            ));
        }
    }

    Ok(())
}

fn validate_tool_name(name: &str) -> Result<()> {
    if name.is_empty() {
        return Err(invalid(name, "tool name cannot be empty"));
    }

    if name.len() > MAX_TOOL_NAME_LEN {
        return Err(invalid(
            name,
            format!("tool name length must be <= {MAX_TOOL_NAME_LEN}"),
        ));
    }

    if !name
        .chars()
        .all(|c| matches!(c, 'a'..='z' | 'A'..='Z' | '0'..='9' | '-' | '_' | '.'))
    {
        return Err(invalid(
            name,
            "tool name must contain alphanumeric, dash, underscore, or dot",
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn method_name_requires_three_segments() {
        assert!(MethodName::new("workspace.casefile.create_casefile").is_ok());

        let err = MethodName::new("casefile.create").expect_err("two segments");
        assert!(matches!(err, Error::InvalidName { .. }));

        let err = MethodName::new("workspace..create").expect_err("empty segment");
        assert!(matches!(err, Error::InvalidName { .. }));

        let err = MethodName::new("Workspace.casefile.create").expect_err("uppercase");
        assert!(matches!(err, Error::InvalidName { .. }));
    }

    #[test]
    fn tool_name_rejects_whitespace() {
        assert!(ToolName::new("create_casefile").is_ok());
        assert!(ToolName::new("").is_err());
        assert!(ToolName::new("create casefile").is_err());
    }

    #[test]
    fn names_deserialize_through_validation() {
        let ok: MethodName = serde_json::from_str("\"workspace.gmail.list_messages\"").unwrap();
        assert_eq!(ok.as_str(), "workspace.gmail.list_messages");

        let err = serde_json::from_str::<MethodName>("\"nope\"");
        assert!(err.is_err());
    }
}
