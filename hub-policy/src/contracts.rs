//! Method policy declarations and the requests evaluated against them.

use std::collections::BTreeSet;
use std::time::Duration;

use hub_primitives::{MethodName, ToolName};
use serde::{Deserialize, Serialize};

use crate::context::CallerContext;
use crate::engine::{PolicyError, PolicyResult};

/// Timeout applied when a method does not declare one.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Execution policy declared by a method.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MethodPolicy {
    #[serde(default)]
    requires_auth: bool,
    #[serde(default)]
    requires_resource_context: bool,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    required_permissions: BTreeSet<String>,
    #[serde(default = "default_timeout", rename = "timeout_ms", with = "millis")]
    timeout: Duration,
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

impl Default for MethodPolicy {
    fn default() -> Self {
        Self {
            requires_auth: false,
            requires_resource_context: false,
            required_permissions: BTreeSet::new(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

impl MethodPolicy {
    /// Requires an authenticated caller.
    #[must_use]
    pub fn require_auth(mut self) -> Self {
        self.requires_auth = true;
        self
    }

    /// Requires the caller to be bound to a resource.
    #[must_use]
    pub fn require_resource_context(mut self) -> Self {
        self.requires_resource_context = true;
        self
    }

    /// Declares a permission the caller must hold.
    #[must_use]
    pub fn with_permission(mut self, permission: impl Into<String>) -> Self {
        let permission = permission.into();
        if !permission.trim().is_empty() {
            self.required_permissions.insert(permission);
        }
        self
    }

    /// Sets the execution timeout.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Returns `true` when an authenticated caller is required.
    #[must_use]
    pub fn requires_auth(&self) -> bool {
        self.requires_auth
    }

    /// Returns `true` when a resource context is required.
    #[must_use]
    pub fn requires_resource_context(&self) -> bool {
        self.requires_resource_context
    }

    /// Returns the declared permissions.
    #[must_use]
    pub fn required_permissions(&self) -> &BTreeSet<String> {
        &self.required_permissions
    }

    /// Returns the execution timeout.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Validates the policy.
    ///
    /// # Errors
    ///
    /// Returns [`PolicyError::InvalidPolicy`] when the timeout is zero.
    pub fn validate(&self) -> PolicyResult<()> {
        if self.timeout.is_zero() {
            return Err(PolicyError::InvalidPolicy(
                "timeout must be greater than zero",
            ));
        }
        Ok(())
    }
}

/// Full request sent to a policy engine for evaluation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PolicyRequest {
    method: MethodName,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    tool: Option<ToolName>,
    policy: MethodPolicy,
    #[serde(default)]
    caller: CallerContext,
}

impl PolicyRequest {
    /// Creates a request to call `method` under `policy`.
    #[must_use]
    pub fn new(method: MethodName, policy: MethodPolicy, caller: CallerContext) -> Self {
        Self {
            method,
            tool: None,
            policy,
            caller,
        }
    }

    /// Records the tool the call was routed through.
    #[must_use]
    pub fn via_tool(mut self, tool: ToolName) -> Self {
        self.tool = Some(tool);
        self
    }

    /// Returns the target method.
    #[must_use]
    pub fn method(&self) -> &MethodName {
        &self.method
    }

    /// Returns the tool the call was routed through, if any.
    #[must_use]
    pub fn tool(&self) -> Option<&ToolName> {
        self.tool.as_ref()
    }

    /// Returns the declared method policy.
    #[must_use]
    pub fn policy(&self) -> &MethodPolicy {
        &self.policy
    }

    /// Returns the caller context.
    #[must_use]
    pub fn caller(&self) -> &CallerContext {
        &self.caller
    }

    /// Returns a concise, human-readable label for the call.
    #[must_use]
    pub fn label(&self) -> String {
        match &self.tool {
            Some(tool) => format!("tool `{tool}` -> method `{}`", self.method),
            None => format!("method `{}`", self.method),
        }
    }
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(value.as_millis()).unwrap_or(u64::MAX);
        serializer.serialize_u64(millis)
    }

    pub(super) fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}
