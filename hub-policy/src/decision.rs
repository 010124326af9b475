//! Policy decision types returned by engines.

use serde::{Deserialize, Serialize};

/// Describes the outcome of a policy evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionKind {
    /// The call may proceed.
    Allow,
    /// The call is rejected.
    Deny,
    /// The call needs approval the hub cannot grant; treated as a rejection.
    Escalate,
}

/// Structured decision emitted by a policy engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDecision {
    kind: DecisionKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    requirement: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    required_approvals: Vec<String>,
}

impl PolicyDecision {
    /// Returns an allow decision.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            kind: DecisionKind::Allow,
            reason: None,
            requirement: None,
            required_approvals: Vec::new(),
        }
    }

    /// Returns a deny decision with an explanatory reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            kind: DecisionKind::Deny,
            reason: Some(reason.into()),
            requirement: None,
            required_approvals: Vec::new(),
        }
    }

    /// Returns an escalate decision naming the approvers.
    #[must_use]
    pub fn escalate(reason: impl Into<String>, approvers: Vec<String>) -> Self {
        Self {
            kind: DecisionKind::Escalate,
            reason: Some(reason.into()),
            requirement: None,
            required_approvals: approvers,
        }
    }

    /// Names the unmet requirement (`auth`, `resource_context`, ...).
    #[must_use]
    pub fn for_requirement(mut self, requirement: impl Into<String>) -> Self {
        self.requirement = Some(requirement.into());
        self
    }

    /// Returns the decision kind.
    #[must_use]
    pub fn kind(&self) -> DecisionKind {
        self.kind
    }

    /// Returns true when the call may proceed.
    #[must_use]
    pub fn is_allow(&self) -> bool {
        self.kind == DecisionKind::Allow
    }

    /// Returns the optional reason associated with the decision.
    #[must_use]
    pub fn reason(&self) -> Option<&str> {
        self.reason.as_deref()
    }

    /// Returns the unmet requirement, if the engine named one.
    #[must_use]
    pub fn requirement(&self) -> Option<&str> {
        self.requirement.as_deref()
    }

    /// Returns approver identifiers for escalations.
    #[must_use]
    pub fn required_approvals(&self) -> &[String] {
        &self.required_approvals
    }

    /// Human-readable explanation for a rejected call.
    #[must_use]
    pub fn describe(&self, subject: &str) -> String {
        match self.kind {
            DecisionKind::Allow => format!("policy allowed {subject}"),
            DecisionKind::Deny => {
                let reason = self.reason().unwrap_or("policy denied the request");
                format!("policy denied {subject}: {reason}")
            }
            DecisionKind::Escalate => {
                let reason = self.reason().unwrap_or("policy escalation required");
                if self.required_approvals.is_empty() {
                    format!("policy escalation required for {subject}: {reason}")
                } else {
                    format!(
                        "policy escalation required for {subject}: {reason} (approvers: {})",
                        self.required_approvals.join(", ")
                    )
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_formats_rejections() {
        let deny = PolicyDecision::deny("authentication required").for_requirement("auth");
        assert!(!deny.is_allow());
        assert_eq!(deny.requirement(), Some("auth"));
        assert_eq!(
            deny.describe("method `a.b.c`"),
            "policy denied method `a.b.c`: authentication required"
        );

        let escalate = PolicyDecision::escalate("needs approval", vec!["secops".into()]);
        assert!(escalate.describe("tool `x`").contains("approvers: secops"));
        assert_eq!(escalate.kind(), DecisionKind::Escalate);
    }
}
