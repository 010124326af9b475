//! Policy engine traits and the declared-flag engine.

use async_trait::async_trait;
use thiserror::Error;
use tracing::debug;

use crate::contracts::PolicyRequest;
use crate::decision::PolicyDecision;

/// Errors surfaced by policy engines.
#[derive(Debug, Error)]
pub enum PolicyError {
    /// A method policy declaration is unusable.
    #[error("invalid method policy: {0}")]
    InvalidPolicy(&'static str),
    /// Backend integration returned an error.
    #[error("policy backend failure: {reason}")]
    Backend {
        /// Human-readable explanation for logging and operators.
        reason: String,
    },
}

/// Result alias for policy operations.
pub type PolicyResult<T> = Result<T, PolicyError>;

/// Trait implemented by policy engines.
#[async_trait]
pub trait PolicyEngine: Send + Sync {
    /// Evaluates the supplied policy request.
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision>;
}

/// Enforces exactly what the method declares: authentication, resource
/// context, and permissions.
#[derive(Debug, Clone, Copy, Default)]
pub struct DeclaredPolicyEngine;

impl DeclaredPolicyEngine {
    /// Evaluates the declared flags synchronously.
    #[must_use]
    pub fn check(request: &PolicyRequest) -> PolicyDecision {
        let decision = Self::first_unmet(request);
        if !decision.is_allow() {
            debug!(
                subject = %request.label(),
                requirement = decision.requirement().unwrap_or_default(),
                "declared policy not satisfied"
            );
        }
        decision
    }

    fn first_unmet(request: &PolicyRequest) -> PolicyDecision {
        let policy = request.policy();
        let caller = request.caller();

        if policy.requires_auth() && !caller.is_authenticated() {
            return PolicyDecision::deny("authentication required").for_requirement("auth");
        }

        if policy.requires_resource_context() && caller.resource_id().is_none() {
            return PolicyDecision::deny("resource context required")
                .for_requirement("resource_context");
        }

        let missing: Vec<&str> = policy
            .required_permissions()
            .iter()
            .filter(|permission| !caller.permissions().contains(*permission))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return PolicyDecision::deny(format!("missing permissions: {}", missing.join(", ")))
                .for_requirement("permissions");
        }

        PolicyDecision::allow()
    }
}

#[async_trait]
impl PolicyEngine for DeclaredPolicyEngine {
    async fn evaluate(&self, request: &PolicyRequest) -> PolicyResult<PolicyDecision> {
        Ok(Self::check(request))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{CallerContext, MethodPolicy};
    use hub_primitives::MethodName;

    fn request(policy: MethodPolicy, caller: CallerContext) -> PolicyRequest {
        PolicyRequest::new(
            MethodName::new("workspace.casefile.create_casefile").unwrap(),
            policy,
            caller,
        )
    }

    #[tokio::test]
    async fn declared_engine_checks_auth_first() {
        let policy = MethodPolicy::default()
            .require_auth()
            .require_resource_context();
        let decision = DeclaredPolicyEngine
            .evaluate(&request(policy.clone(), CallerContext::anonymous()))
            .await
            .unwrap();
        assert_eq!(decision.requirement(), Some("auth"));

        let decision = DeclaredPolicyEngine
            .evaluate(&request(policy, CallerContext::authenticated("u1")))
            .await
            .unwrap();
        assert_eq!(decision.requirement(), Some("resource_context"));
    }

    #[tokio::test]
    async fn declared_engine_lists_missing_permissions() {
        let policy = MethodPolicy::default()
            .with_permission("casefile:write")
            .with_permission("casefile:read");
        let caller = CallerContext::authenticated("u1").with_permissions(["casefile:read"]);
        let decision = DeclaredPolicyEngine::check(&request(policy, caller));

        assert!(!decision.is_allow());
        assert_eq!(decision.reason(), Some("missing permissions: casefile:write"));
    }

    #[tokio::test]
    async fn declared_engine_allows_satisfied_policy() {
        let policy = MethodPolicy::default().require_auth();
        let caller = CallerContext::authenticated("u1");
        let decision = DeclaredPolicyEngine::check(&request(policy, caller));
        assert!(decision.is_allow());
    }
}
