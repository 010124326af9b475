//! Hooks for policy decisions and finished dispatches.

use std::sync::{Arc, Mutex};

use hub_policy::{DecisionKind, PolicyDecision, PolicyRequest};
use tracing::{debug, info, warn};

use crate::envelope::{ResponseEnvelope, ResponseStatus};

/// Observer notified during dispatch.
pub trait DispatchObserver: Send + Sync {
    /// Records a policy decision made for a request.
    fn on_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        let _ = (request, decision);
    }

    /// Records the final response of a request.
    fn on_response(&self, response: &ResponseEnvelope);
}

/// Observer that writes decisions and outcomes to `tracing`.
#[derive(Debug, Default)]
pub struct TracingDispatchObserver;

impl DispatchObserver for TracingDispatchObserver {
    fn on_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        let subject = request.label();
        let reason = decision.reason().unwrap_or_default();
        match decision.kind() {
            DecisionKind::Allow => debug!(subject = %subject, "policy allow"),
            DecisionKind::Deny => warn!(
                subject = %subject,
                reason,
                requirement = decision.requirement().unwrap_or_default(),
                "policy deny"
            ),
            DecisionKind::Escalate => warn!(
                subject = %subject,
                reason,
                approvers = ?decision.required_approvals(),
                "policy escalate"
            ),
        }
    }

    fn on_response(&self, response: &ResponseEnvelope) {
        let metadata = response.metadata();
        let method = metadata.method.as_deref().unwrap_or_default();
        let tool = metadata.tool.as_deref().unwrap_or_default();
        let elapsed_ms = u64::try_from(metadata.execution_time.as_millis()).unwrap_or(u64::MAX);
        match response.status() {
            ResponseStatus::Completed => info!(
                request_id = %response.request_id(),
                method,
                tool,
                elapsed_ms,
                "dispatch completed"
            ),
            ResponseStatus::Failed => {
                let (kind, message) = response
                    .error()
                    .map(|error| (error.kind.as_str(), error.message.as_str()))
                    .unwrap_or_default();
                warn!(
                    request_id = %response.request_id(),
                    method,
                    tool,
                    elapsed_ms,
                    kind,
                    message,
                    "dispatch failed"
                );
            }
            ResponseStatus::Pending => {
                debug!(request_id = %response.request_id(), "dispatch pending");
            }
        }
    }
}

/// Forwards every notification to a list of observers.
#[derive(Default)]
pub struct CompositeDispatchObserver {
    observers: Vec<Arc<dyn DispatchObserver>>,
}

impl CompositeDispatchObserver {
    /// Creates a composite observer from the supplied list.
    #[must_use]
    pub fn new<I>(observers: I) -> Self
    where
        I: IntoIterator<Item = Arc<dyn DispatchObserver>>,
    {
        Self {
            observers: observers.into_iter().collect(),
        }
    }

    /// Adds an observer.
    pub fn push(&mut self, observer: Arc<dyn DispatchObserver>) {
        self.observers.push(observer);
    }
}

impl DispatchObserver for CompositeDispatchObserver {
    fn on_decision(&self, request: &PolicyRequest, decision: &PolicyDecision) {
        for observer in &self.observers {
            observer.on_decision(request, decision);
        }
    }

    fn on_response(&self, response: &ResponseEnvelope) {
        for observer in &self.observers {
            observer.on_response(response);
        }
    }
}

/// Observer that keeps every response, for tests and diagnostics.
#[derive(Default)]
pub struct CollectingObserver {
    responses: Mutex<Vec<ResponseEnvelope>>,
    denials: Mutex<Vec<PolicyDecision>>,
}

impl CollectingObserver {
    /// Creates a new collecting observer.
    #[must_use]
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Removes and returns the collected responses.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain(&self) -> Vec<ResponseEnvelope> {
        let mut lock = self.responses.lock().expect("collecting observer poisoned");
        lock.drain(..).collect()
    }

    /// Removes and returns the collected non-allow decisions.
    ///
    /// # Panics
    ///
    /// Panics if the internal mutex has been poisoned by a previous panic.
    #[must_use]
    pub fn drain_denials(&self) -> Vec<PolicyDecision> {
        let mut lock = self.denials.lock().expect("collecting observer poisoned");
        lock.drain(..).collect()
    }
}

impl DispatchObserver for CollectingObserver {
    fn on_decision(&self, _request: &PolicyRequest, decision: &PolicyDecision) {
        if !decision.is_allow() {
            self.denials
                .lock()
                .expect("collecting observer poisoned")
                .push(decision.clone());
        }
    }

    fn on_response(&self, response: &ResponseEnvelope) {
        self.responses
            .lock()
            .expect("collecting observer poisoned")
            .push(response.clone());
    }
}
