//! Per-request state machine.

use std::time::{Duration, Instant};

use hub_primitives::RequestId;
use thiserror::Error;
use tracing::debug;

/// States a request moves through inside the hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestState {
    /// Envelope accepted, nothing checked yet.
    Received,
    /// Operation resolved and policy satisfied.
    Validated,
    /// Payload bound; implementation running.
    Executing,
    /// Implementation returned a payload.
    Completed,
    /// Request failed at some stage.
    Failed,
}

impl RequestState {
    /// Returns `true` for `Completed` and `Failed`.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Events that drive [`RequestLifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestEvent {
    /// Resolution and policy checks passed.
    Validate,
    /// Payload bound; start the implementation.
    Execute,
    /// Implementation succeeded.
    Complete,
    /// Any failure.
    Fail,
}

/// Tracks one request's state and its execution clock.
///
/// The clock starts on entry to `Validated` and stops at the terminal state, so
/// requests that fail before validation report zero execution time.
#[derive(Debug, Clone)]
pub struct RequestLifecycle {
    request_id: RequestId,
    state: RequestState,
    validated_at: Option<Instant>,
    elapsed: Option<Duration>,
}

impl RequestLifecycle {
    /// Starts a lifecycle in `Received`.
    #[must_use]
    pub fn new(request_id: RequestId) -> Self {
        Self {
            request_id,
            state: RequestState::Received,
            validated_at: None,
            elapsed: None,
        }
    }

    /// Returns the current state.
    #[must_use]
    pub const fn state(&self) -> RequestState {
        self.state
    }

    /// Time from `Validated` entry to the terminal state (or to now, while the
    /// request is still running). Zero if `Validated` was never reached.
    #[must_use]
    pub fn execution_time(&self) -> Duration {
        match (self.elapsed, self.validated_at) {
            (Some(elapsed), _) => elapsed,
            (None, Some(started)) => started.elapsed(),
            (None, None) => Duration::ZERO,
        }
    }

    /// Applies an event, returning the resulting state.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::InvalidTransition`] when the event is not
    /// allowed from the current state.
    pub fn transition(&mut self, event: RequestEvent) -> LifecycleResult<RequestState> {
        let next = match (self.state, event) {
            (RequestState::Received, RequestEvent::Validate) => Some(RequestState::Validated),
            (RequestState::Validated, RequestEvent::Execute) => Some(RequestState::Executing),
            (RequestState::Executing, RequestEvent::Complete) => Some(RequestState::Completed),
            (
                RequestState::Received | RequestState::Validated | RequestState::Executing,
                RequestEvent::Fail,
            ) => Some(RequestState::Failed),
            _ => None,
        };

        let Some(next_state) = next else {
            return Err(LifecycleError::InvalidTransition {
                request_id: self.request_id.clone(),
                from: self.state,
                event,
            });
        };

        match next_state {
            RequestState::Validated => self.validated_at = Some(Instant::now()),
            RequestState::Completed | RequestState::Failed => {
                self.elapsed = Some(self.validated_at.map_or(Duration::ZERO, |at| at.elapsed()));
            }
            RequestState::Received | RequestState::Executing => {}
        }

        debug!(
            request_id = %self.request_id,
            from = ?self.state,
            to = ?next_state,
            ?event,
            "request lifecycle transition"
        );
        self.state = next_state;
        Ok(self.state)
    }
}

/// Errors emitted by the lifecycle controller.
#[derive(Debug, Error)]
pub enum LifecycleError {
    /// Transition was not permitted from the current state.
    #[error("invalid request transition from {from:?} via {event:?} for request {request_id}")]
    InvalidTransition {
        /// Request whose transition failed.
        request_id: RequestId,
        /// State prior to the attempted transition.
        from: RequestState,
        /// Event that triggered the failure.
        event: RequestEvent,
    },
}

/// Result alias used for lifecycle operations.
pub type LifecycleResult<T> = Result<T, LifecycleError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_reaches_completed() {
        let mut lifecycle = RequestLifecycle::new(RequestId::random());
        lifecycle.transition(RequestEvent::Validate).unwrap();
        lifecycle.transition(RequestEvent::Execute).unwrap();
        lifecycle.transition(RequestEvent::Complete).unwrap();
        assert_eq!(lifecycle.state(), RequestState::Completed);
        assert!(lifecycle.state().is_terminal());
    }

    #[test]
    fn early_failure_reports_zero_time() {
        let mut lifecycle = RequestLifecycle::new(RequestId::random());
        lifecycle.transition(RequestEvent::Fail).unwrap();
        assert_eq!(lifecycle.state(), RequestState::Failed);
        assert_eq!(lifecycle.execution_time(), Duration::ZERO);
    }

    #[test]
    fn clock_freezes_at_terminal_state() {
        let mut lifecycle = RequestLifecycle::new(RequestId::random());
        lifecycle.transition(RequestEvent::Validate).unwrap();
        std::thread::sleep(Duration::from_millis(5));
        lifecycle.transition(RequestEvent::Fail).unwrap();
        let frozen = lifecycle.execution_time();
        assert!(frozen >= Duration::from_millis(5));
        std::thread::sleep(Duration::from_millis(5));
        assert_eq!(lifecycle.execution_time(), frozen);
    }

    #[test]
    fn terminal_states_reject_further_events() {
        let mut lifecycle = RequestLifecycle::new(RequestId::random());
        lifecycle.transition(RequestEvent::Fail).unwrap();
        let err = lifecycle
            .transition(RequestEvent::Validate)
            .expect_err("failed requests cannot be validated");
        assert!(matches!(err, LifecycleError::InvalidTransition { .. }));

        let mut skipped = RequestLifecycle::new(RequestId::random());
        assert!(skipped.transition(RequestEvent::Complete).is_err());
    }
}
