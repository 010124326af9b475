//! Request orchestration for the method and tool hub.
//!
//! A [`Hub`] resolves each [`RequestEnvelope`] to a method (through a tool when
//! the name matches one), enforces the method's declared policy, binds the
//! payload to the request contract, and runs the implementation under its
//! timeout. The outcome is always a [`ResponseEnvelope`].

#![warn(missing_docs, clippy::pedantic)]

mod envelope;
mod error;
mod hub;
mod lifecycle;
mod observer;
mod scheduler;

pub use envelope::{
    ErrorInfo, RequestEnvelope, ResponseEnvelope, ResponseMetadata, ResponseStatus,
};
pub use error::{HubError, HubResult};
pub use hub::{Hub, HubBuilder, Submission};
pub use lifecycle::{
    LifecycleError, LifecycleResult, RequestEvent, RequestLifecycle, RequestState,
};
pub use observer::{
    CollectingObserver, CompositeDispatchObserver, DispatchObserver, TracingDispatchObserver,
};
pub use scheduler::DispatchScheduler;
