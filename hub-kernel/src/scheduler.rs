//! Admission control for detached dispatches.
//!
//! [`Hub::submit`](crate::Hub::submit) hands each request to a
//! [`DispatchScheduler`], which caps how many detached requests run at once.
//! Requests past the limit wait for a slot. Closing the scheduler turns every
//! request that has not started into a failed response carrying its own
//! request id.

use std::future::Future;
use std::num::NonZeroUsize;
use std::sync::Arc;

use chrono::Utc;
use hub_primitives::{ErrorKind, RequestId};
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::debug;

use crate::envelope::{ErrorInfo, ResponseEnvelope, ResponseMetadata};

/// Bounded pool of dispatch slots shared by every clone.
#[derive(Debug, Clone)]
pub struct DispatchScheduler {
    slots: Arc<Semaphore>,
    limit: NonZeroUsize,
}

impl DispatchScheduler {
    /// Detached requests allowed to run at once when no limit is given.
    pub const DEFAULT_LIMIT: NonZeroUsize = NonZeroUsize::MIN.saturating_add(31);

    /// Creates a scheduler running at most `limit` requests at once.
    #[must_use]
    pub fn new(limit: NonZeroUsize) -> Self {
        Self {
            slots: Arc::new(Semaphore::new(limit.get())),
            limit,
        }
    }

    /// Returns the concurrency limit.
    #[must_use]
    pub const fn limit(&self) -> NonZeroUsize {
        self.limit
    }

    /// Number of requests currently holding a slot.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.limit.get().saturating_sub(self.slots.available_permits())
    }

    /// Returns `true` once [`close`](Self::close) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.slots.is_closed()
    }

    /// Stops admitting requests. Running requests finish; waiting ones fail.
    pub fn close(&self) {
        debug!(in_flight = self.in_flight(), "closing dispatch scheduler");
        self.slots.close();
    }

    /// Runs `dispatch` once a slot frees up.
    ///
    /// The task resolves to [`closed_response`] for `request_id` when the
    /// scheduler closes before a slot is granted.
    pub(crate) fn run<F>(
        &self,
        request_id: RequestId,
        metadata: ResponseMetadata,
        dispatch: F,
    ) -> JoinHandle<ResponseEnvelope>
    where
        F: Future<Output = ResponseEnvelope> + Send + 'static,
    {
        let slots = Arc::clone(&self.slots);
        tokio::spawn(async move {
            let Ok(_slot) = slots.acquire_owned().await else {
                debug!(%request_id, "scheduler closed before the request ran");
                return closed_response(request_id, metadata);
            };
            dispatch.await
        })
    }
}

impl Default for DispatchScheduler {
    fn default() -> Self {
        Self::new(Self::DEFAULT_LIMIT)
    }
}

/// Failed response for a request the scheduler never ran.
pub(crate) fn closed_response(
    request_id: RequestId,
    metadata: ResponseMetadata,
) -> ResponseEnvelope {
    ResponseEnvelope::failed(
        request_id,
        ErrorInfo::new(
            ErrorKind::Execution,
            "dispatch scheduler closed before the request ran",
        ),
        ResponseMetadata {
            completed_at: Some(Utc::now()),
            ..metadata
        },
    )
}
