//! Inbox ports.

use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Activity, Iri, ProcessingError};
use std::collections::VecDeque;

/// The activity handler the pipeline dispatches to.
///
/// The returned error's classification drives ack/nack: transient errors
/// are nacked for redelivery, everything else is acked.
#[async_trait]
pub trait ActivityHandler: Send + Sync {
    async fn handle(&self, activity: &Activity) -> Result<(), ProcessingError>;
}

/// Scripted handler for tests.
///
/// Pops pre-programmed results in order and falls back to `Ok(())`.
#[derive(Default)]
pub struct MockActivityHandler {
    invocations: Mutex<Vec<Iri>>,
    script: Mutex<VecDeque<Result<(), ProcessingError>>>,
}

impl MockActivityHandler {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a result for the next invocation.
    pub fn push_result(&self, result: Result<(), ProcessingError>) {
        self.script.lock().push_back(result);
    }

    /// IDs of handled activities, in invocation order.
    pub fn invocations(&self) -> Vec<Iri> {
        self.invocations.lock().clone()
    }

    /// Number of invocations so far.
    pub fn invocation_count(&self) -> usize {
        self.invocations.lock().len()
    }
}

#[async_trait]
impl ActivityHandler for MockActivityHandler {
    async fn handle(&self, activity: &Activity) -> Result<(), ProcessingError> {
        self.invocations.lock().push(activity.id.clone());
        self.script.lock().pop_front().unwrap_or(Ok(()))
    }
}
