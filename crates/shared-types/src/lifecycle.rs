//! # Service Lifecycle
//!
//! Long-running components expose explicit `start`/`stop` and reject work
//! before start with a not-started sentinel. State is shared through an
//! atomic handle so the HTTP layer can gate on the router being `Running`.

use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// Lifecycle states for a long-running service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ServiceState {
    /// `start` has not been called.
    NotStarted = 0,
    /// `start` is in progress.
    Starting = 1,
    /// Accepting work.
    Running = 2,
    /// `stop` completed.
    Stopped = 3,
}

impl ServiceState {
    fn from_u8(v: u8) -> Self {
        match v {
            1 => Self::Starting,
            2 => Self::Running,
            3 => Self::Stopped,
            _ => Self::NotStarted,
        }
    }
}

/// Sentinel returned for operations attempted before `start`.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("service has not been started")]
pub struct NotStartedError;

/// Shared, atomically updated lifecycle state.
#[derive(Debug, Clone, Default)]
pub struct StateHandle {
    inner: Arc<AtomicU8>,
}

impl StateHandle {
    /// A new handle in [`ServiceState::NotStarted`].
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The current state.
    #[must_use]
    pub fn get(&self) -> ServiceState {
        ServiceState::from_u8(self.inner.load(Ordering::Acquire))
    }

    /// Move to a new state.
    pub fn set(&self, state: ServiceState) {
        self.inner.store(state as u8, Ordering::Release);
    }

    /// True when the service accepts work.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.get() == ServiceState::Running
    }

    /// Error unless the service is running.
    pub fn require_running(&self) -> Result<(), NotStartedError> {
        if self.is_running() {
            Ok(())
        } else {
            Err(NotStartedError)
        }
    }
}
