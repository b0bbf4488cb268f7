//! Sync cursors.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shared_types::{Iri, StoreError};
use std::collections::HashMap;
use std::fmt;

/// Which feed of a peer a cursor tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Source {
    /// The peer's inbox (follower repair).
    Inbox,
    /// The peer's outbox (following catch-up).
    Outbox,
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Inbox => f.write_str("inbox"),
            Self::Outbox => f.write_str("outbox"),
        }
    }
}

/// Resume position inside a paged feed: the page and the index of the last
/// successfully processed item on it. Within one page the index never
/// decreases; it only resets when the page changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cursor {
    pub page: Iri,
    pub index: usize,
}

/// Persistence for cursors, keyed by `<service-IRI>!<source>`.
#[async_trait]
pub trait CursorStore: Send + Sync {
    async fn get(&self, service: &Iri, source: Source) -> Result<Option<Cursor>, StoreError>;
    async fn put(&self, service: &Iri, source: Source, cursor: &Cursor) -> Result<(), StoreError>;
}

fn key(service: &Iri, source: Source) -> String {
    format!("{service}!{source}")
}

/// In-memory [`CursorStore`].
#[derive(Default)]
pub struct MemoryCursorStore {
    cursors: Mutex<HashMap<String, Cursor>>,
}

impl MemoryCursorStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CursorStore for MemoryCursorStore {
    async fn get(&self, service: &Iri, source: Source) -> Result<Option<Cursor>, StoreError> {
        Ok(self.cursors.lock().get(&key(service, source)).cloned())
    }

    async fn put(&self, service: &Iri, source: Source, cursor: &Cursor) -> Result<(), StoreError> {
        self.cursors
            .lock()
            .insert(key(service, source), cursor.clone());
        Ok(())
    }
}
