//! Watcher entry persistence.

use crate::domain::InclusionEntry;
use async_trait::async_trait;
use parking_lot::Mutex;
use shared_types::{Iri, StoreError};
use std::collections::HashMap;

/// Storage for `not_confirmed` entries.
#[async_trait]
pub trait EntryStore: Send + Sync {
    /// Queue an entry. Re-adding the same credential replaces it.
    async fn add(&self, entry: &InclusionEntry) -> Result<(), StoreError>;

    /// All queued entries.
    async fn not_confirmed(&self) -> Result<Vec<InclusionEntry>, StoreError>;

    /// Remove an entry (confirmed or expired).
    async fn delete(&self, vc_id: &Iri) -> Result<(), StoreError>;
}

/// In-memory [`EntryStore`].
#[derive(Default)]
pub struct MemoryEntryStore {
    entries: Mutex<HashMap<Iri, InclusionEntry>>,
}

impl MemoryEntryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl EntryStore for MemoryEntryStore {
    async fn add(&self, entry: &InclusionEntry) -> Result<(), StoreError> {
        self.entries
            .lock()
            .insert(entry.vc_id.clone(), entry.clone());
        Ok(())
    }

    async fn not_confirmed(&self) -> Result<Vec<InclusionEntry>, StoreError> {
        let mut entries: Vec<InclusionEntry> = self.entries.lock().values().cloned().collect();
        entries.sort_by(|a, b| a.expiration.cmp(&b.expiration));
        Ok(entries)
    }

    async fn delete(&self, vc_id: &Iri) -> Result<(), StoreError> {
        self.entries.lock().remove(vc_id);
        Ok(())
    }
}
