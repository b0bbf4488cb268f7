//! Watcher domain types.

use chrono::{DateTime, Utc};
use shared_types::Iri;

/// A credential awaiting inclusion confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionEntry {
    /// Credential ID; the store key.
    pub vc_id: Iri,
    /// Raw credential bytes as witnessed (the log leaf payload).
    pub credential_raw: Vec<u8>,
    /// The witness domain whose log must include the credential.
    pub domain: Iri,
    /// Witness-proof creation time; the leaf timestamp.
    pub created: DateTime<Utc>,
    /// The promise-of-inclusion deadline.
    pub expiration: DateTime<Utc>,
}

impl InclusionEntry {
    /// The leaf timestamp in milliseconds.
    #[must_use]
    pub fn created_ms(&self) -> u64 {
        self.created.timestamp_millis().max(0) as u64
    }

    /// True once the deadline has passed.
    #[must_use]
    pub fn expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiration
    }
}
