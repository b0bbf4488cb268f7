//! The watcher service.

use crate::domain::InclusionEntry;
use crate::store::EntryStore;
use chrono::Utc;
use shared_discovery::DiscoveryClient;
use shared_types::{Iri, ProcessingError};
use shared_vct::rfc6962::timestamped_leaf_hash;
use shared_vct::{LogClient, VctError};
use std::sync::Arc;
use tracing::{debug, error, info, warn};

/// The only ledger type this watcher can prove inclusion against.
const SUPPORTED_LEDGER_TYPE: &str = "vct-v1";

/// Confirms witnessed credentials reach their log before the deadline.
pub struct InclusionWatcher {
    client: Arc<dyn LogClient>,
    discovery: Arc<DiscoveryClient>,
    store: Arc<dyn EntryStore>,
}

enum ProofOutcome {
    Confirmed,
    NotIncluded,
}

impl InclusionWatcher {
    /// A new watcher.
    #[must_use]
    pub fn new(
        client: Arc<dyn LogClient>,
        discovery: Arc<DiscoveryClient>,
        store: Arc<dyn EntryStore>,
    ) -> Self {
        Self {
            client,
            discovery,
            store,
        }
    }

    /// Register a witnessed credential for inclusion monitoring.
    ///
    /// Monitoring is skipped (with success) when there is no domain to
    /// monitor or the domain's ledger type is unknown or unsupported. If
    /// inclusion can be proven immediately the call succeeds without
    /// queueing; a passed deadline is the [`ProcessingError::Expired`]
    /// signal; otherwise the entry is queued for the periodic worker.
    pub async fn watch(&self, entry: InclusionEntry) -> Result<(), ProcessingError> {
        match self.discovery.ledger_type(entry.domain.as_str()).await {
            Ok(Some(kind)) if kind == SUPPORTED_LEDGER_TYPE => {}
            Ok(_) => {
                debug!(domain = %entry.domain, "No supported ledger; nothing to monitor");
                return Ok(());
            }
            Err(e) => {
                debug!(domain = %entry.domain, error = %e, "Ledger type lookup failed; nothing to monitor");
                return Ok(());
            }
        }

        match self.prove(&entry).await {
            Ok(ProofOutcome::Confirmed) => {
                info!(vc = %entry.vc_id, "Credential already included in the log");
                return Ok(());
            }
            Ok(ProofOutcome::NotIncluded) => {}
            Err(e) => {
                debug!(vc = %entry.vc_id, error = %e, "Initial proof query failed");
            }
        }

        if entry.expired(Utc::now()) {
            return Err(ProcessingError::Expired(format!(
                "witness {} missed the inclusion deadline for {}",
                entry.domain, entry.vc_id
            )));
        }

        self.store
            .add(&entry)
            .await
            .map_err(ProcessingError::transient)?;
        debug!(vc = %entry.vc_id, expires = %entry.expiration, "Queued for inclusion monitoring");
        Ok(())
    }

    /// One worker tick over the `not_confirmed` queue.
    ///
    /// Every queued entry leaves the queue in finite time: confirmed and
    /// expired entries are deleted; the rest stay for the next tick.
    pub async fn run(&self) {
        let entries = match self.store.not_confirmed().await {
            Ok(entries) => entries,
            Err(e) => {
                warn!(error = %e, "Cannot list queued entries");
                return;
            }
        };

        let now = Utc::now();
        for entry in entries {
            if entry.expired(now) {
                error!(
                    vc = %entry.vc_id,
                    domain = %entry.domain,
                    "Inclusion deadline passed without proof"
                );
                self.delete(&entry.vc_id).await;
                continue;
            }

            match self.prove(&entry).await {
                Ok(ProofOutcome::Confirmed) => {
                    info!(vc = %entry.vc_id, "Inclusion confirmed");
                    self.delete(&entry.vc_id).await;
                }
                Ok(ProofOutcome::NotIncluded) => {
                    debug!(vc = %entry.vc_id, "Not yet included; will retry");
                }
                Err(e) => {
                    warn!(vc = %entry.vc_id, error = %e, "Proof query failed; will retry");
                }
            }
        }
    }

    /// Query the log for a proof of this entry's leaf.
    async fn prove(&self, entry: &InclusionEntry) -> Result<ProofOutcome, VctError> {
        let leaf = timestamped_leaf_hash(entry.created_ms(), &entry.credential_raw);
        let sth = self.client.get_sth(entry.domain.as_str()).await?;
        if sth.tree_size == 0 {
            return Ok(ProofOutcome::NotIncluded);
        }

        match self
            .client
            .get_proof_by_hash(entry.domain.as_str(), &leaf, sth.tree_size)
            .await
        {
            Ok(proof) if !proof.audit_path.is_empty() => Ok(ProofOutcome::Confirmed),
            Ok(_) => Ok(ProofOutcome::NotIncluded),
            Err(e) if e.is_not_found() => Ok(ProofOutcome::NotIncluded),
            Err(e) => Err(e),
        }
    }

    async fn delete(&self, vc_id: &Iri) {
        if let Err(e) = self.store.delete(vc_id).await {
            warn!(vc = %vc_id, error = %e, "Failed to delete queue entry");
        }
    }
}
