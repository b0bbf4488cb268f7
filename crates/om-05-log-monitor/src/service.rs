//! The monitor service.

use crate::domain::{LogStatus, MonitorError};
use crate::store::MonitorStore;
use futures::future::join_all;
use shared_vct::rfc6962::{self, Hash, ProofError};
use shared_vct::{LogClient, SignedTreeHead};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Monitor tuning.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Largest tree that will be fully rebuilt on first sight. Bigger logs
    /// are accepted from their current head onward.
    pub max_tree_size: u64,
    /// Page size for `get-entries`.
    pub max_get_entries_range: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_tree_size: 10_000,
            max_get_entries_range: 1000,
        }
    }
}

/// Verifies every active log once per tick, concurrently, and waits for
/// all of them before returning.
pub struct LogMonitor {
    client: Arc<dyn LogClient>,
    store: Arc<dyn MonitorStore>,
    config: MonitorConfig,
}

impl LogMonitor {
    /// A new monitor.
    #[must_use]
    pub fn new(
        client: Arc<dyn LogClient>,
        store: Arc<dyn MonitorStore>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            client,
            store,
            config,
        }
    }

    /// One tick over all active logs. Failures are logged per log; the
    /// stored state of a failing log is untouched so the next tick retries.
    pub async fn run(&self) {
        let statuses = match self.store.active_logs().await {
            Ok(s) => s,
            Err(e) => {
                warn!(error = %e, "Cannot list active logs");
                return;
            }
        };

        let checks = statuses.into_iter().map(|status| {
            let log_url = status.log_url.clone();
            async move {
                if let Err(e) = self.process_log(status).await {
                    warn!(log = %log_url, error = %e, "Log verification failed");
                }
            }
        });
        join_all(checks).await;
    }

    async fn process_log(&self, status: LogStatus) -> Result<(), MonitorError> {
        let sth = self.client.get_sth(&status.log_url).await?;
        let public_key = self.client.get_public_key(&status.log_url).await?;
        sth.verify_signature(&public_key)?;

        match &status.sth {
            None => self.first_sight(&status, &sth).await?,
            Some(prior) => self.extension(&status, prior, &sth).await?,
        }

        let verified = LogStatus {
            log_url: status.log_url.clone(),
            active: status.active,
            sth: Some(sth),
            public_key: Some(public_key),
        };
        self.store.put(&verified).await?;
        Ok(())
    }

    /// No previously verified head for this log.
    async fn first_sight(
        &self,
        status: &LogStatus,
        sth: &SignedTreeHead,
    ) -> Result<(), MonitorError> {
        if sth.tree_size == 0 {
            debug!(log = %status.log_url, "Empty tree; nothing to verify");
            return Ok(());
        }
        if sth.tree_size > self.config.max_tree_size {
            // Bootstrap cost bound: accept the signed head without
            // reconstructing history and verify consistency from here on.
            warn!(
                log = %status.log_url,
                tree_size = sth.tree_size,
                "Tree too large to rebuild; accepting head without reconstruction"
            );
            return Ok(());
        }

        let root = expected_root(sth)?;
        let leaves = self.fetch_entries(&status.log_url, 0, sth.tree_size).await?;
        let rebuilt = rfc6962::root_from_leaves(&leaves);
        if rebuilt != root {
            return Err(MonitorError::RootMismatch {
                tree_size: sth.tree_size,
            });
        }
        info!(log = %status.log_url, tree_size = sth.tree_size, "Rebuilt tree matches STH root");
        Ok(())
    }

    /// A previously verified head exists; the new head must extend it.
    async fn extension(
        &self,
        status: &LogStatus,
        prior: &SignedTreeHead,
        sth: &SignedTreeHead,
    ) -> Result<(), MonitorError> {
        if sth.tree_size < prior.tree_size {
            return Err(MonitorError::Regressed {
                prior: prior.tree_size,
                current: sth.tree_size,
            });
        }
        if sth.tree_size == prior.tree_size {
            if sth.sha256_root_hash != prior.sha256_root_hash {
                return Err(MonitorError::Proof(ProofError::Mismatch(
                    "same tree size, different root".to_string(),
                )));
            }
            debug!(log = %status.log_url, "Tree unchanged");
            return Ok(());
        }

        if prior.tree_size == 0 {
            // Every tree is consistent with the empty tree.
            debug!(log = %status.log_url, "Extending the empty tree; no proof needed");
        } else {
            let proof = self
                .client
                .get_sth_consistency(&status.log_url, prior.tree_size, sth.tree_size)
                .await?;
            if proof.is_empty() {
                return Err(MonitorError::Proof(ProofError::EmptyProof));
            }
            let prior_root = expected_root(prior)?;
            let new_root = expected_root(sth)?;
            rfc6962::verify_consistency(
                prior.tree_size,
                sth.tree_size,
                &prior_root,
                &new_root,
                &proof,
            )?;
        }

        // Pull the new leaves for audit.
        let added = self
            .fetch_entries(&status.log_url, prior.tree_size, sth.tree_size)
            .await?;
        info!(
            log = %status.log_url,
            from = prior.tree_size,
            to = sth.tree_size,
            fetched = added.len(),
            "Tree extension verified"
        );
        Ok(())
    }

    /// Fetch leaf inputs `[start, end)` in pages of `max_get_entries_range`.
    async fn fetch_entries(
        &self,
        log_url: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<Vec<u8>>, MonitorError> {
        let mut leaves = Vec::with_capacity((end - start) as usize);
        let mut from = start;
        while from < end {
            let to = (from + self.config.max_get_entries_range).min(end) - 1;
            let batch = self.client.get_entries(log_url, from, to).await?;
            if batch.is_empty() {
                return Err(MonitorError::MalformedHead(format!(
                    "log returned no entries for [{from}, {to}]"
                )));
            }
            from += batch.len() as u64;
            leaves.extend(batch);
        }
        Ok(leaves)
    }
}

fn expected_root(sth: &SignedTreeHead) -> Result<Hash, MonitorError> {
    sth.root().ok_or_else(|| {
        MonitorError::MalformedHead(format!(
            "root hash has {} bytes",
            sth.sha256_root_hash.len()
        ))
    })
}
