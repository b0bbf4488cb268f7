//! STH growth gates across monitor ticks.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use om_05_log_monitor::{LogMonitor, MemoryMonitorStore, MonitorConfig, MonitorStore};
    use parking_lot::Mutex;
    use shared_crypto::{generate_keypair, sign};
    use shared_vct::rfc6962::{self, Hash};
    use shared_vct::{InclusionProof, LogClient, SignedTreeHead, VctError};
    use std::sync::Arc;

    const LOG: &str = "https://vct.example.com/maple2026";

    /// A scriptable log over a growing leaf list.
    struct ScriptedLog {
        key: ed25519_dalek::SigningKey,
        leaves: Mutex<Vec<Vec<u8>>>,
        consistency_override: Mutex<Option<Vec<Hash>>>,
    }

    impl ScriptedLog {
        fn with_leaves(n: usize) -> Self {
            Self {
                key: generate_keypair(),
                leaves: Mutex::new((0..n).map(|i| vec![i as u8; 8]).collect()),
                consistency_override: Mutex::new(None),
            }
        }

        fn grow_to(&self, n: usize) {
            let mut leaves = self.leaves.lock();
            let len = leaves.len();
            leaves.extend((len..n).map(|i| vec![i as u8; 8]));
        }
    }

    #[async_trait]
    impl LogClient for ScriptedLog {
        async fn get_sth(&self, _log_url: &str) -> Result<SignedTreeHead, VctError> {
            let leaves = self.leaves.lock();
            let mut sth = SignedTreeHead {
                tree_size: leaves.len() as u64,
                timestamp: 1_750_000_000_000,
                sha256_root_hash: rfc6962::root_from_leaves(&leaves).to_vec(),
                tree_head_signature: Vec::new(),
            };
            sth.tree_head_signature = sign(&self.key, &sth.signed_bytes()).to_vec();
            Ok(sth)
        }

        async fn get_sth_consistency(
            &self,
            _log_url: &str,
            first: u64,
            _second: u64,
        ) -> Result<Vec<Hash>, VctError> {
            if let Some(proof) = self.consistency_override.lock().clone() {
                return Ok(proof);
            }
            Ok(rfc6962::consistency_path(&self.leaves.lock(), first as usize))
        }

        async fn get_entries(
            &self,
            _log_url: &str,
            start: u64,
            end: u64,
        ) -> Result<Vec<Vec<u8>>, VctError> {
            let leaves = self.leaves.lock();
            let end = ((end + 1) as usize).min(leaves.len());
            Ok(leaves[start as usize..end].to_vec())
        }

        async fn get_proof_by_hash(
            &self,
            _log_url: &str,
            _leaf_hash: &Hash,
            _tree_size: u64,
        ) -> Result<InclusionProof, VctError> {
            Err(VctError::NotFound("unused".to_string()))
        }

        async fn get_public_key(&self, _log_url: &str) -> Result<Vec<u8>, VctError> {
            Ok(self.key.verifying_key().as_bytes().to_vec())
        }
    }

    async fn monitor_over(log: Arc<ScriptedLog>) -> (LogMonitor, Arc<MemoryMonitorStore>) {
        let store = Arc::new(MemoryMonitorStore::new());
        store.activate(LOG).await.unwrap();
        (
            LogMonitor::new(
                log as Arc<dyn LogClient>,
                Arc::clone(&store) as Arc<dyn MonitorStore>,
                MonitorConfig::default(),
            ),
            store,
        )
    }

    #[tokio::test]
    async fn test_empty_consistency_proof_blocks_new_head() {
        let log = Arc::new(ScriptedLog::with_leaves(4));
        let (monitor, store) = monitor_over(Arc::clone(&log)).await;

        // First tick verifies and stores the size-4 head.
        monitor.run().await;
        assert_eq!(
            store.get(LOG).await.unwrap().sth.map(|s| s.tree_size),
            Some(4)
        );

        // The log grows to 5 but serves an empty consistency proof.
        log.grow_to(5);
        *log.consistency_override.lock() = Some(Vec::new());
        monitor.run().await;

        // The monitor store still holds the size-4 head.
        assert_eq!(
            store.get(LOG).await.unwrap().sth.map(|s| s.tree_size),
            Some(4)
        );
    }

    #[tokio::test]
    async fn test_valid_proof_advances_head_next_tick() {
        let log = Arc::new(ScriptedLog::with_leaves(4));
        let (monitor, store) = monitor_over(Arc::clone(&log)).await;

        monitor.run().await;

        // Bad proof on one tick, good proof on the next: the monitor
        // retries and converges.
        log.grow_to(5);
        *log.consistency_override.lock() = Some(Vec::new());
        monitor.run().await;
        *log.consistency_override.lock() = None;
        monitor.run().await;

        assert_eq!(
            store.get(LOG).await.unwrap().sth.map(|s| s.tree_size),
            Some(5)
        );
    }
}
