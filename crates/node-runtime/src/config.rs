//! Node configuration.

use om_01_redelivery::RedeliveryConfig;
use om_04_anchor_sync::SyncConfig;
use om_05_log_monitor::MonitorConfig;
use shared_types::Iri;
use std::time::Duration;

/// Top-level node configuration.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    /// This service's IRI.
    pub service_iri: Iri,
    /// Base IRI of the content-addressed store.
    pub cas_iri: Iri,
    /// HTTP listen address.
    pub listen_addr: String,
    /// Path of the inbox endpoint.
    pub inbox_path: String,
    /// Topic for inbound activities.
    pub inbox_topic: String,
    /// Accepted bearer tokens; empty requires HTTP signatures.
    pub auth_tokens: Vec<String>,
    /// Reject activities whose actor differs from the signer.
    pub verify_actor_in_signature: bool,
    /// Minimum resolvers advertised in the WebFinger document.
    pub min_resolvers: u64,
    /// Witnessing window and inclusion deadline.
    pub max_witness_delay: Duration,
    /// Scheduler interval for the log monitor.
    pub monitor_interval: Duration,
    /// Scheduler interval for the inclusion-watcher worker.
    pub watcher_interval: Duration,
    /// Soft upper bound for one periodic job run.
    pub max_run_time: Duration,
    /// Anchor-sync tuning.
    pub sync: SyncConfig,
    /// Log-monitor tuning.
    pub monitor: MonitorConfig,
    /// Redelivery tuning.
    pub redelivery: RedeliveryConfig,
}

impl Default for NodeConfig {
    fn default() -> Self {
        let service_iri = Iri::parse("https://orb-mesh.local/services/anchor")
            .unwrap_or_else(|_| unreachable!("static IRI is valid"));
        let cas_iri = Iri::parse("https://orb-mesh.local/cas")
            .unwrap_or_else(|_| unreachable!("static IRI is valid"));
        Self {
            service_iri,
            cas_iri,
            listen_addr: "127.0.0.1:8077".to_string(),
            inbox_path: "/services/anchor/inbox".to_string(),
            inbox_topic: "anchor.inbox".to_string(),
            auth_tokens: Vec::new(),
            verify_actor_in_signature: false,
            min_resolvers: 1,
            max_witness_delay: Duration::from_secs(600),
            monitor_interval: Duration::from_secs(10),
            watcher_interval: Duration::from_secs(10),
            max_run_time: Duration::from_secs(120),
            sync: SyncConfig::default(),
            monitor: MonitorConfig::default(),
            redelivery: RedeliveryConfig::default(),
        }
    }
}
