//! Node assembly.

use crate::config::NodeConfig;
use crate::handlers::MeshActivityHandler;
use crate::http::{node_router, MaintenanceFlag};
use crate::outbox::ActivityOutbox;
use crate::scheduler::{PeriodicTask, TaskManager};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use om_01_redelivery::RedeliveryService;
use om_02_inbox::{inbox_routes, HttpState, InboxConfig, InboxService};
use om_03_activity_store::{ActivityStore, MemoryActivityStore};
use om_04_anchor_sync::{AnchorSyncTask, DiscoveryPager, MemoryCursorStore};
use om_05_log_monitor::{LogMonitor, MemoryMonitorStore, MonitorStore};
use om_06_inclusion_watcher::{InclusionWatcher, MemoryEntryStore};
use om_07_anchor_writer::{
    AnchorWriter, Ed25519Witness, LocalWitness, MemoryAnchorGraph, MemoryAnchorIndex,
    MemoryVcStore, MemoryWitnessStore, WitnessResolver, WriterConfig, WriterDeps, WriterError,
};
use shared_bus::{ConnectionSettings, ManagedBus, MemoryBroker, MemoryConnector, MessageBus};
use shared_crypto::{HttpSignatureVerifier, KeyResolver};
use shared_discovery::{DiscoveryClient, DiscoveryConfig, HttpDiscoveryFetcher};
use shared_types::Iri;
use shared_vct::{HttpLogClient, LogClient};
use std::sync::Arc;
use tracing::info;

/// Witness resolution through the discovery client.
struct DiscoveryWitnessResolver {
    discovery: Arc<DiscoveryClient>,
}

#[async_trait]
impl WitnessResolver for DiscoveryWitnessResolver {
    async fn witness_iri(&self, origin: &Iri) -> Result<Iri, WriterError> {
        self.discovery
            .resolve_host_meta_link(origin, "application/activity+json")
            .await
            .map_err(WriterError::fatal)
    }

    async fn has_log(&self, witness: &Iri) -> bool {
        let Some(domain) = witness.origin() else {
            return false;
        };
        self.discovery.has_log(domain).await.unwrap_or(false)
    }
}

struct SyncJob(Arc<AnchorSyncTask>);

#[async_trait]
impl PeriodicTask for SyncJob {
    fn name(&self) -> &str {
        "anchor-sync"
    }

    async fn run(&self) {
        self.0.run().await;
    }
}

struct MonitorJob(Arc<LogMonitor>);

#[async_trait]
impl PeriodicTask for MonitorJob {
    fn name(&self) -> &str {
        "log-monitor"
    }

    async fn run(&self) {
        self.0.run().await;
    }
}

struct WatcherJob(Arc<InclusionWatcher>);

#[async_trait]
impl PeriodicTask for WatcherJob {
    fn name(&self) -> &str {
        "inclusion-watcher"
    }

    async fn run(&self) {
        self.0.run().await;
    }
}

/// The assembled node.
pub struct Node {
    config: Arc<NodeConfig>,
    bus: Arc<dyn MessageBus>,
    redelivery: Arc<RedeliveryService>,
    inbox: Arc<InboxService>,
    scheduler: TaskManager,
    maintenance: MaintenanceFlag,
    router: axum::Router,
    pub store: Arc<MemoryActivityStore>,
    pub monitor_store: Arc<MemoryMonitorStore>,
    pub writer: Arc<AnchorWriter>,
    pub anchor_index: Arc<MemoryAnchorIndex>,
}

impl Node {
    /// Build a node over the in-memory broker and stores.
    pub async fn build(
        config: NodeConfig,
        key_resolver: Box<dyn KeyResolver>,
    ) -> anyhow::Result<Node> {
        let config = Arc::new(config);

        // Broker behind the managed connection front-end.
        let broker = MemoryBroker::new();
        let bus: Arc<dyn MessageBus> = Arc::new(
            ManagedBus::open(
                Arc::new(MemoryConnector::new(broker)),
                ConnectionSettings::default(),
            )
            .await?,
        );

        // Stores.
        let store = Arc::new(MemoryActivityStore::new());
        let monitor_store = Arc::new(MemoryMonitorStore::new());
        let cursor_store = Arc::new(MemoryCursorStore::new());
        let entry_store = Arc::new(MemoryEntryStore::new());
        let vc_store = Arc::new(MemoryVcStore::new());
        let witness_store = Arc::new(MemoryWitnessStore::new());
        let anchor_index = Arc::new(MemoryAnchorIndex::new());

        // Clients.
        let http = reqwest::Client::new();
        let discovery = Arc::new(DiscoveryClient::new(
            Arc::new(HttpDiscoveryFetcher::new(http.clone())),
            DiscoveryConfig::default(),
        ));
        let log_client: Arc<dyn LogClient> = Arc::new(HttpLogClient::new(http.clone()));

        // Server key; also the local witness key.
        let signing_key = shared_crypto::generate_keypair();
        let public_key_b64 = BASE64.encode(signing_key.verifying_key().as_bytes());
        let key_id = config.service_iri.join("keys/main").to_string();
        let witness: Arc<dyn LocalWitness> = Arc::new(Ed25519Witness::new(
            signing_key.clone(),
            format!("{key_id}#ed25519"),
            config.service_iri.origin().and_then(|o| Iri::parse(o).ok()),
        ));
        let signer = Arc::new(Ed25519Witness::new(
            signing_key.clone(),
            format!("{key_id}#server"),
            None,
        ));

        // Outbox and writer.
        let outbox = Arc::new(ActivityOutbox::new(
            config.service_iri.clone(),
            Arc::clone(&store) as Arc<dyn ActivityStore>,
            Arc::clone(&discovery),
            http.clone(),
            signing_key,
            key_id,
        ));
        let watcher = Arc::new(InclusionWatcher::new(
            Arc::clone(&log_client),
            Arc::clone(&discovery),
            entry_store,
        ));
        let writer = Arc::new(AnchorWriter::new(
            WriterConfig {
                max_witness_delay: config.max_witness_delay,
                ..WriterConfig::new(config.service_iri.clone(), config.cas_iri.clone())
            },
            WriterDeps {
                previous: Arc::clone(&anchor_index) as _,
                operations: Arc::clone(&anchor_index) as _,
                witnesses: Arc::new(DiscoveryWitnessResolver {
                    discovery: Arc::clone(&discovery),
                }),
                local_witness: Some(Arc::clone(&witness)),
                signer,
                vc_store,
                witness_store,
                outbox: Arc::clone(&outbox) as _,
                graph: Arc::new(MemoryAnchorGraph::new(config.cas_iri.clone())),
                monitor: Arc::clone(&watcher) as _,
                activity_store: Arc::clone(&store) as _,
                bus: Arc::clone(&bus),
            },
        ));

        // Federation handler and the pipeline services.
        let handler = Arc::new(MeshActivityHandler::new(
            config.service_iri.clone(),
            Arc::clone(&store) as _,
            Arc::clone(&monitor_store) as Arc<dyn MonitorStore>,
            Arc::clone(&outbox) as _,
            Some(witness),
            Arc::clone(&writer),
        ));

        let redelivery = Arc::new(RedeliveryService::new(
            Arc::clone(&bus),
            config.redelivery.clone(),
        ));

        let mut inbox_config =
            InboxConfig::new(config.service_iri.clone(), config.inbox_topic.clone());
        inbox_config.auth_tokens = config.auth_tokens.clone();
        inbox_config.verify_actor_in_signature = config.verify_actor_in_signature;
        let inbox = Arc::new(InboxService::new(
            inbox_config,
            Arc::clone(&bus),
            Arc::clone(&store) as _,
            Arc::clone(&handler) as _,
        ));

        // Periodic jobs.
        let scheduler = TaskManager::new();
        let sync_task = Arc::new(AnchorSyncTask::new(
            config.service_iri.clone(),
            config.sync.clone(),
            Arc::clone(&store) as _,
            cursor_store,
            Arc::new(DiscoveryPager::new(Arc::clone(&discovery))),
            Arc::clone(&handler) as _,
        ));
        scheduler.register(
            Arc::new(SyncJob(Arc::clone(&sync_task))),
            sync_task.interval(),
            config.max_run_time,
        );
        scheduler.register(
            Arc::new(MonitorJob(Arc::new(LogMonitor::new(
                log_client,
                Arc::clone(&monitor_store) as _,
                config.monitor.clone(),
            )))),
            config.monitor_interval,
            config.max_run_time,
        );
        scheduler.register(
            Arc::new(WatcherJob(Arc::clone(&watcher))),
            config.watcher_interval,
            config.max_run_time,
        );

        // HTTP surface. The inbox route shares the router's state handle
        // so requests are refused until the router runs.
        let maintenance = MaintenanceFlag::new();
        let inbox_router = inbox_routes(
            &config.inbox_path,
            HttpState {
                config: inbox.config(),
                bus: Arc::clone(&bus),
                verifier: Some(Arc::new(HttpSignatureVerifier::new(key_resolver))),
                router_state: inbox.state(),
            },
        );
        let router = node_router(
            Arc::clone(&config),
            public_key_b64,
            maintenance.clone(),
            inbox_router,
        );

        Ok(Node {
            config,
            bus,
            redelivery,
            inbox,
            scheduler,
            maintenance,
            router,
            store,
            monitor_store,
            writer,
            anchor_index,
        })
    }

    /// Start the pipeline and the periodic jobs. The HTTP router refuses
    /// requests until this returns.
    pub async fn start(&self) -> anyhow::Result<()> {
        self.redelivery.start().await?;
        self.inbox.start().await?;
        self.scheduler.start();
        info!(service = %self.config.service_iri, "Node started");
        Ok(())
    }

    /// The HTTP router, ready to serve.
    #[must_use]
    pub fn router(&self) -> axum::Router {
        self.router.clone()
    }

    /// The maintenance flag for operational tooling.
    #[must_use]
    pub fn maintenance(&self) -> MaintenanceFlag {
        self.maintenance.clone()
    }

    /// The HTTP listen address.
    #[must_use]
    pub fn listen_addr(&self) -> &str {
        &self.config.listen_addr
    }

    /// Stop everything.
    pub async fn stop(&self) {
        self.scheduler.stop().await;
        self.inbox.stop();
        self.redelivery.stop();
        let _ = self.bus.close().await;
        info!("Node stopped");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared_crypto::StaticKeyResolver;

    #[tokio::test]
    async fn test_build_start_stop() {
        let node = Node::build(NodeConfig::default(), Box::new(StaticKeyResolver::new()))
            .await
            .unwrap();
        node.start().await.unwrap();
        node.stop().await;
    }
}
