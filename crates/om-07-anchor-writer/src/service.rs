//! The write pipeline.

use crate::config::WriterConfig;
use crate::domain::{VcStatus, WitnessEntry, WriterError};
use crate::ports::{
    AnchorGraph, CredentialSigner, InclusionMonitor, LocalWitness, OperationProcessor, Outbox,
    PreviousAnchorResolver, VcStore, WitnessResolver, WitnessStore,
};
use crate::witness::dedupe_witnesses;
use chrono::Utc;
use mesh_telemetry::metrics;
use om_03_activity_store::{collect_all, ActivityStore, Criteria};
use om_06_inclusion_watcher::InclusionEntry;
use om_08_hashlink::HashlinkCodec;
use serde_json::json;
use shared_bus::{message::topics, Message, MessageBus};
use shared_types::activity::ANCHOR_WITNESS_IRI;
use shared_types::{
    Activity, ActivityKind, AnchorCredential, AnchorSubject, Iri, OperationReference,
    PreviousAnchor, ReferenceType, PUBLIC_IRI,
};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

/// Collaborators of the writer, injected at wiring time.
pub struct WriterDeps {
    pub previous: Arc<dyn PreviousAnchorResolver>,
    pub operations: Arc<dyn OperationProcessor>,
    pub witnesses: Arc<dyn WitnessResolver>,
    pub local_witness: Option<Arc<dyn LocalWitness>>,
    pub signer: Arc<dyn CredentialSigner>,
    pub vc_store: Arc<dyn VcStore>,
    pub witness_store: Arc<dyn WitnessStore>,
    pub outbox: Arc<dyn Outbox>,
    pub graph: Arc<dyn AnchorGraph>,
    pub monitor: Arc<dyn InclusionMonitor>,
    pub activity_store: Arc<dyn ActivityStore>,
    pub bus: Arc<dyn MessageBus>,
}

/// The anchor writer.
pub struct AnchorWriter {
    config: WriterConfig,
    deps: WriterDeps,
    codec: HashlinkCodec,
}

impl AnchorWriter {
    /// A new writer.
    #[must_use]
    pub fn new(config: WriterConfig, deps: WriterDeps) -> Self {
        Self {
            config,
            deps,
            codec: HashlinkCodec::default(),
        }
    }

    /// Write an anchor for a batch: build, witness, sign, store, and offer
    /// the credential.
    pub async fn write_anchor(
        &self,
        core_index: &str,
        operations: &[OperationReference],
        version: u64,
    ) -> Result<Iri, WriterError> {
        // 1. Previous-anchor lookup. A non-Create operation with no prior
        // anchor cannot be anchored at all.
        let suffixes: Vec<String> = operations
            .iter()
            .map(|op| op.unique_suffix.clone())
            .collect();
        let previous = self.deps.previous.latest_anchors(&suffixes).await?;

        let mut previous_anchors = Vec::with_capacity(operations.len());
        for op in operations {
            let anchor = previous.get(&op.unique_suffix).cloned().flatten();
            if anchor.is_none() && op.kind != shared_types::OperationType::Create {
                return Err(WriterError::fatal(format!(
                    "operation {} has type {:?} but no previous anchor",
                    op.unique_suffix, op.kind
                )));
            }
            previous_anchors.push(PreviousAnchor {
                suffix: op.unique_suffix.clone(),
                anchor,
            });
        }

        // 2. Build the credential.
        let vc_id = self
            .config
            .service_iri
            .join(&format!("vc/{}", Uuid::new_v4()));
        let mut vc = AnchorCredential::new(
            vc_id.clone(),
            self.config.service_iri.clone(),
            Utc::now(),
            AnchorSubject {
                operation_count: operations.len() as u64,
                core_index: core_index.to_string(),
                namespace: self.config.namespace.clone(),
                version,
                previous_anchors,
                anchor_origin: self.config.service_iri.clone(),
            },
        );

        // 3. Witness list from the operations' anchor origins.
        let batch_witnesses = self.batch_witnesses(operations).await?;

        // 4. Local witness or server signature; the signed credential is
        // durable before anything is broadcast.
        let use_local = self.deps.local_witness.is_some()
            && (batch_witnesses.contains(&self.config.service_iri)
                || self.config.sign_with_local_witness);
        if use_local {
            // The option was checked above.
            let local = self
                .deps
                .local_witness
                .as_ref()
                .ok_or_else(|| WriterError::fatal("local witness disappeared"))?;
            let proof = local.witness(&vc).await?;
            vc.add_proof(proof.clone());

            if let Some(domain) = proof.domain.clone() {
                let raw = serde_json::to_vec(&vc).map_err(WriterError::fatal)?;
                self.deps
                    .monitor
                    .watch(InclusionEntry {
                        vc_id: vc.id.clone(),
                        credential_raw: raw,
                        domain,
                        created: proof.created,
                        expiration: proof.created
                            + chrono::Duration::from_std(self.config.max_witness_delay)
                                .unwrap_or_else(|_| chrono::Duration::seconds(600)),
                    })
                    .await?;
            }
        } else {
            self.deps.signer.sign(&mut vc).await?;
        }
        self.deps
            .vc_store
            .put(&vc)
            .await
            .map_err(|e| WriterError::transient(e))?;

        // 5. Witness records and in-process status; the Offer must find a
        // non-empty witness set in storage.
        let system_witnesses = self.system_witnesses().await?;
        let mut entries = Vec::new();
        for witness in batch_witnesses
            .iter()
            .filter(|w| **w != self.config.service_iri)
            .chain(system_witnesses.iter())
        {
            entries.push(WitnessEntry {
                iri: witness.clone(),
                has_log: self.deps.witnesses.has_log(witness).await,
            });
        }
        if entries.is_empty() {
            return Err(WriterError::Transient(
                "no witnesses configured for anchor offer".to_string(),
            ));
        }
        self.deps.witness_store.put_witnesses(&vc.id, &entries).await?;
        self.deps
            .witness_store
            .set_status(&vc.id, VcStatus::InProcess)
            .await?;

        // 6. Post the Offer.
        let now = Utc::now();
        let mut recipients: Vec<Iri> = entries.iter().map(|e| e.iri.clone()).collect();
        recipients.push(Iri::parse(PUBLIC_IRI).map_err(WriterError::fatal)?);
        let mut offer = Activity::new(
            self.activity_iri(),
            ActivityKind::Offer,
            self.config.service_iri.clone(),
        )
        .published(now)
        .to(dedupe_witnesses(recipients))
        .object(serde_json::to_value(&vc).map_err(WriterError::fatal)?)
        .target(json!({ "id": ANCHOR_WITNESS_IRI }));
        offer.start_time = Some(now);
        offer.end_time = Some(
            now + chrono::Duration::from_std(self.config.max_witness_delay)
                .unwrap_or_else(|_| chrono::Duration::seconds(600)),
        );

        self.deps
            .outbox
            .post(offer)
            .await
            .map_err(|e| WriterError::fatal(e))?;

        metrics::ANCHORS_WRITTEN.inc();
        info!(vc = %vc.id, witnesses = entries.len(), "Anchor credential offered for witnessing");
        Ok(vc.id)
    }

    /// Complete a credential whose witness proofs have been assembled:
    /// store it, add it to the anchor graph, publish the hashlink on the
    /// local anchor channel, and broadcast the Create.
    pub async fn complete_witnessing(&self, vc: AnchorCredential) -> Result<String, WriterError> {
        // Store first; every failure after this point is non-retryable
        // because the anchor is already durable.
        self.deps
            .vc_store
            .put(&vc)
            .await
            .map_err(|e| WriterError::transient(e))?;

        let hashlink = self.deps.graph.add(&vc).await.map_err(|e| match e {
            WriterError::Transient(msg) => WriterError::NonRetryable(msg),
            other => other,
        })?;

        if let Err(e) = self
            .deps
            .bus
            .publish(
                topics::ANCHOR,
                vec![Message::new(hashlink.clone().into_bytes())],
            )
            .await
        {
            return Err(WriterError::fatal(e));
        }

        let resource_hash = self
            .codec
            .parse(&hashlink)
            .map_err(WriterError::fatal)?
            .resource_hash;

        let mut recipients = self.followers().await?;
        recipients.push(Iri::parse(PUBLIC_IRI).map_err(WriterError::fatal)?);

        let create = Activity::new(
            self.activity_iri(),
            ActivityKind::Create,
            self.config.service_iri.clone(),
        )
        .published(Utc::now())
        .to(dedupe_witnesses(recipients))
        .object(serde_json::to_value(&vc).map_err(WriterError::fatal)?)
        .target(json!({
            "id": self.config.cas_iri.join(&resource_hash).as_str(),
            "cid": hashlink,
            "type": "ContentAddressedStorage",
        }));

        self.deps
            .witness_store
            .set_status(&vc.id, VcStatus::Completed)
            .await
            .unwrap_or_else(|e| warn!(vc = %vc.id, error = %e, "Failed to update status"));

        self.deps
            .outbox
            .post(create)
            .await
            .map_err(|e| WriterError::fatal(e))?;

        info!(vc = %vc.id, hl = %hashlink, "Anchor published");
        Ok(hashlink)
    }

    fn activity_iri(&self) -> Iri {
        self.config
            .service_iri
            .join(&format!("activities/{}", Uuid::new_v4()))
    }

    /// Witness IRIs derived from the batch's anchor origins, deduplicated
    /// in insertion order.
    async fn batch_witnesses(
        &self,
        operations: &[OperationReference],
    ) -> Result<Vec<Iri>, WriterError> {
        let mut witnesses = Vec::with_capacity(operations.len());
        for op in operations {
            let origin = if op.kind.declares_origin() {
                op.anchor_origin.clone().ok_or_else(|| {
                    WriterError::fatal(format!(
                        "operation {} declares no anchor origin",
                        op.unique_suffix
                    ))
                })?
            } else {
                self.deps.operations.anchor_origin(&op.unique_suffix).await?
            };
            witnesses.push(self.deps.witnesses.witness_iri(&origin).await?);
        }
        Ok(dedupe_witnesses(witnesses))
    }

    async fn system_witnesses(&self) -> Result<Vec<Iri>, WriterError> {
        let iterator = self
            .deps
            .activity_store
            .query_references(
                ReferenceType::Witness,
                &Criteria::for_object(self.config.service_iri.clone()),
            )
            .await
            .map_err(WriterError::transient)?;
        collect_all(iterator).map_err(WriterError::transient)
    }

    async fn followers(&self) -> Result<Vec<Iri>, WriterError> {
        let iterator = self
            .deps
            .activity_store
            .query_references(
                ReferenceType::Follower,
                &Criteria::for_object(self.config.service_iri.clone()),
            )
            .await
            .map_err(WriterError::transient)?;
        collect_all(iterator).map_err(WriterError::transient)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::MemoryAnchorGraph;
    use async_trait::async_trait;
    use om_03_activity_store::MemoryActivityStore;
    use parking_lot::Mutex;
    use shared_bus::MemoryBroker;
    use shared_bus::SubscribeOptions;
    use shared_types::{OperationType, ProcessingError, Proof};
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::time::timeout;

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    fn service() -> Iri {
        iri("https://this.example.com/services/anchor")
    }

    /// Shared event log that records the order of storage and wire
    /// operations.
    #[derive(Default)]
    struct EventLog(Mutex<Vec<String>>);

    impl EventLog {
        fn push(&self, event: impl Into<String>) {
            self.0.lock().push(event.into());
        }

        fn events(&self) -> Vec<String> {
            self.0.lock().clone()
        }
    }

    struct StubPrevious {
        anchors: HashMap<String, Option<String>>,
    }

    #[async_trait]
    impl PreviousAnchorResolver for StubPrevious {
        async fn latest_anchors(
            &self,
            suffixes: &[String],
        ) -> Result<HashMap<String, Option<String>>, WriterError> {
            Ok(suffixes
                .iter()
                .map(|s| (s.clone(), self.anchors.get(s).cloned().flatten()))
                .collect())
        }
    }

    struct StubOperations;

    #[async_trait]
    impl OperationProcessor for StubOperations {
        async fn anchor_origin(&self, _suffix: &str) -> Result<Iri, WriterError> {
            Ok(iri("https://origin.example.com"))
        }
    }

    struct StubWitnessResolver;

    #[async_trait]
    impl WitnessResolver for StubWitnessResolver {
        async fn witness_iri(&self, origin: &Iri) -> Result<Iri, WriterError> {
            Ok(origin.join("services/anchor"))
        }

        async fn has_log(&self, _witness: &Iri) -> bool {
            true
        }
    }

    struct RecordingVcStore {
        log: Arc<EventLog>,
        stored: Mutex<Vec<AnchorCredential>>,
    }

    #[async_trait]
    impl VcStore for RecordingVcStore {
        async fn put(&self, vc: &AnchorCredential) -> Result<(), WriterError> {
            self.log.push("vc-store");
            self.stored.lock().push(vc.clone());
            Ok(())
        }

        async fn get(&self, id: &Iri) -> Result<AnchorCredential, WriterError> {
            self.stored
                .lock()
                .iter()
                .rev()
                .find(|vc| &vc.id == id)
                .cloned()
                .ok_or_else(|| WriterError::fatal("not stored"))
        }
    }

    struct RecordingWitnessStore {
        log: Arc<EventLog>,
        witnesses: Mutex<Vec<WitnessEntry>>,
    }

    #[async_trait]
    impl WitnessStore for RecordingWitnessStore {
        async fn put_witnesses(
            &self,
            _vc_id: &Iri,
            witnesses: &[WitnessEntry],
        ) -> Result<(), WriterError> {
            self.log.push(format!("witness-store:{}", witnesses.len()));
            self.witnesses.lock().extend_from_slice(witnesses);
            Ok(())
        }

        async fn set_status(&self, _vc_id: &Iri, status: VcStatus) -> Result<(), WriterError> {
            self.log.push(format!("status:{status:?}"));
            Ok(())
        }
    }

    struct RecordingOutbox {
        log: Arc<EventLog>,
        posted: Mutex<Vec<Activity>>,
    }

    #[async_trait]
    impl Outbox for RecordingOutbox {
        async fn post(&self, activity: Activity) -> Result<(), WriterError> {
            self.log.push(format!("post:{}", activity.kind));
            self.posted.lock().push(activity);
            Ok(())
        }
    }

    struct StubMonitor {
        watched: Mutex<Vec<InclusionEntry>>,
    }

    #[async_trait]
    impl InclusionMonitor for StubMonitor {
        async fn watch(&self, entry: InclusionEntry) -> Result<(), ProcessingError> {
            self.watched.lock().push(entry);
            Ok(())
        }
    }

    struct LocalProof;

    #[async_trait]
    impl LocalWitness for LocalProof {
        async fn witness(&self, _vc: &AnchorCredential) -> Result<Proof, WriterError> {
            Ok(Proof {
                kind: "Ed25519Signature2020".to_string(),
                domain: Some(iri("https://this.example.com")),
                created: Utc::now(),
                verification_method: "did:web:this.example.com#key-1".to_string(),
                proof_purpose: "assertionMethod".to_string(),
                proof_value: "zsig".to_string(),
            })
        }
    }

    struct NoopSigner;

    #[async_trait]
    impl CredentialSigner for NoopSigner {
        async fn sign(&self, vc: &mut AnchorCredential) -> Result<(), WriterError> {
            vc.add_proof(Proof {
                kind: "Ed25519Signature2020".to_string(),
                domain: None,
                created: Utc::now(),
                verification_method: "did:web:this.example.com#server".to_string(),
                proof_purpose: "assertionMethod".to_string(),
                proof_value: "zserver".to_string(),
            });
            Ok(())
        }
    }

    struct Fixture {
        log: Arc<EventLog>,
        bus: MemoryBroker,
        outbox: Arc<RecordingOutbox>,
        vc_store: Arc<RecordingVcStore>,
        monitor: Arc<StubMonitor>,
        activity_store: Arc<MemoryActivityStore>,
        writer: AnchorWriter,
    }

    fn fixture_with(
        previous: HashMap<String, Option<String>>,
        local_witness: bool,
    ) -> Fixture {
        let log = Arc::new(EventLog::default());
        let bus = MemoryBroker::new();
        let outbox = Arc::new(RecordingOutbox {
            log: Arc::clone(&log),
            posted: Mutex::new(Vec::new()),
        });
        let vc_store = Arc::new(RecordingVcStore {
            log: Arc::clone(&log),
            stored: Mutex::new(Vec::new()),
        });
        let witness_store = Arc::new(RecordingWitnessStore {
            log: Arc::clone(&log),
            witnesses: Mutex::new(Vec::new()),
        });
        let monitor = Arc::new(StubMonitor {
            watched: Mutex::new(Vec::new()),
        });
        let activity_store = Arc::new(MemoryActivityStore::new());

        let config = WriterConfig::new(service(), iri("https://this.example.com/cas"));
        let deps = WriterDeps {
            previous: Arc::new(StubPrevious { anchors: previous }),
            operations: Arc::new(StubOperations),
            witnesses: Arc::new(StubWitnessResolver),
            local_witness: if local_witness {
                Some(Arc::new(LocalProof))
            } else {
                None
            },
            signer: Arc::new(NoopSigner),
            vc_store: Arc::clone(&vc_store) as Arc<dyn VcStore>,
            witness_store: witness_store as Arc<dyn WitnessStore>,
            outbox: Arc::clone(&outbox) as Arc<dyn Outbox>,
            graph: Arc::new(MemoryAnchorGraph::new(iri("https://this.example.com/cas"))),
            monitor: Arc::clone(&monitor) as Arc<dyn InclusionMonitor>,
            activity_store: Arc::clone(&activity_store) as Arc<dyn ActivityStore>,
            bus: Arc::new(bus.clone()),
        };

        Fixture {
            log,
            bus,
            outbox,
            vc_store,
            monitor,
            activity_store,
            writer: AnchorWriter::new(config, deps),
        }
    }

    fn create_op(suffix: &str, origin: &str) -> OperationReference {
        OperationReference {
            unique_suffix: suffix.to_string(),
            kind: OperationType::Create,
            anchor_origin: Some(iri(origin)),
        }
    }

    #[tokio::test]
    async fn test_write_anchor_offers_with_witnesses_stored_first() {
        let f = fixture_with(HashMap::new(), true);

        f.writer
            .write_anchor(
                "hl:uEiAcore",
                &[
                    create_op("s1", "https://origin1.example.com"),
                    create_op("s2", "https://origin2.example.com"),
                    create_op("s3", "https://origin1.example.com"),
                ],
                1,
            )
            .await
            .unwrap();

        // Witness records and status precede the Offer on the wire.
        let events = f.log.events();
        let witness_at = events
            .iter()
            .position(|e| e.starts_with("witness-store"))
            .expect("witness store event");
        let offer_at = events
            .iter()
            .position(|e| e == "post:Offer")
            .expect("offer event");
        assert!(witness_at < offer_at, "events: {events:?}");

        // Origins deduplicated: two distinct witnesses.
        assert_eq!(events[witness_at], "witness-store:2");

        // The Offer carries the credential, the witnessing window, and the
        // witness target.
        let posted = f.outbox.posted.lock();
        let offer = &posted[0];
        assert_eq!(offer.kind, ActivityKind::Offer);
        assert!(offer.start_time.is_some() && offer.end_time.is_some());
        assert_eq!(
            offer.target.as_ref().and_then(|t| t.get("id")).and_then(|v| v.as_str()),
            Some(ANCHOR_WITNESS_IRI)
        );
        assert!(offer.to.iter().any(|iri| iri.as_str() == PUBLIC_IRI));

        // Local witnessing registered the credential for inclusion watch.
        assert_eq!(f.monitor.watched.lock().len(), 1);

        // The signed credential was stored.
        assert_eq!(f.vc_store.stored.lock().len(), 1);
        assert_eq!(f.vc_store.stored.lock()[0].proof.len(), 1);
    }

    #[tokio::test]
    async fn test_no_witnesses_is_transient() {
        let f = fixture_with(HashMap::new(), false);

        // The only witness resolves to this service itself and there are
        // no system witnesses, so the filtered set is empty.
        let err = f
            .writer
            .write_anchor(
                "hl:uEiAcore",
                &[create_op("s1", "https://this.example.com")],
                1,
            )
            .await
            .unwrap_err();
        assert!(err.is_transient(), "got {err:?}");

        // Nothing was offered.
        assert!(f.outbox.posted.lock().is_empty());
    }

    #[tokio::test]
    async fn test_update_without_previous_anchor_is_fatal() {
        let f = fixture_with(HashMap::new(), true);

        let err = f
            .writer
            .write_anchor(
                "hl:uEiAcore",
                &[OperationReference {
                    unique_suffix: "s1".to_string(),
                    kind: OperationType::Update,
                    anchor_origin: None,
                }],
                1,
            )
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }

    #[tokio::test]
    async fn test_server_signature_when_no_local_witness() {
        let f = fixture_with(HashMap::new(), false);

        f.writer
            .write_anchor(
                "hl:uEiAcore",
                &[create_op("s1", "https://origin1.example.com")],
                1,
            )
            .await
            .unwrap();

        assert!(f.monitor.watched.lock().is_empty());
        let stored = f.vc_store.stored.lock();
        assert_eq!(stored[0].proof[0].verification_method, "did:web:this.example.com#server");
    }

    #[tokio::test]
    async fn test_complete_witnessing_publishes_and_broadcasts() {
        let f = fixture_with(HashMap::new(), true);
        f.activity_store
            .add_reference(
                ReferenceType::Follower,
                &service(),
                &iri("https://peer1.example.com/services/anchor"),
            )
            .await
            .unwrap();

        let mut anchor_channel = f
            .bus
            .subscribe(topics::ANCHOR, SubscribeOptions::default())
            .await
            .unwrap();

        let vc = AnchorCredential::new(
            service().join("vc/1"),
            service(),
            Utc::now(),
            AnchorSubject {
                operation_count: 1,
                core_index: "hl:uEiAcore".to_string(),
                namespace: "did:orb".to_string(),
                version: 1,
                previous_anchors: Vec::new(),
                anchor_origin: service(),
            },
        );

        let hashlink = f.writer.complete_witnessing(vc.clone()).await.unwrap();
        assert!(hashlink.starts_with("hl:"));

        // The hashlink reached the local anchor channel.
        let published = timeout(Duration::from_millis(200), anchor_channel.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(published.message.payload, hashlink.as_bytes());
        published.ack.ack();

        // The Create's target is the content-addressed object.
        let posted = f.outbox.posted.lock();
        let create = posted.iter().find(|a| a.kind == ActivityKind::Create).unwrap();
        let target = create.target.as_ref().unwrap();
        assert_eq!(target.get("cid").and_then(|v| v.as_str()), Some(hashlink.as_str()));
        assert_eq!(
            target.get("type").and_then(|v| v.as_str()),
            Some("ContentAddressedStorage")
        );
        assert!(target
            .get("id")
            .and_then(|v| v.as_str())
            .is_some_and(|id| id.starts_with("https://this.example.com/cas/")));

        // Followers and the public collection are addressed.
        assert!(create
            .to
            .iter()
            .any(|i| i.as_str() == "https://peer1.example.com/services/anchor"));
        assert!(create.to.iter().any(|i| i.as_str() == PUBLIC_IRI));

        // Store happened before the broadcast.
        let events = f.log.events();
        let store_at = events.iter().position(|e| e == "vc-store").unwrap();
        let create_at = events.iter().position(|e| e == "post:Create").unwrap();
        assert!(store_at < create_at);
    }
}
