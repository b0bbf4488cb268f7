//! Offer/witness/accept/create choreography between two services.

#[cfg(test)]
mod tests {
    use async_trait::async_trait;
    use node_runtime::handlers::MeshActivityHandler;
    use om_02_inbox::ActivityHandler;
    use om_03_activity_store::{ActivityStore, MemoryActivityStore};
    use om_05_log_monitor::{MemoryMonitorStore, MonitorStore};
    use om_06_inclusion_watcher::InclusionEntry;
    use om_07_anchor_writer::{
        AnchorWriter, Ed25519Witness, InclusionMonitor, LocalWitness, MemoryAnchorGraph,
        MemoryAnchorIndex, MemoryVcStore, MemoryWitnessStore, Outbox, PreviousAnchorResolver,
        VcStatus, WitnessResolver, WriterConfig, WriterDeps, WriterError,
    };
    use om_08_hashlink::HashlinkCodec;
    use parking_lot::Mutex;
    use shared_bus::{message::topics, MemoryBroker, MessageBus, SubscribeOptions};
    use shared_types::{
        Activity, ActivityKind, Iri, OperationReference, OperationType, ProcessingError,
        ReferenceType,
    };
    use std::sync::Arc;
    use std::time::Duration;
    use tokio::time::timeout;

    fn iri(s: &str) -> Iri {
        Iri::parse(s).unwrap()
    }

    fn anchor_service() -> Iri {
        iri("https://anchor.example.com/services/anchor")
    }

    fn witness_service() -> Iri {
        iri("https://witness.example.com/services/anchor")
    }

    /// Outbox that records instead of delivering.
    #[derive(Default)]
    struct RecordingOutbox {
        posted: Mutex<Vec<Activity>>,
    }

    impl RecordingOutbox {
        fn take(&self, kind: ActivityKind) -> Option<Activity> {
            self.posted.lock().iter().find(|a| a.kind == kind).cloned()
        }
    }

    #[async_trait]
    impl Outbox for RecordingOutbox {
        async fn post(&self, activity: Activity) -> Result<(), WriterError> {
            self.posted.lock().push(activity);
            Ok(())
        }
    }

    /// Witness resolution pinned to the witness service.
    struct FixedWitnessResolver;

    #[async_trait]
    impl WitnessResolver for FixedWitnessResolver {
        async fn witness_iri(&self, _origin: &Iri) -> Result<Iri, WriterError> {
            Ok(witness_service())
        }

        async fn has_log(&self, _witness: &Iri) -> bool {
            false
        }
    }

    /// Inclusion monitoring stub; the watcher's own tests cover it.
    #[derive(Default)]
    struct NullMonitor;

    #[async_trait]
    impl InclusionMonitor for NullMonitor {
        async fn watch(&self, _entry: InclusionEntry) -> Result<(), ProcessingError> {
            Ok(())
        }
    }

    struct Service {
        store: Arc<MemoryActivityStore>,
        outbox: Arc<RecordingOutbox>,
        witness_store: Arc<MemoryWitnessStore>,
        bus: MemoryBroker,
        writer: Arc<AnchorWriter>,
        handler: MeshActivityHandler,
    }

    fn build_service(service_iri: Iri, cas: &str) -> Service {
        let store = Arc::new(MemoryActivityStore::new());
        let outbox = Arc::new(RecordingOutbox::default());
        let witness_store = Arc::new(MemoryWitnessStore::new());
        let bus = MemoryBroker::new();
        let monitor_store = Arc::new(MemoryMonitorStore::new());

        let local_witness: Arc<dyn LocalWitness> = Arc::new(Ed25519Witness::new(
            shared_crypto::generate_keypair(),
            format!("{service_iri}/keys/main#ed25519"),
            Some(service_iri.clone()),
        ));

        let writer = Arc::new(AnchorWriter::new(
            WriterConfig::new(service_iri.clone(), iri(cas)),
            WriterDeps {
                previous: Arc::new(MemoryAnchorIndex::new()) as Arc<dyn PreviousAnchorResolver>,
                operations: Arc::new(MemoryAnchorIndex::new()) as _,
                witnesses: Arc::new(FixedWitnessResolver),
                local_witness: Some(Arc::clone(&local_witness)),
                signer: Arc::new(Ed25519Witness::new(
                    shared_crypto::generate_keypair(),
                    format!("{service_iri}/keys/main#server"),
                    None,
                )),
                vc_store: Arc::new(MemoryVcStore::new()),
                witness_store: Arc::clone(&witness_store) as _,
                outbox: Arc::clone(&outbox) as Arc<dyn Outbox>,
                graph: Arc::new(MemoryAnchorGraph::new(iri(cas))),
                monitor: Arc::new(NullMonitor),
                activity_store: Arc::clone(&store) as Arc<dyn ActivityStore>,
                bus: Arc::new(bus.clone()),
            },
        ));

        let handler = MeshActivityHandler::new(
            service_iri,
            Arc::clone(&store) as _,
            monitor_store as Arc<dyn MonitorStore>,
            Arc::clone(&outbox) as _,
            Some(local_witness),
            Arc::clone(&writer),
        );

        Service {
            store,
            outbox,
            witness_store,
            bus,
            writer,
            handler,
        }
    }

    fn batch() -> Vec<OperationReference> {
        vec![OperationReference {
            unique_suffix: "suffix-1".to_string(),
            kind: OperationType::Create,
            anchor_origin: Some(iri("https://origin.example.com")),
        }]
    }

    #[tokio::test]
    async fn test_offer_witness_accept_create_round() {
        let anchor_node = build_service(anchor_service(), "https://anchor.example.com/cas");
        let witness_node = build_service(witness_service(), "https://witness.example.com/cas");

        // A follower that must receive the final Create.
        anchor_node
            .store
            .add_reference(
                ReferenceType::Follower,
                &anchor_service(),
                &iri("https://peer9.example.com/services/anchor"),
            )
            .await
            .unwrap();

        let mut anchor_channel = anchor_node
            .bus
            .subscribe(topics::ANCHOR, SubscribeOptions::default())
            .await
            .unwrap();

        // 1. The anchor service writes a batch and offers it.
        let vc_id = anchor_node
            .writer
            .write_anchor("hl:uEiAcoreindex", &batch(), 1)
            .await
            .unwrap();

        // Witness records precede the Offer and are non-empty.
        assert_eq!(anchor_node.witness_store.witnesses(&vc_id).len(), 1);
        assert_eq!(
            anchor_node.witness_store.status(&vc_id),
            Some(VcStatus::InProcess)
        );
        let offer = anchor_node.outbox.take(ActivityKind::Offer).expect("offer posted");
        assert!(offer.to.contains(&witness_service()));

        // 2. The witness service handles the Offer and replies Accept with
        // its proof.
        let mut inbound_offer = offer.clone();
        inbound_offer.actor = Some(anchor_service());
        witness_node.handler.handle(&inbound_offer).await.unwrap();
        let accept = witness_node
            .outbox
            .take(ActivityKind::Accept)
            .expect("accept posted");
        assert!(accept.extra.contains_key("result"));

        // 3. The anchor service handles the Accept: the credential is
        // completed, the hashlink hits the anchor channel, the Create is
        // broadcast.
        anchor_node.handler.handle(&accept).await.unwrap();

        let published = timeout(Duration::from_millis(300), anchor_channel.recv())
            .await
            .expect("hashlink published")
            .unwrap();
        let hashlink = String::from_utf8(published.message.payload.clone()).unwrap();
        published.ack.ack();
        HashlinkCodec::default().parse(&hashlink).unwrap();

        let create = anchor_node
            .outbox
            .take(ActivityKind::Create)
            .expect("create broadcast");
        let target = create.target.as_ref().unwrap();
        assert_eq!(target["cid"], serde_json::Value::String(hashlink));
        assert_eq!(target["type"], "ContentAddressedStorage");
        assert!(create
            .to
            .contains(&iri("https://peer9.example.com/services/anchor")));
        assert_eq!(
            anchor_node.witness_store.status(&vc_id),
            Some(VcStatus::Completed)
        );
    }

    #[tokio::test]
    async fn test_offer_without_witnesses_never_leaves_the_node() {
        // A writer whose origins resolve to itself and with no system
        // witnesses has nobody to offer to.
        struct SelfResolver;

        #[async_trait]
        impl WitnessResolver for SelfResolver {
            async fn witness_iri(&self, _origin: &Iri) -> Result<Iri, WriterError> {
                Ok(anchor_service())
            }

            async fn has_log(&self, _witness: &Iri) -> bool {
                false
            }
        }

        let node = build_service(anchor_service(), "https://anchor.example.com/cas");
        let writer = AnchorWriter::new(
            WriterConfig::new(anchor_service(), iri("https://anchor.example.com/cas")),
            WriterDeps {
                previous: Arc::new(MemoryAnchorIndex::new()) as _,
                operations: Arc::new(MemoryAnchorIndex::new()) as _,
                witnesses: Arc::new(SelfResolver),
                local_witness: None,
                signer: Arc::new(Ed25519Witness::new(
                    shared_crypto::generate_keypair(),
                    "k#server".to_string(),
                    None,
                )),
                vc_store: Arc::new(MemoryVcStore::new()),
                witness_store: Arc::new(MemoryWitnessStore::new()) as _,
                outbox: Arc::clone(&node.outbox) as Arc<dyn Outbox>,
                graph: Arc::new(MemoryAnchorGraph::new(iri("https://anchor.example.com/cas"))),
                monitor: Arc::new(NullMonitor),
                activity_store: Arc::clone(&node.store) as _,
                bus: Arc::new(node.bus.clone()),
            },
        );

        let err = writer.write_anchor("hl:uEiAcore", &batch(), 1).await.unwrap_err();
        assert!(err.is_transient(), "retry must be possible once a witness exists");
        assert!(node.outbox.posted.lock().is_empty());
    }
}
