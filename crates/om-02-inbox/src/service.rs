//! The message router.

use crate::config::InboxConfig;
use crate::ports::ActivityHandler;
use mesh_telemetry::metrics;
use om_03_activity_store::ActivityStore;
use parking_lot::Mutex;
use shared_bus::{
    message::{properties, topics},
    BusError, Delivery, MessageBus, QueueDeclaration, SubscribeOptions,
};
use shared_types::{Activity, ProcessingError, ReferenceType, ServiceState, StateHandle};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Subscribes to the service topic and drives deliveries through the
/// dedupe/dispatch/persist sequence.
pub struct InboxService {
    config: Arc<InboxConfig>,
    bus: Arc<dyn MessageBus>,
    store: Arc<dyn ActivityStore>,
    handler: Arc<dyn ActivityHandler>,
    state: StateHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl InboxService {
    /// A new, unstarted router.
    #[must_use]
    pub fn new(
        config: InboxConfig,
        bus: Arc<dyn MessageBus>,
        store: Arc<dyn ActivityStore>,
        handler: Arc<dyn ActivityHandler>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            bus,
            store,
            handler,
            state: StateHandle::new(),
            worker: Mutex::new(None),
        }
    }

    /// The router's lifecycle handle, shared with the HTTP layer.
    #[must_use]
    pub fn state(&self) -> StateHandle {
        self.state.clone()
    }

    /// The inbox configuration.
    #[must_use]
    pub fn config(&self) -> Arc<InboxConfig> {
        Arc::clone(&self.config)
    }

    /// Declare the destination queue and start consuming.
    pub async fn start(&self) -> Result<(), BusError> {
        self.state.set(ServiceState::Starting);

        self.bus
            .declare_queue(
                QueueDeclaration::named(self.config.topic.as_str())
                    .dead_letter_to(topics::REDELIVERY),
            )
            .await?;

        let mut stream = self
            .bus
            .subscribe(
                &self.config.topic,
                SubscribeOptions::pooled(self.config.pool_size),
            )
            .await?;

        let config = Arc::clone(&self.config);
        let store = Arc::clone(&self.store);
        let handler = Arc::clone(&self.handler);
        let dispatcher = tokio::spawn(async move {
            while let Some(delivery) = stream.recv().await {
                let config = Arc::clone(&config);
                let store = Arc::clone(&store);
                let handler = Arc::clone(&handler);
                tokio::spawn(async move {
                    Self::process(&config, store.as_ref(), handler.as_ref(), delivery).await;
                });
            }
            debug!("Inbox stream closed");
        });

        *self.worker.lock() = Some(dispatcher);
        self.state.set(ServiceState::Running);
        info!(topic = %self.config.topic, pool = self.config.pool_size, "Inbox router running");
        Ok(())
    }

    /// Stop consuming.
    pub fn stop(&self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
        self.state.set(ServiceState::Stopped);
        info!("Inbox router stopped");
    }

    async fn process(
        config: &InboxConfig,
        store: &dyn ActivityStore,
        handler: &dyn ActivityHandler,
        delivery: Delivery,
    ) {
        let message = &delivery.message;

        // Deserialize and validate.
        let activity: Activity = match serde_json::from_slice(&message.payload) {
            Ok(a) => a,
            Err(e) => {
                warn!(error = %e, "Dropping undeserializable activity");
                delivery.ack.ack();
                return;
            }
        };
        let Some(actor) = activity.actor.clone() else {
            warn!(id = %activity.id, "Dropping activity without an actor");
            delivery.ack.ack();
            return;
        };

        if config.verify_actor_in_signature && !config.auth_tokens.is_empty() {
            if let Some(signed_actor) = message.property(properties::ACTOR_IRI) {
                if signed_actor != actor.as_str() {
                    warn!(
                        id = %activity.id,
                        actor = %actor,
                        signer = signed_actor,
                        "Dropping activity: actor differs from signer"
                    );
                    delivery.ack.ack();
                    return;
                }
            }
        }

        // Dedupe: a re-received activity was already handled and stored.
        match store.get_activity(&activity.id).await {
            Ok(_) => {
                debug!(id = %activity.id, "Duplicate delivery; already processed");
                metrics::INBOX_DUPLICATES.inc();
                delivery.ack.ack();
                return;
            }
            Err(e) if e.is_not_found() => {}
            Err(e) => {
                // Read failure before any side effect: retry is safe.
                warn!(id = %activity.id, error = %e, "Store lookup failed; redelivering");
                delivery.ack.nack();
                return;
            }
        }

        // Dispatch.
        match handler.handle(&activity).await {
            Ok(()) | Err(ProcessingError::DuplicateAnchorEvent) => {}
            Err(e) if e.is_transient() => {
                warn!(id = %activity.id, error = %e, "Transient handler error; redelivering");
                delivery.ack.nack();
                return;
            }
            Err(e) => {
                warn!(id = %activity.id, error = %e, "Persistent handler error; dropping");
                delivery.ack.ack();
                return;
            }
        }

        // Persist. The handler's side effects are done; a failure here is
        // logged but never redelivered.
        if let Err(e) = store.put_activity(&activity).await {
            error!(id = %activity.id, error = %e, "Failed to store handled activity");
        } else if let Err(e) = store
            .add_reference(ReferenceType::Inbox, &config.service_iri, &activity.id)
            .await
        {
            error!(id = %activity.id, error = %e, "Failed to add inbox reference");
        }
        metrics::INBOX_HANDLED.inc();
        delivery.ack.ack();
    }
}
