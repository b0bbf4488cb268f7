//! The redelivery handler.

use crate::backoff::redelivery_interval;
use crate::config::RedeliveryConfig;
use mesh_telemetry::metrics;
use parking_lot::Mutex;
use shared_bus::{
    message::{death_reasons, properties, topics},
    BusError, Delivery, MessageBus, QueueDeclaration, SubscribeOptions,
};
use shared_types::{NotStartedError, ServiceState, StateHandle};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// The single consumer of `orb.redelivery`.
///
/// Resolves each dead-lettered message's original destination and either
/// republishes it immediately, parks it on `orb.wait` with a backoff
/// expiration, or drops it once the attempt limit is reached.
pub struct RedeliveryService {
    bus: Arc<dyn MessageBus>,
    config: RedeliveryConfig,
    state: StateHandle,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl RedeliveryService {
    /// A new, unstarted service.
    #[must_use]
    pub fn new(bus: Arc<dyn MessageBus>, config: RedeliveryConfig) -> Self {
        Self {
            bus,
            config,
            state: StateHandle::new(),
            worker: Mutex::new(None),
        }
    }

    /// Declare the redelivery queues and start the handler.
    pub async fn start(&self) -> Result<(), BusError> {
        self.state.set(ServiceState::Starting);

        // A redelivery message that fails to republish is retried on the
        // same queue rather than dead-lettered into itself.
        self.bus
            .declare_queue(QueueDeclaration::named(topics::REDELIVERY).requeue_on_nack())
            .await?;
        self.bus
            .declare_queue(QueueDeclaration::named(topics::WAIT).dead_letter_to(topics::REDELIVERY))
            .await?;

        let mut stream = self
            .bus
            .subscribe(topics::REDELIVERY, SubscribeOptions::default())
            .await?;

        let bus = Arc::clone(&self.bus);
        let config = self.config.clone();
        let handle = tokio::spawn(async move {
            while let Some(delivery) = stream.recv().await {
                Self::handle(bus.as_ref(), &config, delivery).await;
            }
            debug!("Redelivery stream closed");
        });

        *self.worker.lock() = Some(handle);
        self.state.set(ServiceState::Running);
        info!("Redelivery service started");
        Ok(())
    }

    /// Stop consuming. In-flight handling completes on its own task.
    pub fn stop(&self) {
        if let Some(handle) = self.worker.lock().take() {
            handle.abort();
        }
        self.state.set(ServiceState::Stopped);
        info!("Redelivery service stopped");
    }

    /// The current lifecycle state.
    pub fn require_running(&self) -> Result<(), NotStartedError> {
        self.state.require_running()
    }

    async fn handle(bus: &dyn MessageBus, config: &RedeliveryConfig, delivery: Delivery) {
        let message = &delivery.message;

        // 1. Where was this message originally headed?
        let destination = message
            .property(properties::QUEUE)
            .or_else(|| message.property(properties::FIRST_DEATH_QUEUE))
            .map(str::to_string);
        let Some(destination) = destination else {
            debug!(id = %message.id, "No destination queue recorded; dropping");
            delivery.ack.ack();
            return;
        };

        // 2. Terminal drop once the attempt budget is spent.
        let count = message.redelivery_count();
        if count >= config.max_attempts {
            warn!(
                id = %message.id,
                queue = %destination,
                attempts = count,
                "Redelivery attempts exhausted; dropping"
            );
            metrics::REDELIVERY_DROPPED.inc();
            delivery.ack.ack();
            return;
        }

        let wait_elapsed = message.property(properties::FIRST_DEATH_REASON)
            == Some(death_reasons::EXPIRED);

        let mut copy = message.clone();
        copy.strip_death_properties();
        copy.set_property(properties::QUEUE, destination.clone());

        // 3. First failure, or the wait period just elapsed: go now.
        if count == 0 || wait_elapsed {
            copy.remove_property(properties::EXPIRATION);
            copy.set_property(properties::REDELIVERY_COUNT, (count + 1).to_string());

            match bus.publish(&destination, vec![copy]).await {
                Ok(()) => {
                    debug!(id = %message.id, queue = %destination, count = count + 1, "Redelivered");
                    metrics::REDELIVERY_REPUBLISHED.inc();
                    delivery.ack.ack();
                }
                Err(e) => {
                    warn!(id = %message.id, error = %e, "Republish failed; requeueing");
                    delivery.ack.nack();
                }
            }
            return;
        }

        // 4. Otherwise park on the wait queue for the backoff interval.
        let interval = redelivery_interval(config, count);
        copy.set_expiration(interval);
        copy.set_property(properties::REDELIVERY_COUNT, count.to_string());

        match bus.publish(topics::WAIT, vec![copy]).await {
            Ok(()) => {
                debug!(id = %message.id, wait = ?interval, count, "Parked on wait queue");
                metrics::REDELIVERY_WAITING.inc();
                delivery.ack.ack();
            }
            Err(e) => {
                warn!(id = %message.id, error = %e, "Publish to wait queue failed; requeueing");
                delivery.ack.nack();
            }
        }
    }
}
