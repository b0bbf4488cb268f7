//! # In-Memory Broker
//!
//! A broker implementation over tokio channels, suitable for single-node
//! operation and tests. A distributed deployment would put an AMQP adapter
//! behind the same [`MessageBus`] trait; the dead-letter and expiration
//! semantics here match what that adapter's queue arguments would configure.

use crate::bus::{
    AckHandle, BusError, Delivery, DeliveryStream, MessageBus, Outcome, QueueDeclaration,
    SubscribeOptions,
};
use crate::message::{death_reasons, properties, Message};
use crate::{pool, DEFAULT_CHANNEL_CAPACITY};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

struct Queue {
    name: String,
    declaration: Mutex<QueueDeclaration>,
    pending: Mutex<VecDeque<Message>>,
    consumers: Mutex<Vec<mpsc::Sender<Delivery>>>,
    next: AtomicUsize,
}

impl Queue {
    fn new(declaration: QueueDeclaration) -> Arc<Self> {
        Arc::new(Self {
            name: declaration.name.clone(),
            declaration: Mutex::new(declaration),
            pending: Mutex::new(VecDeque::new()),
            consumers: Mutex::new(Vec::new()),
            next: AtomicUsize::new(0),
        })
    }

    /// Pick a live consumer round-robin, pruning closed channels.
    fn pick_consumer(&self) -> Option<mpsc::Sender<Delivery>> {
        let mut consumers = self.consumers.lock();
        consumers.retain(|c| !c.is_closed());
        if consumers.is_empty() {
            return None;
        }
        let idx = self.next.fetch_add(1, Ordering::Relaxed) % consumers.len();
        Some(consumers[idx].clone())
    }
}

struct Inner {
    queues: Mutex<HashMap<String, Arc<Queue>>>,
    closed: AtomicBool,
}

impl Inner {
    fn queue(&self, name: &str) -> Arc<Queue> {
        let mut queues = self.queues.lock();
        queues
            .entry(name.to_string())
            .or_insert_with(|| Queue::new(QueueDeclaration::named(name)))
            .clone()
    }
}

/// The in-memory [`MessageBus`].
///
/// Clones share state; a clone is a new channel on the same connection.
#[derive(Clone)]
pub struct MemoryBroker {
    inner: Arc<Inner>,
}

impl Default for MemoryBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBroker {
    /// A new, empty broker.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Inner {
                queues: Mutex::new(HashMap::new()),
                closed: AtomicBool::new(false),
            }),
        }
    }

    fn deliver(inner: &Arc<Inner>, queue: &Arc<Queue>, message: Message) {
        if inner.closed.load(Ordering::Acquire) {
            return;
        }

        let Some(consumer) = queue.pick_consumer() else {
            if let Some(ttl) = message.expiration() {
                // No consumer and a TTL: the message sits until it expires,
                // then dead-letters. This is the wait-queue path.
                let inner = Arc::clone(inner);
                let queue = Arc::clone(queue);
                tokio::spawn(async move {
                    tokio::time::sleep(ttl).await;
                    Self::dead_letter(&inner, &queue, message, death_reasons::EXPIRED);
                });
            } else {
                queue.pending.lock().push_back(message);
            }
            return;
        };

        let (ack_tx, ack_rx) = oneshot::channel();
        let delivery = Delivery {
            message: message.clone(),
            ack: AckHandle::new(ack_tx),
        };

        let inner = Arc::clone(inner);
        let queue = Arc::clone(queue);
        tokio::spawn(async move {
            if consumer.send(delivery).await.is_err() {
                // Consumer went away between pick and send; try again.
                Self::deliver(&inner, &queue, message);
                return;
            }
            match ack_rx.await {
                Ok(Outcome::Ack) => {}
                Ok(Outcome::Nack) => {
                    let requeue = queue.declaration.lock().requeue_on_nack;
                    if requeue {
                        Self::deliver(&inner, &queue, message);
                    } else {
                        Self::dead_letter(&inner, &queue, message, death_reasons::REJECTED);
                    }
                }
                Err(_) => {
                    debug!(queue = %queue.name, id = %message.id, "Delivery abandoned");
                }
            }
        });
    }

    fn dead_letter(inner: &Arc<Inner>, queue: &Arc<Queue>, mut message: Message, reason: &str) {
        let target = queue.declaration.lock().dead_letter.clone();
        let Some(target) = target else {
            warn!(queue = %queue.name, id = %message.id, reason, "Message dropped (no dead-letter target)");
            return;
        };

        let deaths = message
            .property(properties::DEATH)
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(0);
        message.set_property(properties::DEATH, (deaths + 1).to_string());
        if message.property(properties::FIRST_DEATH_QUEUE).is_none() {
            message.set_property(properties::FIRST_DEATH_QUEUE, queue.name.clone());
            message.set_property(properties::FIRST_DEATH_REASON, reason);
        }
        // TTL is consumed by the death; it must not re-arm on the target.
        message.remove_property(properties::EXPIRATION);

        debug!(from = %queue.name, to = %target, id = %message.id, reason, "Dead-lettering");
        let target_queue = inner.queue(&target);
        Self::deliver(inner, &target_queue, message);
    }

    fn subscribe_one(&self, queue: &Arc<Queue>) -> DeliveryStream {
        let (tx, rx) = mpsc::channel(DEFAULT_CHANNEL_CAPACITY);
        queue.consumers.lock().push(tx);

        // Drain anything parked while the queue had no consumer.
        let parked: Vec<Message> = queue.pending.lock().drain(..).collect();
        for message in parked {
            Self::deliver(&self.inner, queue, message);
        }

        DeliveryStream::new(rx)
    }
}

#[async_trait]
impl MessageBus for MemoryBroker {
    async fn declare_queue(&self, declaration: QueueDeclaration) -> Result<(), BusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let queue = self.inner.queue(&declaration.name);
        *queue.declaration.lock() = declaration;
        Ok(())
    }

    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), BusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BusError::Transient("bus closed".to_string()));
        }
        let queue = self.inner.queue(topic);
        for message in messages {
            Self::deliver(&self.inner, &queue, message);
        }
        Ok(())
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<DeliveryStream, BusError> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(BusError::Closed);
        }
        let queue = self.inner.queue(topic);

        if options.pool_size <= 1 {
            return Ok(self.subscribe_one(&queue));
        }

        let streams = (0..options.pool_size)
            .map(|_| self.subscribe_one(&queue))
            .collect();
        Ok(pool::merge(streams))
    }

    async fn close(&self) -> Result<(), BusError> {
        self.inner.closed.store(true, Ordering::Release);
        let queues: Vec<Arc<Queue>> = self.inner.queues.lock().values().cloned().collect();
        for queue in queues {
            queue.consumers.lock().clear();
        }
        Ok(())
    }
}
