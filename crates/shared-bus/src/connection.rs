//! # Connection Management
//!
//! A single broker connection carries a bounded number of subscriptions;
//! [`ManagedBus`] opens more connections as capacity is exhausted and
//! dispatches publishes round-robin over a pooled set of publisher channels.
//! The initial connect retries with capped exponential backoff and fails
//! loudly once the elapsed budget is spent.

use crate::bus::{BusError, DeliveryStream, MessageBus, QueueDeclaration, SubscribeOptions};
use crate::memory::MemoryBroker;
use crate::message::Message;
use crate::DEFAULT_MAX_SUBSCRIPTIONS_PER_CONNECTION;
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{info, warn};

/// Exponential backoff settings for the initial broker connect.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub initial_interval: Duration,
    pub multiplier: f64,
    pub max_interval: Duration,
    /// Total budget; once spent, the connect fails for good.
    pub max_elapsed: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_interval: Duration::from_secs(1),
            multiplier: 2.0,
            max_interval: Duration::from_secs(30),
            max_elapsed: Duration::from_secs(120),
        }
    }
}

/// Opens broker connections.
#[async_trait]
pub trait BusConnector: Send + Sync {
    /// Open one connection.
    async fn connect(&self) -> Result<Arc<dyn MessageBus>, BusError>;
}

/// Connector handing out channels on a shared in-memory broker.
pub struct MemoryConnector {
    broker: MemoryBroker,
}

impl MemoryConnector {
    /// Connector over an existing broker.
    #[must_use]
    pub fn new(broker: MemoryBroker) -> Self {
        Self { broker }
    }
}

#[async_trait]
impl BusConnector for MemoryConnector {
    async fn connect(&self) -> Result<Arc<dyn MessageBus>, BusError> {
        Ok(Arc::new(self.broker.clone()))
    }
}

/// Connect with capped exponential backoff.
///
/// Exhausting `max_elapsed` is unrecoverable: the node cannot run without a
/// broker, so the error propagates to the top.
pub async fn connect_with_backoff(
    connector: &dyn BusConnector,
    retry: &RetryConfig,
) -> Result<Arc<dyn MessageBus>, BusError> {
    let started = Instant::now();
    let mut interval = retry.initial_interval;
    let mut attempt = 0u32;

    loop {
        match connector.connect().await {
            Ok(bus) => {
                if attempt > 0 {
                    info!(attempt, "Broker connection established after retries");
                }
                return Ok(bus);
            }
            Err(e) => {
                attempt += 1;
                if started.elapsed() + interval > retry.max_elapsed {
                    return Err(BusError::ConnectionFailed(format!(
                        "giving up after {attempt} attempts: {e}"
                    )));
                }
                warn!(attempt, error = %e, retry_in = ?interval, "Broker connect failed");
                tokio::time::sleep(interval).await;
                interval = interval.mul_f64(retry.multiplier).min(retry.max_interval);
            }
        }
    }
}

/// Settings for [`ManagedBus`].
#[derive(Debug, Clone)]
pub struct ConnectionSettings {
    /// Subscriptions per connection before a new one is opened.
    pub max_subscriptions_per_connection: usize,
    /// Number of pooled publisher channels.
    pub publisher_pool_size: usize,
    /// Backoff for opening connections.
    pub retry: RetryConfig,
}

impl Default for ConnectionSettings {
    fn default() -> Self {
        Self {
            max_subscriptions_per_connection: DEFAULT_MAX_SUBSCRIPTIONS_PER_CONNECTION,
            publisher_pool_size: 1,
            retry: RetryConfig::default(),
        }
    }
}

struct ConnectionEntry {
    bus: Arc<dyn MessageBus>,
    subscriptions: usize,
}

/// Capacity-aware bus front-end.
///
/// Subscriptions are placed on the first connection with spare capacity;
/// publishes rotate round-robin across the publisher pool.
pub struct ManagedBus {
    connector: Arc<dyn BusConnector>,
    settings: ConnectionSettings,
    connections: Mutex<Vec<ConnectionEntry>>,
    publishers: Mutex<Vec<Arc<dyn MessageBus>>>,
    publish_next: AtomicUsize,
}

impl ManagedBus {
    /// Open the managed bus, establishing the first connection eagerly so a
    /// broken broker fails startup rather than the first publish.
    pub async fn open(
        connector: Arc<dyn BusConnector>,
        settings: ConnectionSettings,
    ) -> Result<Self, BusError> {
        let first = connect_with_backoff(connector.as_ref(), &settings.retry).await?;
        Ok(Self {
            connector,
            settings,
            connections: Mutex::new(vec![ConnectionEntry {
                bus: first,
                subscriptions: 0,
            }]),
            publishers: Mutex::new(Vec::new()),
            publish_next: AtomicUsize::new(0),
        })
    }

    /// Connection with spare capacity for `slots` more subscriptions, or a
    /// freshly opened one.
    async fn connection_for_subscription(
        &self,
        slots: usize,
    ) -> Result<Arc<dyn MessageBus>, BusError> {
        {
            let mut connections = self.connections.lock();
            if let Some(entry) = connections
                .iter_mut()
                .find(|e| e.subscriptions + slots <= self.settings.max_subscriptions_per_connection)
            {
                entry.subscriptions += slots;
                return Ok(Arc::clone(&entry.bus));
            }
        }

        let bus = connect_with_backoff(self.connector.as_ref(), &self.settings.retry).await?;
        info!("Opened additional broker connection (subscription capacity exhausted)");
        self.connections.lock().push(ConnectionEntry {
            bus: Arc::clone(&bus),
            subscriptions: slots,
        });
        Ok(bus)
    }

    async fn publisher(&self) -> Result<Arc<dyn MessageBus>, BusError> {
        {
            let publishers = self.publishers.lock();
            if publishers.len() >= self.settings.publisher_pool_size.max(1) {
                let idx = self.publish_next.fetch_add(1, Ordering::Relaxed) % publishers.len();
                return Ok(Arc::clone(&publishers[idx]));
            }
        }
        let bus = connect_with_backoff(self.connector.as_ref(), &self.settings.retry).await?;
        self.publishers.lock().push(Arc::clone(&bus));
        Ok(bus)
    }
}

#[async_trait]
impl MessageBus for ManagedBus {
    async fn declare_queue(&self, declaration: QueueDeclaration) -> Result<(), BusError> {
        let bus = {
            let connections = self.connections.lock();
            match connections.first() {
                Some(entry) => Arc::clone(&entry.bus),
                None => return Err(BusError::Closed),
            }
        };
        bus.declare_queue(declaration).await
    }

    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), BusError> {
        self.publisher().await?.publish(topic, messages).await
    }

    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<DeliveryStream, BusError> {
        let slots = options.pool_size.max(1);
        let bus = self.connection_for_subscription(slots).await?;
        bus.subscribe(topic, options).await
    }

    async fn close(&self) -> Result<(), BusError> {
        let connections: Vec<Arc<dyn MessageBus>> = {
            let mut guard = self.connections.lock();
            guard.drain(..).map(|e| e.bus).collect()
        };
        for bus in connections {
            bus.close().await?;
        }
        self.publishers.lock().clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicU32;

    struct FlakyConnector {
        broker: MemoryBroker,
        failures_left: AtomicU32,
        attempts: AtomicU32,
    }

    #[async_trait]
    impl BusConnector for FlakyConnector {
        async fn connect(&self) -> Result<Arc<dyn MessageBus>, BusError> {
            self.attempts.fetch_add(1, Ordering::SeqCst);
            if self
                .failures_left
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |v| v.checked_sub(1))
                .is_ok()
            {
                return Err(BusError::Transient("broker down".to_string()));
            }
            Ok(Arc::new(self.broker.clone()))
        }
    }

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            initial_interval: Duration::from_millis(5),
            multiplier: 2.0,
            max_interval: Duration::from_millis(20),
            max_elapsed: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn test_connect_retries_then_succeeds() {
        let connector = FlakyConnector {
            broker: MemoryBroker::new(),
            failures_left: AtomicU32::new(2),
            attempts: AtomicU32::new(0),
        };
        let bus = connect_with_backoff(&connector, &fast_retry()).await.unwrap();
        assert_eq!(connector.attempts.load(Ordering::SeqCst), 3);
        drop(bus);
    }

    #[tokio::test]
    async fn test_connect_gives_up_after_elapsed_budget() {
        let connector = FlakyConnector {
            broker: MemoryBroker::new(),
            failures_left: AtomicU32::new(u32::MAX),
            attempts: AtomicU32::new(0),
        };
        let result = connect_with_backoff(&connector, &fast_retry()).await;
        assert!(matches!(result, Err(BusError::ConnectionFailed(_))));
    }

    #[tokio::test]
    async fn test_capacity_exhaustion_opens_new_connection() {
        let connector = Arc::new(MemoryConnector::new(MemoryBroker::new()));
        let settings = ConnectionSettings {
            max_subscriptions_per_connection: 2,
            ..ConnectionSettings::default()
        };
        let bus = ManagedBus::open(connector, settings).await.unwrap();

        for i in 0..3 {
            bus.subscribe(&format!("t{i}"), SubscribeOptions::default())
                .await
                .unwrap();
        }
        assert_eq!(bus.connections.lock().len(), 2);
    }

    #[tokio::test]
    async fn test_managed_publish_reaches_subscriber() {
        let broker = MemoryBroker::new();
        let bus = ManagedBus::open(
            Arc::new(MemoryConnector::new(broker)),
            ConnectionSettings::default(),
        )
        .await
        .unwrap();

        let mut stream = bus
            .subscribe("inbox", SubscribeOptions::default())
            .await
            .unwrap();
        bus.publish("inbox", vec![Message::new(b"hello".to_vec())])
            .await
            .unwrap();

        let d = tokio::time::timeout(Duration::from_millis(200), stream.recv())
            .await
            .expect("timeout")
            .expect("delivery");
        assert_eq!(d.message.payload, b"hello");
        d.ack.ack();
    }
}
