//! # Shared Bus - Broker Adapter for Orb-Mesh
//!
//! Abstracts a durable message broker behind [`MessageBus`]:
//! `publish(topic, msgs)` / `subscribe(topic, opts) -> stream` / `close()`.
//!
//! ## Delivery semantics
//!
//! At-least-once. Every delivery carries an ack/nack handle; acked messages
//! are done, nacked messages are routed to the queue's dead-letter target.
//! Messages published to a queue with an `expiration` property and no
//! consumer are dead-lettered with reason `expired` once the period elapses.
//! The redelivery engine is built entirely on these two behaviors.
//!
//! ## Connections
//!
//! A single broker connection carries a bounded number of subscriptions
//! (default 1000). [`ManagedBus`] opens additional connections as capacity is
//! exhausted, pools publisher channels round-robin, and retries the initial
//! connect with capped exponential backoff before failing loudly.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod bus;
pub mod connection;
pub mod memory;
pub mod message;
mod pool;

pub use bus::{
    AckHandle, BusError, Delivery, DeliveryStream, MessageBus, QueueDeclaration, SubscribeOptions,
};
pub use connection::{BusConnector, ConnectionSettings, ManagedBus, MemoryConnector, RetryConfig};
pub use memory::MemoryBroker;
pub use message::{properties, topics, Message};

/// Maximum subscriptions multiplexed over one broker connection.
pub const DEFAULT_MAX_SUBSCRIPTIONS_PER_CONNECTION: usize = 1000;

/// Per-subscription delivery buffer.
pub const DEFAULT_CHANNEL_CAPACITY: usize = 64;
