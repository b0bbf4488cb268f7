//! # Message
//!
//! The broker transport unit: an opaque payload plus named string properties.
//! Redelivery state travels in the properties so it survives republishing
//! across the destination, wait, and redelivery queues.

use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Property names propagated across the redelivery loop.
pub mod properties {
    /// Original destination queue for a message in redelivery.
    pub const QUEUE: &str = "orb-queue";
    /// Number of redelivery publishes so far.
    pub const REDELIVERY_COUNT: &str = "orb-redelivery-count";
    /// Per-message time-to-live, in milliseconds.
    pub const EXPIRATION: &str = "expiration";
    /// Actor IRI attached after HTTP-signature verification.
    pub const ACTOR_IRI: &str = "ActorIRI";

    /// Broker-owned death count. Never forwarded on republish.
    pub const DEATH: &str = "x-death";
    /// Broker-owned: queue of the first death in the current chain.
    pub const FIRST_DEATH_QUEUE: &str = "x-first-death-queue";
    /// Broker-owned: reason of the first death in the current chain.
    pub const FIRST_DEATH_REASON: &str = "x-first-death-reason";
}

/// Well-known topic names.
pub mod topics {
    /// The redelivery handler's queue.
    pub const REDELIVERY: &str = "orb.redelivery";
    /// The consumerless wait queue; messages leave it by expiring.
    pub const WAIT: &str = "orb.wait";
    /// Local channel carrying published anchor hashlinks.
    pub const ANCHOR: &str = "orb.anchor";
}

/// Dead-letter reasons set by the broker.
pub mod death_reasons {
    /// The consumer nacked the delivery.
    pub const REJECTED: &str = "rejected";
    /// The per-message `expiration` elapsed with no consumer.
    pub const EXPIRED: &str = "expired";
}

/// A broker message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    /// Broker-local identity, distinct from any payload identity.
    pub id: Uuid,
    /// Opaque payload bytes.
    pub payload: Vec<u8>,
    /// Named string properties.
    pub properties: HashMap<String, String>,
}

impl Message {
    /// A new message wrapping a payload.
    #[must_use]
    pub fn new(payload: impl Into<Vec<u8>>) -> Self {
        Self {
            id: Uuid::new_v4(),
            payload: payload.into(),
            properties: HashMap::new(),
        }
    }

    /// Builder-style property setter.
    #[must_use]
    pub fn with_property(mut self, name: &str, value: impl Into<String>) -> Self {
        self.properties.insert(name.to_string(), value.into());
        self
    }

    /// Read a property.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&str> {
        self.properties.get(name).map(String::as_str)
    }

    /// Set a property in place.
    pub fn set_property(&mut self, name: &str, value: impl Into<String>) {
        self.properties.insert(name.to_string(), value.into());
    }

    /// Remove a property.
    pub fn remove_property(&mut self, name: &str) {
        self.properties.remove(name);
    }

    /// The redelivery count, defaulting to zero.
    #[must_use]
    pub fn redelivery_count(&self) -> u32 {
        self.property(properties::REDELIVERY_COUNT)
            .and_then(|v| v.parse().ok())
            .unwrap_or(0)
    }

    /// The per-message expiration, if set.
    #[must_use]
    pub fn expiration(&self) -> Option<Duration> {
        self.property(properties::EXPIRATION)
            .and_then(|v| v.parse::<u64>().ok())
            .map(Duration::from_millis)
    }

    /// Set the per-message expiration.
    pub fn set_expiration(&mut self, ttl: Duration) {
        self.set_property(properties::EXPIRATION, ttl.as_millis().to_string());
    }

    /// Strip the broker-owned death metadata.
    ///
    /// Death history is not a forwardable value: a republished message must
    /// start a fresh death chain or the broker's first-death bookkeeping
    /// lies about where the message came from.
    pub fn strip_death_properties(&mut self) {
        self.remove_property(properties::DEATH);
        self.remove_property(properties::FIRST_DEATH_QUEUE);
        self.remove_property(properties::FIRST_DEATH_REASON);
    }
}
