//! Prometheus counters for the federation pipeline.

use lazy_static::lazy_static;
use prometheus::{IntCounter, Registry};

lazy_static! {
    /// Process-wide metrics registry.
    pub static ref REGISTRY: Registry = Registry::new();

    /// Activities accepted by the inbox HTTP endpoint.
    pub static ref INBOX_ACCEPTED: IntCounter = register(IntCounter::new(
        "orbmesh_inbox_accepted_total",
        "Activities accepted for asynchronous processing",
    ));

    /// Activities handled successfully by the inbox pipeline.
    pub static ref INBOX_HANDLED: IntCounter = register(IntCounter::new(
        "orbmesh_inbox_handled_total",
        "Activities handled and persisted",
    ));

    /// Duplicate activity deliveries absorbed by the dedupe check.
    pub static ref INBOX_DUPLICATES: IntCounter = register(IntCounter::new(
        "orbmesh_inbox_duplicates_total",
        "Duplicate activity deliveries observed",
    ));

    /// Messages republished by the redelivery engine.
    pub static ref REDELIVERY_REPUBLISHED: IntCounter = register(IntCounter::new(
        "orbmesh_redelivery_republished_total",
        "Messages republished to their destination queue",
    ));

    /// Messages parked on the wait queue.
    pub static ref REDELIVERY_WAITING: IntCounter = register(IntCounter::new(
        "orbmesh_redelivery_waiting_total",
        "Messages parked on the wait queue with a backoff interval",
    ));

    /// Messages dropped after exhausting redelivery attempts.
    pub static ref REDELIVERY_DROPPED: IntCounter = register(IntCounter::new(
        "orbmesh_redelivery_dropped_total",
        "Messages dropped after the redelivery attempt limit",
    ));

    /// Anchor credentials written.
    pub static ref ANCHORS_WRITTEN: IntCounter = register(IntCounter::new(
        "orbmesh_anchors_written_total",
        "Anchor credentials built and offered for witnessing",
    ));
}

fn register(counter: Result<IntCounter, prometheus::Error>) -> IntCounter {
    let counter = counter.unwrap_or_else(|e| panic!("counter definition invalid: {e}"));
    REGISTRY
        .register(Box::new(counter.clone()))
        .unwrap_or_else(|e| panic!("counter registration failed: {e}"));
    counter
}
