//! # Bus Contract
//!
//! The broker-facing trait plus the delivery types handed to consumers.
//! Handlers receive a stream of `(message, ack-handle)` pairs; the dispatcher
//! decides ack vs. nack from the handler's classified error.

use crate::message::Message;
use async_trait::async_trait;
use std::pin::Pin;
use std::task::{Context, Poll};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use tokio_stream::Stream;

/// Errors from bus operations.
#[derive(Debug, Error)]
pub enum BusError {
    /// The bus was closed.
    #[error("bus closed")]
    Closed,

    /// A retryable failure (publish path).
    #[error("transient bus error: {0}")]
    Transient(String),

    /// Connecting to the broker failed after exhausting retries.
    /// Unrecoverable; the process should not continue without a broker.
    #[error("broker connection failed: {0}")]
    ConnectionFailed(String),
}

impl BusError {
    /// True when the caller may retry.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transient(_))
    }
}

/// Declaration of a queue and its dead-letter wiring.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueueDeclaration {
    /// Queue (and topic) name.
    pub name: String,
    /// Dead-letter target for nacked or expired messages.
    pub dead_letter: Option<String>,
    /// Requeue nacked messages on the same queue instead of dead-lettering.
    pub requeue_on_nack: bool,
}

impl QueueDeclaration {
    /// A queue with no dead-letter target.
    #[must_use]
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Set the dead-letter target.
    #[must_use]
    pub fn dead_letter_to(mut self, target: impl Into<String>) -> Self {
        self.dead_letter = Some(target.into());
        self
    }

    /// Requeue on nack.
    #[must_use]
    pub fn requeue_on_nack(mut self) -> Self {
        self.requeue_on_nack = true;
        self
    }
}

/// Subscription options.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubscribeOptions {
    /// When positive, the returned stream is fed by this many independently
    /// subscribed underlying streams; zero means a single stream.
    pub pool_size: usize,
}

impl SubscribeOptions {
    /// Pooled subscription.
    #[must_use]
    pub fn pooled(pool_size: usize) -> Self {
        Self { pool_size }
    }
}

pub(crate) enum Outcome {
    Ack,
    Nack,
}

/// Consumer-side acknowledgement handle.
///
/// Exactly one of [`AckHandle::ack`] or [`AckHandle::nack`] must be called.
/// Dropping the handle abandons the delivery (the in-memory broker treats it
/// as lost; a durable broker would redeliver on channel close).
pub struct AckHandle {
    tx: Option<oneshot::Sender<Outcome>>,
}

impl AckHandle {
    pub(crate) fn new(tx: oneshot::Sender<Outcome>) -> Self {
        Self { tx: Some(tx) }
    }

    /// Acknowledge: the message is done and will not be redelivered.
    pub fn ack(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outcome::Ack);
        }
    }

    /// Negative-acknowledge: route the message to the dead-letter target.
    pub fn nack(mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(Outcome::Nack);
        }
    }
}

impl std::fmt::Debug for AckHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AckHandle")
            .field("decided", &self.tx.is_none())
            .finish()
    }
}

/// A single delivery: the message and its acknowledgement handle.
#[derive(Debug)]
pub struct Delivery {
    pub message: Message,
    pub ack: AckHandle,
}

/// Stream of deliveries for one subscription.
///
/// Closes when the subscription's input context is cancelled, the bus is
/// closed, or (for pooled subscriptions) any upstream stream closes.
pub struct DeliveryStream {
    rx: mpsc::Receiver<Delivery>,
}

impl DeliveryStream {
    pub(crate) fn new(rx: mpsc::Receiver<Delivery>) -> Self {
        Self { rx }
    }

    /// Receive the next delivery, or `None` when the stream is closed.
    pub async fn recv(&mut self) -> Option<Delivery> {
        self.rx.recv().await
    }
}

impl Stream for DeliveryStream {
    type Item = Delivery;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

/// The broker adapter contract.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Declare a queue and its dead-letter wiring. Idempotent.
    async fn declare_queue(&self, declaration: QueueDeclaration) -> Result<(), BusError>;

    /// Publish messages to a topic.
    ///
    /// Failures are transient; callers may retry.
    async fn publish(&self, topic: &str, messages: Vec<Message>) -> Result<(), BusError>;

    /// Subscribe to a topic.
    async fn subscribe(
        &self,
        topic: &str,
        options: SubscribeOptions,
    ) -> Result<DeliveryStream, BusError>;

    /// Close the bus; all streams end.
    async fn close(&self) -> Result<(), BusError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_declaration_builder() {
        let decl = QueueDeclaration::named("inbox").dead_letter_to("orb.redelivery");
        assert_eq!(decl.name, "inbox");
        assert_eq!(decl.dead_letter.as_deref(), Some("orb.redelivery"));
        assert!(!decl.requeue_on_nack);
    }

    #[tokio::test]
    async fn test_ack_handle_single_use() {
        let (tx, rx) = oneshot::channel();
        let handle = AckHandle::new(tx);
        handle.ack();
        assert!(matches!(rx.await, Ok(Outcome::Ack)));
    }

    #[tokio::test]
    async fn test_dropped_handle_closes_channel() {
        let (tx, rx) = oneshot::channel();
        drop(AckHandle::new(tx));
        assert!(rx.await.is_err());
    }
}
