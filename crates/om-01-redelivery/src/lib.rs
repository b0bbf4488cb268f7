//! # OM-01 Redelivery Engine
//!
//! Bounded exponential-backoff redelivery layered on the broker adapter.
//!
//! ## Queues
//!
//! Three logical queues per deployment: the destination queue (e.g.
//! `inbox`), `orb.redelivery`, and `orb.wait`. The destination queue
//! dead-letters to `orb.redelivery`; so does `orb.wait`. Nothing consumes
//! `orb.wait` - messages sit there until their per-message expiration
//! elapses and the broker dead-letters them back to `orb.redelivery`.
//!
//! ## Per-message state machine
//!
//! ```text
//! Delivered -(nack)-> Nacked -(DLQ)-> InRedelivery -+-> Redelivered
//!                                         ^         +-> InWait -(expire)-+
//!                                         |         +-> Dropped          |
//!                                         +-----------------------------+
//! ```

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod backoff;
pub mod config;
pub mod service;

pub use backoff::redelivery_interval;
pub use config::RedeliveryConfig;
pub use service::RedeliveryService;
