//! # OM-03 Activity Store
//!
//! Keyed storage of activities plus the reference collections (Inbox,
//! Outbox, Follower, Following, Witness, Like, Share). All operations are
//! idempotent on repeat with identical inputs; `(collection, object,
//! activity)` is unique; iteration is forward-only with an explicit close
//! and survives concurrent inserts by observing a prefix of the insertion
//! order.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod memory;
pub mod store;

pub use memory::{collect_all, MemoryActivityStore};
pub use store::{ActivityStore, Criteria, ReferenceIterator};
