//! # OM-04 Anchor Sync
//!
//! Closes gaps left by message loss or offline periods by walking remote
//! services' activity feeds:
//!
//! - for each **follower**, this service walks the peer's *inbox* looking
//!   for its own Create activities the peer may have missed;
//! - for each **following**, it walks the peer's *outbox* for Create and
//!   Announce activities it may have missed itself.
//!
//! Progress is a per-`(peer, source)` cursor `(page, index)` persisted only
//! after the walk, so a crash re-presents already-processed activities and
//! the store-level dedup absorbs them.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod cursor;
pub mod ports;
pub mod task;

pub use cursor::{Cursor, CursorStore, MemoryCursorStore, Source};
pub use ports::{
    AnchorEventHandler, CollectionPage, CollectionPager, DiscoveryPager, MockEventHandler,
    MockPager, SyncError,
};
pub use task::{AnchorSyncTask, SyncConfig};
