//! # OM-02 Inbox Pipeline
//!
//! HTTP ingest -> verify -> enqueue -> dedupe -> handle -> persist.
//!
//! ## Flow
//!
//! 1. `POST <service-endpoint>` authenticates the request (bearer token or
//!    HTTP signature), attaches the signing actor to the message metadata,
//!    and enqueues it. 200 means "accepted for asynchronous processing",
//!    whatever the handler later decides.
//! 2. The message router consumes the service topic with a pooled
//!    subscription (default 5), deduplicates by activity ID against the
//!    activity store, and dispatches to the [`ActivityHandler`].
//! 3. Transient handler errors nack for redelivery; persistent ones ack so
//!    the broker stops. On success the activity is stored and its ID is
//!    appended to the service's Inbox collection. Storage failures after
//!    the handler ran are logged, never nacked: the side effects already
//!    happened and re-invocation is worse than a missing reference row.
//!
//! The HTTP handler must not accept requests before the router reports
//! `Running`; both share a [`shared_types::StateHandle`].

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod http;
pub mod ports;
pub mod service;

pub use config::InboxConfig;
pub use http::{inbox_routes, HttpState};
pub use ports::{ActivityHandler, MockActivityHandler};
pub use service::InboxService;
