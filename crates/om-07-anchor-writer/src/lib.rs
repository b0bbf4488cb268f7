//! # OM-07 Anchor Writer
//!
//! The orchestrator that turns a batch of DID operations into a published
//! anchor:
//!
//! 1. bulk-resolve previous anchors per operation suffix;
//! 2. build the anchor credential;
//! 3. choose witnesses from the operations' anchor origins, deduplicated
//!    in insertion order;
//! 4. obtain a local witness proof (registering the credential with the
//!    inclusion watcher) or a server signature, and persist the signed
//!    credential before anything goes on the wire;
//! 5. store the witness records and set the credential `in-process` - a
//!    non-empty witness set is required before any Offer leaves the node;
//! 6. post the Offer to the witnesses and the public collection;
//! 7. once witness proofs are assembled, store the witnessed credential,
//!    add it to the anchor graph, publish the resulting hashlink on the
//!    local anchor channel, and broadcast the Create to followers.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod domain;
pub mod ports;
pub mod service;
pub mod witness;

pub use config::WriterConfig;
pub use domain::{VcStatus, WitnessEntry, WriterError};
pub use ports::{
    AnchorGraph, CredentialSigner, Ed25519Witness, InclusionMonitor, LocalWitness,
    MemoryAnchorGraph, MemoryAnchorIndex, MemoryVcStore, MemoryWitnessStore, OperationProcessor,
    Outbox, PreviousAnchorResolver, VcStore, WitnessResolver, WitnessStore,
};
pub use service::{AnchorWriter, WriterDeps};
pub use witness::dedupe_witnesses;
