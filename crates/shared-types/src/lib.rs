//! # Shared Types - Common Vocabulary for Orb-Mesh
//!
//! Foundation crate with zero dependencies on other Orb-Mesh crates.
//!
//! ## Contents
//!
//! - [`Iri`] - validated absolute IRI, the identity type for every federation
//!   object. Edges between activities, credentials, and witnesses are always
//!   IRIs, never pointers.
//! - [`Activity`] - the federation unit, a tagged-variant JSON document with
//!   a common head and an opaque tail for unknown vocabulary.
//! - [`AnchorCredential`] - the anchor credential (VC) built by the writer
//!   and witnessed by remote peers.
//! - Error taxonomy - every failure crossing a subsystem boundary is either
//!   *transient* (retry) or *persistent* (drop), and wrapping preserves that
//!   classification.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod activity;
pub mod collection;
pub mod credential;
pub mod errors;
pub mod iri;
pub mod lifecycle;

pub use activity::{Activity, ActivityKind, PUBLIC_IRI};
pub use collection::ReferenceType;
pub use credential::{
    AnchorCredential, AnchorSubject, OperationReference, OperationType, PreviousAnchor, Proof,
};
pub use errors::{ProcessingError, StoreError};
pub use iri::{Iri, IriError};
pub use lifecycle::{NotStartedError, ServiceState, StateHandle};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn public_iri_parses() {
        assert!(Iri::parse(PUBLIC_IRI).is_ok());
    }
}
