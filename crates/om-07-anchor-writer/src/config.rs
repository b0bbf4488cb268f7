//! Writer configuration.

use shared_types::Iri;
use std::time::Duration;

/// Configuration for the anchor writer.
#[derive(Debug, Clone)]
pub struct WriterConfig {
    /// This service's IRI; becomes the credential's issuer and anchor
    /// origin.
    pub service_iri: Iri,
    /// Base IRI of the content-addressed store serving anchor objects.
    pub cas_iri: Iri,
    /// Sidetree namespace carried in the credential subject.
    pub namespace: String,
    /// Witnessing window; also the inclusion-watch deadline.
    pub max_witness_delay: Duration,
    /// Sign with the local witness even when it is not in the witness
    /// list.
    pub sign_with_local_witness: bool,
}

impl WriterConfig {
    /// Defaults for a service.
    #[must_use]
    pub fn new(service_iri: Iri, cas_iri: Iri) -> Self {
        Self {
            service_iri,
            cas_iri,
            namespace: "did:orb".to_string(),
            max_witness_delay: Duration::from_secs(600),
            sign_with_local_witness: true,
        }
    }
}
