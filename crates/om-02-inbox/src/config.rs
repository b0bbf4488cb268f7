//! Inbox configuration.

use shared_types::Iri;

/// Configuration for the inbox pipeline.
#[derive(Debug, Clone)]
pub struct InboxConfig {
    /// This service's IRI; the Inbox collection is keyed by it.
    pub service_iri: Iri,
    /// Topic (and queue) for inbound activities; one per service endpoint.
    pub topic: String,
    /// Handler pool size for the subscription.
    pub pool_size: usize,
    /// Accepted bearer tokens. Empty means token auth is not offered and
    /// every request must carry a valid HTTP signature.
    pub auth_tokens: Vec<String>,
    /// Reject activities whose `actor` differs from the signing actor.
    pub verify_actor_in_signature: bool,
}

impl InboxConfig {
    /// Defaults for a service.
    #[must_use]
    pub fn new(service_iri: Iri, topic: impl Into<String>) -> Self {
        Self {
            service_iri,
            topic: topic.into(),
            pool_size: 5,
            auth_tokens: Vec::new(),
            verify_actor_in_signature: false,
        }
    }
}
