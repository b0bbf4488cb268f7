//! The activity outbox.
//!
//! Posting an activity persists it (activity store plus the Outbox
//! collection) and then delivers it to every non-public recipient's inbox
//! with a signed request. Persistence failures fail the post; deliveries
//! run in background tasks whose failures are logged and left to the
//! peers' sync walkers to repair.

use async_trait::async_trait;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use om_03_activity_store::ActivityStore;
use om_07_anchor_writer::{Outbox, WriterError};
use shared_discovery::DiscoveryClient;
use shared_types::{Activity, Iri, ReferenceType, PUBLIC_IRI};
use std::sync::Arc;
use tracing::{debug, warn};

struct DeliveryContext {
    discovery: Arc<DiscoveryClient>,
    http: reqwest::Client,
    signing_key: SigningKey,
    key_id: String,
}

impl DeliveryContext {
    async fn deliver(&self, recipient: Iri, body: Arc<Vec<u8>>) {
        let inbox = match self.discovery.resolve_actor(&recipient).await {
            Ok(actor) => actor.inbox,
            Err(e) => {
                warn!(recipient = %recipient, error = %e, "Cannot resolve recipient inbox");
                return;
            }
        };

        let Some(origin) = inbox.origin().map(str::to_string) else {
            warn!(inbox = %inbox, "Inbox IRI has no origin");
            return;
        };
        let host = origin
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .to_string();
        let path = inbox.as_str()[origin.len()..].to_string();

        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();
        let signed = shared_crypto::httpsig::sign_request(
            &self.signing_key,
            &self.key_id,
            "POST",
            &path,
            &host,
            &date,
            &body,
        );
        let (signature, digest) = match signed {
            Ok(parts) => parts,
            Err(e) => {
                warn!(inbox = %inbox, error = %e, "Cannot sign delivery");
                return;
            }
        };

        let result = self
            .http
            .post(inbox.as_str())
            .header("Content-Type", "application/activity+json")
            .header("Host", host)
            .header("Date", date)
            .header("Digest", digest)
            .header("Signature", signature)
            .body(body.as_ref().clone())
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                debug!(inbox = %inbox, "Activity delivered");
            }
            Ok(response) => {
                warn!(inbox = %inbox, status = %response.status(), "Delivery rejected");
            }
            Err(e) => {
                warn!(inbox = %inbox, error = %e, "Delivery failed");
            }
        }
    }
}

/// Outbox backed by the activity store and signed HTTP delivery.
pub struct ActivityOutbox {
    service_iri: Iri,
    store: Arc<dyn ActivityStore>,
    delivery: Arc<DeliveryContext>,
}

impl ActivityOutbox {
    /// A new outbox signing with this node's key.
    #[must_use]
    pub fn new(
        service_iri: Iri,
        store: Arc<dyn ActivityStore>,
        discovery: Arc<DiscoveryClient>,
        http: reqwest::Client,
        signing_key: SigningKey,
        key_id: String,
    ) -> Self {
        Self {
            service_iri,
            store,
            delivery: Arc::new(DeliveryContext {
                discovery,
                http,
                signing_key,
                key_id,
            }),
        }
    }
}

#[async_trait]
impl Outbox for ActivityOutbox {
    async fn post(&self, activity: Activity) -> Result<(), WriterError> {
        self.store
            .put_activity(&activity)
            .await
            .map_err(WriterError::transient)?;
        self.store
            .add_reference(ReferenceType::Outbox, &self.service_iri, &activity.id)
            .await
            .map_err(WriterError::transient)?;

        let body = Arc::new(serde_json::to_vec(&activity).map_err(WriterError::fatal)?);
        for recipient in activity
            .to
            .iter()
            .filter(|r| r.as_str() != PUBLIC_IRI && **r != self.service_iri)
        {
            let context = Arc::clone(&self.delivery);
            let recipient = recipient.clone();
            let body = Arc::clone(&body);
            tokio::spawn(async move {
                context.deliver(recipient, body).await;
            });
        }
        Ok(())
    }
}
