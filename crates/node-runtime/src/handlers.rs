//! The federation activity handler.
//!
//! The inbox pipeline and the sync walker both dispatch here. Error
//! classification is the contract: transient errors are redelivered,
//! persistent ones are dropped, and `DuplicateAnchorEvent` means the work
//! was already done.

use async_trait::async_trait;
use chrono::Utc;
use om_02_inbox::ActivityHandler;
use om_03_activity_store::ActivityStore;
use om_04_anchor_sync::AnchorEventHandler;
use om_05_log_monitor::MonitorStore;
use om_07_anchor_writer::{AnchorWriter, LocalWitness, Outbox};
use serde_json::Value;
use shared_types::activity::ANCHOR_WITNESS_IRI;
use shared_types::{
    Activity, ActivityKind, AnchorCredential, Iri, ProcessingError, Proof, ReferenceType,
};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Handles every inbound activity for this service.
pub struct MeshActivityHandler {
    service_iri: Iri,
    store: Arc<dyn ActivityStore>,
    monitor_store: Arc<dyn MonitorStore>,
    outbox: Arc<dyn Outbox>,
    local_witness: Option<Arc<dyn LocalWitness>>,
    writer: Arc<AnchorWriter>,
}

impl MeshActivityHandler {
    /// A new handler.
    #[must_use]
    pub fn new(
        service_iri: Iri,
        store: Arc<dyn ActivityStore>,
        monitor_store: Arc<dyn MonitorStore>,
        outbox: Arc<dyn Outbox>,
        local_witness: Option<Arc<dyn LocalWitness>>,
        writer: Arc<AnchorWriter>,
    ) -> Self {
        Self {
            service_iri,
            store,
            monitor_store,
            outbox,
            local_witness,
            writer,
        }
    }

    fn reply_iri(&self) -> Iri {
        self.service_iri
            .join(&format!("activities/{}", Uuid::new_v4()))
    }

    /// An inbound Follow: record the follower and reply with Accept.
    async fn on_follow(&self, activity: &Activity) -> Result<(), ProcessingError> {
        let follower = activity
            .actor
            .clone()
            .ok_or_else(|| ProcessingError::persistent("follow without actor"))?;

        self.store
            .add_reference(ReferenceType::Follower, &self.service_iri, &follower)
            .await
            .map_err(ProcessingError::transient)?;

        let accept = Activity::new(
            self.reply_iri(),
            ActivityKind::Accept,
            self.service_iri.clone(),
        )
        .published(Utc::now())
        .to(vec![follower.clone()])
        .object(
            serde_json::to_value(activity)
                .map_err(ProcessingError::persistent)?,
        );

        self.outbox
            .post(accept)
            .await
            .map_err(|e| ProcessingError::Transient(e.to_string()))?;
        info!(follower = %follower, "Follower accepted");
        Ok(())
    }

    /// An inbound Accept: a peer accepted our Follow, acknowledged a log
    /// subscription, or returned a witness proof for an Offer.
    async fn on_accept(&self, activity: &Activity) -> Result<(), ProcessingError> {
        let Some(object) = activity.object.as_ref() else {
            return Err(ProcessingError::persistent("accept without object"));
        };

        // A plain string object names a transparency log to monitor.
        if let Value::String(log_url) = object {
            self.monitor_store
                .activate(log_url)
                .await
                .map_err(ProcessingError::transient)?;
            info!(log = %log_url, "Log monitoring activated");
            return Ok(());
        }

        let object_kind = object.get("type").and_then(Value::as_str);
        match object_kind {
            Some("Follow") => {
                let followed = activity
                    .actor
                    .clone()
                    .ok_or_else(|| ProcessingError::persistent("accept without actor"))?;
                self.store
                    .add_reference(ReferenceType::Following, &self.service_iri, &followed)
                    .await
                    .map_err(ProcessingError::transient)?;
                info!(peer = %followed, "Follow accepted by peer");
                Ok(())
            }
            Some("Offer") => self.on_witness_proof(activity, object).await,
            other => {
                debug!(kind = ?other, "Ignoring accept of unhandled object");
                Ok(())
            }
        }
    }

    /// A witness returned a proof for one of our Offers: assemble the
    /// witnessed credential and complete the anchor.
    async fn on_witness_proof(
        &self,
        activity: &Activity,
        offer: &Value,
    ) -> Result<(), ProcessingError> {
        let vc_value = offer
            .get("object")
            .cloned()
            .ok_or_else(|| ProcessingError::persistent("accepted offer carries no credential"))?;
        let mut vc: AnchorCredential = serde_json::from_value(vc_value)
            .map_err(|e| ProcessingError::persistent(format!("malformed credential: {e}")))?;

        let proof: Proof = activity
            .extra
            .get("result")
            .and_then(|r| r.get("proof"))
            .cloned()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProcessingError::persistent(format!("malformed proof: {e}")))?
            .ok_or_else(|| ProcessingError::persistent("accept carries no witness proof"))?;

        vc.add_proof(proof);
        self.writer
            .complete_witnessing(vc)
            .await
            .map_err(|e| {
                if e.is_transient() {
                    ProcessingError::Transient(e.to_string())
                } else {
                    ProcessingError::Persistent(e.to_string())
                }
            })?;
        Ok(())
    }

    /// An inbound Offer targeting the anchor-witness IRI: produce a local
    /// witness proof and reply with Accept.
    async fn on_offer(&self, activity: &Activity) -> Result<(), ProcessingError> {
        let target_id = activity
            .target
            .as_ref()
            .and_then(|t| match t {
                Value::String(s) => Some(s.as_str()),
                Value::Object(map) => map.get("id").and_then(Value::as_str),
                _ => None,
            });
        if target_id != Some(ANCHOR_WITNESS_IRI) {
            return Err(ProcessingError::persistent("offer with unsupported target"));
        }

        let Some(witness) = self.local_witness.as_ref() else {
            return Err(ProcessingError::persistent(
                "this service is not a witness",
            ));
        };

        let vc: AnchorCredential = activity
            .object
            .clone()
            .map(serde_json::from_value)
            .transpose()
            .map_err(|e| ProcessingError::persistent(format!("malformed credential: {e}")))?
            .ok_or_else(|| ProcessingError::persistent("offer carries no credential"))?;

        let proof = witness
            .witness(&vc)
            .await
            .map_err(|e| ProcessingError::Persistent(e.to_string()))?;

        let requester = activity
            .actor
            .clone()
            .ok_or_else(|| ProcessingError::persistent("offer without actor"))?;

        let mut accept = Activity::new(
            self.reply_iri(),
            ActivityKind::Accept,
            self.service_iri.clone(),
        )
        .published(Utc::now())
        .to(vec![requester])
        .object(
            serde_json::to_value(activity)
                .map_err(ProcessingError::persistent)?,
        );
        accept.extra.insert(
            "result".to_string(),
            serde_json::json!({
                "proof": serde_json::to_value(&proof)
                    .map_err(ProcessingError::persistent)?
            }),
        );

        self.outbox
            .post(accept)
            .await
            .map_err(|e| ProcessingError::Transient(e.to_string()))?;
        info!(offer = %activity.id, "Credential witnessed");
        Ok(())
    }

    /// An inbound Undo removes a Follow edge or deactivates a log.
    async fn on_undo(&self, activity: &Activity) -> Result<(), ProcessingError> {
        let Some(object) = activity.object.as_ref() else {
            return Err(ProcessingError::persistent("undo without object"));
        };

        if let Value::String(reference) = object {
            // A log URL deactivates monitoring; anything else is an
            // activity IRI whose Follow edge is removed below.
            if self.monitor_store.get(reference).await.is_ok() {
                self.monitor_store
                    .deactivate(reference)
                    .await
                    .map_err(ProcessingError::transient)?;
                info!(log = %reference, "Log monitoring deactivated");
                return Ok(());
            }
        }

        let Some(actor) = activity.actor.clone() else {
            return Err(ProcessingError::persistent("undo without actor"));
        };
        self.store
            .delete_reference(ReferenceType::Follower, &self.service_iri, &actor)
            .await
            .map_err(ProcessingError::transient)?;
        info!(peer = %actor, "Follower removed");
        Ok(())
    }

    /// An inbound Create or Announce carrying an anchor.
    async fn on_anchor_event(&self, activity: &Activity) -> Result<(), ProcessingError> {
        if self.store.get_activity(&activity.id).await.is_ok() {
            return Err(ProcessingError::DuplicateAnchorEvent);
        }
        if activity.kind == ActivityKind::Announce {
            self.store
                .add_reference(ReferenceType::Share, &self.service_iri, &activity.id)
                .await
                .map_err(ProcessingError::transient)?;
        }
        debug!(id = %activity.id, kind = %activity.kind, "Anchor event accepted");
        Ok(())
    }

    async fn on_like(&self, activity: &Activity) -> Result<(), ProcessingError> {
        self.store
            .add_reference(ReferenceType::Like, &self.service_iri, &activity.id)
            .await
            .map_err(ProcessingError::transient)
    }
}

#[async_trait]
impl ActivityHandler for MeshActivityHandler {
    async fn handle(&self, activity: &Activity) -> Result<(), ProcessingError> {
        match activity.kind {
            ActivityKind::Create | ActivityKind::Announce => self.on_anchor_event(activity).await,
            ActivityKind::Follow => self.on_follow(activity).await,
            ActivityKind::Accept => self.on_accept(activity).await,
            ActivityKind::Offer => self.on_offer(activity).await,
            ActivityKind::Undo => self.on_undo(activity).await,
            ActivityKind::Like => self.on_like(activity).await,
            ActivityKind::Reject => {
                warn!(id = %activity.id, "Peer rejected an activity");
                Ok(())
            }
            ActivityKind::Other(ref kind) => Err(ProcessingError::persistent(format!(
                "unsupported activity type: {kind}"
            ))),
        }
    }
}

#[async_trait]
impl AnchorEventHandler for MeshActivityHandler {
    async fn handle_create(&self, activity: &Activity) -> Result<(), ProcessingError> {
        self.on_anchor_event(activity).await
    }

    async fn handle_announce(&self, activity: &Activity) -> Result<(), ProcessingError> {
        self.on_anchor_event(activity).await
    }
}
