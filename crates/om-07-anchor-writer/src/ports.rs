//! Writer ports and their default implementations.

use crate::domain::{VcStatus, WitnessEntry, WriterError};
use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Utc;
use ed25519_dalek::SigningKey;
use om_06_inclusion_watcher::{InclusionEntry, InclusionWatcher};
use om_08_hashlink::HashlinkCodec;
use parking_lot::Mutex;
use shared_types::{Activity, AnchorCredential, Iri, ProcessingError, Proof};
use std::collections::HashMap;

/// Bulk-resolves the most recent anchor per operation suffix.
#[async_trait]
pub trait PreviousAnchorResolver: Send + Sync {
    /// Map of suffix to its latest anchor hashlink (None for suffixes that
    /// were never anchored).
    async fn latest_anchors(
        &self,
        suffixes: &[String],
    ) -> Result<HashMap<String, Option<String>>, WriterError>;
}

/// Resolves the anchor origin of an already-anchored operation.
#[async_trait]
pub trait OperationProcessor: Send + Sync {
    async fn anchor_origin(&self, suffix: &str) -> Result<Iri, WriterError>;
}

/// Resolves anchor origins to witness IRIs and probes their logs.
#[async_trait]
pub trait WitnessResolver: Send + Sync {
    /// The origin's witness service, via its host-meta `activity+json`
    /// link.
    async fn witness_iri(&self, origin: &Iri) -> Result<Iri, WriterError>;

    /// Whether the witness advertises a transparency log.
    async fn has_log(&self, witness: &Iri) -> bool;
}

/// A local witness producing linked-data proofs.
#[async_trait]
pub trait LocalWitness: Send + Sync {
    async fn witness(&self, vc: &AnchorCredential) -> Result<Proof, WriterError>;
}

/// Signs credentials with the server key when no local witness applies.
#[async_trait]
pub trait CredentialSigner: Send + Sync {
    async fn sign(&self, vc: &mut AnchorCredential) -> Result<(), WriterError>;
}

/// Credential persistence.
#[async_trait]
pub trait VcStore: Send + Sync {
    async fn put(&self, vc: &AnchorCredential) -> Result<(), WriterError>;
    async fn get(&self, id: &Iri) -> Result<AnchorCredential, WriterError>;
}

/// Witness-record and status persistence.
#[async_trait]
pub trait WitnessStore: Send + Sync {
    async fn put_witnesses(&self, vc_id: &Iri, witnesses: &[WitnessEntry])
        -> Result<(), WriterError>;
    async fn set_status(&self, vc_id: &Iri, status: VcStatus) -> Result<(), WriterError>;
}

/// Broadcasts an activity: persist it to the Outbox and deliver it to its
/// recipients.
#[async_trait]
pub trait Outbox: Send + Sync {
    async fn post(&self, activity: Activity) -> Result<(), WriterError>;
}

/// The anchor graph; adding a credential yields its hashlink.
#[async_trait]
pub trait AnchorGraph: Send + Sync {
    async fn add(&self, vc: &AnchorCredential) -> Result<String, WriterError>;
}

/// Registers witnessed credentials for inclusion monitoring.
#[async_trait]
pub trait InclusionMonitor: Send + Sync {
    async fn watch(&self, entry: InclusionEntry) -> Result<(), ProcessingError>;
}

#[async_trait]
impl InclusionMonitor for InclusionWatcher {
    async fn watch(&self, entry: InclusionEntry) -> Result<(), ProcessingError> {
        InclusionWatcher::watch(self, entry).await
    }
}

/// Ed25519 witness/signer over the credential's canonical JSON (the
/// document without its `proof` array).
pub struct Ed25519Witness {
    key: SigningKey,
    verification_method: String,
    domain: Option<Iri>,
}

impl Ed25519Witness {
    /// A witness identified by `verification_method`, optionally bound to
    /// a witnessing domain.
    #[must_use]
    pub fn new(key: SigningKey, verification_method: String, domain: Option<Iri>) -> Self {
        Self {
            key,
            verification_method,
            domain,
        }
    }

    fn proof_over(&self, vc: &AnchorCredential) -> Result<Proof, WriterError> {
        let mut unsigned = vc.clone();
        unsigned.proof.clear();
        let payload = serde_json::to_vec(&unsigned).map_err(WriterError::fatal)?;
        let signature = shared_crypto::sign(&self.key, &payload);
        Ok(Proof {
            kind: "Ed25519Signature2020".to_string(),
            domain: self.domain.clone(),
            created: Utc::now(),
            verification_method: self.verification_method.clone(),
            proof_purpose: "assertionMethod".to_string(),
            proof_value: URL_SAFE_NO_PAD.encode(signature),
        })
    }
}

#[async_trait]
impl LocalWitness for Ed25519Witness {
    async fn witness(&self, vc: &AnchorCredential) -> Result<Proof, WriterError> {
        self.proof_over(vc)
    }
}

#[async_trait]
impl CredentialSigner for Ed25519Witness {
    async fn sign(&self, vc: &mut AnchorCredential) -> Result<(), WriterError> {
        let proof = self.proof_over(vc)?;
        vc.add_proof(proof);
        Ok(())
    }
}

/// In-memory anchor graph: content-addresses the credential JSON with the
/// hashlink codec, carrying the CAS URL as the retrieval link.
pub struct MemoryAnchorGraph {
    codec: HashlinkCodec,
    cas_iri: Iri,
    entries: Mutex<HashMap<String, AnchorCredential>>,
}

impl MemoryAnchorGraph {
    /// A graph serving content through `cas_iri`.
    #[must_use]
    pub fn new(cas_iri: Iri) -> Self {
        Self {
            codec: HashlinkCodec::default(),
            cas_iri,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Resolve a stored credential by its hashlink.
    #[must_use]
    pub fn get(&self, hashlink: &str) -> Option<AnchorCredential> {
        self.entries.lock().get(hashlink).cloned()
    }
}

#[async_trait]
impl AnchorGraph for MemoryAnchorGraph {
    async fn add(&self, vc: &AnchorCredential) -> Result<String, WriterError> {
        let payload = serde_json::to_vec(vc).map_err(WriterError::fatal)?;
        let resource = self.codec.resource_hash(&payload);
        let link = self.cas_iri.join(&resource).to_string();
        let hashlink = self
            .codec
            .encode(&payload, &[link])
            .map_err(WriterError::fatal)?;
        self.entries.lock().insert(hashlink.clone(), vc.clone());
        Ok(hashlink)
    }
}

/// In-memory [`VcStore`].
#[derive(Default)]
pub struct MemoryVcStore {
    credentials: Mutex<HashMap<Iri, AnchorCredential>>,
}

impl MemoryVcStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VcStore for MemoryVcStore {
    async fn put(&self, vc: &AnchorCredential) -> Result<(), WriterError> {
        self.credentials.lock().insert(vc.id.clone(), vc.clone());
        Ok(())
    }

    async fn get(&self, id: &Iri) -> Result<AnchorCredential, WriterError> {
        self.credentials
            .lock()
            .get(id)
            .cloned()
            .ok_or_else(|| WriterError::fatal(format!("credential not stored: {id}")))
    }
}

/// In-memory [`WitnessStore`].
#[derive(Default)]
pub struct MemoryWitnessStore {
    witnesses: Mutex<HashMap<Iri, Vec<WitnessEntry>>>,
    statuses: Mutex<HashMap<Iri, VcStatus>>,
}

impl MemoryWitnessStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stored witnesses for a credential.
    #[must_use]
    pub fn witnesses(&self, vc_id: &Iri) -> Vec<WitnessEntry> {
        self.witnesses.lock().get(vc_id).cloned().unwrap_or_default()
    }

    /// Stored status for a credential.
    #[must_use]
    pub fn status(&self, vc_id: &Iri) -> Option<VcStatus> {
        self.statuses.lock().get(vc_id).copied()
    }
}

#[async_trait]
impl WitnessStore for MemoryWitnessStore {
    async fn put_witnesses(
        &self,
        vc_id: &Iri,
        witnesses: &[WitnessEntry],
    ) -> Result<(), WriterError> {
        self.witnesses
            .lock()
            .insert(vc_id.clone(), witnesses.to_vec());
        Ok(())
    }

    async fn set_status(&self, vc_id: &Iri, status: VcStatus) -> Result<(), WriterError> {
        self.statuses.lock().insert(vc_id.clone(), status);
        Ok(())
    }
}

/// In-memory anchor index: the latest anchor and origin per operation
/// suffix, fed by the batch source and the completed-anchor path.
#[derive(Default)]
pub struct MemoryAnchorIndex {
    latest: Mutex<HashMap<String, (Option<String>, Option<Iri>)>>,
}

impl MemoryAnchorIndex {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an anchored suffix.
    pub fn record(&self, suffix: impl Into<String>, anchor: Option<String>, origin: Option<Iri>) {
        self.latest.lock().insert(suffix.into(), (anchor, origin));
    }
}

#[async_trait]
impl PreviousAnchorResolver for MemoryAnchorIndex {
    async fn latest_anchors(
        &self,
        suffixes: &[String],
    ) -> Result<HashMap<String, Option<String>>, WriterError> {
        let latest = self.latest.lock();
        Ok(suffixes
            .iter()
            .map(|s| (s.clone(), latest.get(s).and_then(|(a, _)| a.clone())))
            .collect())
    }
}

#[async_trait]
impl OperationProcessor for MemoryAnchorIndex {
    async fn anchor_origin(&self, suffix: &str) -> Result<Iri, WriterError> {
        self.latest
            .lock()
            .get(suffix)
            .and_then(|(_, origin)| origin.clone())
            .ok_or_else(|| WriterError::fatal(format!("no anchor origin known for {suffix}")))
    }
}
