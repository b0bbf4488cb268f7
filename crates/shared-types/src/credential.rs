//! # Anchor Credential
//!
//! The signed JSON credential whose subject identifies a batch of DID
//! operations by a content-addressed core index. Built by the anchor writer,
//! witnessed locally or by remote peers, then announced via a Create.

use crate::iri::Iri;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sidetree-style operation types referenced by an anchor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationType {
    Create,
    Update,
    Recover,
    Deactivate,
}

impl OperationType {
    /// True for operations that declare their own anchor origin.
    #[must_use]
    pub fn declares_origin(&self) -> bool {
        matches!(self, Self::Create | Self::Recover)
    }
}

/// A reference to a single DID operation inside a batch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationReference {
    /// The operation's unique suffix.
    pub unique_suffix: String,
    /// The operation type.
    #[serde(rename = "type")]
    pub kind: OperationType,
    /// Declared anchor origin (Create/Recover only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor_origin: Option<Iri>,
}

/// The most recent anchor for a suffix, carried in the credential subject.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreviousAnchor {
    /// The operation suffix.
    pub suffix: String,
    /// The hashlink of the previous anchor, absent for first anchors.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anchor: Option<String>,
}

/// The credential subject: the batch description.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSubject {
    /// Number of operations in the batch.
    pub operation_count: u64,
    /// Content-addressed core index URI.
    pub core_index: String,
    /// Sidetree namespace.
    pub namespace: String,
    /// Protocol version.
    pub version: u64,
    /// Most recent anchors per suffix.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub previous_anchors: Vec<PreviousAnchor>,
    /// The originating service IRI.
    pub anchor_origin: Iri,
}

/// A linked-data proof attached to a credential.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(rename = "type")]
    pub kind: String,
    /// The witnessing domain.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<Iri>,
    /// RFC 3339 creation time.
    pub created: DateTime<Utc>,
    pub verification_method: String,
    pub proof_purpose: String,
    pub proof_value: String,
}

/// An anchor credential (VC).
///
/// The `id` is unique per originator. A credential is immutable once signed;
/// witnessing appends proofs but never rewrites the subject.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorCredential {
    #[serde(rename = "@context")]
    pub context: Vec<String>,
    pub id: Iri,
    #[serde(rename = "type")]
    pub kind: Vec<String>,
    pub issuer: Iri,
    pub issuance_date: DateTime<Utc>,
    pub credential_subject: AnchorSubject,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub proof: Vec<Proof>,
}

impl AnchorCredential {
    /// Standard context entries for anchor credentials.
    pub const CONTEXTS: [&'static str; 2] = [
        "https://www.w3.org/2018/credentials/v1",
        "https://w3id.org/activityanchors/v1",
    ];

    /// Build an unsigned credential for a batch.
    #[must_use]
    pub fn new(id: Iri, issuer: Iri, issued: DateTime<Utc>, subject: AnchorSubject) -> Self {
        Self {
            context: Self::CONTEXTS.iter().map(ToString::to_string).collect(),
            id,
            kind: vec!["VerifiableCredential".to_string(), "AnchorCredential".to_string()],
            issuer,
            issuance_date: issued,
            credential_subject: subject,
            proof: Vec::new(),
        }
    }

    /// Append a witness proof.
    pub fn add_proof(&mut self, proof: Proof) {
        self.proof.push(proof);
    }
}
