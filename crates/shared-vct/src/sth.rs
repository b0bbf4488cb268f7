//! Signed tree heads.

use serde::{Deserialize, Serialize};
use shared_crypto::CryptoError;

/// TreeHeadSignature version byte (V1).
const VERSION_V1: u8 = 0;
/// Signature-type byte for tree heads.
const SIGNATURE_TYPE_TREE_HEAD: u8 = 1;

mod b64 {
    use base64::engine::general_purpose::STANDARD;
    use base64::Engine;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        STANDARD.decode(s).map_err(serde::de::Error::custom)
    }
}

/// A signed tree head as served by `get-sth`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTreeHead {
    /// Number of leaves in the tree.
    pub tree_size: u64,
    /// Milliseconds since the epoch.
    pub timestamp: u64,
    /// Root hash at `tree_size`.
    #[serde(with = "b64")]
    pub sha256_root_hash: Vec<u8>,
    /// Signature over the canonical serialization.
    #[serde(with = "b64")]
    pub tree_head_signature: Vec<u8>,
}

impl SignedTreeHead {
    /// The canonical byte layout the signature covers:
    /// `{V1, TreeHeadSignatureType, timestamp, tree_size, root_hash}` with
    /// big-endian integers.
    #[must_use]
    pub fn signed_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(2 + 8 + 8 + self.sha256_root_hash.len());
        out.push(VERSION_V1);
        out.push(SIGNATURE_TYPE_TREE_HEAD);
        out.extend_from_slice(&self.timestamp.to_be_bytes());
        out.extend_from_slice(&self.tree_size.to_be_bytes());
        out.extend_from_slice(&self.sha256_root_hash);
        out
    }

    /// Verify the tree-head signature against a raw Ed25519 public key.
    pub fn verify_signature(&self, public_key: &[u8]) -> Result<(), CryptoError> {
        shared_crypto::verify(public_key, &self.signed_bytes(), &self.tree_head_signature)
    }

    /// The root hash as a fixed array, when well-formed.
    #[must_use]
    pub fn root(&self) -> Option<[u8; 32]> {
        self.sha256_root_hash.as_slice().try_into().ok()
    }
}
