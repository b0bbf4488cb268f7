//! The VC-log wire client.
//!
//! `GET /v1/get-sth`, `/v1/get-sth-consistency`, `/v1/get-entries`,
//! `/v1/get-proof-by-hash`, plus the WebFinger lookup that yields the log's
//! public key.

use crate::rfc6962::Hash;
use crate::sth::SignedTreeHead;
use async_trait::async_trait;
use base64::engine::general_purpose::{STANDARD, URL_SAFE};
use base64::Engine;
use serde::Deserialize;
use shared_discovery::Jrd;
use thiserror::Error;

/// WebFinger property carrying the base64-encoded log public key.
pub const PUBLIC_KEY_PROPERTY: &str = "https://trustbloc.dev/ns/public-key";

/// Errors from log queries.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum VctError {
    /// The queried object does not exist (yet). The inclusion watcher
    /// treats this as "leaf not in the tree".
    #[error("not found: {0}")]
    NotFound(String),

    /// The transport failed.
    #[error("log transport error: {0}")]
    Transport(String),

    /// The response was not the expected shape.
    #[error("malformed log response: {0}")]
    BadResponse(String),
}

impl VctError {
    /// True for the distinguished not-found signal.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

/// An inclusion proof as returned by `get-proof-by-hash`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InclusionProof {
    pub leaf_index: u64,
    pub audit_path: Vec<Hash>,
}

/// The log client contract.
#[async_trait]
pub trait LogClient: Send + Sync {
    /// Current signed tree head.
    async fn get_sth(&self, log_url: &str) -> Result<SignedTreeHead, VctError>;

    /// Consistency proof between two tree sizes.
    async fn get_sth_consistency(
        &self,
        log_url: &str,
        first: u64,
        second: u64,
    ) -> Result<Vec<Hash>, VctError>;

    /// Leaf inputs for the inclusive range `[start, end]`.
    async fn get_entries(
        &self,
        log_url: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<Vec<u8>>, VctError>;

    /// Inclusion proof for a leaf hash against `tree_size`.
    async fn get_proof_by_hash(
        &self,
        log_url: &str,
        leaf_hash: &Hash,
        tree_size: u64,
    ) -> Result<InclusionProof, VctError>;

    /// The log's public key, from its WebFinger document.
    async fn get_public_key(&self, log_url: &str) -> Result<Vec<u8>, VctError>;
}

#[derive(Deserialize)]
struct ConsistencyResponse {
    #[serde(default)]
    consistency: Vec<String>,
}

#[derive(Deserialize)]
struct EntriesResponse {
    #[serde(default)]
    entries: Vec<LogEntry>,
}

#[derive(Deserialize)]
struct LogEntry {
    leaf_input: String,
}

#[derive(Deserialize)]
struct ProofByHashResponse {
    leaf_index: u64,
    #[serde(default)]
    audit_path: Vec<String>,
}

/// reqwest-backed [`LogClient`].
#[derive(Default)]
pub struct HttpLogClient {
    http: reqwest::Client,
}

impl HttpLogClient {
    #[must_use]
    pub fn new(http: reqwest::Client) -> Self {
        Self { http }
    }

    async fn get<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, VctError> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| VctError::Transport(e.to_string()))?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(VctError::NotFound(url.to_string()));
        }
        if !response.status().is_success() {
            return Err(VctError::Transport(format!(
                "{url}: status {}",
                response.status()
            )));
        }
        response
            .json()
            .await
            .map_err(|e| VctError::BadResponse(e.to_string()))
    }
}

fn decode_hash(encoded: &str) -> Result<Hash, VctError> {
    let bytes = STANDARD
        .decode(encoded)
        .map_err(|e| VctError::BadResponse(format!("hash not base64: {e}")))?;
    bytes
        .as_slice()
        .try_into()
        .map_err(|_| VctError::BadResponse(format!("hash has {} bytes", bytes.len())))
}

#[async_trait]
impl LogClient for HttpLogClient {
    async fn get_sth(&self, log_url: &str) -> Result<SignedTreeHead, VctError> {
        let url = format!("{}/v1/get-sth", log_url.trim_end_matches('/'));
        self.get(&url).await
    }

    async fn get_sth_consistency(
        &self,
        log_url: &str,
        first: u64,
        second: u64,
    ) -> Result<Vec<Hash>, VctError> {
        let url = format!(
            "{}/v1/get-sth-consistency?first={first}&second={second}",
            log_url.trim_end_matches('/')
        );
        let response: ConsistencyResponse = self.get(&url).await?;
        response.consistency.iter().map(|h| decode_hash(h)).collect()
    }

    async fn get_entries(
        &self,
        log_url: &str,
        start: u64,
        end: u64,
    ) -> Result<Vec<Vec<u8>>, VctError> {
        let url = format!(
            "{}/v1/get-entries?start={start}&end={end}",
            log_url.trim_end_matches('/')
        );
        let response: EntriesResponse = self.get(&url).await?;
        response
            .entries
            .iter()
            .map(|e| {
                STANDARD
                    .decode(&e.leaf_input)
                    .map_err(|err| VctError::BadResponse(format!("leaf_input not base64: {err}")))
            })
            .collect()
    }

    async fn get_proof_by_hash(
        &self,
        log_url: &str,
        leaf_hash: &Hash,
        tree_size: u64,
    ) -> Result<InclusionProof, VctError> {
        let encoded = URL_SAFE.encode(leaf_hash);
        let url = format!(
            "{}/v1/get-proof-by-hash?hash={encoded}&tree_size={tree_size}",
            log_url.trim_end_matches('/')
        );
        let response: ProofByHashResponse = self.get(&url).await?;
        Ok(InclusionProof {
            leaf_index: response.leaf_index,
            audit_path: response
                .audit_path
                .iter()
                .map(|h| decode_hash(h))
                .collect::<Result<_, _>>()?,
        })
    }

    async fn get_public_key(&self, log_url: &str) -> Result<Vec<u8>, VctError> {
        let url = format!(
            "{}/.well-known/webfinger?resource={log_url}",
            log_url.trim_end_matches('/')
        );
        let jrd: Jrd = self.get(&url).await?;
        let encoded = jrd
            .property_str(PUBLIC_KEY_PROPERTY)
            .ok_or_else(|| VctError::BadResponse(format!("{log_url}: no public-key property")))?;
        STANDARD
            .decode(encoded)
            .map_err(|e| VctError::BadResponse(format!("public key not base64: {e}")))
    }
}
