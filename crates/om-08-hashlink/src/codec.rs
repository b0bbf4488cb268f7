//! The `hl:` codec.

use crate::metadata;
use crate::multihash;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Multibase designator for unpadded base64url.
const MULTIBASE_BASE64URL: char = 'u';

/// Errors from hashlink encoding and parsing.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum HashlinkError {
    /// Input does not start with `hl:`.
    #[error("not a hashlink: {0}")]
    MissingPrefix(String),

    /// Input has fewer than two or more than three `:`-separated parts.
    #[error("hashlink must have two or three parts, found {0}")]
    PartCount(usize),

    /// A segment is not valid `u`-multibase base64url.
    #[error("invalid multibase segment: {0}")]
    InvalidMultibase(String),

    /// The resource segment is not a valid multihash.
    #[error("invalid multihash: {0}")]
    InvalidMultihash(String),

    /// The multihash code does not match the codec's configured code.
    #[error("unsupported multihash code: expected {expected:#04x}, found {found:#04x}")]
    CodeMismatch { expected: u8, found: u8 },

    /// The metadata segment is not the expected CBOR shape.
    #[error("invalid link metadata: {0}")]
    InvalidMetadata(String),
}

/// A parsed hashlink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Hashlink {
    /// The `u`-multibase encoded multihash of the resource.
    pub resource_hash: String,
    /// Ordered alternate retrieval URLs.
    pub links: Vec<String>,
}

/// Hashlink encoder/decoder pinned to one multihash code.
#[derive(Debug, Clone)]
pub struct HashlinkCodec {
    code: u8,
}

impl Default for HashlinkCodec {
    fn default() -> Self {
        Self {
            code: multihash::SHA2_256,
        }
    }
}

impl HashlinkCodec {
    /// A codec accepting only the given multihash code.
    #[must_use]
    pub fn with_code(code: u8) -> Self {
        Self { code }
    }

    /// The multibase-encoded multihash of `content`.
    #[must_use]
    pub fn resource_hash(&self, content: &[u8]) -> String {
        let digest: [u8; 32] = Sha256::digest(content).into();
        let mh = multihash::encode_sha2_256(&digest);
        format!("{MULTIBASE_BASE64URL}{}", URL_SAFE_NO_PAD.encode(mh))
    }

    /// Encode `content` (and optional links) as a hashlink.
    pub fn encode(&self, content: &[u8], links: &[String]) -> Result<String, HashlinkError> {
        let resource = self.resource_hash(content);
        if links.is_empty() {
            return Ok(format!("hl:{resource}"));
        }
        let cbor = metadata::encode_links(links)?;
        Ok(format!(
            "hl:{resource}:{MULTIBASE_BASE64URL}{}",
            URL_SAFE_NO_PAD.encode(cbor)
        ))
    }

    /// Parse a hashlink, validating the multihash code and metadata shape.
    pub fn parse(&self, input: &str) -> Result<Hashlink, HashlinkError> {
        let parts: Vec<&str> = input.split(':').collect();
        if parts.first() != Some(&"hl") {
            return Err(HashlinkError::MissingPrefix(input.to_string()));
        }
        if parts.len() < 2 || parts.len() > 3 {
            return Err(HashlinkError::PartCount(parts.len()));
        }

        let resource = parts[1];
        let mh = decode_multibase(resource)?;
        let (code, _digest) = multihash::decode(&mh)?;
        if code != self.code {
            return Err(HashlinkError::CodeMismatch {
                expected: self.code,
                found: code,
            });
        }

        let links = match parts.get(2) {
            Some(segment) => metadata::decode_links(&decode_multibase(segment)?)?,
            None => Vec::new(),
        };

        Ok(Hashlink {
            resource_hash: resource.to_string(),
            links,
        })
    }
}

fn decode_multibase(segment: &str) -> Result<Vec<u8>, HashlinkError> {
    let rest = segment
        .strip_prefix(MULTIBASE_BASE64URL)
        .ok_or_else(|| HashlinkError::InvalidMultibase(segment.to_string()))?;
    URL_SAFE_NO_PAD
        .decode(rest)
        .map_err(|e| HashlinkError::InvalidMultibase(e.to_string()))
}
