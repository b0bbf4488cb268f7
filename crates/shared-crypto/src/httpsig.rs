//! HTTP signatures.
//!
//! Inbound federation requests carry a `Signature` header binding the
//! request line and selected headers to the sender's key. Verification
//! resolves the key id to an actor IRI through [`KeyResolver`]; that IRI is
//! what the inbox pipeline compares against the activity's `actor`.

use crate::digest::sha256;
use crate::keys::{sign, verify, CryptoError};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::SigningKey;
use shared_types::Iri;
use std::collections::HashMap;

/// Resolves a signature `keyId` to the actor that owns it and the raw
/// Ed25519 public key.
#[async_trait]
pub trait KeyResolver: Send + Sync {
    async fn resolve(&self, key_id: &str) -> Result<(Iri, Vec<u8>), CryptoError>;
}

/// Fixed key table, for tests and single-tenant deployments.
#[derive(Default)]
pub struct StaticKeyResolver {
    keys: HashMap<String, (Iri, Vec<u8>)>,
}

impl StaticKeyResolver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a key.
    pub fn add(&mut self, key_id: impl Into<String>, actor: Iri, public_key: Vec<u8>) {
        self.keys.insert(key_id.into(), (actor, public_key));
    }
}

#[async_trait]
impl KeyResolver for StaticKeyResolver {
    async fn resolve(&self, key_id: &str) -> Result<(Iri, Vec<u8>), CryptoError> {
        self.keys
            .get(key_id)
            .cloned()
            .ok_or_else(|| CryptoError::UnknownKey(key_id.to_string()))
    }
}

/// Parsed `Signature` header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignatureHeader {
    pub key_id: String,
    /// Space-separated header names covered by the signature.
    pub headers: Vec<String>,
    /// Raw signature bytes.
    pub signature: Vec<u8>,
}

impl SignatureHeader {
    /// Parse a `keyId="...",headers="...",signature="..."` header value.
    pub fn parse(value: &str) -> Result<Self, CryptoError> {
        let mut fields = HashMap::new();
        for part in value.split(',') {
            let (name, quoted) = part
                .trim()
                .split_once('=')
                .ok_or_else(|| CryptoError::MalformedHeader(part.to_string()))?;
            let unquoted = quoted.trim_matches('"');
            fields.insert(name.to_string(), unquoted.to_string());
        }

        let key_id = fields
            .remove("keyId")
            .ok_or_else(|| CryptoError::MalformedHeader("missing keyId".to_string()))?;
        let headers = fields
            .remove("headers")
            .unwrap_or_else(|| "(request-target)".to_string())
            .split_whitespace()
            .map(str::to_lowercase)
            .collect();
        let signature = fields
            .remove("signature")
            .ok_or_else(|| CryptoError::MalformedHeader("missing signature".to_string()))?;
        let signature = BASE64
            .decode(signature)
            .map_err(|e| CryptoError::MalformedHeader(e.to_string()))?;

        Ok(Self {
            key_id,
            headers,
            signature,
        })
    }

    fn format(&self) -> String {
        format!(
            "keyId=\"{}\",algorithm=\"ed25519\",headers=\"{}\",signature=\"{}\"",
            self.key_id,
            self.headers.join(" "),
            BASE64.encode(&self.signature)
        )
    }
}

/// Build the signing string for `covered` header names.
///
/// `(request-target)` expands to `<method-lowercase> <path>`; every other
/// name takes its value from `headers`.
fn signing_string(
    covered: &[String],
    method: &str,
    path: &str,
    headers: &HashMap<String, String>,
) -> Result<String, CryptoError> {
    let mut lines = Vec::with_capacity(covered.len());
    for name in covered {
        if name == "(request-target)" {
            lines.push(format!("(request-target): {} {}", method.to_lowercase(), path));
        } else {
            let value = headers
                .get(name)
                .ok_or_else(|| CryptoError::MalformedHeader(format!("header not present: {name}")))?;
            lines.push(format!("{name}: {value}"));
        }
    }
    Ok(lines.join("\n"))
}

/// Sign an outbound request, returning the `Signature` header value and the
/// `Digest` header value for the body.
pub fn sign_request(
    key: &SigningKey,
    key_id: &str,
    method: &str,
    path: &str,
    host: &str,
    date: &str,
    body: &[u8],
) -> Result<(String, String), CryptoError> {
    let digest = format!("SHA-256={}", BASE64.encode(sha256(body)));
    let mut headers = HashMap::new();
    headers.insert("host".to_string(), host.to_string());
    headers.insert("date".to_string(), date.to_string());
    headers.insert("digest".to_string(), digest.clone());

    let covered: Vec<String> = ["(request-target)", "host", "date", "digest"]
        .iter()
        .map(ToString::to_string)
        .collect();
    let to_sign = signing_string(&covered, method, path, &headers)?;
    let signature = sign(key, to_sign.as_bytes());

    let header = SignatureHeader {
        key_id: key_id.to_string(),
        headers: covered,
        signature: signature.to_vec(),
    };
    Ok((header.format(), digest))
}

/// Verifies inbound request signatures and yields the signing actor.
pub struct HttpSignatureVerifier {
    resolver: Box<dyn KeyResolver>,
}

impl HttpSignatureVerifier {
    #[must_use]
    pub fn new(resolver: Box<dyn KeyResolver>) -> Self {
        Self { resolver }
    }

    /// Verify the `Signature` header of a request.
    ///
    /// `headers` maps lowercase header names to values. On success, returns
    /// the actor IRI that owns the signing key.
    pub async fn verify_request(
        &self,
        method: &str,
        path: &str,
        headers: &HashMap<String, String>,
    ) -> Result<Iri, CryptoError> {
        let raw = headers
            .get("signature")
            .ok_or_else(|| CryptoError::MalformedHeader("missing Signature header".to_string()))?;
        let parsed = SignatureHeader::parse(raw)?;

        let (actor, public_key) = self.resolver.resolve(&parsed.key_id).await?;
        let to_verify = signing_string(&parsed.headers, method, path, headers)?;
        verify(&public_key, to_verify.as_bytes(), &parsed.signature)?;
        Ok(actor)
    }
}
