//! Ed25519 key operations.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use thiserror::Error;

/// Errors from key and signature handling.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CryptoError {
    /// Key bytes have the wrong length or are off-curve.
    #[error("invalid key material: {0}")]
    InvalidKey(String),

    /// Signature bytes have the wrong length.
    #[error("invalid signature encoding: {0}")]
    InvalidSignature(String),

    /// The signature does not verify.
    #[error("signature verification failed")]
    VerificationFailed,

    /// A required signature header field is missing or malformed.
    #[error("malformed signature header: {0}")]
    MalformedHeader(String),

    /// The signing key is unknown.
    #[error("unknown key: {0}")]
    UnknownKey(String),
}

/// Generate an Ed25519 keypair.
#[must_use]
pub fn generate_keypair() -> SigningKey {
    SigningKey::generate(&mut rand::rngs::OsRng)
}

/// Sign `message` with `key`, returning the 64-byte signature.
#[must_use]
pub fn sign(key: &SigningKey, message: &[u8]) -> [u8; 64] {
    key.sign(message).to_bytes()
}

/// Verify `signature` over `message` against raw 32-byte `public_key`.
pub fn verify(public_key: &[u8], message: &[u8], signature: &[u8]) -> Result<(), CryptoError> {
    let key_bytes: &[u8; 32] = public_key
        .try_into()
        .map_err(|_| CryptoError::InvalidKey(format!("expected 32 bytes, got {}", public_key.len())))?;
    let key = VerifyingKey::from_bytes(key_bytes)
        .map_err(|e| CryptoError::InvalidKey(e.to_string()))?;

    let sig_bytes: &[u8; 64] = signature
        .try_into()
        .map_err(|_| CryptoError::InvalidSignature(format!("expected 64 bytes, got {}", signature.len())))?;
    let signature = Signature::from_bytes(sig_bytes);

    key.verify(message, &signature)
        .map_err(|_| CryptoError::VerificationFailed)
}
