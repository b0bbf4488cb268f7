//! # Shared Crypto
//!
//! Ed25519 signing, SHA-256 digests, and HTTP-signature construction and
//! verification for the federation overlay. Key material stays behind
//! [`KeyResolver`] so transports never see private keys.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod digest;
pub mod httpsig;
pub mod keys;

pub use digest::sha256;
pub use httpsig::{HttpSignatureVerifier, KeyResolver, SignatureHeader, StaticKeyResolver};
pub use keys::{generate_keypair, sign, verify, CryptoError};
