//! Minimal multihash support.
//!
//! A multihash is `<code><length><digest>`; this codec only ever produces
//! and accepts SHA2-256 (code 0x12, length 32), so the header is two fixed
//! bytes plus a length check on decode.

use crate::codec::HashlinkError;

/// Multicodec code for SHA2-256.
pub const SHA2_256: u8 = 0x12;

const SHA2_256_LEN: usize = 32;

/// Wrap a SHA2-256 digest as a multihash.
#[must_use]
pub fn encode_sha2_256(digest: &[u8; 32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(2 + SHA2_256_LEN);
    out.push(SHA2_256);
    out.push(SHA2_256_LEN as u8);
    out.extend_from_slice(digest);
    out
}

/// Split a multihash into its code and digest, validating the length byte.
pub fn decode(bytes: &[u8]) -> Result<(u8, &[u8]), HashlinkError> {
    if bytes.len() < 2 {
        return Err(HashlinkError::InvalidMultihash(
            "too short for code and length".to_string(),
        ));
    }
    let code = bytes[0];
    let length = bytes[1] as usize;
    let digest = &bytes[2..];
    if digest.len() != length {
        return Err(HashlinkError::InvalidMultihash(format!(
            "declared digest length {length}, found {}",
            digest.len()
        )));
    }
    Ok((code, digest))
}
