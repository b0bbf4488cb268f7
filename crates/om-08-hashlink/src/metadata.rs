//! CBOR link metadata.
//!
//! The metadata segment is a definite-length CBOR map; key `0x0f` maps to
//! an ordered array of link strings. Other keys are tolerated on decode and
//! never produced on encode.

use crate::codec::HashlinkError;

/// CBOR map key for the link list.
pub const LINKS_KEY: u8 = 0x0f;

/// Encode `{0x0f: links}`.
pub fn encode_links(links: &[String]) -> Result<Vec<u8>, HashlinkError> {
    let mut buf = Vec::new();
    let mut encoder = minicbor::Encoder::new(&mut buf);
    encoder
        .map(1)
        .and_then(|e| e.u8(LINKS_KEY))
        .and_then(|e| e.array(links.len() as u64))
        .map_err(|e| HashlinkError::InvalidMetadata(e.to_string()))?;
    for link in links {
        encoder
            .str(link)
            .map_err(|e| HashlinkError::InvalidMetadata(e.to_string()))?;
    }
    Ok(buf)
}

/// Decode the metadata map, returning the link list (possibly empty).
pub fn decode_links(bytes: &[u8]) -> Result<Vec<String>, HashlinkError> {
    let mut decoder = minicbor::Decoder::new(bytes);
    let entries = decoder
        .map()
        .map_err(|e| HashlinkError::InvalidMetadata(e.to_string()))?
        .ok_or_else(|| {
            HashlinkError::InvalidMetadata("indefinite-length map not allowed".to_string())
        })?;

    let mut links = Vec::new();
    for _ in 0..entries {
        let key = decoder
            .u32()
            .map_err(|e| HashlinkError::InvalidMetadata(format!("non-integer key: {e}")))?;
        if key == u32::from(LINKS_KEY) {
            let count = decoder
                .array()
                .map_err(|e| HashlinkError::InvalidMetadata(format!("links must be a list: {e}")))?
                .ok_or_else(|| {
                    HashlinkError::InvalidMetadata("indefinite-length list not allowed".to_string())
                })?;
            for _ in 0..count {
                let link = decoder.str().map_err(|e| {
                    HashlinkError::InvalidMetadata(format!("links must be strings: {e}"))
                })?;
                links.push(link.to_string());
            }
        } else {
            decoder
                .skip()
                .map_err(|e| HashlinkError::InvalidMetadata(e.to_string()))?;
        }
    }
    Ok(links)
}
