//! # OM-08 Hashlink Codec
//!
//! Encodes and decodes the `hl:` content addresses used throughout the
//! anchor graph:
//!
//! ```text
//! hl:<u-base64url(multihash(content))>                       no links
//! hl:<resource>:<u-base64url(cbor({0x0f: [link, ...]}))>    with links
//! ```
//!
//! The `u` prefix is the multibase designator for unpadded base64url. The
//! metadata is a CBOR map whose key `0x0f` holds an ordered list of
//! alternate retrieval URLs.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod codec;
pub mod metadata;
pub mod multihash;

pub use codec::{Hashlink, HashlinkCodec, HashlinkError};
