//! RFC 6962 Merkle tree hashing and proof verification.
//!
//! Leaf hashes are domain-separated with `0x00`, interior nodes with
//! `0x01`. Trees split at the largest power of two strictly smaller than
//! the leaf count. Proof generation is included so tests and local logs can
//! produce what the verifiers check.

use sha2::{Digest, Sha256};
use thiserror::Error;

/// A node or leaf hash.
pub type Hash = [u8; 32];

/// Errors from proof verification.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ProofError {
    /// The proof is empty where a non-empty proof is required.
    #[error("empty proof")]
    EmptyProof,

    /// The proof does not connect the inputs to the expected root(s).
    #[error("proof does not verify: {0}")]
    Mismatch(String),

    /// The proof has the wrong length for the tree shape.
    #[error("malformed proof: {0}")]
    Malformed(String),

    /// Sizes or indices are out of range.
    #[error("invalid range: {0}")]
    InvalidRange(String),
}

/// Leaf hash: `SHA-256(0x00 || leaf_input)`.
#[must_use]
pub fn leaf_hash(leaf_input: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x00]);
    hasher.update(leaf_input);
    hasher.finalize().into()
}

/// Interior node hash: `SHA-256(0x01 || left || right)`.
#[must_use]
pub fn node_hash(left: &Hash, right: &Hash) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update([0x01]);
    hasher.update(left);
    hasher.update(right);
    hasher.finalize().into()
}

/// The leaf input for a timestamped entry: big-endian millisecond timestamp
/// followed by the entry bytes.
#[must_use]
pub fn timestamped_leaf(timestamp_ms: u64, data: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(8 + data.len());
    out.extend_from_slice(&timestamp_ms.to_be_bytes());
    out.extend_from_slice(data);
    out
}

/// Leaf hash of a timestamped entry.
#[must_use]
pub fn timestamped_leaf_hash(timestamp_ms: u64, data: &[u8]) -> Hash {
    leaf_hash(&timestamped_leaf(timestamp_ms, data))
}

/// The largest power of two strictly smaller than `n` (`n >= 2`).
fn split_point(n: usize) -> usize {
    let mut k = 1;
    while k * 2 < n {
        k *= 2;
    }
    k
}

/// The Merkle tree head over `leaves` (leaf inputs, not hashes).
///
/// The empty tree hashes to `SHA-256("")`.
#[must_use]
pub fn root_from_leaves(leaves: &[Vec<u8>]) -> Hash {
    match leaves.len() {
        0 => Sha256::digest([]).into(),
        1 => leaf_hash(&leaves[0]),
        n => {
            let k = split_point(n);
            node_hash(&root_from_leaves(&leaves[..k]), &root_from_leaves(&leaves[k..]))
        }
    }
}

/// The inclusion path for `index` in `leaves`.
#[must_use]
pub fn inclusion_path(leaves: &[Vec<u8>], index: usize) -> Vec<Hash> {
    if leaves.len() <= 1 || index >= leaves.len() {
        return Vec::new();
    }
    let k = split_point(leaves.len());
    if index < k {
        let mut path = inclusion_path(&leaves[..k], index);
        path.push(root_from_leaves(&leaves[k..]));
        path
    } else {
        let mut path = inclusion_path(&leaves[k..], index - k);
        path.push(root_from_leaves(&leaves[..k]));
        path
    }
}

/// The consistency path between `first` leaves and the full set.
#[must_use]
pub fn consistency_path(leaves: &[Vec<u8>], first: usize) -> Vec<Hash> {
    if first == 0 || first >= leaves.len() {
        return Vec::new();
    }
    subproof(leaves, first, true)
}

fn subproof(leaves: &[Vec<u8>], m: usize, complete: bool) -> Vec<Hash> {
    let n = leaves.len();
    if m == n {
        return if complete {
            Vec::new()
        } else {
            vec![root_from_leaves(leaves)]
        };
    }
    let k = split_point(n);
    if m <= k {
        let mut path = subproof(&leaves[..k], m, complete);
        path.push(root_from_leaves(&leaves[k..]));
        path
    } else {
        let mut path = subproof(&leaves[k..], m - k, false);
        path.push(root_from_leaves(&leaves[..k]));
        path
    }
}

/// Verify an inclusion (audit) path.
pub fn verify_inclusion(
    leaf: &Hash,
    leaf_index: u64,
    tree_size: u64,
    path: &[Hash],
    root: &Hash,
) -> Result<(), ProofError> {
    if tree_size == 0 || leaf_index >= tree_size {
        return Err(ProofError::InvalidRange(format!(
            "index {leaf_index} outside tree of size {tree_size}"
        )));
    }

    let mut fn_ = leaf_index;
    let mut sn = tree_size - 1;
    let mut hash = *leaf;

    for sibling in path {
        if sn == 0 {
            return Err(ProofError::Malformed("path longer than tree depth".to_string()));
        }
        if fn_ & 1 == 1 || fn_ == sn {
            hash = node_hash(sibling, &hash);
            if fn_ & 1 == 0 {
                while fn_ & 1 == 0 && fn_ != 0 {
                    fn_ >>= 1;
                    sn >>= 1;
                }
            }
        } else {
            hash = node_hash(&hash, sibling);
        }
        fn_ >>= 1;
        sn >>= 1;
    }

    if sn != 0 {
        return Err(ProofError::Malformed("path shorter than tree depth".to_string()));
    }
    if hash != *root {
        return Err(ProofError::Mismatch("computed root differs".to_string()));
    }
    Ok(())
}

/// Verify a consistency proof between two tree heads.
///
/// `first` must be positive and smaller than `second`; equal sizes require
/// equal roots and an empty proof, and the empty tree needs no proof at all
/// (the caller decides that case).
pub fn verify_consistency(
    first: u64,
    second: u64,
    first_root: &Hash,
    second_root: &Hash,
    proof: &[Hash],
) -> Result<(), ProofError> {
    if first > second {
        return Err(ProofError::InvalidRange(format!(
            "first {first} larger than second {second}"
        )));
    }
    if first == second {
        if !proof.is_empty() {
            return Err(ProofError::Malformed("proof for equal sizes".to_string()));
        }
        if first_root != second_root {
            return Err(ProofError::Mismatch("equal sizes, different roots".to_string()));
        }
        return Ok(());
    }
    if first == 0 {
        return Err(ProofError::InvalidRange(
            "consistency from the empty tree needs no proof".to_string(),
        ));
    }
    if proof.is_empty() {
        return Err(ProofError::EmptyProof);
    }

    // When first is an exact power of two, the first root is itself the
    // starting subtree hash and is not repeated in the proof.
    let mut path = proof.iter();
    let mut fn_ = first - 1;
    let mut sn = second - 1;
    while fn_ & 1 == 1 {
        fn_ >>= 1;
        sn >>= 1;
    }
    let (mut fr, mut sr) = if fn_ == 0 {
        (*first_root, *first_root)
    } else {
        let seed = path
            .next()
            .ok_or_else(|| ProofError::Malformed("proof exhausted at seed".to_string()))?;
        (*seed, *seed)
    };

    while sn > 0 {
        if fn_ & 1 == 1 || fn_ == sn {
            let sibling = path
                .next()
                .ok_or_else(|| ProofError::Malformed("proof too short".to_string()))?;
            fr = node_hash(sibling, &fr);
            sr = node_hash(sibling, &sr);
            if fn_ & 1 == 0 {
                while fn_ & 1 == 0 && fn_ != 0 {
                    fn_ >>= 1;
                    sn >>= 1;
                }
            }
        } else {
            let sibling = path
                .next()
                .ok_or_else(|| ProofError::Malformed("proof too short".to_string()))?;
            sr = node_hash(&sr, sibling);
        }
        fn_ >>= 1;
        sn >>= 1;
    }

    if fr != *first_root {
        return Err(ProofError::Mismatch("first root differs".to_string()));
    }
    if sr != *second_root {
        return Err(ProofError::Mismatch("second root differs".to_string()));
    }
    if path.next().is_some() {
        return Err(ProofError::Malformed("proof too long".to_string()));
    }
    Ok(())
}
