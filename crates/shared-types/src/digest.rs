//! # Canonical Digests
//!
//! Every node must derive the same hash from the same entry, so field order and
//! framing are fixed here and nowhere else.
//!
//! | Entry | Fields (in order) |
//! |-------|-------------------|
//! | Transaction | from, to, amount, data, timestamp, nonce |
//! | Action | fromAccount, type, task, data, fee, timestamp |
//! | Block | previousHash, timestamp, merkleRoot, nonce |
//!
//! Each field is framed with a big-endian `u32` length prefix so that adjacent
//! fields can never be re-split into a colliding preimage.

use sha2::{Digest, Sha256};

use crate::entities::{Hash, ZERO_HASH};

/// Compute SHA-256 of `data`.
#[inline]
pub fn sha256(data: &[u8]) -> Hash {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// Incremental hasher with length-prefixed fields.
#[derive(Default)]
pub struct CanonicalHasher {
    inner: Sha256,
}

impl CanonicalHasher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one framed field.
    pub fn field(mut self, bytes: &[u8]) -> Self {
        self.inner.update((bytes.len() as u32).to_be_bytes());
        self.inner.update(bytes);
        self
    }

    pub fn str_field(self, value: &str) -> Self {
        self.field(value.as_bytes())
    }

    pub fn u64_field(self, value: u64) -> Self {
        self.field(&value.to_be_bytes())
    }

    pub fn finish(self) -> Hash {
        self.inner.finalize().into()
    }
}

/// Binary SHA-256 merkle root over ordered leaf hashes.
///
/// An odd node at any level is paired with itself. An empty list yields the zero
/// hash.
pub fn merkle_root(leaves: &[Hash]) -> Hash {
    if leaves.is_empty() {
        return ZERO_HASH;
    }

    let mut level: Vec<Hash> = leaves.to_vec();
    while level.len() > 1 {
        level = level
            .chunks(2)
            .map(|pair| {
                let left = pair[0];
                let right = pair.get(1).copied().unwrap_or(left);
                let mut hasher = Sha256::new();
                hasher.update(left);
                hasher.update(right);
                hasher.finalize().into()
            })
            .collect();
    }
    level[0]
}

/// Lowercase hex rendering of a hash.
pub fn hash_to_hex(hash: &Hash) -> String {
    hex::encode(hash)
}

/// Short hash prefix for log lines.
pub fn short_hex(hash: &Hash) -> String {
    hex::encode(&hash[..6])
}

/// Parse a 64-character hex string into a hash.
pub fn hash_from_hex(value: &str) -> Option<Hash> {
    let bytes = hex::decode(value).ok()?;
    bytes.try_into().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_deterministic() {
        assert_eq!(sha256(b"hello"), sha256(b"hello"));
        assert_ne!(sha256(b"hello"), sha256(b"hellp"));
    }

    #[test]
    fn test_field_framing_prevents_resplit() {
        let a = CanonicalHasher::new().str_field("ab").str_field("c").finish();
        let b = CanonicalHasher::new().str_field("a").str_field("bc").finish();
        assert_ne!(a, b);
    }

    #[test]
    fn test_merkle_root_odd_leaf_paired_with_itself() {
        let a = [7u8; 32];
        let b = [8u8; 32];
        let c = [9u8; 32];
        assert_eq!(merkle_root(&[a]), a);
        assert_eq!(merkle_root(&[a, b, c]), merkle_root(&[a, b, c, c]));
    }

    #[test]
    fn test_merkle_root_order_sensitive() {
        let a = [1u8; 32];
        let b = [2u8; 32];
        assert_ne!(merkle_root(&[a, b]), merkle_root(&[b, a]));
        assert_eq!(merkle_root(&[]), ZERO_HASH);
    }

    #[test]
    fn test_hex_roundtrip() {
        let hash = sha256(b"x");
        assert_eq!(hash_from_hex(&hash_to_hex(&hash)), Some(hash));
        assert_eq!(hash_from_hex("zz"), None);
    }
}
