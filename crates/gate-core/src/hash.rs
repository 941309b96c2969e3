//! Digest helpers
//!
//! Credential integrity hashes and QR secret digests both go through
//! [`hash`], so the algorithm (SHA-256) is chosen in one place.

use sha2::{Digest, Sha256};

/// SHA-256 of `data`
pub fn hash(data: &[u8]) -> [u8; 32] {
    Sha256::digest(data).into()
}

/// Hex-encoded [`hash`]
pub fn hash_hex(data: &[u8]) -> String {
    hex::encode(hash(data))
}
