//! Key digests
//!
//! Maps arbitrary keys to fixed-length, filesystem-safe identifiers.

use sha2::{Digest, Sha256};

/// Length of every digest and content hash, in hex characters
pub const DIGEST_LEN: usize = 16;

/// First 16 lowercase hex chars of SHA-256 over `bytes`
pub fn short_sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    let result = hasher.finalize();

    // 8 bytes = 16 hex characters
    hex::encode(&result[..DIGEST_LEN / 2])
}

/// Digest of a cache key, used as the on-disk file stem
pub fn digest(key: &str) -> String {
    short_sha256_hex(key.as_bytes())
}
