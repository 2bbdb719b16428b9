//! # Content Hashing
//!
//! Cheap change detection for fetched payloads.
//!
//! A payload is encoded with postcard and at most the first
//! [`HASH_BYTE_LIMIT`] bytes are hashed, followed by the total encoded
//! length. Two payloads of equal length that agree on that prefix hash the
//! same, and the cache then treats a refresh as "unchanged". Payload
//! changes past 64 KiB that keep the length are therefore missed until the
//! next forced refresh.
//!
//! The default hash is 64-bit FNV-1a. With the `crypto-hash` feature the
//! prefix is hashed with BLAKE3 and truncated to 64 bits.

use crate::PantauError;
use crate::primitives::HASH_BYTE_LIMIT;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A 64-bit content fingerprint.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub u64);

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:016x}", self.0)
    }
}

/// Hash a serializable payload.
pub fn content_hash<T: Serialize + ?Sized>(payload: &T) -> Result<ContentHash, PantauError> {
    let bytes =
        postcard::to_stdvec(payload).map_err(|e| PantauError::SerializationError(e.to_string()))?;
    Ok(hash_bytes(&bytes))
}

/// Hash an encoded payload: bounded prefix plus total length.
#[must_use]
pub fn hash_bytes(bytes: &[u8]) -> ContentHash {
    let prefix = bytes.get(..HASH_BYTE_LIMIT).unwrap_or(bytes);
    ContentHash(digest(prefix, bytes.len() as u64))
}

#[cfg(not(feature = "crypto-hash"))]
fn digest(prefix: &[u8], total_len: u64) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf2_9ce4_8422_2325;
    const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

    prefix
        .iter()
        .chain(total_len.to_le_bytes().iter())
        .fold(FNV_OFFSET, |hash, byte| {
            (hash ^ u64::from(*byte)).wrapping_mul(FNV_PRIME)
        })
}

#[cfg(feature = "crypto-hash")]
fn digest(prefix: &[u8], total_len: u64) -> u64 {
    let mut hasher = blake3::Hasher::new();
    hasher.update(prefix);
    hasher.update(&total_len.to_le_bytes());
    let out = hasher.finalize();
    let mut first = [0u8; 8];
    first.copy_from_slice(&out.as_bytes()[..8]);
    u64::from_le_bytes(first)
}

// =============================================================================
// TESTS
// =============================================================================
