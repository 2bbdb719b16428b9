//! # Snapshot Format
//!
//! Binary serialization of a proposal dataset together with the roster it
//! was aggregated against, so a report can be reproduced offline.
//!
//! Format: Header (5 bytes) + postcard-serialized [`Snapshot`].
//! - 4 bytes: Magic ("PNTU")
//! - 1 byte: Version
//!
//! ## Input limits
//!
//! Size, magic and version are checked BEFORE the payload is decoded, and
//! record/roster counts are checked right after.

use crate::primitives::{self, MAX_RECORDS, MAX_ROSTER_ENTRIES};
use crate::{Desa, PantauError, ProposalRecord, RegionRoster};
use serde::{Deserialize, Serialize};

/// Maximum accepted snapshot size in bytes.
pub const MAX_SNAPSHOT_SIZE: usize = 256 * 1024 * 1024; // 256 MB

/// Header length in bytes.
const HEADER_LEN: usize = 5;

// =============================================================================
// FILE HEADER
// =============================================================================

/// The header that precedes every snapshot payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SnapshotHeader {
    pub magic: [u8; 4],
    pub version: u8,
}

impl SnapshotHeader {
    /// Header for the current format version.
    #[must_use]
    pub fn new() -> Self {
        Self {
            magic: *primitives::MAGIC_BYTES,
            version: primitives::FORMAT_VERSION,
        }
    }

    /// Check magic and version.
    pub fn validate(&self) -> Result<(), PantauError> {
        if &self.magic != primitives::MAGIC_BYTES {
            return Err(PantauError::DeserializationError(
                "Invalid magic bytes".to_string(),
            ));
        }
        if self.version != primitives::FORMAT_VERSION {
            return Err(PantauError::DeserializationError(format!(
                "Unsupported version: {} (expected {})",
                self.version,
                primitives::FORMAT_VERSION
            )));
        }
        Ok(())
    }

    /// Encode the header.
    #[must_use]
    pub fn to_bytes(&self) -> [u8; HEADER_LEN] {
        let [a, b, c, d] = self.magic;
        [a, b, c, d, self.version]
    }

    /// Decode the header from the start of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, PantauError> {
        match bytes {
            [a, b, c, d, version, ..] => Ok(Self {
                magic: [*a, *b, *c, *d],
                version: *version,
            }),
            _ => Err(PantauError::DeserializationError(
                "Header too short".to_string(),
            )),
        }
    }
}

impl Default for SnapshotHeader {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// SNAPSHOT
// =============================================================================

/// Records plus the roster they belong to.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snapshot {
    pub records: Vec<ProposalRecord>,
    pub roster: Vec<Desa>,
}

impl Snapshot {
    /// Capture records and a roster.
    #[must_use]
    pub fn new(records: Vec<ProposalRecord>, roster: &RegionRoster) -> Self {
        Self {
            records,
            roster: roster.entries().to_vec(),
        }
    }

    /// Rebuild the roster index.
    #[must_use]
    pub fn roster(&self) -> RegionRoster {
        RegionRoster::new(self.roster.iter().cloned())
    }
}

/// Serialize a snapshot to bytes (header + payload).
pub fn snapshot_to_bytes(snapshot: &Snapshot) -> Result<Vec<u8>, PantauError> {
    let header = SnapshotHeader::new();
    let payload = postcard::to_stdvec(snapshot)
        .map_err(|e| PantauError::SerializationError(e.to_string()))?;

    let mut result = Vec::with_capacity(HEADER_LEN + payload.len());
    result.extend_from_slice(&header.to_bytes());
    result.extend_from_slice(&payload);
    Ok(result)
}

/// Deserialize a snapshot from bytes.
pub fn snapshot_from_bytes(bytes: &[u8]) -> Result<Snapshot, PantauError> {
    if bytes.len() > MAX_SNAPSHOT_SIZE {
        return Err(PantauError::DeserializationError(format!(
            "Data size {} bytes exceeds maximum allowed {} bytes",
            bytes.len(),
            MAX_SNAPSHOT_SIZE
        )));
    }

    let header = SnapshotHeader::from_bytes(bytes)?;
    header.validate()?;

    let payload = bytes.get(HEADER_LEN..).unwrap_or_default();
    let snapshot: Snapshot = postcard::from_bytes(payload).map_err(|e| {
        PantauError::DeserializationError(format!("Failed to decode snapshot: {}", e))
    })?;

    if snapshot.records.len() > MAX_RECORDS {
        return Err(PantauError::InvalidDataset(format!(
            "{} records exceeds maximum {}",
            snapshot.records.len(),
            MAX_RECORDS
        )));
    }
    if snapshot.roster.len() > MAX_ROSTER_ENTRIES {
        return Err(PantauError::InvalidDataset(format!(
            "{} roster entries exceeds maximum {}",
            snapshot.roster.len(),
            MAX_ROSTER_ENTRIES
        )));
    }

    Ok(snapshot)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DesaId, ProposalId, RegionPath};

    fn sample() -> Snapshot {
        let roster = RegionRoster::new(vec![Desa::new(DesaId(1), "Mekarsari", "Anyer")]);
        let record = ProposalRecord {
            budget_requested: Some(5_000_000),
            ..ProposalRecord::new(ProposalId(9), RegionPath::new("Anyer", "Mekarsari", DesaId(1)))
        };
        Snapshot::new(vec![record], &roster)
    }

    #[test]
    fn header_roundtrip() {
        let bytes = SnapshotHeader::new().to_bytes();
        let restored = SnapshotHeader::from_bytes(&bytes).expect("parse header");
        assert_eq!(restored, SnapshotHeader::new());
    }

    #[test]
    fn reencode_is_bit_exact() {
        let bytes1 = snapshot_to_bytes(&sample()).expect("encode");
        let restored = snapshot_from_bytes(&bytes1).expect("decode");
        let bytes2 = snapshot_to_bytes(&restored).expect("re-encode");
        assert_eq!(bytes1, bytes2);
        assert_eq!(restored.roster().len(), 1);
    }

    #[test]
    fn invalid_magic_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("encode");
        bytes[0] = b'X';
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn wrong_version_rejected() {
        let mut bytes = snapshot_to_bytes(&sample()).expect("encode");
        bytes[4] = primitives::FORMAT_VERSION + 1;
        assert!(snapshot_from_bytes(&bytes).is_err());
    }

    #[test]
    fn truncated_data_rejected() {
        assert!(snapshot_from_bytes(b"PNT").is_err());
        let bytes = snapshot_to_bytes(&sample()).expect("encode");
        assert!(snapshot_from_bytes(&bytes[..bytes.len() - 3]).is_err());
    }
}
