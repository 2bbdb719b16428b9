//! # Core Type Definitions
//!
//! This module contains the record types the Pantau core reads:
//! - Identifiers (`ProposalId`, `DesaId`)
//! - Region addressing (`RegionPath`)
//! - Review statuses (`ReviewStatus`)
//! - The proposal snapshot itself (`ProposalRecord`)
//! - Error types (`PantauError`)
//!
//! ## Determinism Guarantees
//!
//! All types in this module:
//! - Use integer arithmetic only (budgets are whole rupiah)
//! - Implement `Ord` where they serve as `BTreeMap`/`BTreeSet` keys
//! - Are never mutated by the core; derived structures are always new values

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Identifier of a proposal in the remote record store.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct ProposalId(pub u64);

/// Identifier of a desa (village) in the regional roster.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct DesaId(pub u64);

impl fmt::Display for ProposalId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for DesaId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque reference to an uploaded document (path or storage key).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DocumentRef(pub String);

impl DocumentRef {
    /// Create a new document reference.
    #[must_use]
    pub fn new(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the reference as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

// =============================================================================
// REGION PATH
// =============================================================================

/// Where a proposal claims to come from.
///
/// The names are free text as submitted; `desa_id` is the join key against
/// the roster. A missing `desa_id` cannot be resolved and lands in the
/// unknown-region bucket during aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct RegionPath {
    pub kecamatan_name: String,
    pub desa_name: String,
    pub desa_id: Option<DesaId>,
}

impl RegionPath {
    /// Create a region path with a known desa id.
    #[must_use]
    pub fn new(kecamatan: impl Into<String>, desa: impl Into<String>, desa_id: DesaId) -> Self {
        Self {
            kecamatan_name: kecamatan.into(),
            desa_name: desa.into(),
            desa_id: Some(desa_id),
        }
    }
}

// =============================================================================
// REVIEW STATUS
// =============================================================================

/// Review status reported by a pipeline reviewer (Dinas or DPMD).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum ReviewStatus {
    /// Not yet seen by this reviewer.
    #[default]
    None,
    Pending,
    Approved,
    Rejected,
    Revision,
}

impl ReviewStatus {
    /// Every status, in display order.
    pub const ALL: [ReviewStatus; 5] = [
        ReviewStatus::None,
        ReviewStatus::Pending,
        ReviewStatus::Approved,
        ReviewStatus::Rejected,
        ReviewStatus::Revision,
    ];

    /// Wire label of this status.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            ReviewStatus::None => "none",
            ReviewStatus::Pending => "pending",
            ReviewStatus::Approved => "approved",
            ReviewStatus::Rejected => "rejected",
            ReviewStatus::Revision => "revision",
        }
    }

    /// Parse a wire label. Unknown, empty or null-like labels map to `None`.
    ///
    /// Accepts the Indonesian labels the record store also emits
    /// (`disetujui`, `ditolak`, `revisi`, `menunggu`).
    #[must_use]
    pub fn parse(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "pending" | "menunggu" | "diproses" => ReviewStatus::Pending,
            "approved" | "disetujui" => ReviewStatus::Approved,
            "rejected" | "ditolak" => ReviewStatus::Rejected,
            "revision" | "revisi" => ReviewStatus::Revision,
            _ => ReviewStatus::None,
        }
    }
}

impl fmt::Display for ReviewStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// =============================================================================
// PROPOSAL RECORD
// =============================================================================

/// A snapshot of one proposal as read from the remote record store.
///
/// The core only reads these. `budget_requested` is `None` when the store
/// delivered a missing, negative or non-numeric amount; aggregation counts
/// such budgets as zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ProposalRecord {
    pub id: ProposalId,
    pub region: RegionPath,
    /// ISO-8601 submission timestamp, compared lexicographically.
    pub submitted_at: String,
    pub budget_requested: Option<u64>,
    pub activity_title: String,
    pub linked_activity_type: String,
    pub proposer_name: String,
    /// Category facet, e.g. the BUMDes business type.
    pub business_type: Option<String>,
    /// Upload/participation status facet as reported by the store.
    pub upload_status: Option<String>,
    pub dinas_status: ReviewStatus,
    /// Forwarding letter issued by the kecamatan. Presence is the marker.
    pub kecamatan_forwarding: Option<DocumentRef>,
    pub dpmd_status: ReviewStatus,
    pub documents: Vec<DocumentRef>,
}

impl ProposalRecord {
    /// Create a record with the given id and region; every other field empty.
    #[must_use]
    pub fn new(id: ProposalId, region: RegionPath) -> Self {
        Self {
            id,
            region,
            ..Self::default()
        }
    }

    /// Budget with missing values counted as zero.
    #[must_use]
    pub fn budget_or_zero(&self) -> u64 {
        self.budget_requested.unwrap_or(0)
    }

    /// Whether the kecamatan forwarding marker is present.
    #[must_use]
    pub fn is_forwarded(&self) -> bool {
        self.kecamatan_forwarding.is_some()
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Errors that can occur in the Pantau core.
///
/// - Aggregation, filtering and pagination never produce these
/// - Fallible operations are decoding, validation and file I/O
#[derive(Debug, Error)]
pub enum PantauError {
    /// A statistics summary failed its shape checks.
    #[error("Invalid statistics summary: {0}")]
    InvalidSummary(String),

    /// A proposal or roster payload failed its shape checks.
    #[error("Invalid dataset: {0}")]
    InvalidDataset(String),

    /// A serialization error occurred.
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// A deserialization error occurred.
    #[error("Deserialization error: {0}")]
    DeserializationError(String),

    /// An I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(String),

    /// The remote record store could not deliver data.
    #[error("Remote store unavailable: {0}")]
    RemoteError(String),
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn review_status_parse_accepts_local_labels() {
        assert_eq!(ReviewStatus::parse("disetujui"), ReviewStatus::Approved);
        assert_eq!(ReviewStatus::parse(" Approved "), ReviewStatus::Approved);
        assert_eq!(ReviewStatus::parse("revisi"), ReviewStatus::Revision);
    }

    #[test]
    fn review_status_parse_unknown_is_none() {
        assert_eq!(ReviewStatus::parse(""), ReviewStatus::None);
        assert_eq!(ReviewStatus::parse("null"), ReviewStatus::None);
        assert_eq!(ReviewStatus::parse("archived"), ReviewStatus::None);
    }

    #[test]
    fn missing_budget_counts_as_zero() {
        let record = ProposalRecord::new(ProposalId(1), RegionPath::default());
        assert_eq!(record.budget_or_zero(), 0);
        assert!(!record.is_forwarded());
    }
}
