//! # Stage Resolution
//!
//! Maps a proposal's currently observed review flags to the pipeline stage
//! it occupies: Dinas → Kecamatan → DPMD.
//!
//! ## Decision Table
//!
//! Evaluated top-down, first match wins (most advanced stage wins):
//!
//! | # | Condition                                              | Stage         |
//! |---|--------------------------------------------------------|---------------|
//! | 1 | `dpmd_status == pending`                               | `AtDpmd`      |
//! | 2 | `dinas_status == approved` and forwarding marker set   | `AtDpmd`      |
//! | 3 | `dinas_status == approved`                             | `AtKecamatan` |
//! | 4 | anything else                                          | `AtDinas`     |
//!
//! ## Important Note
//!
//! This is a classifier over the latest snapshot, not a state machine. There
//! is no record of *when* a proposal moved; see [`crate::transition`] for the
//! append-only log that observes changes between snapshots.

use crate::{ProposalRecord, ReviewStatus};
use serde::{Deserialize, Serialize};

// =============================================================================
// STAGE ENUM
// =============================================================================

/// Pipeline stages, in pipeline order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    /// Under review by the sector department.
    AtDinas,
    /// Approved by Dinas, waiting for the kecamatan forwarding letter.
    AtKecamatan,
    /// Forwarded to (or pending at) DPMD.
    AtDpmd,
}

impl Stage {
    /// Every stage, in pipeline order.
    pub const ALL: [Stage; 3] = [Stage::AtDinas, Stage::AtKecamatan, Stage::AtDpmd];

    /// Get the stage display name.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Stage::AtDinas => "Dinas",
            Stage::AtKecamatan => "Kecamatan",
            Stage::AtDpmd => "DPMD",
        }
    }

    /// Stable machine key, used by filters and facets.
    #[must_use]
    pub fn key(&self) -> &'static str {
        match self {
            Stage::AtDinas => "at_dinas",
            Stage::AtKecamatan => "at_kecamatan",
            Stage::AtDpmd => "at_dpmd",
        }
    }

    /// Parse a machine key.
    #[must_use]
    pub fn from_key(key: &str) -> Option<Stage> {
        Stage::ALL.into_iter().find(|s| s.key() == key)
    }

    /// Get the next stage, if any.
    #[must_use]
    pub fn next(&self) -> Option<Stage> {
        match self {
            Stage::AtDinas => Some(Stage::AtKecamatan),
            Stage::AtKecamatan => Some(Stage::AtDpmd),
            Stage::AtDpmd => None,
        }
    }

    /// Check if this stage is terminal (DPMD).
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Stage::AtDpmd)
    }
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}: {}", self, self.name())
    }
}

// =============================================================================
// RESOLVER
// =============================================================================

/// Resolve the pipeline stage of one proposal. Pure and total.
#[must_use]
pub fn resolve_stage(record: &ProposalRecord) -> Stage {
    if record.dpmd_status == ReviewStatus::Pending {
        Stage::AtDpmd
    } else if record.dinas_status == ReviewStatus::Approved && record.is_forwarded() {
        Stage::AtDpmd
    } else if record.dinas_status == ReviewStatus::Approved {
        Stage::AtKecamatan
    } else {
        Stage::AtDinas
    }
}

// =============================================================================
// STAGE COUNTS
// =============================================================================

/// Number of proposals per stage.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageCounts {
    pub at_dinas: usize,
    pub at_kecamatan: usize,
    pub at_dpmd: usize,
}

impl StageCounts {
    /// Count stages over any record iterator.
    #[must_use]
    pub fn from_records<'a, I>(records: I) -> Self
    where
        I: IntoIterator<Item = &'a ProposalRecord>,
    {
        let mut counts = Self::default();
        for record in records {
            counts.add(resolve_stage(record));
        }
        counts
    }

    /// Add one proposal at `stage`.
    pub fn add(&mut self, stage: Stage) {
        let slot = match stage {
            Stage::AtDinas => &mut self.at_dinas,
            Stage::AtKecamatan => &mut self.at_kecamatan,
            Stage::AtDpmd => &mut self.at_dpmd,
        };
        *slot = slot.saturating_add(1);
    }

    /// Count at a given stage.
    #[must_use]
    pub fn get(&self, stage: Stage) -> usize {
        match stage {
            Stage::AtDinas => self.at_dinas,
            Stage::AtKecamatan => self.at_kecamatan,
            Stage::AtDpmd => self.at_dpmd,
        }
    }

    /// Total proposals counted.
    #[must_use]
    pub fn total(&self) -> usize {
        self.at_dinas
            .saturating_add(self.at_kecamatan)
            .saturating_add(self.at_dpmd)
    }
}

// =============================================================================
// TESTS
// =============================================================================
