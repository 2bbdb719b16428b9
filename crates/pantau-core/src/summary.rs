//! # Cacheable Payloads
//!
//! The two payloads the dashboard pulls from the remote record store:
//!
//! - [`StatisticsSummary`]: pre-aggregated totals and progress to target
//! - [`ProposalDataset`]: the raw proposal records
//!
//! Both carry shape checks. A payload that fails them is malformed and must
//! not replace a previously cached one.

use crate::primitives::MAX_RECORDS;
use crate::{PantauError, Percentage, ProposalId, ProposalRecord};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Progress of the active count toward its target.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressToTarget {
    pub current: u64,
    pub target: u64,
    pub remaining: u64,
    pub percentage: Percentage,
}

impl ProgressToTarget {
    /// Build progress from `current` and `target`, deriving the rest.
    /// The percentage is capped at 100.0.
    #[must_use]
    pub fn new(current: u64, target: u64) -> Self {
        Self {
            current,
            target,
            remaining: target.saturating_sub(current),
            percentage: Percentage::from_ratio(current, target).capped(),
        }
    }
}

/// Pre-aggregated statistics summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatisticsSummary {
    pub total: u64,
    pub target_total: u64,
    /// Category name to count, e.g. `active` / `inactive`.
    pub categories: BTreeMap<String, u64>,
    pub progress_to_target: ProgressToTarget,
}

impl StatisticsSummary {
    /// Whether the summary carries no data at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total == 0 && self.target_total == 0 && self.categories.is_empty()
    }

    /// Check the summary's internal consistency.
    pub fn validate(&self) -> Result<(), PantauError> {
        let progress = &self.progress_to_target;
        if progress.remaining != progress.target.saturating_sub(progress.current) {
            return Err(PantauError::InvalidSummary(format!(
                "remaining {} does not match target {} - current {}",
                progress.remaining, progress.target, progress.current
            )));
        }
        if progress.percentage > Percentage::FULL {
            return Err(PantauError::InvalidSummary(format!(
                "percentage {} out of range",
                progress.percentage
            )));
        }
        if let Some((name, count)) = self.categories.iter().find(|(_, c)| **c > self.total) {
            return Err(PantauError::InvalidSummary(format!(
                "category '{}' count {} exceeds total {}",
                name, count, self.total
            )));
        }
        Ok(())
    }
}

/// Raw proposal records as fetched.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalDataset {
    pub records: Vec<ProposalRecord>,
}

impl ProposalDataset {
    /// Wrap records.
    #[must_use]
    pub fn new(records: Vec<ProposalRecord>) -> Self {
        Self { records }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Reject oversized datasets and duplicate proposal ids.
    pub fn validate(&self) -> Result<(), PantauError> {
        if self.records.len() > MAX_RECORDS {
            return Err(PantauError::InvalidDataset(format!(
                "{} records exceeds maximum {}",
                self.records.len(),
                MAX_RECORDS
            )));
        }
        let mut seen = BTreeSet::new();
        if let Some(dup) = self.records.iter().find(|r| !seen.insert(r.id)) {
            return Err(PantauError::InvalidDataset(format!(
                "duplicate proposal id {}",
                dup.id
            )));
        }
        Ok(())
    }

    /// Look up a record by id.
    #[must_use]
    pub fn get(&self, id: ProposalId) -> Option<&ProposalRecord> {
        self.records.iter().find(|r| r.id == id)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RegionPath;

    fn summary() -> StatisticsSummary {
        StatisticsSummary {
            total: 40,
            target_total: 100,
            categories: BTreeMap::from([("active".to_string(), 30), ("inactive".to_string(), 10)]),
            progress_to_target: ProgressToTarget::new(30, 100),
        }
    }

    #[test]
    fn consistent_summary_validates() {
        let s = summary();
        assert!(s.validate().is_ok());
        assert_eq!(s.progress_to_target.remaining, 70);
        assert_eq!(s.progress_to_target.percentage.to_string(), "30.0");
        assert!(!s.is_empty());
    }

    #[test]
    fn remaining_mismatch_is_rejected() {
        let mut s = summary();
        s.progress_to_target.remaining = 5;
        assert!(matches!(s.validate(), Err(PantauError::InvalidSummary(_))));
    }

    #[test]
    fn category_above_total_is_rejected() {
        let mut s = summary();
        s.categories.insert("active".to_string(), 41);
        assert!(s.validate().is_err());
    }

    #[test]
    fn current_above_target_is_allowed() {
        let mut s = summary();
        s.progress_to_target = ProgressToTarget::new(120, 100);
        assert!(s.validate().is_ok());
        assert_eq!(s.progress_to_target.remaining, 0);
        assert_eq!(s.progress_to_target.percentage, Percentage(1000));
    }

    #[test]
    fn duplicate_ids_are_rejected() {
        let record = ProposalRecord::new(ProposalId(1), RegionPath::default());
        let dataset = ProposalDataset::new(vec![record.clone(), record]);
        assert!(matches!(
            dataset.validate(),
            Err(PantauError::InvalidDataset(_))
        ));
        assert!(ProposalDataset::default().is_empty());
    }
}
