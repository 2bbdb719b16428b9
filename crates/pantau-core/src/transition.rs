//! # Stage Transition Log
//!
//! Bounded history of observed stage changes.
//!
//! The record store keeps no transition history, so the log only knows what
//! it has seen: the first observation of a proposal sets a baseline and
//! records nothing, and later observations append an entry when the resolved
//! stage differs from the last one seen for that id. Past transitions are
//! never inferred.
//!
//! The log is bounded: observing a whole snapshot forgets baselines of ids
//! that are no longer present, and only the newest `max_entries`
//! transitions are retained.

use crate::primitives::DEFAULT_TRANSITION_CAP;
use crate::{ProposalId, ProposalRecord, Stage, resolve_stage};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// One observed stage change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transition {
    pub proposal_id: ProposalId,
    pub from: Stage,
    pub to: Stage,
    /// Milliseconds since the Unix epoch at observation time.
    pub observed_at_ms: u64,
}

/// Last known stage per proposal plus the most recent transitions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransitionLog {
    last_stage: BTreeMap<ProposalId, Stage>,
    entries: Vec<Transition>,
    #[serde(default = "default_cap")]
    max_entries: usize,
    /// Transitions ever appended, including those since dropped.
    #[serde(default)]
    recorded_total: u64,
}

fn default_cap() -> usize {
    DEFAULT_TRANSITION_CAP
}

impl Default for TransitionLog {
    fn default() -> Self {
        Self::with_capacity(DEFAULT_TRANSITION_CAP)
    }
}

impl TransitionLog {
    /// Create an empty log retaining [`DEFAULT_TRANSITION_CAP`] transitions.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty log retaining at most `max_entries` transitions
    /// (at least one).
    #[must_use]
    pub fn with_capacity(max_entries: usize) -> Self {
        Self {
            last_stage: BTreeMap::new(),
            entries: Vec::new(),
            max_entries: max_entries.max(1),
            recorded_total: 0,
        }
    }

    /// Observe one record. Returns the appended transition, if any.
    pub fn observe(&mut self, record: &ProposalRecord, observed_at_ms: u64) -> Option<Transition> {
        let stage = resolve_stage(record);
        let previous = self.last_stage.insert(record.id, stage)?;
        if previous == stage {
            return None;
        }

        let transition = Transition {
            proposal_id: record.id,
            from: previous,
            to: stage,
            observed_at_ms,
        };
        self.entries.push(transition);
        self.recorded_total = self.recorded_total.saturating_add(1);
        if self.entries.len() > self.max_entries {
            let excess = self.entries.len() - self.max_entries;
            self.entries.drain(..excess);
        }
        Some(transition)
    }

    /// Observe a whole snapshot. Returns how many transitions were appended.
    ///
    /// Baselines of ids missing from `records` are forgotten; an id that
    /// comes back later starts a fresh baseline.
    pub fn observe_all(&mut self, records: &[ProposalRecord], observed_at_ms: u64) -> usize {
        let appended = records
            .iter()
            .filter_map(|record| self.observe(record, observed_at_ms))
            .count();
        let present: BTreeSet<ProposalId> = records.iter().map(|r| r.id).collect();
        self.last_stage.retain(|id, _| present.contains(id));
        appended
    }

    /// Every transition in observation order.
    #[must_use]
    pub fn entries(&self) -> &[Transition] {
        &self.entries
    }

    /// Transitions of one proposal, oldest first.
    pub fn history(&self, id: ProposalId) -> impl Iterator<Item = &Transition> {
        self.entries.iter().filter(move |t| t.proposal_id == id)
    }

    /// Last stage seen for a proposal.
    #[must_use]
    pub fn last_stage(&self, id: ProposalId) -> Option<Stage> {
        self.last_stage.get(&id).copied()
    }

    /// Number of proposals with a baseline.
    #[must_use]
    pub fn tracked(&self) -> usize {
        self.last_stage.len()
    }

    /// Maximum number of retained transitions.
    #[must_use]
    pub fn max_entries(&self) -> usize {
        self.max_entries
    }

    /// Transitions appended since creation, including dropped ones.
    #[must_use]
    pub fn recorded_total(&self) -> u64 {
        self.recorded_total
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DocumentRef, RegionPath, ReviewStatus};

    fn record(id: u64) -> ProposalRecord {
        ProposalRecord::new(ProposalId(id), RegionPath::default())
    }

    #[test]
    fn first_observation_is_baseline_only() {
        let mut log = TransitionLog::new();
        assert!(log.observe(&record(1), 10).is_none());
        assert!(log.entries().is_empty());
        assert_eq!(log.last_stage(ProposalId(1)), Some(Stage::AtDinas));
    }

    #[test]
    fn unchanged_stage_appends_nothing() {
        let mut log = TransitionLog::new();
        log.observe(&record(1), 10);
        assert!(log.observe(&record(1), 20).is_none());
        assert!(log.entries().is_empty());
    }

    #[test]
    fn stage_changes_are_appended_in_order() {
        let mut log = TransitionLog::new();
        let mut r = record(7);
        log.observe(&r, 1);

        r.dinas_status = ReviewStatus::Approved;
        let first = log.observe(&r, 2);
        assert_eq!(
            first.map(|t| (t.from, t.to)),
            Some((Stage::AtDinas, Stage::AtKecamatan))
        );

        r.kecamatan_forwarding = Some(DocumentRef::new("surat.pdf"));
        log.observe(&r, 3);

        let history: Vec<_> = log.history(ProposalId(7)).map(|t| t.to).collect();
        assert_eq!(history, vec![Stage::AtKecamatan, Stage::AtDpmd]);
        assert_eq!(log.entries().len(), 2);
    }

    #[test]
    fn observe_all_counts_appended() {
        let mut log = TransitionLog::new();
        let mut records = vec![record(1), record(2)];
        assert_eq!(log.observe_all(&records, 1), 0);

        records[1].dpmd_status = ReviewStatus::Pending;
        assert_eq!(log.observe_all(&records, 2), 1);
        assert_eq!(log.tracked(), 2);
    }

    #[test]
    fn vanished_ids_are_forgotten() {
        let mut log = TransitionLog::new();
        log.observe_all(&[record(1), record(2), record(3)], 1);
        assert_eq!(log.tracked(), 3);

        log.observe_all(&[record(2)], 2);
        assert_eq!(log.tracked(), 1);
        assert_eq!(log.last_stage(ProposalId(1)), None);
        assert_eq!(log.last_stage(ProposalId(2)), Some(Stage::AtDinas));

        // A returning id only sets a new baseline.
        let mut back = record(1);
        back.dinas_status = ReviewStatus::Approved;
        assert_eq!(log.observe_all(&[record(2), back], 3), 0);
        assert_eq!(log.tracked(), 2);
    }

    #[test]
    fn oldest_entries_are_dropped_past_capacity() {
        let mut log = TransitionLog::with_capacity(2);
        let mut r = record(5);
        log.observe(&r, 1);

        for (at, status) in [
            (2, ReviewStatus::Approved),
            (3, ReviewStatus::Pending),
            (4, ReviewStatus::Approved),
        ] {
            r.dinas_status = status;
            assert!(log.observe(&r, at).is_some());
        }

        let kept: Vec<u64> = log.entries().iter().map(|t| t.observed_at_ms).collect();
        assert_eq!(kept, vec![3, 4]);
        assert_eq!(log.recorded_total(), 3);
        assert_eq!(log.max_entries(), 2);
    }

    #[test]
    fn zero_capacity_keeps_latest() {
        let log = TransitionLog::with_capacity(0);
        assert_eq!(log.max_entries(), 1);
    }
}
