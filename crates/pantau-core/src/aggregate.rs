//! # Regional Aggregator
//!
//! Rolls proposal records up into global, per-kecamatan and per-desa
//! statistics and reconciles every scope against the roster.
//!
//! ## Rules
//!
//! - `proposal_count`: records in scope.
//! - `participating_desa_count`: distinct roster desa with at least one record
//!   in scope. Two proposals from one desa count once.
//! - `budget_sum`: saturating sum of budgets; missing budgets count as 0.
//! - `status_breakdown`: DPMD status in four buckets. `none` is folded into
//!   `pending`, so the pending bucket also holds every proposal DPMD has not
//!   seen yet; `folded_from_none` reports how many.
//! - `non_participating`: roster desa in scope with zero records.
//! - Participation: `participating / roster_size * 100`, one decimal,
//!   half away from zero, held as integer tenths ([`Percentage`]).
//!
//! Records the roster cannot resolve are counted in the global totals and
//! kept in [`UnknownBucket`], but never in a kecamatan rollup and never in
//! the roster-relative participating count. So
//! `Σ kecamatan.proposal_count + unknown.proposal_count == global.proposal_count`.

use crate::grouping::RegionGroups;
use crate::{Desa, DesaId, ProposalId, ProposalRecord, RegionRoster, ReviewStatus, StageCounts};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// =============================================================================
// PERCENTAGE (integer tenths)
// =============================================================================

/// A percentage with one decimal place, stored as integer tenths.
///
/// `Percentage(2)` is 0.2 %, `Percentage(1000)` is 100.0 %.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Percentage(pub u32);

impl Percentage {
    /// 100.0 %.
    pub const FULL: Percentage = Percentage(1000);

    /// Cap at [`Percentage::FULL`].
    #[must_use]
    pub fn capped(self) -> Self {
        self.min(Self::FULL)
    }

    /// `part / whole * 100`, rounded half away from zero to one decimal.
    ///
    /// A zero `whole` yields 0.0.
    #[must_use]
    pub fn from_ratio(part: u64, whole: u64) -> Self {
        if whole == 0 {
            return Self(0);
        }
        // tenths = part * 1000 / whole, +0.5 before truncation
        let numerator = part.saturating_mul(2000).saturating_add(whole);
        let denominator = whole.saturating_mul(2);
        let tenths = numerator / denominator;
        Self(u32::try_from(tenths).unwrap_or(u32::MAX))
    }

    /// Parse a non-negative decimal such as `"45"`, `"45.5"` or `"12.345"`.
    ///
    /// Extra decimals are rounded half away from zero. Signs, exponents and
    /// anything non-numeric are rejected.
    #[must_use]
    pub fn parse_decimal(text: &str) -> Option<Self> {
        let text = text.trim();
        let (whole, fraction) = text.split_once('.').unwrap_or((text, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !fraction.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }

        let whole: u64 = whole.parse().ok()?;
        let mut digits = fraction.bytes().map(|b| u64::from(b - b'0'));
        let first = digits.next().unwrap_or(0);
        let round_up = digits.next().is_some_and(|d| d >= 5);

        let tenths = whole
            .saturating_mul(10)
            .saturating_add(first)
            .saturating_add(u64::from(round_up));
        u32::try_from(tenths).ok().map(Self)
    }

    /// Raw tenths value.
    #[must_use]
    pub fn tenths(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for Percentage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.0 / 10, self.0 % 10)
    }
}

// =============================================================================
// SCOPE & BREAKDOWN
// =============================================================================

/// What an [`AggregatedStat`] covers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scope {
    Global,
    Kecamatan(String),
    Desa(Desa),
}

/// DPMD status counts with `none` folded into `pending`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusBreakdown {
    pub pending: usize,
    pub approved: usize,
    pub rejected: usize,
    pub revision: usize,
    /// How much of `pending` came from records with DPMD status `none`.
    pub folded_from_none: usize,
}

impl StatusBreakdown {
    /// Count one DPMD status.
    pub fn record(&mut self, status: ReviewStatus) {
        let slot = match status {
            ReviewStatus::None => {
                self.folded_from_none = self.folded_from_none.saturating_add(1);
                &mut self.pending
            }
            ReviewStatus::Pending => &mut self.pending,
            ReviewStatus::Approved => &mut self.approved,
            ReviewStatus::Rejected => &mut self.rejected,
            ReviewStatus::Revision => &mut self.revision,
        };
        *slot = slot.saturating_add(1);
    }

    /// Sum of the four buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.pending
            .saturating_add(self.approved)
            .saturating_add(self.rejected)
            .saturating_add(self.revision)
    }
}

// =============================================================================
// AGGREGATED STAT
// =============================================================================

/// Statistics for one scope. Derived, never mutated after aggregation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregatedStat {
    pub scope: Scope,
    pub proposal_count: usize,
    pub participating_desa_count: usize,
    /// Roster desa in this scope (1 for a desa scope).
    pub roster_size: usize,
    pub budget_sum: u64,
    pub status_breakdown: StatusBreakdown,
    pub stages: StageCounts,
    /// Roster desa in this scope without any proposal.
    pub non_participating: Vec<Desa>,
}

impl AggregatedStat {
    fn empty(scope: Scope, roster_size: usize) -> Self {
        Self {
            scope,
            proposal_count: 0,
            participating_desa_count: 0,
            roster_size,
            budget_sum: 0,
            status_breakdown: StatusBreakdown::default(),
            stages: StageCounts::default(),
            non_participating: Vec::new(),
        }
    }

    fn add(&mut self, record: &ProposalRecord) {
        self.proposal_count = self.proposal_count.saturating_add(1);
        self.budget_sum = self.budget_sum.saturating_add(record.budget_or_zero());
        self.status_breakdown.record(record.dpmd_status);
        self.stages.add(crate::resolve_stage(record));
    }

    /// Participation rate against the roster of this scope.
    #[must_use]
    pub fn participation(&self) -> Percentage {
        Percentage::from_ratio(
            self.participating_desa_count as u64,
            self.roster_size as u64,
        )
    }

    /// Roster desa in scope that submitted nothing.
    #[must_use]
    pub fn non_participating_count(&self) -> usize {
        self.roster_size
            .saturating_sub(self.participating_desa_count)
    }
}

/// Records whose region the roster could not resolve.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnknownBucket {
    pub proposal_count: usize,
    pub budget_sum: u64,
    pub proposal_ids: Vec<ProposalId>,
}

// =============================================================================
// REGION ROWS
// =============================================================================

/// One table row per roster desa.
///
/// A desa without proposals is an explicit `NoSubmission` carrying its real
/// roster kecamatan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegionRow {
    Submitted { desa: Desa, stat: AggregatedStat },
    NoSubmission { desa: Desa },
}

impl RegionRow {
    /// The desa this row describes.
    #[must_use]
    pub fn desa(&self) -> &Desa {
        match self {
            RegionRow::Submitted { desa, .. } | RegionRow::NoSubmission { desa } => desa,
        }
    }

    /// Proposals submitted by this desa.
    #[must_use]
    pub fn proposal_count(&self) -> usize {
        match self {
            RegionRow::Submitted { stat, .. } => stat.proposal_count,
            RegionRow::NoSubmission { .. } => 0,
        }
    }

    /// Budget requested by this desa.
    #[must_use]
    pub fn budget_sum(&self) -> u64 {
        match self {
            RegionRow::Submitted { stat, .. } => stat.budget_sum,
            RegionRow::NoSubmission { .. } => 0,
        }
    }

    /// Participation label used by the participation-status facet.
    #[must_use]
    pub fn participation_status(&self) -> &'static str {
        match self {
            RegionRow::Submitted { .. } => "submitted",
            RegionRow::NoSubmission { .. } => "not_submitted",
        }
    }
}

// =============================================================================
// REPORT
// =============================================================================

/// Output of [`aggregate`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegionalReport {
    pub global: AggregatedStat,
    /// One entry per roster kecamatan, in name order, including empty ones.
    pub kecamatan: Vec<AggregatedStat>,
    /// One entry per participating desa, ordered by kecamatan then id.
    pub desa: Vec<AggregatedStat>,
    pub unknown: UnknownBucket,
}

impl RegionalReport {
    /// Roster desa that submitted nothing anywhere.
    #[must_use]
    pub fn total_desa_tidak_mengajukan(&self) -> usize {
        self.global.non_participating_count()
    }

    /// Global participation rate.
    #[must_use]
    pub fn participation(&self) -> Percentage {
        self.global.participation()
    }

    /// Stats for one kecamatan.
    #[must_use]
    pub fn kecamatan_stat(&self, name: &str) -> Option<&AggregatedStat> {
        self.kecamatan
            .iter()
            .find(|s| matches!(&s.scope, Scope::Kecamatan(n) if n == name))
    }

    /// Stats for one desa, if it submitted anything.
    #[must_use]
    pub fn desa_stat(&self, id: DesaId) -> Option<&AggregatedStat> {
        self.desa
            .iter()
            .find(|s| matches!(&s.scope, Scope::Desa(d) if d.id == id))
    }

    /// Stats for any scope.
    #[must_use]
    pub fn stat_for(&self, scope: &Scope) -> Option<&AggregatedStat> {
        match scope {
            Scope::Global => Some(&self.global),
            Scope::Kecamatan(name) => self.kecamatan_stat(name),
            Scope::Desa(desa) => self.desa_stat(desa.id),
        }
    }

    /// One row per roster desa, in roster order (kecamatan, desa name, id).
    #[must_use]
    pub fn region_rows(&self) -> Vec<RegionRow> {
        let mut rows = Vec::with_capacity(self.global.roster_size);
        for kecamatan in &self.kecamatan {
            let Scope::Kecamatan(name) = &kecamatan.scope else {
                continue;
            };

            let submitted = self.desa.iter().filter_map(|stat| match &stat.scope {
                Scope::Desa(desa) if desa.kecamatan_name == *name => Some(RegionRow::Submitted {
                    desa: desa.clone(),
                    stat: stat.clone(),
                }),
                _ => None,
            });
            let missing = kecamatan
                .non_participating
                .iter()
                .map(|desa| RegionRow::NoSubmission { desa: desa.clone() });

            let mut in_kecamatan: Vec<RegionRow> = submitted.chain(missing).collect();
            in_kecamatan.sort_by(|a, b| {
                a.desa()
                    .name
                    .cmp(&b.desa().name)
                    .then_with(|| a.desa().id.cmp(&b.desa().id))
            });
            rows.extend(in_kecamatan);
        }
        rows
    }
}

// =============================================================================
// AGGREGATION
// =============================================================================

/// Aggregate `records` against `roster`. Never fails, never drops a record.
#[must_use]
pub fn aggregate(records: &[ProposalRecord], roster: &RegionRoster) -> RegionalReport {
    let groups = RegionGroups::build(records, roster);

    let mut kecamatan_stats = Vec::with_capacity(roster.kecamatan_count());
    let mut desa_stats = Vec::new();

    for kecamatan in roster.kecamatan_names() {
        let roster_desa: Vec<&Desa> = roster.desa_in(kecamatan).collect();
        let participating = groups.participating_ids(kecamatan);

        let mut stat =
            AggregatedStat::empty(Scope::Kecamatan(kecamatan.to_string()), roster_desa.len());
        for record in groups.records_in(kecamatan) {
            stat.add(record);
        }
        stat.participating_desa_count = participating.len();
        stat.non_participating = non_participating(roster_desa, &participating);

        for (id, desa_records) in groups.desa_in(kecamatan) {
            let Some(desa) = roster.get(id) else { continue };
            let mut desa_stat = AggregatedStat::empty(Scope::Desa(desa.clone()), 1);
            for record in desa_records {
                desa_stat.add(record);
            }
            desa_stat.participating_desa_count = 1;
            desa_stats.push(desa_stat);
        }

        kecamatan_stats.push(stat);
    }

    let mut global = AggregatedStat::empty(Scope::Global, roster.len());
    for record in records {
        global.add(record);
    }
    let participating = groups.all_participating_ids();
    global.participating_desa_count = participating.len();
    global.non_participating = non_participating(roster.entries(), &participating);

    let mut unknown = UnknownBucket::default();
    for record in groups.unknown() {
        unknown.proposal_count = unknown.proposal_count.saturating_add(1);
        unknown.budget_sum = unknown.budget_sum.saturating_add(record.budget_or_zero());
        unknown.proposal_ids.push(record.id);
    }

    RegionalReport {
        global,
        kecamatan: kecamatan_stats,
        desa: desa_stats,
        unknown,
    }
}

fn non_participating<'a>(
    roster_desa: impl IntoIterator<Item = &'a Desa>,
    participating: &BTreeSet<DesaId>,
) -> Vec<Desa> {
    roster_desa
        .into_iter()
        .filter(|desa| !participating.contains(&desa.id))
        .cloned()
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ProposalId, RegionPath};

    fn roster() -> RegionRoster {
        RegionRoster::new(vec![
            Desa::new(DesaId(1), "Mekarsari", "Anyer"),
            Desa::new(DesaId(2), "Cikoneng", "Anyer"),
            Desa::new(DesaId(3), "Sukamaju", "Cibeber"),
            Desa::new(DesaId(4), "Kubang", "Cibeber"),
        ])
    }

    fn proposal(id: u64, kecamatan: &str, desa: u64, budget: Option<u64>) -> ProposalRecord {
        ProposalRecord {
            budget_requested: budget,
            ..ProposalRecord::new(ProposalId(id), RegionPath::new(kecamatan, "", DesaId(desa)))
        }
    }

    #[test]
    fn percentage_rounds_half_away_from_zero() {
        assert_eq!(Percentage::from_ratio(1, 416), Percentage(2));
        assert_eq!(Percentage::from_ratio(1, 8), Percentage(125));
        // 1/16 = 6.25 % -> 6.3
        assert_eq!(Percentage::from_ratio(1, 16), Percentage(63));
        assert_eq!(Percentage::from_ratio(5, 0), Percentage(0));
        assert_eq!(Percentage::from_ratio(3, 3).to_string(), "100.0");
    }

    #[test]
    fn percentage_parse_decimal() {
        assert_eq!(Percentage::parse_decimal("45"), Some(Percentage(450)));
        assert_eq!(Percentage::parse_decimal("45.5"), Some(Percentage(455)));
        assert_eq!(Percentage::parse_decimal("0.25"), Some(Percentage(3)));
        assert_eq!(Percentage::parse_decimal("12.349"), Some(Percentage(123)));
        assert_eq!(Percentage::parse_decimal("-1"), None);
        assert_eq!(Percentage::parse_decimal("1e3"), None);
        assert_eq!(Percentage::parse_decimal(""), None);
    }

    #[test]
    fn status_breakdown_folds_none_into_pending() {
        let mut breakdown = StatusBreakdown::default();
        breakdown.record(ReviewStatus::None);
        breakdown.record(ReviewStatus::Pending);
        breakdown.record(ReviewStatus::Approved);

        assert_eq!(breakdown.pending, 2);
        assert_eq!(breakdown.folded_from_none, 1);
        assert_eq!(breakdown.total(), 3);
    }

    #[test]
    fn every_roster_kecamatan_gets_a_stat() {
        let report = aggregate(&[proposal(1, "Anyer", 1, Some(10))], &roster());
        assert_eq!(report.kecamatan.len(), 2);

        let cibeber = report.kecamatan_stat("Cibeber").map(|s| s.proposal_count);
        assert_eq!(cibeber, Some(0));
        assert_eq!(report.kecamatan_stat("Cibeber").map(|s| s.non_participating.len()), Some(2));
    }

    #[test]
    fn missing_budget_counts_as_zero() {
        let records = vec![
            proposal(1, "Anyer", 1, Some(500)),
            proposal(2, "Anyer", 2, None),
        ];
        let report = aggregate(&records, &roster());
        assert_eq!(report.global.budget_sum, 500);
        assert_eq!(report.global.proposal_count, 2);
    }

    #[test]
    fn unknown_region_counted_globally_only() {
        let records = vec![
            proposal(1, "Anyer", 1, Some(100)),
            proposal(2, "Anyer", 77, Some(50)),
        ];
        let report = aggregate(&records, &roster());

        assert_eq!(report.global.proposal_count, 2);
        assert_eq!(report.global.budget_sum, 150);
        assert_eq!(report.global.participating_desa_count, 1);
        assert_eq!(report.unknown.proposal_ids, vec![ProposalId(2)]);
        assert_eq!(report.kecamatan_stat("Anyer").map(|s| s.proposal_count), Some(1));
    }

    #[test]
    fn region_rows_cover_whole_roster() {
        let records = vec![proposal(1, "Anyer", 2, Some(100))];
        let report = aggregate(&records, &roster());
        let rows = report.region_rows();

        assert_eq!(rows.len(), 4);
        let submitted: Vec<_> = rows
            .iter()
            .filter(|r| matches!(r, RegionRow::Submitted { .. }))
            .map(|r| r.desa().id)
            .collect();
        assert_eq!(submitted, vec![DesaId(2)]);

        // Placeholders keep the real roster kecamatan
        for row in &rows {
            if let RegionRow::NoSubmission { desa } = row {
                assert_eq!(roster().get(desa.id).map(|d| &d.kecamatan_name), Some(&desa.kecamatan_name));
            }
        }
    }

    #[test]
    fn stat_for_scope_lookup() {
        let report = aggregate(&[proposal(1, "Cibeber", 4, Some(1))], &roster());
        let desa = Desa::new(DesaId(4), "Kubang", "Cibeber");
        assert_eq!(report.stat_for(&Scope::Desa(desa)).map(|s| s.proposal_count), Some(1));
        assert_eq!(report.stat_for(&Scope::Global).map(|s| s.proposal_count), Some(1));
        assert!(report.stat_for(&Scope::Kecamatan("Nowhere".into())).is_none());
    }
}
