//! # Rankings
//!
//! Top-N lists over aggregated desa and kecamatan statistics.
//!
//! Ordering is total: metric descending, then desa id ascending (kecamatan
//! rankings tie-break on kecamatan name ascending). Repeated runs over the
//! same data yield the same list, which keeps exports row-stable.

use crate::primitives::{TOP_BUDGET_LIMIT, TOP_COUNT_LIMIT};
use crate::{AggregatedStat, Desa, RegionalReport, Scope};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;

/// Metric a ranking sorts by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Budget,
    ProposalCount,
}

impl RankMetric {
    /// Parse `budget` / `count` (also `proposal_count`).
    #[must_use]
    pub fn parse(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "budget" | "anggaran" => Some(RankMetric::Budget),
            "count" | "proposal_count" | "jumlah" => Some(RankMetric::ProposalCount),
            _ => None,
        }
    }

    fn value(self, stat: &AggregatedStat) -> u64 {
        match self {
            RankMetric::Budget => stat.budget_sum,
            RankMetric::ProposalCount => stat.proposal_count as u64,
        }
    }
}

/// One desa in a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedDesa {
    /// 1-based position.
    pub rank: usize,
    pub desa: Desa,
    pub proposal_count: usize,
    pub budget_sum: u64,
}

/// One kecamatan in a ranking.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RankedKecamatan {
    pub rank: usize,
    pub kecamatan: String,
    pub proposal_count: usize,
    pub participating_desa_count: usize,
    pub budget_sum: u64,
}

/// Top `limit` participating desa by `metric`.
#[must_use]
pub fn top_desa(report: &RegionalReport, metric: RankMetric, limit: usize) -> Vec<RankedDesa> {
    let mut ranked: Vec<(&Desa, &AggregatedStat)> = report
        .desa
        .iter()
        .filter_map(|stat| match &stat.scope {
            Scope::Desa(desa) => Some((desa, stat)),
            _ => None,
        })
        .collect();
    ranked.sort_by_key(|(desa, stat)| (Reverse(metric.value(stat)), desa.id));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (desa, stat))| RankedDesa {
            rank: idx.saturating_add(1),
            desa: desa.clone(),
            proposal_count: stat.proposal_count,
            budget_sum: stat.budget_sum,
        })
        .collect()
}

/// Top desa by budget. `None` uses the default length of 10.
#[must_use]
pub fn top_by_budget(report: &RegionalReport, limit: Option<usize>) -> Vec<RankedDesa> {
    top_desa(report, RankMetric::Budget, limit.unwrap_or(TOP_BUDGET_LIMIT))
}

/// Top desa by proposal count. `None` uses the default length of 15.
#[must_use]
pub fn top_by_count(report: &RegionalReport, limit: Option<usize>) -> Vec<RankedDesa> {
    top_desa(report, RankMetric::ProposalCount, limit.unwrap_or(TOP_COUNT_LIMIT))
}

/// Top `limit` kecamatan by `metric`. Kecamatan without proposals are kept
/// so a short roster still ranks every kecamatan.
#[must_use]
pub fn top_kecamatan(
    report: &RegionalReport,
    metric: RankMetric,
    limit: usize,
) -> Vec<RankedKecamatan> {
    let mut ranked: Vec<(&str, &AggregatedStat)> = report
        .kecamatan
        .iter()
        .filter_map(|stat| match &stat.scope {
            Scope::Kecamatan(name) => Some((name.as_str(), stat)),
            _ => None,
        })
        .collect();
    ranked.sort_by_key(|(name, stat)| (Reverse(metric.value(stat)), *name));

    ranked
        .into_iter()
        .take(limit)
        .enumerate()
        .map(|(idx, (name, stat))| RankedKecamatan {
            rank: idx.saturating_add(1),
            kecamatan: name.to_string(),
            proposal_count: stat.proposal_count,
            participating_desa_count: stat.participating_desa_count,
            budget_sum: stat.budget_sum,
        })
        .collect()
}

// =============================================================================
// TESTS
// =============================================================================
