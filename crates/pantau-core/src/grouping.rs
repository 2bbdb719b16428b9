//! # Region Grouping
//!
//! Two-level partition of proposal records: kecamatan → desa id → records.
//!
//! Records are keyed by the ROSTER's view of their region, so spelling
//! differences in submitted kecamatan names cannot split a group. Records the
//! roster cannot resolve go to a separate unknown bucket; nothing is dropped.
//!
//! Invariant: `resolved_count() + unknown().len() == records.len()`.

use crate::{DesaId, ProposalRecord, RegionRoster};
use std::collections::{BTreeMap, BTreeSet};

/// Records of one kecamatan, keyed by desa id.
pub type DesaGroups<'a> = BTreeMap<DesaId, Vec<&'a ProposalRecord>>;

/// Kecamatan → desa → records, plus the unresolvable remainder.
#[derive(Debug, Default)]
pub struct RegionGroups<'a> {
    kecamatan: BTreeMap<&'a str, DesaGroups<'a>>,
    unknown: Vec<&'a ProposalRecord>,
}

impl<'a> RegionGroups<'a> {
    /// Partition `records` against `roster`.
    #[must_use]
    pub fn build(records: &'a [ProposalRecord], roster: &'a RegionRoster) -> Self {
        let mut groups = Self::default();
        for record in records {
            match roster.resolve(&record.region) {
                Some(desa) => groups
                    .kecamatan
                    .entry(desa.kecamatan_name.as_str())
                    .or_default()
                    .entry(desa.id)
                    .or_default()
                    .push(record),
                None => groups.unknown.push(record),
            }
        }
        groups
    }

    /// Iterate over kecamatan that have at least one resolved record.
    pub fn kecamatan(&self) -> impl Iterator<Item = (&'a str, &DesaGroups<'a>)> {
        self.kecamatan.iter().map(|(name, desa)| (*name, desa))
    }

    /// Desa groups of one kecamatan, if it has records.
    #[must_use]
    pub fn desa_groups(&self, kecamatan: &str) -> Option<&DesaGroups<'a>> {
        self.kecamatan.get(kecamatan)
    }

    /// Iterate over `(desa id, records)` in one kecamatan.
    pub fn desa_in<'s>(
        &'s self,
        kecamatan: &str,
    ) -> impl Iterator<Item = (DesaId, &'s [&'a ProposalRecord])> + use<'s, 'a> {
        self.kecamatan
            .get(kecamatan)
            .into_iter()
            .flatten()
            .map(|(id, records)| (*id, records.as_slice()))
    }

    /// All records of one kecamatan.
    pub fn records_in<'s>(
        &'s self,
        kecamatan: &str,
    ) -> impl Iterator<Item = &'a ProposalRecord> + use<'s, 'a> {
        self.desa_in(kecamatan)
            .flat_map(|(_, records)| records.iter().copied())
    }

    /// Distinct desa ids with records in one kecamatan.
    #[must_use]
    pub fn participating_ids(&self, kecamatan: &str) -> BTreeSet<DesaId> {
        self.desa_in(kecamatan).map(|(id, _)| id).collect()
    }

    /// Distinct resolved desa ids across all kecamatan.
    #[must_use]
    pub fn all_participating_ids(&self) -> BTreeSet<DesaId> {
        self.kecamatan
            .values()
            .flat_map(|desa| desa.keys().copied())
            .collect()
    }

    /// Records of one desa.
    #[must_use]
    pub fn records_of(&self, kecamatan: &str, desa: DesaId) -> &[&'a ProposalRecord] {
        self.kecamatan
            .get(kecamatan)
            .and_then(|groups| groups.get(&desa))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Records the roster could not resolve.
    #[must_use]
    pub fn unknown(&self) -> &[&'a ProposalRecord] {
        &self.unknown
    }

    /// Number of records placed under some kecamatan.
    #[must_use]
    pub fn resolved_count(&self) -> usize {
        self.kecamatan
            .values()
            .flat_map(BTreeMap::values)
            .map(Vec::len)
            .sum()
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Desa, ProposalId, RegionPath};

    fn roster() -> RegionRoster {
        RegionRoster::new(vec![
            Desa::new(DesaId(1), "Mekarsari", "Anyer"),
            Desa::new(DesaId(2), "Cikoneng", "Anyer"),
            Desa::new(DesaId(3), "Sukamaju", "Cibeber"),
        ])
    }

    fn proposal(id: u64, kecamatan: &str, desa: u64) -> ProposalRecord {
        ProposalRecord::new(ProposalId(id), RegionPath::new(kecamatan, "", DesaId(desa)))
    }

    #[test]
    fn groups_by_roster_kecamatan_then_desa() {
        let roster = roster();
        let records = vec![
            proposal(1, "Anyer", 1),
            proposal(2, "ANYER", 1),
            proposal(3, "Anyer", 2),
            proposal(4, "Cibeber", 3),
        ];
        let groups = RegionGroups::build(&records, &roster);

        assert_eq!(groups.records_of("Anyer", DesaId(1)).len(), 2);
        assert_eq!(groups.participating_ids("Anyer").len(), 2);
        assert_eq!(groups.records_in("Cibeber").count(), 1);
        assert_eq!(groups.kecamatan().count(), 2);
        assert!(groups.unknown().is_empty());
    }

    #[test]
    fn unresolvable_records_go_to_unknown() {
        let roster = roster();
        let mut orphan = proposal(2, "Anyer", 1);
        orphan.region.desa_id = None;
        let records = vec![
            proposal(1, "Anyer", 99),
            orphan,
            proposal(3, "Cibeber", 1),
            proposal(4, "Anyer", 1),
        ];
        let groups = RegionGroups::build(&records, &roster);

        assert_eq!(groups.unknown().len(), 3);
        assert_eq!(groups.resolved_count(), 1);
        assert_eq!(groups.resolved_count() + groups.unknown().len(), records.len());
    }

    #[test]
    fn missing_kecamatan_yields_empty_iterators() {
        let roster = roster();
        let groups = RegionGroups::build(&[], &roster);
        assert_eq!(groups.desa_in("Anyer").count(), 0);
        assert!(groups.records_of("Anyer", DesaId(1)).is_empty());
        assert!(groups.desa_groups("Anyer").is_none());
        assert!(groups.all_participating_ids().is_empty());
    }
}
