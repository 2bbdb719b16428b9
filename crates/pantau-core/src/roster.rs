//! # Regional Roster
//!
//! The authoritative list of every desa in the jurisdiction, grouped by
//! kecamatan. Loaded once per session and read-only afterwards; it is the
//! universe participation rates are computed against.
//!
//! Entries are deduplicated by id (first occurrence wins) and kept in a
//! deterministic order: kecamatan name, then desa name, then id.

use crate::{DesaId, RegionPath};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// One desa in the roster.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Desa {
    pub id: DesaId,
    pub name: String,
    pub kecamatan_name: String,
}

impl Desa {
    /// Create a roster entry.
    #[must_use]
    pub fn new(id: DesaId, name: impl Into<String>, kecamatan: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            kecamatan_name: kecamatan.into(),
        }
    }
}

/// Immutable roster with id and kecamatan indexes.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegionRoster {
    entries: Vec<Desa>,
    by_id: BTreeMap<DesaId, usize>,
    by_kecamatan: BTreeMap<String, Vec<usize>>,
}

impl RegionRoster {
    /// Build a roster from raw entries.
    #[must_use]
    pub fn new(entries: impl IntoIterator<Item = Desa>) -> Self {
        let mut seen = BTreeMap::new();
        for desa in entries {
            seen.entry(desa.id).or_insert(desa);
        }

        let mut entries: Vec<Desa> = seen.into_values().collect();
        entries.sort_by(|a, b| {
            a.kecamatan_name
                .cmp(&b.kecamatan_name)
                .then_with(|| a.name.cmp(&b.name))
                .then_with(|| a.id.cmp(&b.id))
        });

        let mut by_id = BTreeMap::new();
        let mut by_kecamatan: BTreeMap<String, Vec<usize>> = BTreeMap::new();
        for (idx, desa) in entries.iter().enumerate() {
            by_id.insert(desa.id, idx);
            by_kecamatan
                .entry(desa.kecamatan_name.clone())
                .or_default()
                .push(idx);
        }

        Self {
            entries,
            by_id,
            by_kecamatan,
        }
    }

    /// Number of desa in the roster.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Check if the roster is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// All entries in roster order.
    #[must_use]
    pub fn entries(&self) -> &[Desa] {
        &self.entries
    }

    /// Look up a desa by id.
    #[must_use]
    pub fn get(&self, id: DesaId) -> Option<&Desa> {
        self.by_id.get(&id).and_then(|&idx| self.entries.get(idx))
    }

    /// Check whether a desa id is in the roster.
    #[must_use]
    pub fn contains(&self, id: DesaId) -> bool {
        self.by_id.contains_key(&id)
    }

    /// Kecamatan names in lexicographic order.
    pub fn kecamatan_names(&self) -> impl Iterator<Item = &str> {
        self.by_kecamatan.keys().map(String::as_str)
    }

    /// Number of kecamatan in the roster.
    #[must_use]
    pub fn kecamatan_count(&self) -> usize {
        self.by_kecamatan.len()
    }

    /// Desa of one kecamatan, in roster order. Empty for unknown names.
    pub fn desa_in<'a>(&'a self, kecamatan: &str) -> impl Iterator<Item = &'a Desa> + use<'a> {
        self.by_kecamatan
            .get(kecamatan)
            .into_iter()
            .flatten()
            .filter_map(|&idx| self.entries.get(idx))
    }

    /// Resolve a record's region against the roster.
    ///
    /// Succeeds only when the desa id exists and the submitted kecamatan
    /// name matches the roster kecamatan of that desa (ASCII case and
    /// surrounding whitespace ignored). Anything else is unresolvable.
    #[must_use]
    pub fn resolve(&self, path: &RegionPath) -> Option<&Desa> {
        let desa = self.get(path.desa_id?)?;
        desa.kecamatan_name
            .trim()
            .eq_ignore_ascii_case(path.kecamatan_name.trim())
            .then_some(desa)
    }
}

impl FromIterator<Desa> for RegionRoster {
    fn from_iter<I: IntoIterator<Item = Desa>>(iter: I) -> Self {
        Self::new(iter)
    }
}

// =============================================================================
// TESTS
// =============================================================================
