//! # pantau-core
//!
//! The deterministic statistics engine for Pantau - THE LOGIC.
//!
//! Pantau watches village (desa) proposals move through a three-stage review
//! pipeline (Dinas → Kecamatan → DPMD) and rolls them up per kecamatan and
//! per desa against the authoritative regional roster.
//!
//! ## Contents
//!
//! - `system` → stage resolver and per-stage counts
//! - `roster`, `grouping`, `aggregate`, `ranking` → regional rollups
//! - `facet` → filtering, facet options, pagination
//! - `transition` → observed stage change log
//! - `hash`, `summary` → cacheable payloads and their fingerprints
//! - `formats`, `export` → snapshot and export encodings
//!
//! ## Architectural Constraints
//!
//! The core:
//! - Never mutates a proposal record; every derived structure is a new value
//! - Uses BTreeMap/BTreeSet only and integer arithmetic only
//! - Has NO async, NO network dependencies (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod aggregate;
pub mod export;
pub mod facet;
pub mod formats;
pub mod grouping;
pub mod hash;
pub mod primitives;
pub mod ranking;
pub mod roster;
pub mod summary;
pub mod system;
pub mod transition;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{DesaId, DocumentRef, PantauError, ProposalId, ProposalRecord, RegionPath, ReviewStatus};

// =============================================================================
// RE-EXPORTS: Regional Aggregator
// =============================================================================

pub use aggregate::{
    AggregatedStat, Percentage, RegionRow, RegionalReport, Scope, StatusBreakdown, UnknownBucket,
    aggregate,
};
pub use grouping::{DesaGroups, RegionGroups};
pub use ranking::{
    RankMetric, RankedDesa, RankedKecamatan, top_by_budget, top_by_count, top_desa, top_kecamatan,
};
pub use roster::{Desa, RegionRoster};

// =============================================================================
// RE-EXPORTS: Facets, Payloads, Transitions
// =============================================================================

pub use facet::{
    FacetField, Facetable, FilterField, FilterSet, ListView, Page, facet_values, filter, paginate,
};
pub use hash::{ContentHash, content_hash, hash_bytes};
pub use summary::{ProgressToTarget, ProposalDataset, StatisticsSummary};
pub use transition::{Transition, TransitionLog};

// =============================================================================
// RE-EXPORTS: Formats & Export
// =============================================================================

pub use export::{ExportHeader, ExportRow, export_bytes, export_checksum, export_rows, import_rows};
pub use formats::{Snapshot, SnapshotHeader, snapshot_from_bytes, snapshot_to_bytes};

// =============================================================================
// RE-EXPORTS: System (from system module)
// =============================================================================

pub use system::{Stage, StageCounts, resolve_stage};
