//! # Facet Filter & Paginator
//!
//! Predicate filtering, facet option extraction and page slicing for any
//! collection whose items implement [`Facetable`] (proposal records and
//! region rows out of the box).
//!
//! - Predicates are optional and AND-combined. An empty value or `"all"`
//!   means "no restriction".
//! - Facet options are always taken from the FULL dataset, so a dropdown
//!   offers every option regardless of the other active filters.
//! - Pages are 1-indexed. Changing a filter through [`ListView`] resets the
//!   page to 1.
//!
//! Everything here is total: empty inputs and out-of-range pages produce
//! empty results, never errors.

use crate::primitives::{ALL_FILTER, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE};
use crate::{ProposalRecord, RegionRow, resolve_stage};
use serde::{Deserialize, Serialize};
use std::borrow::Cow;
use std::collections::BTreeSet;

// =============================================================================
// FACET FIELDS
// =============================================================================

/// Fields that can be filtered on or listed as facet options.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FacetField {
    Kecamatan,
    Desa,
    /// Review status (the Dinas status for proposals).
    Status,
    /// Derived pipeline stage key.
    Stage,
    /// Category, e.g. business type.
    Category,
    /// Upload / participation status.
    UploadStatus,
    ActivityType,
}

impl FacetField {
    /// Parse a field name as used in query strings.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "kecamatan" => Some(FacetField::Kecamatan),
            "desa" => Some(FacetField::Desa),
            "status" => Some(FacetField::Status),
            "stage" => Some(FacetField::Stage),
            "category" | "business_type" => Some(FacetField::Category),
            "upload_status" | "participation" => Some(FacetField::UploadStatus),
            "activity_type" => Some(FacetField::ActivityType),
            _ => None,
        }
    }
}

/// An item that exposes facet values and free-text search fields.
pub trait Facetable {
    /// Value of `field`, or `None` when the item has none.
    fn facet(&self, field: FacetField) -> Option<Cow<'_, str>>;

    /// Text fields searched by the free-text predicate.
    fn search_fields(&self) -> Vec<&str>;
}

impl Facetable for ProposalRecord {
    fn facet(&self, field: FacetField) -> Option<Cow<'_, str>> {
        match field {
            FacetField::Kecamatan => Some(Cow::Borrowed(self.region.kecamatan_name.as_str())),
            FacetField::Desa => Some(Cow::Borrowed(self.region.desa_name.as_str())),
            FacetField::Status => Some(Cow::Borrowed(self.dinas_status.as_str())),
            FacetField::Stage => Some(Cow::Borrowed(resolve_stage(self).key())),
            FacetField::Category => self.business_type.as_deref().map(Cow::Borrowed),
            FacetField::UploadStatus => self.upload_status.as_deref().map(Cow::Borrowed),
            FacetField::ActivityType => Some(Cow::Borrowed(self.linked_activity_type.as_str())),
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.proposer_name.as_str(),
            self.activity_title.as_str(),
            self.region.desa_name.as_str(),
            self.region.kecamatan_name.as_str(),
        ]
    }
}

impl Facetable for RegionRow {
    fn facet(&self, field: FacetField) -> Option<Cow<'_, str>> {
        match field {
            FacetField::Kecamatan => Some(Cow::Borrowed(self.desa().kecamatan_name.as_str())),
            FacetField::Desa => Some(Cow::Borrowed(self.desa().name.as_str())),
            FacetField::UploadStatus => Some(Cow::Borrowed(self.participation_status())),
            FacetField::Status
            | FacetField::Stage
            | FacetField::Category
            | FacetField::ActivityType => None,
        }
    }

    fn search_fields(&self) -> Vec<&str> {
        vec![
            self.desa().name.as_str(),
            self.desa().kecamatan_name.as_str(),
        ]
    }
}

// =============================================================================
// FILTER SET
// =============================================================================

/// Active predicates. `None` (or `"all"`, or empty) disables a predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterSet {
    pub kecamatan: Option<String>,
    pub status: Option<String>,
    pub stage: Option<String>,
    pub search: Option<String>,
    pub category: Option<String>,
    pub upload_status: Option<String>,
}

impl FilterSet {
    /// Set (or clear) the predicate for `field`.
    pub fn set(&mut self, field: FilterField, value: Option<String>) {
        let value = value.filter(|v| is_active(v));
        match field {
            FilterField::Kecamatan => self.kecamatan = value,
            FilterField::Status => self.status = value,
            FilterField::Stage => self.stage = value,
            FilterField::Search => self.search = value,
            FilterField::Category => self.category = value,
            FilterField::UploadStatus => self.upload_status = value,
        }
    }

    /// Whether any predicate is active.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        [
            &self.kecamatan,
            &self.status,
            &self.stage,
            &self.search,
            &self.category,
            &self.upload_status,
        ]
        .iter()
        .all(|v| v.as_deref().is_none_or(|v| !is_active(v)))
    }

    /// Check one item against every active predicate.
    #[must_use]
    pub fn matches<T: Facetable + ?Sized>(&self, item: &T) -> bool {
        exact(item, FacetField::Kecamatan, self.kecamatan.as_deref())
            && exact(item, FacetField::Status, self.status.as_deref())
            && exact(item, FacetField::Stage, self.stage.as_deref())
            && exact(item, FacetField::Category, self.category.as_deref())
            && exact(item, FacetField::UploadStatus, self.upload_status.as_deref())
            && text_matches(item, self.search.as_deref())
    }
}

/// Filterable fields, as named by the presentation layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterField {
    Kecamatan,
    Status,
    Stage,
    Search,
    Category,
    UploadStatus,
}

impl FilterField {
    /// Parse a filter name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "kecamatan" => Some(FilterField::Kecamatan),
            "status" => Some(FilterField::Status),
            "stage" => Some(FilterField::Stage),
            "search" | "q" => Some(FilterField::Search),
            "category" | "business_type" => Some(FilterField::Category),
            "upload_status" | "participation" => Some(FilterField::UploadStatus),
            _ => None,
        }
    }
}

fn is_active(value: &str) -> bool {
    let value = value.trim();
    !value.is_empty() && !value.eq_ignore_ascii_case(ALL_FILTER)
}

fn exact<T: Facetable + ?Sized>(item: &T, field: FacetField, wanted: Option<&str>) -> bool {
    match wanted.filter(|w| is_active(w)) {
        None => true,
        Some(wanted) => item
            .facet(field)
            .is_some_and(|value| value.as_ref() == wanted.trim()),
    }
}

fn text_matches<T: Facetable + ?Sized>(item: &T, needle: Option<&str>) -> bool {
    let Some(needle) = needle.map(str::trim).filter(|n| !n.is_empty()) else {
        return true;
    };
    let needle = needle.to_lowercase();
    item.search_fields()
        .iter()
        .any(|field| field.to_lowercase().contains(&needle))
}

// =============================================================================
// OPERATIONS
// =============================================================================

/// Items matching every active predicate, in input order.
#[must_use]
pub fn filter<'a, T: Facetable>(items: &'a [T], filters: &FilterSet) -> Vec<&'a T> {
    items.iter().filter(|item| filters.matches(*item)).collect()
}

/// Sorted distinct values of `field` over the full dataset.
///
/// Empty values are skipped.
#[must_use]
pub fn facet_values<T: Facetable>(items: &[T], field: FacetField) -> Vec<String> {
    let values: BTreeSet<String> = items
        .iter()
        .filter_map(|item| item.facet(field))
        .filter(|v| !v.trim().is_empty())
        .map(Cow::into_owned)
        .collect();
    values.into_iter().collect()
}

/// One page of a collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// 1-based page number that was requested.
    pub page_number: usize,
    pub page_size: usize,
    pub page_count: usize,
    pub total_items: usize,
}

/// Slice page `page_number` (1-based) of `items`.
///
/// Page size is clamped to `1..=MAX_PAGE_SIZE`; page 0 is treated as page 1.
/// A page past the end is empty.
#[must_use]
pub fn paginate<T: Clone>(items: &[T], page_size: usize, page_number: usize) -> Page<T> {
    let page_size = page_size.clamp(1, MAX_PAGE_SIZE);
    let page_number = page_number.max(1);
    let total_items = items.len();
    let page_count = total_items.div_ceil(page_size);

    let start = (page_number - 1).saturating_mul(page_size);
    let page_items = items
        .iter()
        .skip(start)
        .take(page_size)
        .cloned()
        .collect();

    Page {
        items: page_items,
        page_number,
        page_size,
        page_count,
        total_items,
    }
}

// =============================================================================
// LIST VIEW STATE
// =============================================================================

/// Filter + page state behind one table on the dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListView {
    filters: FilterSet,
    page_number: usize,
    page_size: usize,
}

impl Default for ListView {
    fn default() -> Self {
        Self::new(DEFAULT_PAGE_SIZE)
    }
}

impl ListView {
    /// Create a view on page 1 with no filters.
    #[must_use]
    pub fn new(page_size: usize) -> Self {
        Self {
            filters: FilterSet::default(),
            page_number: 1,
            page_size: page_size.clamp(1, MAX_PAGE_SIZE),
        }
    }

    /// Change one filter. Always resets to page 1.
    pub fn set_filter(&mut self, field: FilterField, value: Option<String>) {
        self.filters.set(field, value);
        self.page_number = 1;
    }

    /// Drop every filter. Resets to page 1.
    pub fn clear_filters(&mut self) {
        self.filters = FilterSet::default();
        self.page_number = 1;
    }

    /// Jump to a page (0 is treated as 1).
    pub fn set_page(&mut self, page_number: usize) {
        self.page_number = page_number.max(1);
    }

    /// Change the page size. Resets to page 1.
    pub fn set_page_size(&mut self, page_size: usize) {
        self.page_size = page_size.clamp(1, MAX_PAGE_SIZE);
        self.page_number = 1;
    }

    #[must_use]
    pub fn filters(&self) -> &FilterSet {
        &self.filters
    }

    #[must_use]
    pub fn page_number(&self) -> usize {
        self.page_number
    }

    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Filter then paginate `items` with the current state.
    #[must_use]
    pub fn current_page<'a, T: Facetable>(&self, items: &'a [T]) -> Page<&'a T> {
        let filtered = filter(items, &self.filters);
        paginate(&filtered, self.page_size, self.page_number)
    }
}

// =============================================================================
// TESTS
// =============================================================================
