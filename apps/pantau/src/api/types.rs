//! # API Request/Response Types
//!
//! This module defines the JSON structures for the HTTP API.

use crate::cache::{CacheError, CacheHit};
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use pantau_core::{
    AggregatedStat, FilterField, FilterSet, Page, ProposalRecord, RankMetric, RankedDesa,
    RankedKecamatan, RegionRow, Stage, StatisticsSummary, Transition, UnknownBucket,
    resolve_stage,
};
use serde::{Deserialize, Serialize};

// =============================================================================
// ERRORS
// =============================================================================

/// Error body shared by every endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
}

/// Handler failure: status code plus message.
#[derive(Debug, Clone)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: msg.into(),
        }
    }
}

impl From<CacheError> for ApiError {
    fn from(err: CacheError) -> Self {
        let status = match err {
            CacheError::Timeout => StatusCode::GATEWAY_TIMEOUT,
            CacheError::Fetch(_) | CacheError::Malformed(_) => StatusCode::BAD_GATEWAY,
        };
        Self {
            status,
            message: err.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorResponse {
            success: false,
            error: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}

// =============================================================================
// HEALTH RESPONSE
// =============================================================================

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

impl Default for HealthResponse {
    fn default() -> Self {
        Self {
            status: "ok".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

// =============================================================================
// CACHE FRESHNESS
// =============================================================================

/// How a cached payload was served.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Freshness {
    pub from_cache: bool,
    pub stale: bool,
    pub changed: bool,
}

impl<T> From<&CacheHit<T>> for Freshness {
    fn from(hit: &CacheHit<T>) -> Self {
        Self {
            from_cache: hit.from_cache,
            stale: hit.stale,
            changed: hit.changed,
        }
    }
}

// =============================================================================
// SUMMARY / REFRESH
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryResponse {
    pub summary: StatisticsSummary,
    #[serde(flatten)]
    pub freshness: Freshness,
}

/// `POST /refresh`. `force` bypasses the TTL and hash short-circuit.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefreshRequest {
    #[serde(default)]
    pub force: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    pub summary: Freshness,
    pub proposals: Freshness,
    /// Stage transitions recorded by this refresh.
    pub transitions: usize,
}

// =============================================================================
// REGIONS / RANKINGS
// =============================================================================

/// Query string of `GET /regions`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RegionsQuery {
    pub kecamatan: Option<String>,
    pub upload_status: Option<String>,
    pub q: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl RegionsQuery {
    #[must_use]
    pub fn filters(&self) -> FilterSet {
        let mut filters = FilterSet::default();
        filters.set(FilterField::Kecamatan, self.kecamatan.clone());
        filters.set(FilterField::UploadStatus, self.upload_status.clone());
        filters.set(FilterField::Search, self.q.clone());
        filters
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegionsResponse {
    pub global: AggregatedStat,
    /// Global participation as a one-decimal percentage, e.g. `"43.5"`.
    pub participation: String,
    pub total_desa_tidak_mengajukan: usize,
    pub kecamatan: Vec<AggregatedStat>,
    pub unknown: UnknownBucket,
    pub rows: Page<RegionRow>,
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RankingsQuery {
    pub by: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingsResponse {
    pub metric: RankMetric,
    pub desa: Vec<RankedDesa>,
    pub kecamatan: Vec<RankedKecamatan>,
}

// =============================================================================
// PROPOSALS / FACETS
// =============================================================================

/// Query string of `GET /proposals`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProposalsQuery {
    pub kecamatan: Option<String>,
    pub status: Option<String>,
    pub stage: Option<String>,
    pub q: Option<String>,
    pub category: Option<String>,
    pub upload_status: Option<String>,
    pub page: Option<usize>,
    pub page_size: Option<usize>,
}

impl ProposalsQuery {
    #[must_use]
    pub fn filters(&self) -> FilterSet {
        let mut filters = FilterSet::default();
        filters.set(FilterField::Kecamatan, self.kecamatan.clone());
        filters.set(FilterField::Status, self.status.clone());
        filters.set(FilterField::Stage, self.stage.clone());
        filters.set(FilterField::Search, self.q.clone());
        filters.set(FilterField::Category, self.category.clone());
        filters.set(FilterField::UploadStatus, self.upload_status.clone());
        filters
    }
}

/// A proposal with its resolved stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalJson {
    #[serde(flatten)]
    pub record: ProposalRecord,
    pub stage: Stage,
}

impl From<&ProposalRecord> for ProposalJson {
    fn from(record: &ProposalRecord) -> Self {
        Self {
            stage: resolve_stage(record),
            record: record.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProposalsResponse {
    pub page: Page<ProposalJson>,
    #[serde(flatten)]
    pub freshness: Freshness,
}

/// Converts a borrowed page into its JSON form.
#[must_use]
pub fn proposal_page(page: Page<&ProposalRecord>) -> Page<ProposalJson> {
    Page {
        items: page.items.into_iter().map(ProposalJson::from).collect(),
        page_number: page.page_number,
        page_size: page.page_size,
        page_count: page.page_count,
        total_items: page.total_items,
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FacetResponse {
    pub field: String,
    pub values: Vec<String>,
}

// =============================================================================
// VIEW STATE
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityRequest {
    pub visible: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VisibilityResponse {
    pub visible: bool,
    /// Caches refreshed because the dashboard became visible while stale.
    pub refreshed: bool,
}

/// `POST /view/filter`. A `null`, empty or `"all"` value clears the filter.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewFilterRequest {
    pub field: String,
    #[serde(default)]
    pub value: Option<String>,
}

/// `POST /view/page`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewPageRequest {
    pub page: usize,
    #[serde(default)]
    pub page_size: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewResponse {
    pub filters: FilterSet,
    pub page: Page<ProposalJson>,
    #[serde(flatten)]
    pub freshness: Freshness,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionsResponse {
    pub tracked: usize,
    pub transitions: Vec<Transition>,
}

// =============================================================================
// EXPORT RESPONSE
// =============================================================================

/// Export response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportResponse {
    pub success: bool,
    pub data: Option<String>, // Base64 encoded
    pub checksum: Option<u64>,
    pub row_count: usize,
    pub error: Option<String>,
}

impl ExportResponse {
    pub fn success(data: Vec<u8>, checksum: u64, row_count: usize) -> Self {
        Self {
            success: true,
            data: Some(base64::Engine::encode(
                &base64::engine::general_purpose::STANDARD,
                &data,
            )),
            checksum: Some(checksum),
            row_count,
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            checksum: None,
            row_count: 0,
            error: Some(msg.into()),
        }
    }
}
