//! # API Endpoint Handlers
//!
//! Every handler reads through the caches; cache failures map to 502/504
//! via [`ApiError`], while a timeout with cached data still answers 200
//! with `stale: true`.

use super::{
    AppState,
    types::{
        ApiError, ExportResponse, FacetResponse, Freshness, HealthResponse, ProposalsQuery,
        ProposalsResponse, RankingsQuery, RankingsResponse, RefreshRequest, RefreshResponse,
        RegionsQuery, RegionsResponse, SummaryResponse, TransitionsResponse, ViewFilterRequest,
        ViewPageRequest, ViewResponse, VisibilityRequest, VisibilityResponse, proposal_page,
    },
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
};
use pantau_core::{
    FacetField, FilterField, RankMetric, RegionRow, aggregate, export_bytes, export_checksum,
    export_rows, facet_values, filter, paginate,
    primitives::{TOP_BUDGET_LIMIT, TOP_COUNT_LIMIT},
    top_desa, top_kecamatan,
};

// =============================================================================
// HEALTH HANDLER
// =============================================================================

/// Health check endpoint.
pub async fn health_handler() -> impl IntoResponse {
    Json(HealthResponse::default())
}

// =============================================================================
// SUMMARY / REFRESH
// =============================================================================

/// Cached statistics summary.
pub async fn summary_handler(
    State(state): State<AppState>,
) -> Result<impl IntoResponse, ApiError> {
    let hit = state.summary.get(false).await?;
    let response = SummaryResponse {
        freshness: Freshness::from(&hit),
        summary: (*hit.payload).clone(),
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Refresh both caches. An empty body is a non-forced refresh. Both caches
/// are attempted even if the first fails.
pub async fn refresh_handler(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let request: RefreshRequest = if body.is_empty() {
        RefreshRequest::default()
    } else {
        serde_json::from_slice(&body)
            .map_err(|e| ApiError::bad_request(format!("Invalid refresh request: {e}")))?
    };
    let force = request.force;
    let before = state.transitions.read().await.recorded_total();

    let summary = state.summary.get(force).await;
    let proposals = state.proposals(force).await;
    let summary = summary?;
    let proposals = proposals?;

    let after = state.transitions.read().await.recorded_total();
    tracing::info!(
        event = "manual_refresh",
        force,
        summary_changed = summary.changed,
        proposals_changed = proposals.changed,
        "manual refresh"
    );
    Ok((
        StatusCode::OK,
        Json(RefreshResponse {
            summary: Freshness::from(&summary),
            proposals: Freshness::from(&proposals),
            transitions: after.saturating_sub(before) as usize,
        }),
    ))
}

// =============================================================================
// REGIONS / RANKINGS
// =============================================================================

/// Regional report plus filtered, paginated region rows.
pub async fn regions_handler(
    State(state): State<AppState>,
    Query(query): Query<RegionsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hit = state.proposals(false).await?;
    let roster = state.roster.get().await?;
    let report = aggregate(&hit.payload.records, &roster);

    let rows = report.region_rows();
    let filtered: Vec<RegionRow> = filter(&rows, &query.filters())
        .into_iter()
        .cloned()
        .collect();
    let page_size = query.page_size.unwrap_or(state.view.read().await.page_size());
    let page = paginate(&filtered, page_size, query.page.unwrap_or(1));

    let response = RegionsResponse {
        participation: report.participation().to_string(),
        total_desa_tidak_mengajukan: report.total_desa_tidak_mengajukan(),
        freshness: Freshness::from(&hit),
        rows: page,
        global: report.global,
        kecamatan: report.kecamatan,
        unknown: report.unknown,
    };
    Ok((StatusCode::OK, Json(response)))
}

/// Top desa and kecamatan by budget (default) or proposal count.
pub async fn rankings_handler(
    State(state): State<AppState>,
    Query(query): Query<RankingsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let metric = match query.by.as_deref() {
        None => RankMetric::Budget,
        Some(label) => RankMetric::parse(label)
            .ok_or_else(|| ApiError::bad_request(format!("Unknown ranking metric: {label}")))?,
    };
    let limit = query.limit.unwrap_or(match metric {
        RankMetric::Budget => TOP_BUDGET_LIMIT,
        RankMetric::ProposalCount => TOP_COUNT_LIMIT,
    });

    let hit = state.proposals(false).await?;
    let roster = state.roster.get().await?;
    let report = aggregate(&hit.payload.records, &roster);

    Ok((
        StatusCode::OK,
        Json(RankingsResponse {
            metric,
            desa: top_desa(&report, metric, limit),
            kecamatan: top_kecamatan(&report, metric, limit),
        }),
    ))
}

// =============================================================================
// PROPOSALS / FACETS
// =============================================================================

/// Filtered, paginated proposals.
pub async fn proposals_handler(
    State(state): State<AppState>,
    Query(query): Query<ProposalsQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let hit = state.proposals(false).await?;
    let filtered = filter(&hit.payload.records, &query.filters());
    let page_size = query.page_size.unwrap_or(state.view.read().await.page_size());
    let page = paginate(&filtered, page_size, query.page.unwrap_or(1));

    Ok((
        StatusCode::OK,
        Json(ProposalsResponse {
            page: proposal_page(page),
            freshness: Freshness::from(&hit),
        }),
    ))
}

/// Distinct values of one facet over the full dataset.
pub async fn facets_handler(
    State(state): State<AppState>,
    Path(field): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let facet = FacetField::parse(&field)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown facet: {field}")))?;
    let hit = state.proposals(false).await?;

    Ok((
        StatusCode::OK,
        Json(FacetResponse {
            field,
            values: facet_values(&hit.payload.records, facet),
        }),
    ))
}

// =============================================================================
// VISIBILITY
// =============================================================================

/// Record dashboard visibility. Becoming visible with a stale cache
/// triggers a non-forced refresh; its failures are logged only.
pub async fn visibility_handler(
    State(state): State<AppState>,
    Json(request): Json<VisibilityRequest>,
) -> impl IntoResponse {
    state.visibility.set(request.visible);

    let stale = state.summary.is_stale() || state.proposals.is_stale();
    let refreshed = request.visible && stale;
    if refreshed {
        if let Err(e) = state.summary.get(false).await {
            tracing::warn!(event = "visibility_refresh", cache = "summary", error = %e, "refresh failed");
        }
        if let Err(e) = state.proposals(false).await {
            tracing::warn!(event = "visibility_refresh", cache = "proposals", error = %e, "refresh failed");
        }
    }

    (
        StatusCode::OK,
        Json(VisibilityResponse {
            visible: request.visible,
            refreshed,
        }),
    )
}

// =============================================================================
// LIST VIEW
// =============================================================================

async fn render_view(state: &AppState) -> Result<ViewResponse, ApiError> {
    let hit = state.proposals(false).await?;
    let view = state.view.read().await;
    Ok(ViewResponse {
        filters: view.filters().clone(),
        page: proposal_page(view.current_page(&hit.payload.records)),
        freshness: Freshness::from(&hit),
    })
}

/// Current page of the server-held list view.
pub async fn view_handler(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    Ok((StatusCode::OK, Json(render_view(&state).await?)))
}

/// Change one filter of the list view; resets to page 1.
pub async fn view_filter_handler(
    State(state): State<AppState>,
    Json(request): Json<ViewFilterRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let field = FilterField::parse(&request.field)
        .ok_or_else(|| ApiError::bad_request(format!("Unknown filter: {}", request.field)))?;
    state.view.write().await.set_filter(field, request.value);
    Ok((StatusCode::OK, Json(render_view(&state).await?)))
}

/// Move the list view to another page, optionally changing its size.
pub async fn view_page_handler(
    State(state): State<AppState>,
    Json(request): Json<ViewPageRequest>,
) -> Result<impl IntoResponse, ApiError> {
    {
        let mut view = state.view.write().await;
        if let Some(size) = request.page_size {
            view.set_page_size(size);
        }
        view.set_page(request.page);
    }
    Ok((StatusCode::OK, Json(render_view(&state).await?)))
}

// =============================================================================
// TRANSITIONS
// =============================================================================

/// Stage transitions observed since startup.
pub async fn transitions_handler(State(state): State<AppState>) -> impl IntoResponse {
    let log = state.transitions.read().await;
    Json(TransitionsResponse {
        tracked: log.tracked(),
        transitions: log.entries().to_vec(),
    })
}

// =============================================================================
// EXPORT HANDLER
// =============================================================================

/// Export the proposal dataset as ordered rows.
pub async fn export_handler(State(state): State<AppState>) -> impl IntoResponse {
    let loaded = async {
        let hit = state.proposals(false).await?;
        let roster = state.roster.get().await?;
        Ok::<_, ApiError>((hit, roster))
    }
    .await;
    let (hit, roster) = match loaded {
        Ok(loaded) => loaded,
        Err(e) => return (e.status, Json(ExportResponse::error(e.message))),
    };

    let rows = export_rows(&hit.payload.records, &roster);
    let checksum = export_checksum(&rows);
    match export_bytes(&hit.payload.records, &roster) {
        Ok(data) => (
            StatusCode::OK,
            Json(ExportResponse::success(data, checksum, rows.len())),
        ),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            Json(ExportResponse::error(format!("Export failed: {}", e))),
        ),
    }
}
