//! # Pantau HTTP API Module
//!
//! This module implements the dashboard's HTTP REST API using axum.
//!
//! ## Endpoints
//!
//! - `GET /health` - Health check
//! - `GET /summary` - Cached statistics summary
//! - `POST /refresh` - Refresh both caches (`{"force": true}` bypasses TTL and dedup)
//! - `GET /regions` - Regional report and filtered, paginated region rows
//! - `GET /rankings` - Top desa / kecamatan by budget or proposal count
//! - `GET /proposals` - Filtered, paginated proposals with resolved stages
//! - `GET /facets/{field}` - Distinct values of a facet over the full dataset
//! - `POST /visibility` - Dashboard visibility (gates background refresh)
//! - `GET /view`, `POST /view/filter`, `POST /view/page` - Server-held list view
//! - `GET /transitions` - Observed stage transitions
//! - `POST /export` - Ordered export rows, base64 encoded, with checksum
//!
//! ## Security Configuration (Environment Variables)
//!
//! - `PANTAU_CORS_ORIGINS`: Comma-separated list of allowed origins, or "*" for all (default: localhost only)
//! - `PANTAU_RATE_LIMIT`: Requests per second (default: 100, 0 to disable)
//! - `PANTAU_API_KEY`: If set, requires Bearer token authentication

mod auth;
mod handlers;
mod middleware;
mod types;

pub use auth::get_api_key_from_env;
pub use middleware::{create_rate_limiter, get_rate_limit_from_env};
pub use types::{
    ApiError, ErrorResponse, ExportResponse, FacetResponse, Freshness, HealthResponse,
    ProposalJson, ProposalsQuery, ProposalsResponse, RankingsQuery, RankingsResponse,
    RefreshRequest, RefreshResponse, RegionsQuery, RegionsResponse, SummaryResponse,
    TransitionsResponse, ViewFilterRequest, ViewPageRequest, ViewResponse, VisibilityRequest,
    VisibilityResponse, proposal_page,
};

use crate::cache::{
    CacheError, CacheHit, Clock, Refreshable, Refresher, RosterStore, StatsCache, SystemClock,
    VisibilityFlag,
};
use crate::config::PantauConfig;
use crate::remote::RemoteClient;
use axum::{
    Router,
    http::{HeaderValue, Method, header},
    middleware as axum_middleware,
    routing::{get, post},
};
use pantau_core::{ListView, PantauError, ProposalDataset, StatisticsSummary, TransitionLog};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

// =============================================================================
// SERVER STATE
// =============================================================================

/// Shared server state: the two caches, the roster and the view state.
#[derive(Clone)]
pub struct AppState {
    pub summary: Arc<StatsCache<StatisticsSummary>>,
    pub proposals: Arc<StatsCache<ProposalDataset>>,
    pub roster: Arc<RosterStore>,
    pub visibility: VisibilityFlag,
    pub view: Arc<RwLock<ListView>>,
    pub transitions: Arc<RwLock<TransitionLog>>,
    pub clock: Arc<dyn Clock>,
}

impl AppState {
    pub fn new(
        summary: Arc<StatsCache<StatisticsSummary>>,
        proposals: Arc<StatsCache<ProposalDataset>>,
        roster: Arc<RosterStore>,
        clock: Arc<dyn Clock>,
        page_size: usize,
    ) -> Self {
        Self {
            summary,
            proposals,
            roster,
            visibility: VisibilityFlag::default(),
            view: Arc::new(RwLock::new(ListView::new(page_size))),
            transitions: Arc::new(RwLock::new(TransitionLog::new())),
            clock,
        }
    }

    /// State backed by the remote record store.
    #[must_use]
    pub fn from_remote(client: RemoteClient, config: &PantauConfig) -> Self {
        let client = Arc::new(client);
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let summary = StatsCache::<StatisticsSummary>::new(
            "summary",
            client.clone(),
            clock.clone(),
            config.cache.summary(),
        );
        let proposals = StatsCache::<ProposalDataset>::new(
            "proposals",
            client.clone(),
            clock.clone(),
            config.cache.proposals(),
        );
        Self::new(
            Arc::new(summary),
            Arc::new(proposals),
            Arc::new(RosterStore::new(client)),
            clock,
            config.view.page_size,
        )
        .with_transition_cap(config.view.max_transitions)
    }

    /// Replace the transition log with an empty one retaining at most
    /// `max_entries` transitions.
    #[must_use]
    pub fn with_transition_cap(mut self, max_entries: usize) -> Self {
        self.transitions = Arc::new(RwLock::new(TransitionLog::with_capacity(max_entries)));
        self
    }

    /// Background refresher over both caches, gated by this state's
    /// visibility flag.
    #[must_use]
    pub fn refresher(&self, interval: Duration) -> Refresher {
        Refresher::new(
            vec![
                self.summary.clone() as Arc<dyn Refreshable>,
                self.proposals.clone() as Arc<dyn Refreshable>,
            ],
            Arc::new(self.visibility.clone()),
            interval,
        )
    }

    /// Proposal dataset through the cache; a replaced dataset is fed to the
    /// transition log.
    pub async fn proposals(&self, force: bool) -> Result<CacheHit<ProposalDataset>, CacheError> {
        let hit = self.proposals.get(force).await?;
        if hit.changed {
            self.observe_transitions().await;
        }
        Ok(hit)
    }

    /// Feed the current proposal entry to the transition log. Repeated
    /// observations of the same data record nothing.
    pub async fn observe_transitions(&self) -> usize {
        let Some(entry) = self.proposals.entry() else {
            return 0;
        };
        let now = self.clock.now_ms();
        let recorded = self
            .transitions
            .write()
            .await
            .observe_all(&entry.payload.records, now);
        if recorded > 0 {
            tracing::info!(event = "stage_transitions", recorded, "stage transitions observed");
        }
        recorded
    }

    /// Track transitions for every proposal swap, including background ones.
    pub fn spawn_transition_tracker(&self) -> JoinHandle<()> {
        let state = self.clone();
        let mut changes = self.proposals.subscribe();
        tokio::spawn(async move {
            while changes.changed().await.is_ok() {
                state.observe_transitions().await;
            }
        })
    }
}

// =============================================================================
// CORS CONFIGURATION
// =============================================================================

/// Build CORS layer from environment configuration.
///
/// Reads `PANTAU_CORS_ORIGINS` environment variable:
/// - If "*": allows all origins
/// - If not set: defaults to localhost only
/// - Otherwise: parses comma-separated list of allowed origins
fn build_cors_layer() -> CorsLayer {
    let origins_env = std::env::var("PANTAU_CORS_ORIGINS").ok();

    match origins_env.as_deref() {
        Some("*") => {
            tracing::warn!(
                "CORS: Allowing ALL origins (PANTAU_CORS_ORIGINS=*). This is insecure for production!"
            );
            CorsLayer::permissive()
        }
        Some(origins) => {
            let allowed_origins: Vec<HeaderValue> = origins
                .split(',')
                .filter_map(|s| {
                    let trimmed = s.trim();
                    match trimmed.parse::<HeaderValue>() {
                        Ok(hv) => {
                            tracing::info!("CORS: Allowing origin: {}", trimmed);
                            Some(hv)
                        }
                        Err(e) => {
                            tracing::warn!("CORS: Invalid origin '{}': {}", trimmed, e);
                            None
                        }
                    }
                })
                .collect();

            if allowed_origins.is_empty() {
                tracing::warn!(
                    "CORS: No valid origins in PANTAU_CORS_ORIGINS, defaulting to localhost only"
                );
                build_localhost_cors()
            } else {
                CorsLayer::new()
                    .allow_origin(allowed_origins)
                    .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
                    .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
            }
        }
        None => {
            tracing::info!("CORS: No PANTAU_CORS_ORIGINS set, defaulting to localhost only");
            build_localhost_cors()
        }
    }
}

/// Restrictive CORS layer that only allows localhost origins.
fn build_localhost_cors() -> CorsLayer {
    let origins: Vec<HeaderValue> = [
        "http://localhost:3000",
        "http://localhost:5173",
        "http://127.0.0.1:3000",
        "http://127.0.0.1:5173",
    ]
    .into_iter()
    .filter_map(|origin| origin.parse::<HeaderValue>().ok())
    .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
}

// =============================================================================
// ROUTER CREATION
// =============================================================================

/// Create the axum router with all endpoints and middleware.
///
/// Middleware stack (outer to inner):
/// 1. Tracing - logs all requests
/// 2. CORS - handles preflight requests
/// 3. Rate Limiting (if enabled)
/// 4. Authentication (if configured)
pub fn create_router(state: AppState) -> Router {
    let cors = build_cors_layer();

    let rate_limit = get_rate_limit_from_env();
    let rate_limiter = if rate_limit > 0 {
        tracing::info!("Rate limiting enabled: {} requests/second", rate_limit);
        Some(create_rate_limiter(rate_limit))
    } else {
        tracing::info!("Rate limiting disabled");
        None
    };

    let has_auth = get_api_key_from_env().is_some();
    if has_auth {
        tracing::info!("API key authentication enabled");
    } else {
        tracing::warn!(
            "API key authentication DISABLED - all endpoints are publicly accessible! \
             Set PANTAU_API_KEY environment variable to enable authentication."
        );
    }

    let mut router = Router::new()
        .route("/health", get(handlers::health_handler))
        .route("/summary", get(handlers::summary_handler))
        .route("/refresh", post(handlers::refresh_handler))
        .route("/regions", get(handlers::regions_handler))
        .route("/rankings", get(handlers::rankings_handler))
        .route("/proposals", get(handlers::proposals_handler))
        .route("/facets/{field}", get(handlers::facets_handler))
        .route("/visibility", post(handlers::visibility_handler))
        .route("/view", get(handlers::view_handler))
        .route("/view/filter", post(handlers::view_filter_handler))
        .route("/view/page", post(handlers::view_page_handler))
        .route("/transitions", get(handlers::transitions_handler))
        .route("/export", post(handlers::export_handler));

    if has_auth {
        router = router.layer(axum_middleware::from_fn(auth::api_key_auth_middleware));
    }

    if let Some(limiter) = rate_limiter {
        router = router.layer(axum_middleware::from_fn_with_state(
            limiter,
            middleware::rate_limit_middleware,
        ));
    }

    router
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(cors)
                .layer(axum::extract::DefaultBodyLimit::max(64 * 1024)),
        )
        .with_state(state)
}

// =============================================================================
// SERVER STARTUP
// =============================================================================

/// Start the HTTP server.
pub async fn run_server(addr: &str, state: AppState) -> Result<(), PantauError> {
    let router = create_router(state);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| PantauError::IoError(format!("Bind failed: {}", e)))?;

    tracing::info!("Pantau HTTP server listening on {}", addr);

    axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|e| PantauError::IoError(format!("Server error: {}", e)))
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Cannot listen for Ctrl+C: {}", e);
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
