//! Regional roster, loaded once per process and shared.

use super::CacheError;
use crate::remote::FetchError;
use async_trait::async_trait;
use pantau_core::{Desa, RegionRoster};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// Where the roster comes from.
#[async_trait]
pub trait RosterSource: Send + Sync {
    async fn load(&self) -> Result<Vec<Desa>, FetchError>;
}

/// Lazily loaded roster. Concurrent first callers share one load; a failed
/// load leaves the cell empty so the next call retries.
pub struct RosterStore {
    cell: OnceCell<Arc<RegionRoster>>,
    source: Option<Arc<dyn RosterSource>>,
}

impl RosterStore {
    pub fn new(source: Arc<dyn RosterSource>) -> Self {
        Self {
            cell: OnceCell::new(),
            source: Some(source),
        }
    }

    /// A store that already holds `roster` and never loads.
    #[must_use]
    pub fn preloaded(roster: RegionRoster) -> Self {
        Self {
            cell: OnceCell::new_with(Some(Arc::new(roster))),
            source: None,
        }
    }

    /// Whether the roster has been loaded.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.cell.initialized()
    }

    pub async fn get(&self) -> Result<Arc<RegionRoster>, CacheError> {
        self.cell
            .get_or_try_init(|| async {
                let Some(source) = &self.source else {
                    return Ok(Arc::new(RegionRoster::default()));
                };
                let desa = source.load().await.map_err(|e| {
                    tracing::warn!(event = "roster_load_failed", error = %e, "roster load failed");
                    match e {
                        FetchError::Parse(reason) => CacheError::Malformed(reason),
                        other => CacheError::Fetch(other.to_string()),
                    }
                })?;
                let roster = RegionRoster::new(desa);
                tracing::info!(
                    event = "roster_loaded",
                    desa = roster.len(),
                    "regional roster loaded"
                );
                Ok(Arc::new(roster))
            })
            .await
            .map(Arc::clone)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pantau_core::DesaId;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Flaky {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl RosterSource for Flaky {
        async fn load(&self) -> Result<Vec<Desa>, FetchError> {
            if self.calls.fetch_add(1, Ordering::SeqCst) == 0 {
                return Err(FetchError::RateLimited);
            }
            Ok(vec![Desa::new(DesaId(1), "Sukamaju", "Cibeber")])
        }
    }

    #[tokio::test]
    async fn failed_load_is_retried_then_cached() {
        let source = Arc::new(Flaky {
            calls: AtomicUsize::new(0),
        });
        let store = RosterStore::new(source.clone());

        assert!(store.get().await.is_err());
        assert!(!store.is_loaded());

        let roster = store.get().await.expect("second load");
        assert_eq!(roster.len(), 1);
        store.get().await.expect("cached");
        assert_eq!(source.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn preloaded_store_never_loads() {
        let store = RosterStore::preloaded(RegionRoster::new(vec![Desa::new(
            DesaId(7),
            "A",
            "K",
        )]));
        assert!(store.is_loaded());
        assert_eq!(store.get().await.expect("roster").len(), 1);
    }
}
