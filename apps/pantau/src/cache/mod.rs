//! # Statistics Cache Controller
//!
//! A TTL cache around one remotely fetched payload, with change detection
//! and a single in-flight fetch.
//!
//! ## `get(force_refresh)`
//!
//! 1. Not forced, entry fresh and non-empty → cached payload, no fetch.
//! 2. Otherwise fetch, bounded by the configured timeout.
//! 3. Fetched payload hashes equal to the cached one (and not forced) →
//!    keep the entry, advance `fetched_at_ms`, notify nobody.
//! 4. Different hash, or forced → replace the entry, notify subscribers.
//! 5. Failure:
//!    - timeout with a non-empty entry → serve the entry as stale, no error
//!    - any other failure → error, even when an entry exists
//!    - no entry → always an error
//!
//!    The entry is never touched by a failed fetch. A payload that fails
//!    validation, or that the wire layer could not parse, is reported as
//!    `Malformed`.
//!
//! Concurrent callers share one fetch: whoever acquires the flight guard
//! first fetches, everyone queued behind it receives the same outcome.

mod clock;
pub mod refresher;
mod roster;

pub use clock::{Clock, ManualClock, SystemClock};
pub use refresher::{Refreshable, Refresher, TickOutcome, Visibility, VisibilityFlag};
pub use roster::{RosterSource, RosterStore};

use crate::remote::FetchError;
use async_trait::async_trait;
use pantau_core::{ContentHash, PantauError, ProposalDataset, StatisticsSummary, content_hash};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{Mutex, watch};

// =============================================================================
// SEAMS
// =============================================================================

/// A payload the cache can hold.
pub trait CachePayload: Serialize + Send + Sync + 'static {
    /// Whether the payload carries no data (an empty entry is never served).
    fn is_empty(&self) -> bool;

    /// Shape checks; failures reject the payload.
    fn validate(&self) -> Result<(), PantauError>;
}

impl CachePayload for StatisticsSummary {
    fn is_empty(&self) -> bool {
        StatisticsSummary::is_empty(self)
    }

    fn validate(&self) -> Result<(), PantauError> {
        StatisticsSummary::validate(self)
    }
}

impl CachePayload for ProposalDataset {
    fn is_empty(&self) -> bool {
        ProposalDataset::is_empty(self)
    }

    fn validate(&self) -> Result<(), PantauError> {
        ProposalDataset::validate(self)
    }
}

/// Source of fresh payloads.
#[async_trait]
pub trait Fetcher<T>: Send + Sync {
    async fn fetch(&self) -> Result<T, FetchError>;
}

// =============================================================================
// TYPES
// =============================================================================

/// Cache failures surfaced to callers.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CacheError {
    /// Fetch timed out and there was nothing cached to fall back on.
    #[error("Fetch timed out with no cached data")]
    Timeout,
    /// Fetch failed.
    #[error("Fetch failed: {0}")]
    Fetch(String),
    /// Fetched payload could not be parsed or failed validation.
    #[error("Malformed payload: {0}")]
    Malformed(String),
}

/// Timing knobs for one cache instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSettings {
    pub ttl: Duration,
    pub fetch_timeout: Duration,
}

impl CacheSettings {
    /// Statistics summary: 3 minute TTL.
    pub const SUMMARY: CacheSettings = CacheSettings {
        ttl: Duration::from_secs(3 * 60),
        fetch_timeout: Duration::from_secs(45),
    };

    /// Proposal dataset: 5 minute TTL.
    pub const PROPOSALS: CacheSettings = CacheSettings {
        ttl: Duration::from_secs(5 * 60),
        fetch_timeout: Duration::from_secs(45),
    };

    #[must_use]
    pub fn from_secs(ttl_secs: u64, fetch_timeout_secs: u64) -> Self {
        Self {
            ttl: Duration::from_secs(ttl_secs),
            fetch_timeout: Duration::from_secs(fetch_timeout_secs.max(1)),
        }
    }
}

/// The cached payload and its bookkeeping.
#[derive(Debug)]
pub struct CacheEntry<T> {
    pub payload: Arc<T>,
    pub fetched_at_ms: u64,
    pub content_hash: ContentHash,
    pub ttl: Duration,
    /// Set by `invalidate()`; cleared by the next accepted fetch.
    pub invalidated: bool,
}

impl<T> Clone for CacheEntry<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            fetched_at_ms: self.fetched_at_ms,
            content_hash: self.content_hash,
            ttl: self.ttl,
            invalidated: self.invalidated,
        }
    }
}

impl<T> CacheEntry<T> {
    /// Older than its TTL at `now_ms`, or invalidated.
    #[must_use]
    pub fn is_stale(&self, now_ms: u64) -> bool {
        self.invalidated || now_ms.saturating_sub(self.fetched_at_ms) > self.ttl.as_millis() as u64
    }
}

/// Result of a successful `get`.
#[derive(Debug)]
pub struct CacheHit<T> {
    pub payload: Arc<T>,
    /// Served from the existing entry without accepting new data.
    pub from_cache: bool,
    /// The served entry was past its TTL (or invalidated) when served.
    pub stale: bool,
    /// The entry was replaced by this call.
    pub changed: bool,
}

impl<T> Clone for CacheHit<T> {
    fn clone(&self) -> Self {
        Self {
            payload: Arc::clone(&self.payload),
            from_cache: self.from_cache,
            stale: self.stale,
            changed: self.changed,
        }
    }
}

struct Flight<T> {
    last: Option<Result<CacheHit<T>, CacheError>>,
}

// =============================================================================
// STATS CACHE
// =============================================================================

/// TTL cache with content-hash dedup and single-flight fetches.
pub struct StatsCache<T> {
    name: &'static str,
    fetcher: Arc<dyn Fetcher<T>>,
    clock: Arc<dyn Clock>,
    settings: CacheSettings,
    entry: RwLock<Option<CacheEntry<T>>>,
    flight: Mutex<Flight<T>>,
    completed_flights: AtomicU64,
    fetch_count: AtomicU64,
    changes: watch::Sender<u64>,
}

impl<T: CachePayload> StatsCache<T> {
    /// Create an empty cache.
    pub fn new(
        name: &'static str,
        fetcher: Arc<dyn Fetcher<T>>,
        clock: Arc<dyn Clock>,
        settings: CacheSettings,
    ) -> Self {
        let (changes, _) = watch::channel(0);
        Self {
            name,
            fetcher,
            clock,
            settings,
            entry: RwLock::new(None),
            flight: Mutex::new(Flight { last: None }),
            completed_flights: AtomicU64::new(0),
            fetch_count: AtomicU64::new(0),
            changes,
        }
    }

    /// Cache name used in logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Get the payload, fetching when needed.
    pub async fn get(&self, force_refresh: bool) -> Result<CacheHit<T>, CacheError> {
        if !force_refresh {
            if let Some(hit) = self.fresh_hit() {
                return Ok(hit);
            }
        }

        let ticket = self.completed_flights.load(Ordering::Acquire);
        let mut flight = self.flight.lock().await;

        // A flight finished while we queued: share its outcome.
        if self.completed_flights.load(Ordering::Acquire) != ticket {
            if let Some(last) = &flight.last {
                tracing::debug!(cache = self.name, "joined in-flight refresh");
                return last.clone();
            }
        }
        if !force_refresh {
            if let Some(hit) = self.fresh_hit() {
                return Ok(hit);
            }
        }

        let outcome = self.fetch_and_swap(force_refresh).await;
        flight.last = Some(outcome.clone());
        self.completed_flights.fetch_add(1, Ordering::Release);
        outcome
    }

    /// Mark the entry stale so the next `get` fetches. The payload stays
    /// available as a timeout fallback.
    pub fn invalidate(&self) {
        let mut entry = self.entry.write().unwrap_or_else(PoisonError::into_inner);
        if let Some(entry) = entry.as_mut() {
            entry.invalidated = true;
        }
        tracing::debug!(cache = self.name, "cache invalidated");
    }

    /// Whether the next non-forced `get` would fetch. True with no entry.
    #[must_use]
    pub fn is_stale(&self) -> bool {
        let now = self.clock.now_ms();
        self.read_entry()
            .as_ref()
            .is_none_or(|entry| entry.is_stale(now))
    }

    /// Snapshot of the current entry.
    #[must_use]
    pub fn entry(&self) -> Option<CacheEntry<T>> {
        self.read_entry().as_ref().cloned()
    }

    /// Receiver that ticks every time the entry is replaced.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.changes.subscribe()
    }

    /// Number of fetches issued so far.
    #[must_use]
    pub fn fetch_count(&self) -> u64 {
        self.fetch_count.load(Ordering::Relaxed)
    }

    fn read_entry(&self) -> std::sync::RwLockReadGuard<'_, Option<CacheEntry<T>>> {
        self.entry.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn fresh_hit(&self) -> Option<CacheHit<T>> {
        let now = self.clock.now_ms();
        let entry = self.read_entry();
        let entry = entry.as_ref()?;
        if entry.is_stale(now) || entry.payload.is_empty() {
            return None;
        }
        Some(CacheHit {
            payload: Arc::clone(&entry.payload),
            from_cache: true,
            stale: false,
            changed: false,
        })
    }

    async fn fetch_and_swap(&self, force: bool) -> Result<CacheHit<T>, CacheError> {
        self.fetch_count.fetch_add(1, Ordering::Relaxed);
        let fetched = tokio::time::timeout(self.settings.fetch_timeout, self.fetcher.fetch()).await;

        match fetched {
            Ok(Ok(payload)) => self.accept(payload, force),
            Ok(Err(e)) if e.is_timeout() => self.timeout_fallback(),
            Err(_elapsed) => self.timeout_fallback(),
            Ok(Err(FetchError::Parse(reason))) => {
                tracing::warn!(
                    event = "cache_refresh_failed",
                    cache = self.name,
                    error = %reason,
                    "rejected malformed payload"
                );
                Err(CacheError::Malformed(reason))
            }
            Ok(Err(e)) => {
                tracing::warn!(
                    event = "cache_refresh_failed",
                    cache = self.name,
                    error = %e,
                    "fetch failed"
                );
                Err(CacheError::Fetch(e.to_string()))
            }
        }
    }

    fn accept(&self, payload: T, force: bool) -> Result<CacheHit<T>, CacheError> {
        let checked = payload
            .validate()
            .and_then(|()| content_hash(&payload));
        let hash = match checked {
            Ok(hash) => hash,
            Err(e) => {
                tracing::warn!(
                    event = "cache_refresh_failed",
                    cache = self.name,
                    error = %e,
                    "rejected malformed payload"
                );
                return Err(CacheError::Malformed(e.to_string()));
            }
        };

        let now = self.clock.now_ms();
        let mut slot = self.entry.write().unwrap_or_else(PoisonError::into_inner);

        if !force {
            if let Some(entry) = slot.as_mut() {
                if entry.content_hash == hash {
                    entry.fetched_at_ms = now;
                    entry.invalidated = false;
                    tracing::info!(
                        event = "cache_refresh",
                        cache = self.name,
                        changed = false,
                        from_cache = false,
                        hash = %hash,
                        "payload unchanged"
                    );
                    return Ok(CacheHit {
                        payload: Arc::clone(&entry.payload),
                        from_cache: false,
                        stale: false,
                        changed: false,
                    });
                }
            }
        }

        let payload = Arc::new(payload);
        *slot = Some(CacheEntry {
            payload: Arc::clone(&payload),
            fetched_at_ms: now,
            content_hash: hash,
            ttl: self.settings.ttl,
            invalidated: false,
        });
        drop(slot);

        self.changes.send_modify(|version| *version = version.wrapping_add(1));
        tracing::info!(
            event = "cache_refresh",
            cache = self.name,
            changed = true,
            from_cache = false,
            forced = force,
            hash = %hash,
            "payload replaced"
        );
        Ok(CacheHit {
            payload,
            from_cache: false,
            stale: false,
            changed: true,
        })
    }

    fn timeout_fallback(&self) -> Result<CacheHit<T>, CacheError> {
        let now = self.clock.now_ms();
        let entry = self.read_entry();
        match entry.as_ref() {
            Some(entry) if !entry.payload.is_empty() => {
                let stale = entry.is_stale(now);
                tracing::warn!(
                    event = "cache_refresh_timeout",
                    cache = self.name,
                    from_cache = true,
                    stale,
                    "fetch timed out, serving cached payload"
                );
                Ok(CacheHit {
                    payload: Arc::clone(&entry.payload),
                    from_cache: true,
                    stale,
                    changed: false,
                })
            }
            _ => {
                tracing::warn!(
                    event = "cache_refresh_timeout",
                    cache = self.name,
                    from_cache = false,
                    "fetch timed out with nothing cached"
                );
                Err(CacheError::Timeout)
            }
        }
    }
}

#[async_trait]
impl<T: CachePayload> Refreshable for StatsCache<T> {
    fn name(&self) -> &str {
        self.name
    }

    async fn refresh(&self) -> Result<bool, CacheError> {
        self.get(false).await.map(|hit| hit.changed)
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use pantau_core::ProgressToTarget;
    use std::collections::BTreeMap;
    use std::sync::atomic::AtomicUsize;

    struct Fixed {
        summary: StatisticsSummary,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl Fetcher<StatisticsSummary> for Fixed {
        async fn fetch(&self) -> Result<StatisticsSummary, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.summary.clone())
        }
    }

    fn summary(total: u64) -> StatisticsSummary {
        StatisticsSummary {
            total,
            target_total: 100,
            categories: BTreeMap::new(),
            progress_to_target: ProgressToTarget::new(total, 100),
        }
    }

    fn cache(total: u64) -> (StatsCache<StatisticsSummary>, Arc<Fixed>, Arc<ManualClock>) {
        let fetcher = Arc::new(Fixed {
            summary: summary(total),
            calls: AtomicUsize::new(0),
        });
        let clock = Arc::new(ManualClock::new(0));
        let cache = StatsCache::new(
            "summary",
            fetcher.clone(),
            clock.clone(),
            CacheSettings::SUMMARY,
        );
        (cache, fetcher, clock)
    }

    #[tokio::test]
    async fn fresh_entry_is_served_without_fetch() {
        let (cache, fetcher, _clock) = cache(10);
        let first = cache.get(false).await.expect("first");
        assert!(first.changed);
        assert!(!first.from_cache);

        let second = cache.get(false).await.expect("second");
        assert!(second.from_cache);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn ttl_expiry_triggers_fetch() {
        let (cache, fetcher, clock) = cache(10);
        cache.get(false).await.expect("first");
        clock.advance(Duration::from_secs(3 * 60 + 1));
        assert!(cache.is_stale());

        let hit = cache.get(false).await.expect("refetch");
        assert!(!hit.changed);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
        assert!(!cache.is_stale());
    }

    #[tokio::test]
    async fn invalidate_keeps_payload_but_forces_fetch() {
        let (cache, fetcher, _clock) = cache(10);
        cache.get(false).await.expect("first");
        cache.invalidate();
        assert!(cache.is_stale());
        assert!(cache.entry().is_some());

        cache.get(false).await.expect("after invalidate");
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn empty_cache_is_stale() {
        let (cache, _fetcher, _clock) = cache(10);
        assert!(cache.is_stale());
        assert!(cache.entry().is_none());
    }
}
