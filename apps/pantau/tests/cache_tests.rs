//! Integration tests for the statistics cache controller and the
//! background refresher.

#![allow(clippy::unwrap_used, clippy::panic, clippy::await_holding_lock)]

use async_trait::async_trait;
use pantau::cache::{
    CacheError, CacheSettings, Fetcher, ManualClock, Refreshable, Refresher, StatsCache,
    TickOutcome, VisibilityFlag,
};
use pantau::remote::FetchError;
use pantau_core::{
    DesaId, ProgressToTarget, ProposalDataset, ProposalId, ProposalRecord, RegionPath,
    StatisticsSummary,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;
use tokio::task::JoinSet;

// =============================================================================
// FAKE FETCHERS
// =============================================================================

/// Returns whatever payload is currently loaded, after an optional delay.
/// A loaded failure takes precedence over the payload.
struct Slow<T> {
    payload: Mutex<T>,
    failure: Mutex<Option<FetchError>>,
    delay_ms: AtomicU64,
    calls: AtomicUsize,
}

impl<T: Clone> Slow<T> {
    fn new(payload: T) -> Arc<Self> {
        Arc::new(Self {
            payload: Mutex::new(payload),
            failure: Mutex::new(None),
            delay_ms: AtomicU64::new(0),
            calls: AtomicUsize::new(0),
        })
    }

    fn load(&self, payload: T) {
        *self.payload.lock().unwrap() = payload;
    }

    fn fail_with(&self, error: FetchError) {
        *self.failure.lock().unwrap() = Some(error);
    }

    fn set_delay(&self, delay: Duration) {
        self.delay_ms.store(delay.as_millis() as u64, Ordering::SeqCst);
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl<T: Clone + Send + Sync> Fetcher<T> for Slow<T> {
    async fn fetch(&self) -> Result<T, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let delay = self.delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if let Some(error) = self.failure.lock().unwrap().clone() {
            return Err(error);
        }
        Ok(self.payload.lock().unwrap().clone())
    }
}

struct Broken;

#[async_trait]
impl Fetcher<StatisticsSummary> for Broken {
    async fn fetch(&self) -> Result<StatisticsSummary, FetchError> {
        Err(FetchError::ConnectionFailed("http://records.invalid".to_string()))
    }
}

// =============================================================================
// FIXTURES
// =============================================================================

fn summary(total: u64) -> StatisticsSummary {
    StatisticsSummary {
        total,
        target_total: 50,
        categories: BTreeMap::from([("active".to_string(), total)]),
        progress_to_target: ProgressToTarget::new(total, 50),
    }
}

fn records(ids: &[u64]) -> ProposalDataset {
    ProposalDataset::new(
        ids.iter()
            .map(|&id| {
                ProposalRecord::new(
                    ProposalId(id),
                    RegionPath::new("Cibeber", "Sukamaju", DesaId(10)),
                )
            })
            .collect(),
    )
}

const QUICK: CacheSettings = CacheSettings {
    ttl: Duration::from_secs(60),
    fetch_timeout: Duration::from_millis(50),
};

fn summary_cache(
    fetcher: Arc<Slow<StatisticsSummary>>,
) -> (Arc<StatsCache<StatisticsSummary>>, Arc<ManualClock>) {
    let clock = Arc::new(ManualClock::new(1_000));
    let cache = StatsCache::<StatisticsSummary>::new("summary", fetcher, clock.clone(), QUICK);
    (Arc::new(cache), clock)
}

// =============================================================================
// DEDUP / REPLACE
// =============================================================================

#[tokio::test]
async fn identical_payload_keeps_entry_and_skips_notification() {
    let fetcher = Slow::new(records(&[1, 2]));
    let clock = Arc::new(ManualClock::new(0));
    let cache = StatsCache::<ProposalDataset>::new(
        "proposals",
        fetcher.clone(),
        clock.clone(),
        CacheSettings::PROPOSALS,
    );
    let mut changes = cache.subscribe();

    let first = cache.get(false).await.unwrap();
    assert!(first.changed);
    assert!(changes.has_changed().unwrap());
    changes.mark_unchanged();
    let first_hash = cache.entry().unwrap().content_hash;

    clock.advance(Duration::from_secs(5 * 60 + 1));
    let second = cache.get(false).await.unwrap();
    assert!(!second.changed);
    assert!(!second.from_cache);
    assert!(!changes.has_changed().unwrap());

    let entry = cache.entry().unwrap();
    assert_eq!(entry.content_hash, first_hash);
    assert_eq!(entry.fetched_at_ms, 5 * 60 * 1000 + 1000);
    assert!(Arc::ptr_eq(&first.payload, &second.payload));
}

#[tokio::test]
async fn changed_payload_replaces_entry_and_notifies() {
    let fetcher = Slow::new(records(&[1]));
    let clock = Arc::new(ManualClock::new(0));
    let cache = StatsCache::<ProposalDataset>::new(
        "proposals",
        fetcher.clone(),
        clock.clone(),
        CacheSettings::PROPOSALS,
    );
    cache.get(false).await.unwrap();
    let mut changes = cache.subscribe();
    changes.mark_unchanged();

    fetcher.load(records(&[1, 2, 3]));
    // Still fresh: the new data is not seen until a forced refresh.
    assert_eq!(cache.get(false).await.unwrap().payload.len(), 1);

    let forced = cache.get(true).await.unwrap();
    assert!(forced.changed);
    assert_eq!(forced.payload.len(), 3);
    assert!(changes.has_changed().unwrap());
    assert_eq!(fetcher.calls(), 2);
}

#[tokio::test]
async fn forced_refresh_with_same_data_still_replaces() {
    let fetcher = Slow::new(summary(7));
    let (cache, _clock) = summary_cache(fetcher.clone());
    let first = cache.get(false).await.unwrap();

    let forced = cache.get(true).await.unwrap();
    assert!(forced.changed);
    assert!(!Arc::ptr_eq(&first.payload, &forced.payload));
    assert_eq!(*forced.payload, summary(7));
}

#[tokio::test]
async fn empty_payload_is_never_served_from_cache() {
    let fetcher = Slow::new(ProposalDataset::default());
    let clock = Arc::new(ManualClock::new(0));
    let cache = StatsCache::<ProposalDataset>::new(
        "proposals",
        fetcher.clone(),
        clock,
        CacheSettings::PROPOSALS,
    );

    cache.get(false).await.unwrap();
    let again = cache.get(false).await.unwrap();
    assert!(!again.from_cache);
    assert_eq!(fetcher.calls(), 2);
}

// =============================================================================
// FAILURE HANDLING
// =============================================================================

#[tokio::test]
async fn timeout_without_cache_is_an_error() {
    let fetcher = Slow::new(summary(3));
    fetcher.set_delay(Duration::from_millis(300));
    let (cache, _clock) = summary_cache(fetcher);

    assert_eq!(cache.get(false).await.unwrap_err(), CacheError::Timeout);
    assert!(cache.entry().is_none());
}

#[tokio::test]
async fn timeout_with_cache_serves_stale_entry() {
    let fetcher = Slow::new(summary(3));
    let (cache, clock) = summary_cache(fetcher.clone());
    cache.get(false).await.unwrap();
    let before = cache.entry().unwrap();

    clock.advance(Duration::from_secs(61));
    fetcher.set_delay(Duration::from_millis(300));
    fetcher.load(summary(4));

    let hit = cache.get(false).await.unwrap();
    assert!(hit.stale);
    assert!(hit.from_cache);
    assert!(!hit.changed);
    assert_eq!(hit.payload.total, 3);

    let after = cache.entry().unwrap();
    assert_eq!(after.fetched_at_ms, before.fetched_at_ms);
    assert_eq!(after.content_hash, before.content_hash);
}

#[tokio::test]
async fn forced_timeout_on_fresh_entry_is_not_stale() {
    let fetcher = Slow::new(summary(3));
    let (cache, _clock) = summary_cache(fetcher.clone());
    cache.get(false).await.unwrap();

    fetcher.set_delay(Duration::from_millis(300));
    let hit = cache.get(true).await.unwrap();
    assert!(hit.from_cache);
    assert!(!hit.stale);
    assert!(!hit.changed);
    assert_eq!(hit.payload.total, 3);
}

#[tokio::test]
async fn timeout_after_invalidate_is_stale() {
    let fetcher = Slow::new(summary(3));
    let (cache, _clock) = summary_cache(fetcher.clone());
    cache.get(false).await.unwrap();

    cache.invalidate();
    fetcher.set_delay(Duration::from_millis(300));
    let hit = cache.get(false).await.unwrap();
    assert!(hit.from_cache);
    assert!(hit.stale);
}

#[tokio::test]
async fn other_failures_without_cache_are_errors() {
    let clock = Arc::new(ManualClock::new(0));
    let cache = StatsCache::<StatisticsSummary>::new("summary", Arc::new(Broken), clock, QUICK);

    let err = cache.get(false).await.unwrap_err();
    assert!(matches!(err, CacheError::Fetch(msg) if msg.contains("records.invalid")));
}

#[tokio::test]
async fn other_failures_surface_even_with_cache() {
    let fetcher = Slow::new(summary(5));
    let (cache, clock) = summary_cache(fetcher.clone());
    cache.get(false).await.unwrap();
    let before = cache.entry().unwrap();

    clock.advance(Duration::from_secs(61));
    fetcher.fail_with(FetchError::ConnectionFailed(
        "http://records.invalid".to_string(),
    ));

    let err = cache.get(false).await.unwrap_err();
    assert!(matches!(err, CacheError::Fetch(msg) if msg.contains("records.invalid")));
    let forced = cache.get(true).await.unwrap_err();
    assert!(matches!(forced, CacheError::Fetch(_)));

    let after = cache.entry().unwrap();
    assert_eq!(after.fetched_at_ms, before.fetched_at_ms);
    assert_eq!(after.payload.total, 5);
}

#[tokio::test]
async fn unparseable_response_is_malformed() {
    let fetcher = Slow::new(summary(5));
    let (cache, clock) = summary_cache(fetcher.clone());
    cache.get(false).await.unwrap();
    let before = cache.entry().unwrap();

    clock.advance(Duration::from_secs(61));
    fetcher.fail_with(FetchError::Parse("expected an object".to_string()));

    let err = cache.get(false).await.unwrap_err();
    assert_eq!(err, CacheError::Malformed("expected an object".to_string()));
    let after = cache.entry().unwrap();
    assert_eq!(after.content_hash, before.content_hash);
}

#[tokio::test]
async fn malformed_payload_preserves_previous_entry() {
    let fetcher = Slow::new(summary(5));
    let (cache, clock) = summary_cache(fetcher.clone());
    cache.get(false).await.unwrap();
    let before = cache.entry().unwrap();

    let mut broken = summary(6);
    broken.progress_to_target.remaining = 999;
    fetcher.load(broken);
    clock.advance(Duration::from_secs(61));

    assert!(matches!(
        cache.get(false).await,
        Err(CacheError::Malformed(_))
    ));
    let after = cache.entry().unwrap();
    assert_eq!(after.content_hash, before.content_hash);
    assert_eq!(after.payload.total, 5);
}

#[tokio::test]
async fn duplicate_ids_are_malformed() {
    let fetcher = Slow::new(records(&[1, 1]));
    let cache = StatsCache::<ProposalDataset>::new(
        "proposals",
        fetcher,
        Arc::new(ManualClock::new(0)),
        CacheSettings::PROPOSALS,
    );
    assert!(matches!(
        cache.get(false).await,
        Err(CacheError::Malformed(_))
    ));
}

// =============================================================================
// SINGLE FLIGHT
// =============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_gets_share_one_fetch() {
    let fetcher = Slow::new(summary(9));
    fetcher.set_delay(Duration::from_millis(30));
    let cache = Arc::new(StatsCache::<StatisticsSummary>::new(
        "summary",
        fetcher.clone(),
        Arc::new(ManualClock::new(0)),
        CacheSettings::SUMMARY,
    ));

    let mut set = JoinSet::new();
    for _ in 0..16 {
        let cache = cache.clone();
        set.spawn(async move { cache.get(false).await });
    }

    let mut changed = 0;
    while let Some(result) = set.join_next().await {
        let hit = result.unwrap().unwrap();
        assert_eq!(hit.payload.total, 9);
        if hit.changed {
            changed += 1;
        }
    }

    assert_eq!(fetcher.calls(), 1);
    assert_eq!(cache.fetch_count(), 1);
    assert!(changed >= 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn queued_callers_share_a_failure() {
    let fetcher = Slow::new(summary(2));
    fetcher.set_delay(Duration::from_millis(200));
    let (cache, _clock) = summary_cache(fetcher.clone());

    let mut set = JoinSet::new();
    for _ in 0..4 {
        let cache = cache.clone();
        set.spawn(async move { cache.get(false).await });
    }
    while let Some(result) = set.join_next().await {
        assert_eq!(result.unwrap().unwrap_err(), CacheError::Timeout);
    }
    assert_eq!(fetcher.calls(), 1);
}

// =============================================================================
// BACKGROUND REFRESH
// =============================================================================

#[tokio::test]
async fn refresher_respects_visibility() {
    let fetcher = Slow::new(summary(1));
    let (cache, clock) = summary_cache(fetcher.clone());
    let visibility = VisibilityFlag::new(false);
    let refresher = Refresher::new(
        vec![cache.clone() as Arc<dyn Refreshable>],
        Arc::new(visibility.clone()),
        Duration::from_secs(600),
    );

    assert_eq!(refresher.tick().await, TickOutcome::Skipped);
    assert_eq!(fetcher.calls(), 0);

    visibility.set(true);
    assert_eq!(
        refresher.tick().await,
        TickOutcome::Refreshed { changed: 1, failed: 0 }
    );

    // Fresh entry: the tick does not fetch again.
    assert_eq!(
        refresher.tick().await,
        TickOutcome::Refreshed { changed: 0, failed: 0 }
    );
    assert_eq!(fetcher.calls(), 1);

    clock.advance(Duration::from_secs(61));
    fetcher.load(summary(2));
    assert_eq!(
        refresher.tick().await,
        TickOutcome::Refreshed { changed: 1, failed: 0 }
    );
    assert_eq!(cache.entry().unwrap().payload.total, 2);
}
