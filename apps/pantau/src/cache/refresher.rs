//! # Background Refresh
//!
//! Periodically refreshes caches while the dashboard is visible.
//!
//! Each tick runs a non-forced refresh on every target, but only when the
//! visibility source reports visible; a hidden dashboard costs no fetches.
//! Refresh errors are logged and never stop the loop.

use super::CacheError;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

/// Default interval between background refreshes.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Whether the presentation layer is currently shown.
pub trait Visibility: Send + Sync {
    fn is_visible(&self) -> bool;
}

/// Shared visibility flag, set by the presentation layer.
#[derive(Debug, Clone)]
pub struct VisibilityFlag(Arc<AtomicBool>);

impl VisibilityFlag {
    #[must_use]
    pub fn new(visible: bool) -> Self {
        Self(Arc::new(AtomicBool::new(visible)))
    }

    pub fn set(&self, visible: bool) {
        self.0.store(visible, Ordering::SeqCst);
    }
}

impl Default for VisibilityFlag {
    fn default() -> Self {
        Self::new(true)
    }
}

impl Visibility for VisibilityFlag {
    fn is_visible(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Something the refresher can refresh.
#[async_trait]
pub trait Refreshable: Send + Sync {
    fn name(&self) -> &str;

    /// Non-forced refresh. `Ok(true)` when the payload changed.
    async fn refresh(&self) -> Result<bool, CacheError>;
}

/// What one tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Not visible; nothing fetched.
    Skipped,
    Refreshed { changed: usize, failed: usize },
}

/// Visibility-gated periodic refresher.
pub struct Refresher {
    targets: Vec<Arc<dyn Refreshable>>,
    visibility: Arc<dyn Visibility>,
    interval: Duration,
}

impl Refresher {
    pub fn new(
        targets: Vec<Arc<dyn Refreshable>>,
        visibility: Arc<dyn Visibility>,
        interval: Duration,
    ) -> Self {
        Self {
            targets,
            visibility,
            interval,
        }
    }

    /// Run one tick.
    pub async fn tick(&self) -> TickOutcome {
        if !self.visibility.is_visible() {
            tracing::debug!(event = "refresh_tick", "dashboard hidden, skipping refresh");
            return TickOutcome::Skipped;
        }

        let mut changed = 0;
        let mut failed = 0;
        for target in &self.targets {
            match target.refresh().await {
                Ok(true) => changed += 1,
                Ok(false) => {}
                Err(e) => {
                    failed += 1;
                    tracing::warn!(
                        event = "refresh_tick",
                        cache = target.name(),
                        error = %e,
                        "background refresh failed"
                    );
                }
            }
        }
        tracing::debug!(event = "refresh_tick", changed, failed, "background refresh done");
        TickOutcome::Refreshed { changed, failed }
    }

    /// Spawn the refresh loop. The first tick fires one interval from now.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            let start = tokio::time::Instant::now() + self.interval;
            let mut ticker = tokio::time::interval_at(start, self.interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                self.tick().await;
            }
        })
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Counting {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl Refreshable for Counting {
        fn name(&self) -> &str {
            "counting"
        }

        async fn refresh(&self) -> Result<bool, CacheError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(CacheError::Fetch("boom".to_string()))
            } else {
                Ok(true)
            }
        }
    }

    fn counting(fail: bool) -> Arc<Counting> {
        Arc::new(Counting {
            calls: AtomicUsize::new(0),
            fail,
        })
    }

    #[tokio::test]
    async fn hidden_tick_is_noop() {
        let target = counting(false);
        let flag = VisibilityFlag::new(false);
        let refresher = Refresher::new(
            vec![target.clone()],
            Arc::new(flag.clone()),
            DEFAULT_REFRESH_INTERVAL,
        );

        assert_eq!(refresher.tick().await, TickOutcome::Skipped);
        assert_eq!(target.calls.load(Ordering::SeqCst), 0);

        flag.set(true);
        assert_eq!(
            refresher.tick().await,
            TickOutcome::Refreshed { changed: 1, failed: 0 }
        );
        assert_eq!(target.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn failures_do_not_stop_other_targets() {
        let bad = counting(true);
        let good = counting(false);
        let refresher = Refresher::new(
            vec![bad.clone(), good.clone()],
            Arc::new(VisibilityFlag::default()),
            DEFAULT_REFRESH_INTERVAL,
        );

        assert_eq!(
            refresher.tick().await,
            TickOutcome::Refreshed { changed: 1, failed: 1 }
        );
        assert_eq!(good.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn spawned_loop_ticks() {
        let target = counting(false);
        let handle = Refresher::new(
            vec![target.clone()],
            Arc::new(VisibilityFlag::default()),
            Duration::from_millis(20),
        )
        .spawn();

        tokio::time::sleep(Duration::from_millis(110)).await;
        handle.abort();
        assert!(target.calls.load(Ordering::SeqCst) >= 2);
    }
}
