//! Background refresh of a collection's aggregate.
//!
//! The loop only fetches the cheap aggregate endpoint and writes it with
//! [`CollectionCache::set_aggregate`]; items and cursor are never touched.
//! It is not reset by mutations and has no backoff.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, trace};

use crate::cache::CollectionCache;
use crate::error::GatewayError;

/// Handle to a running poll task. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollLoop {
    name: &'static str,
    token: CancellationToken,
    handle: JoinHandle<()>,
}

impl PollLoop {
    /// Spawn a loop that calls `fetch` every `period`.
    ///
    /// The first fetch happens one full period after spawning; the initial
    /// value comes from the caller's own first load.
    pub fn spawn<T, A, F, Fut>(
        name: &'static str,
        period: Duration,
        cache: Arc<CollectionCache<T, A>>,
        fetch: F,
    ) -> Self
    where
        T: Clone + Send + Sync + 'static,
        A: Clone + Default + Send + Sync + 'static,
        F: Fn() -> Fut + Send + 'static,
        Fut: Future<Output = Result<A, GatewayError>> + Send,
    {
        let token = CancellationToken::new();
        let child = token.child_token();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    biased;
                    () = child.cancelled() => break,
                    _ = ticker.tick() => {}
                }

                match fetch().await {
                    Ok(aggregate) => {
                        if !cache.set_aggregate(aggregate) {
                            trace!(poll = name, "Store torn down, poll result dropped");
                        }
                    }
                    Err(err) if err.is_expected_in_background() => {
                        debug!(poll = name, error = %err, "Poll failed");
                    }
                    Err(err) => {
                        error!(poll = name, error = %err, "Unexpected poll failure");
                    }
                }
            }

            debug!(poll = name, "Poll loop stopped");
        });

        debug!(poll = name, period_secs = period.as_secs(), "Poll loop started");

        Self {
            name,
            token,
            handle,
        }
    }

    /// Stop future firings. A fetch already in flight still completes; its
    /// result is dropped if the cache was deactivated.
    pub fn cancel(&self) {
        if !self.token.is_cancelled() {
            debug!(poll = self.name, "Cancelling poll loop");
            self.token.cancel();
        }
    }

    /// Whether the task is still running.
    #[must_use]
    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }
}

impl Drop for PollLoop {
    fn drop(&mut self) {
        self.token.cancel();
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

    use super::*;
    use crate::cache::{ReplaceMode, Snapshot};

    fn cache_with_items() -> Arc<CollectionCache<&'static str, u64>> {
        let cache = Arc::new(CollectionCache::new());
        cache.replace(
            Snapshot {
                items: vec!["a", "b"],
                aggregate: 2,
                cursor: 2,
                has_more: true,
            },
            ReplaceMode::Overwrite,
        );
        cache
    }

    /// Let the spawned task run until it blocks again.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_updates_aggregate_only() {
        let cache = cache_with_items();
        let next = Arc::new(AtomicU64::new(10));

        let counter = Arc::clone(&next);
        let poll = PollLoop::spawn("test", Duration::from_secs(30), Arc::clone(&cache), move || {
            let value = counter.fetch_add(1, Ordering::SeqCst);
            async move { Ok(value) }
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        let snapshot = cache.view().snapshot;
        assert_eq!(snapshot.aggregate, 10);
        assert_eq!(snapshot.items, vec!["a", "b"]);
        assert_eq!(snapshot.cursor, 2);
        assert!(snapshot.has_more);

        poll.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_fires_once_per_interval() {
        let cache = cache_with_items();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let poll = PollLoop::spawn("test", Duration::from_secs(30), cache, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(0) }
        });

        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        tokio::time::sleep(Duration::from_secs(95)).await;
        settle().await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);

        drop(poll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_future_firings() {
        let cache = cache_with_items();
        let calls = Arc::new(AtomicUsize::new(0));

        let counter = Arc::clone(&calls);
        let poll = PollLoop::spawn("test", Duration::from_secs(30), cache, move || {
            counter.fetch_add(1, Ordering::SeqCst);
            async { Ok(0) }
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;
        poll.cancel();
        settle().await;

        tokio::time::sleep(Duration::from_secs(120)).await;
        settle().await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(!poll.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_errors_are_swallowed() {
        let cache = cache_with_items();

        let poll = PollLoop::spawn("test", Duration::from_secs(30), Arc::clone(&cache), || async {
            Err(GatewayError::Unauthorized)
        });

        tokio::time::sleep(Duration::from_secs(61)).await;
        settle().await;

        assert_eq!(cache.view().snapshot.aggregate, 2);
        assert!(poll.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_result_dropped_after_deactivate() {
        let cache = cache_with_items();
        cache.deactivate();

        let _poll = PollLoop::spawn("test", Duration::from_secs(30), Arc::clone(&cache), || async {
            Ok(99)
        });

        tokio::time::sleep(Duration::from_secs(31)).await;
        settle().await;

        assert_eq!(cache.view().snapshot.aggregate, 2);
    }
}
