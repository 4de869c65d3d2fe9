//! Realtime polling
//!
//! The chat view has no push channel, so it refreshes its messages on a timer.
//! [`RealtimePoller`] waits `interval` *after* each tick completes (so a slow
//! request delays the next one instead of piling up), skips ticks while the
//! window is hidden or offline unless the query's config allows them, and stops
//! when dropped.

use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use futures::{FutureExt, future::BoxFuture};
use tokio::task::JoinHandle;

use crate::{cache::CacheStore, config::SwrConfig, query::DataQuery, types::QueryDataBounds};

/// One poll iteration
pub type Tick = Arc<dyn Fn() -> BoxFuture<'static, ()> + Send + Sync>;

/// Background task calling a [`Tick`] on an interval; aborted on drop
pub struct RealtimePoller {
    task: JoinHandle<()>,
    ticks: Arc<AtomicU64>,
    interval: Duration,
}

impl RealtimePoller {
    /// Starts polling. The first tick runs one `interval` from now.
    pub fn start(store: CacheStore, interval: Duration, config: SwrConfig, tick: Tick) -> Self {
        let ticks = Arc::new(AtomicU64::new(0));
        let counter = ticks.clone();
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(interval).await;
                if !store.allows_background_refresh(&config) {
                    crate::log_poll!("Skipping tick while hidden or offline");
                    continue;
                }
                tick().await;
                let count = counter.fetch_add(1, Ordering::Relaxed) + 1;
                crate::log_poll!("Completed tick #{}", count);
            }
        });
        crate::debug_log!("Started poller every {:?}", interval);
        Self {
            task,
            ticks,
            interval,
        }
    }

    /// Polls `query` by force-refetching it on every tick.
    pub fn for_query<T: QueryDataBounds>(query: DataQuery<T>, interval: Duration) -> Self {
        let store = query.store().clone();
        let config = query.config().clone();
        let tick: Tick = Arc::new(move || {
            let query = query.clone();
            async move {
                query.mutate().await;
            }
            .boxed()
        });
        Self::start(store, interval, config, tick)
    }

    /// Number of ticks completed so far.
    pub fn tick_count(&self) -> u64 {
        self.ticks.load(Ordering::Relaxed)
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn is_running(&self) -> bool {
        !self.task.is_finished()
    }
}

impl Drop for RealtimePoller {
    fn drop(&mut self) {
        self.task.abort();
    }
}
