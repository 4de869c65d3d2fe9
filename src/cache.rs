//! # Cache Store for dawa-provider
//!
//! This module implements the shared, type-erased cache behind every data query:
//! - **Request dedupe**: concurrent loads of one key share a single in-flight fetch,
//!   and a key fetched within its deduping interval is served from cache.
//! - **Stale-while-error**: a failed fetch records the error but keeps the last data.
//! - **Ordering**: every fetch carries a sequence number; a completion older than
//!   the last applied one is dropped.
//! - **Subscriptions**: listeners are told about every change to their key, and
//!   subscribed queries can be revalidated on focus, reconnect or invalidation.
//! - **Maintenance**: unused entries can be cleaned up and LRU-evicted.
//!
//! The store is an explicit value. Construct one per session (usually through
//! [`crate::runtime::StorefrontRuntime`]) and clone the handle where needed;
//! clones share the same state.
//!
//! ## Example
//! ```rust,no_run
//! use dawa_provider::cache::{CacheStore, FetchOptions};
//! use dawa_provider::key::CacheKey;
//!
//! # async fn demo() -> Result<(), dawa_provider::errors::DataError> {
//! let store = CacheStore::new();
//! let key = CacheKey::new("faqs");
//! let faqs: Vec<String> = store
//!     .fetch_or_reuse(&key, FetchOptions::default(), || async { Ok(vec!["Q?".to_string()]) })
//!     .await?;
//! assert_eq!(store.get::<Vec<String>>(&key), Some(faqs));
//! # Ok(())
//! # }
//! ```

use std::{
    any::Any,
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
    time::Duration,
};

use futures::{
    FutureExt,
    future::{BoxFuture, Shared, join_all},
};
use tokio::time::Instant;

use crate::{
    config::{DEFAULT_DEDUPING_INTERVAL, SwrConfig},
    errors::{DataError, DataResult},
    key::CacheKey,
};

type ErasedValue = Arc<dyn Any + Send + Sync>;
type ErasedResult = Result<ErasedValue, DataError>;
type SharedFetch = Shared<BoxFuture<'static, ErasedResult>>;

/// Callback invoked for every change to a subscribed key
pub type Listener = Arc<dyn Fn(&CacheEvent) + Send + Sync>;

/// Re-runs a query's fetch; registered by subscribed queries
///
/// With `force` the fetch starts even while another request for the key is in
/// flight.
pub type Revalidator = Arc<dyn Fn(bool) -> BoxFuture<'static, ()> + Send + Sync>;

/// What happened to a cache entry
#[derive(Debug, Clone, PartialEq)]
pub enum CacheEventKind {
    /// A fetch started
    Validating,
    /// New data was stored
    Updated,
    /// A fetch failed; previous data, if any, is kept
    Failed(DataError),
    /// The entry was marked stale
    Invalidated,
    /// The entry was dropped from the cache
    Removed,
}

/// Notification delivered to subscribers
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEvent {
    pub key: CacheKey,
    pub kind: CacheEventKind,
}

/// Options for a single `fetch_or_reuse` call
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOptions {
    /// Entries fetched more recently than this are served from cache
    pub deduping_interval: Duration,
    /// Ignore the dedupe window and any in-flight request
    pub force: bool,
    /// Fail with `TimedOut` after this long
    pub timeout: Option<Duration>,
}

impl Default for FetchOptions {
    fn default() -> Self {
        Self {
            deduping_interval: DEFAULT_DEDUPING_INTERVAL,
            force: false,
            timeout: None,
        }
    }
}

impl FetchOptions {
    /// Options derived from a query's revalidation config
    pub fn from_config(config: &SwrConfig) -> Self {
        Self {
            deduping_interval: config.deduping_interval,
            force: false,
            timeout: config.fetch_timeout,
        }
    }

    /// Same options, but bypassing dedupe
    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }
}

/// Typed view of an entry, as returned by [`CacheStore::snapshot`]
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySnapshot<T> {
    pub data: Option<T>,
    pub error: Option<DataError>,
    pub is_validating: bool,
    pub last_fetched_at: Option<Instant>,
}

/// Untyped entry metadata, for introspection and tests
#[derive(Debug, Clone, PartialEq)]
pub struct EntryInfo {
    pub has_data: bool,
    pub error: Option<DataError>,
    pub is_validating: bool,
    pub subscriber_count: usize,
    pub last_fetched_at: Option<Instant>,
    pub access_count: u32,
}

struct CacheEntry {
    data: Option<ErasedValue>,
    error: Option<DataError>,
    is_validating: bool,
    last_fetched_at: Option<Instant>,
    last_accessed: Instant,
    access_count: u32,
    applied_seq: u64,
}

impl CacheEntry {
    fn empty() -> Self {
        Self {
            data: None,
            error: None,
            is_validating: false,
            last_fetched_at: None,
            last_accessed: Instant::now(),
            access_count: 0,
            applied_seq: 0,
        }
    }

    fn read<T: Clone + 'static>(&mut self) -> Option<T> {
        self.last_accessed = Instant::now();
        self.access_count = self.access_count.saturating_add(1);
        self.data.as_ref()?.downcast_ref::<T>().cloned()
    }

    fn is_fresh(&self, window: Duration) -> bool {
        self.last_fetched_at
            .map(|at| at.elapsed() < window)
            .unwrap_or(false)
    }
}

struct InFlight {
    seq: u64,
    future: SharedFetch,
}

struct Subscriber {
    id: u64,
    listener: Option<Listener>,
    revalidator: Option<(Revalidator, SwrConfig)>,
}

#[derive(Default)]
struct StoreInner {
    entries: HashMap<CacheKey, CacheEntry>,
    in_flight: HashMap<CacheKey, InFlight>,
    subscribers: HashMap<CacheKey, Vec<Subscriber>>,
    observers: HashMap<CacheKey, Vec<(u64, Listener)>>,
    next_subscriber: u64,
    next_seq: u64,
    hidden: bool,
    offline: bool,
    max_entries: Option<usize>,
}

impl StoreInner {
    fn subscriber_count(&self, key: &CacheKey) -> usize {
        self.subscribers.get(key).map(Vec::len).unwrap_or(0)
    }

    fn listeners(&self, key: &CacheKey) -> Vec<Listener> {
        let subscribed = self
            .subscribers
            .get(key)
            .into_iter()
            .flatten()
            .filter_map(|s| s.listener.clone());
        let observing = self
            .observers
            .get(key)
            .into_iter()
            .flatten()
            .map(|(_, listener)| listener.clone());
        subscribed.chain(observing).collect()
    }

    fn revalidator(&self, key: &CacheKey, pick: impl Fn(&SwrConfig) -> bool) -> Option<Revalidator> {
        self.subscribers.get(key)?.iter().find_map(|s| match &s.revalidator {
            Some((revalidate, config)) if pick(config) => Some(revalidate.clone()),
            _ => None,
        })
    }
}

enum FetchPlan<T> {
    Fresh(T),
    Join(SharedFetch),
    Start,
}

/// Shared cache for storefront query results
#[derive(Clone, Default)]
pub struct CacheStore {
    inner: Arc<Mutex<StoreInner>>,
}

impl CacheStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a store that LRU-evicts unsubscribed entries beyond `max_entries`.
    pub fn with_max_entries(max_entries: usize) -> Self {
        let store = Self::new();
        store.lock().max_entries = Some(max_entries);
        store
    }

    fn lock(&self) -> MutexGuard<'_, StoreInner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the cached data for `key`, if present and of type `T`.
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &CacheKey) -> Option<T> {
        self.lock().entries.get_mut(key)?.read::<T>()
    }

    /// Returns data, error and validation state for `key`.
    pub fn snapshot<T: Clone + Send + Sync + 'static>(
        &self,
        key: &CacheKey,
    ) -> Option<EntrySnapshot<T>> {
        let mut inner = self.lock();
        let entry = inner.entries.get_mut(key)?;
        Some(EntrySnapshot {
            data: entry.read::<T>(),
            error: entry.error.clone(),
            is_validating: entry.is_validating,
            last_fetched_at: entry.last_fetched_at,
        })
    }

    /// Returns untyped metadata for `key`.
    pub fn info(&self, key: &CacheKey) -> Option<EntryInfo> {
        let inner = self.lock();
        let entry = inner.entries.get(key)?;
        Some(EntryInfo {
            has_data: entry.data.is_some(),
            error: entry.error.clone(),
            is_validating: entry.is_validating,
            subscriber_count: inner.subscriber_count(key),
            last_fetched_at: entry.last_fetched_at,
            access_count: entry.access_count,
        })
    }

    /// Whether a fetch for `key` is currently in flight.
    pub fn is_request_pending(&self, key: &CacheKey) -> bool {
        self.lock().in_flight.contains_key(key)
    }

    /// Loads `key`, reusing fresh data or an in-flight request when possible.
    ///
    /// - An in-flight request for the key is joined rather than duplicated.
    /// - Data fetched within `options.deduping_interval` is returned as-is.
    /// - Otherwise `fetcher` runs exactly once and its result is stored.
    ///
    /// `options.force` skips both shortcuts. On failure the error is recorded on
    /// the entry while the previous data stays available.
    pub async fn fetch_or_reuse<T, F, Fut>(
        &self,
        key: &CacheKey,
        options: FetchOptions,
        fetcher: F,
    ) -> DataResult<T>
    where
        T: Clone + Send + Sync + 'static,
        F: FnOnce() -> Fut,
        Fut: Future<Output = DataResult<T>> + Send + 'static,
    {
        let shared = match self.plan_fetch::<T>(key, &options) {
            FetchPlan::Fresh(data) => {
                crate::log_cache_hit!("Serving fresh data for key: {}", key);
                return Ok(data);
            }
            FetchPlan::Join(shared) => {
                crate::log_dedupe!("Joining in-flight request for key: {}", key);
                shared
            }
            FetchPlan::Start => self.start_fetch(key, &options, fetcher()),
        };

        let erased = shared.await?;
        erased.downcast_ref::<T>().cloned().ok_or_else(|| {
            DataError::Schema(format!("cached value for {key} has a different type"))
        })
    }

    fn plan_fetch<T: Clone + 'static>(&self, key: &CacheKey, options: &FetchOptions) -> FetchPlan<T> {
        if options.force {
            return FetchPlan::Start;
        }
        let mut inner = self.lock();
        if let Some(flight) = inner.in_flight.get(key) {
            return FetchPlan::Join(flight.future.clone());
        }
        if let Some(entry) = inner.entries.get_mut(key)
            && entry.is_fresh(options.deduping_interval)
            && let Some(data) = entry.read::<T>()
        {
            return FetchPlan::Fresh(data);
        }
        FetchPlan::Start
    }

    fn start_fetch<T, Fut>(&self, key: &CacheKey, options: &FetchOptions, fut: Fut) -> SharedFetch
    where
        T: Send + Sync + 'static,
        Fut: Future<Output = DataResult<T>> + Send + 'static,
    {
        let mut inner = self.lock();
        if !options.force
            && let Some(flight) = inner.in_flight.get(key)
        {
            // another caller started the same fetch while we were building ours
            return flight.future.clone();
        }

        inner.next_seq += 1;
        let seq = inner.next_seq;
        let store = self.clone();
        let fetch_key = key.clone();
        let timeout = options.timeout;

        let future = async move {
            let outcome = match timeout {
                Some(limit) => tokio::time::timeout(limit, fut)
                    .await
                    .unwrap_or_else(|_| Err(DataError::TimedOut(limit))),
                None => fut.await,
            };
            let erased: ErasedResult = outcome.map(|data| Arc::new(data) as ErasedValue);
            store.complete_fetch(&fetch_key, seq, &erased);
            erased
        }
        .boxed()
        .shared();

        inner
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty)
            .is_validating = true;
        inner.in_flight.insert(
            key.clone(),
            InFlight {
                seq,
                future: future.clone(),
            },
        );
        drop(inner);

        crate::log_dedupe!("Starting new request #{} for key: {}", seq, key);
        self.notify(key, CacheEventKind::Validating);
        future
    }

    fn complete_fetch(&self, key: &CacheKey, seq: u64, result: &ErasedResult) {
        let kind = {
            let mut inner = self.lock();
            if inner.in_flight.get(key).is_some_and(|flight| flight.seq == seq) {
                inner.in_flight.remove(key);
            }
            let newer_in_flight = inner.in_flight.contains_key(key);
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(CacheEntry::empty);
            entry.is_validating = newer_in_flight;

            if seq < entry.applied_seq {
                crate::warn_log!(
                    "Dropping response #{} for key: {} (#{} already applied)",
                    seq,
                    key,
                    entry.applied_seq
                );
                return;
            }
            entry.applied_seq = seq;

            match result {
                Ok(data) => {
                    entry.data = Some(data.clone());
                    entry.error = None;
                    entry.last_fetched_at = Some(Instant::now());
                    crate::log_cache_store!("Stored response #{} for key: {}", seq, key);
                    CacheEventKind::Updated
                }
                Err(error) => {
                    entry.error = Some(error.clone());
                    crate::debug_log!("Fetch #{} failed for key: {}: {}", seq, key, error);
                    CacheEventKind::Failed(error.clone())
                }
            }
        };

        self.notify(key, kind);
        self.enforce_limit();
    }

    /// Writes `value` directly, returning whether it differed from the cached one.
    pub fn set<T>(&self, key: &CacheKey, value: T) -> bool
    where
        T: Clone + PartialEq + Send + Sync + 'static,
    {
        {
            let mut inner = self.lock();
            let entry = inner
                .entries
                .entry(key.clone())
                .or_insert_with(CacheEntry::empty);
            if entry.read::<T>().as_ref() == Some(&value) {
                entry.last_fetched_at = Some(Instant::now());
                return false;
            }
            entry.data = Some(Arc::new(value));
            entry.error = None;
            entry.last_fetched_at = Some(Instant::now());
        }
        crate::log_cache_store!("Stored local value for key: {}", key);
        self.notify(key, CacheEventKind::Updated);
        true
    }

    /// Marks `key` stale so the next load refetches; data stays visible meanwhile.
    pub fn invalidate(&self, key: &CacheKey) {
        let existed = {
            let mut inner = self.lock();
            match inner.entries.get_mut(key) {
                Some(entry) => {
                    entry.last_fetched_at = None;
                    true
                }
                None => false,
            }
        };
        if existed {
            crate::log_cache_invalidate!("Invalidated cache entry for key: {}", key);
            self.notify(key, CacheEventKind::Invalidated);
        }
    }

    /// Invalidates `key` and refetches it through a subscribed query, if any.
    ///
    /// The refetch never joins a request that was already in flight, so data
    /// written before this call is reflected in the result. Returns `true`
    /// when a refetch ran.
    pub async fn revalidate(&self, key: &CacheKey) -> bool {
        self.invalidate(key);
        let revalidator = self.lock().revalidator(key, |_| true);
        match revalidator {
            Some(revalidate) => {
                revalidate(true).await;
                true
            }
            None => false,
        }
    }

    /// Removes `key` entirely.
    pub fn remove(&self, key: &CacheKey) -> bool {
        let removed = self.lock().entries.remove(key).is_some();
        if removed {
            self.notify(key, CacheEventKind::Removed);
        }
        removed
    }

    /// Drops every entry. Subscriptions and in-flight requests are kept.
    pub fn clear(&self) {
        let keys: Vec<CacheKey> = {
            let mut inner = self.lock();
            let keys = inner.entries.keys().cloned().collect();
            inner.entries.clear();
            keys
        };
        crate::debug_log!("🗑️ [CACHE-CLEAR] Cleared {} cache entries", keys.len());
        for key in keys {
            self.notify(&key, CacheEventKind::Removed);
        }
    }

    /// Number of cached entries.
    pub fn size(&self) -> usize {
        self.lock().entries.len()
    }

    /// Subscribes `listener` to changes of `key`.
    ///
    /// The entry is created if it does not exist yet. Dropping the returned
    /// [`Subscription`] unsubscribes.
    pub fn subscribe<F>(&self, key: &CacheKey, listener: F) -> Subscription
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        self.register(key, Some(Arc::new(listener)), None)
    }

    pub(crate) fn register(
        &self,
        key: &CacheKey,
        listener: Option<Listener>,
        revalidator: Option<(Revalidator, SwrConfig)>,
    ) -> Subscription {
        let mut inner = self.lock();
        inner.next_subscriber += 1;
        let id = inner.next_subscriber;
        inner
            .entries
            .entry(key.clone())
            .or_insert_with(CacheEntry::empty);
        inner
            .subscribers
            .entry(key.clone())
            .or_default()
            .push(Subscriber {
                id,
                listener,
                revalidator,
            });
        Subscription {
            store: self.clone(),
            key: key.clone(),
            id,
        }
    }

    /// Calls `listener` for every change of `key`.
    ///
    /// Unlike [`Self::subscribe`] this neither creates the entry nor protects it
    /// from cleanup and eviction.
    pub fn observe<F>(&self, key: &CacheKey, listener: F) -> Subscription
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let mut inner = self.lock();
        inner.next_subscriber += 1;
        let id = inner.next_subscriber;
        inner
            .observers
            .entry(key.clone())
            .or_default()
            .push((id, Arc::new(listener)));
        Subscription {
            store: self.clone(),
            key: key.clone(),
            id,
        }
    }

    fn unsubscribe(&self, key: &CacheKey, id: u64) {
        let mut inner = self.lock();
        if let Some(subs) = inner.subscribers.get_mut(key) {
            subs.retain(|sub| sub.id != id);
            if subs.is_empty() {
                inner.subscribers.remove(key);
            }
        }
        if let Some(observers) = inner.observers.get_mut(key) {
            observers.retain(|(observer, _)| *observer != id);
            if observers.is_empty() {
                inner.observers.remove(key);
            }
        }
    }

    fn notify(&self, key: &CacheKey, kind: CacheEventKind) {
        let listeners = self.lock().listeners(key);
        if listeners.is_empty() {
            return;
        }
        let event = CacheEvent {
            key: key.clone(),
            kind,
        };
        for listener in listeners {
            listener(&event);
        }
    }

    /// Marks the window visible or hidden. Becoming visible counts as a focus event.
    pub async fn set_visible(&self, visible: bool) -> usize {
        let was_hidden = std::mem::replace(&mut self.lock().hidden, !visible);
        if visible && was_hidden {
            self.notify_focus().await
        } else {
            0
        }
    }

    /// Marks the network online or offline. Coming back online counts as a reconnect.
    pub async fn set_online(&self, online: bool) -> usize {
        let was_offline = std::mem::replace(&mut self.lock().offline, !online);
        if online && was_offline {
            self.notify_reconnect().await
        } else {
            0
        }
    }

    pub fn is_visible(&self) -> bool {
        !self.lock().hidden
    }

    pub fn is_online(&self) -> bool {
        !self.lock().offline
    }

    /// Whether background refresh may run for a query with `config` right now.
    pub fn allows_background_refresh(&self, config: &SwrConfig) -> bool {
        let inner = self.lock();
        config.allows_background_refresh(!inner.hidden, !inner.offline)
    }

    /// Refetches subscribed keys whose queries revalidate on focus.
    ///
    /// Returns the number of keys refetched.
    pub async fn notify_focus(&self) -> usize {
        self.revalidate_subscribed(|config| config.revalidate_on_focus)
            .await
    }

    /// Refetches subscribed keys whose queries revalidate on reconnect.
    pub async fn notify_reconnect(&self) -> usize {
        self.revalidate_subscribed(|config| config.revalidate_on_reconnect)
            .await
    }

    async fn revalidate_subscribed(&self, pick: impl Fn(&SwrConfig) -> bool) -> usize {
        let revalidators: Vec<Revalidator> = {
            let inner = self.lock();
            inner
                .subscribers
                .keys()
                .filter_map(|key| inner.revalidator(key, &pick))
                .collect()
        };
        let count = revalidators.len();
        join_all(revalidators.iter().map(|revalidate| revalidate(false))).await;
        count
    }

    /// Removes unsubscribed, idle entries not read for `unused_threshold`.
    ///
    /// Returns the number of entries removed.
    pub fn cleanup_unused_entries(&self, unused_threshold: Duration) -> usize {
        let mut inner = self.lock();
        let initial_size = inner.entries.len();
        let StoreInner {
            entries,
            in_flight,
            subscribers,
            ..
        } = &mut *inner;
        entries.retain(|key, entry| {
            subscribers.contains_key(key)
                || in_flight.contains_key(key)
                || entry.last_accessed.elapsed() <= unused_threshold
        });
        let removed = initial_size - entries.len();
        if removed > 0 {
            crate::debug_log!("🧹 [CACHE-CLEANUP] Removed {} unused entries", removed);
        }
        removed
    }

    /// Evicts least recently used, unsubscribed entries until at most
    /// `max_size` remain. Returns the number evicted.
    pub fn evict_lru_entries(&self, max_size: usize) -> usize {
        let mut inner = self.lock();
        if inner.entries.len() <= max_size {
            return 0;
        }

        let mut candidates: Vec<(CacheKey, Instant)> = inner
            .entries
            .iter()
            .filter(|(key, _)| {
                !inner.subscribers.contains_key(*key) && !inner.in_flight.contains_key(*key)
            })
            .map(|(key, entry)| (key.clone(), entry.last_accessed))
            .collect();
        // oldest access first
        candidates.sort_by_key(|(_, accessed)| *accessed);

        let excess = inner.entries.len() - max_size;
        let mut evicted = 0;
        for (key, _) in candidates.into_iter().take(excess) {
            inner.entries.remove(&key);
            evicted += 1;
        }
        if evicted > 0 {
            crate::debug_log!(
                "🗑️ [LRU-EVICT] Evicted {} entries due to cache size limit",
                evicted
            );
        }
        evicted
    }

    fn enforce_limit(&self) {
        let max_entries = self.lock().max_entries;
        if let Some(max) = max_entries {
            self.evict_lru_entries(max);
        }
    }

    /// Gets cache statistics.
    pub fn stats(&self) -> CacheStats {
        let inner = self.lock();
        let mut total_age = Duration::ZERO;
        let mut total_accesses = 0u32;
        for entry in inner.entries.values() {
            if let Some(fetched) = entry.last_fetched_at {
                total_age += fetched.elapsed();
            }
            total_accesses = total_accesses.saturating_add(entry.access_count);
        }
        let entry_count = inner.entries.len();
        CacheStats {
            entry_count,
            in_flight: inner.in_flight.len(),
            subscribed_keys: inner.subscribers.len(),
            total_accesses,
            avg_age: if entry_count > 0 {
                total_age / entry_count as u32
            } else {
                Duration::ZERO
            },
        }
    }
}

/// Handle for a key subscription; unsubscribes on drop
pub struct Subscription {
    store: CacheStore,
    key: CacheKey,
    id: u64,
}

impl Subscription {
    pub fn key(&self) -> &CacheKey {
        &self.key
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.store.unsubscribe(&self.key, self.id);
    }
}

impl std::fmt::Debug for Subscription {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Subscription")
            .field("key", &self.key)
            .field("id", &self.id)
            .finish()
    }
}

/// General cache statistics
#[derive(Debug, Clone, Default)]
pub struct CacheStats {
    pub entry_count: usize,
    pub in_flight: usize,
    pub subscribed_keys: usize,
    pub total_accesses: u32,
    pub avg_age: Duration,
}

impl CacheStats {
    pub fn avg_accesses_per_entry(&self) -> f64 {
        if self.entry_count > 0 {
            self.total_accesses as f64 / self.entry_count as f64
        } else {
            0.0
        }
    }
}
