//! Cache-backed data queries
//!
//! A [`DataQuery`] binds an optional [`CacheKey`], a [`Fetcher`] and a
//! [`SwrConfig`]. It never fetches without a key, shares in-flight requests and
//! fresh entries with every other query on the same key through the
//! [`CacheStore`], and keeps the previous data visible when a refetch fails.

use std::{sync::Arc, time::Duration};

use futures::FutureExt;

use crate::{
    cache::{CacheEvent, CacheStore, FetchOptions, Listener, Revalidator, Subscription},
    config::SwrConfig,
    key::CacheKey,
    state::QueryState,
    types::{Fetcher, QueryDataBounds},
};

/// A keyed, deduplicated, revalidating read
pub struct DataQuery<T> {
    store: CacheStore,
    key: Option<CacheKey>,
    fetcher: Fetcher<T>,
    config: SwrConfig,
}

impl<T> Clone for DataQuery<T> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key: self.key.clone(),
            fetcher: self.fetcher.clone(),
            config: self.config.clone(),
        }
    }
}

impl<T: QueryDataBounds> DataQuery<T> {
    /// Creates a query. A `None` key disables it: no fetch ever runs.
    pub fn new(
        store: CacheStore,
        key: Option<CacheKey>,
        fetcher: Fetcher<T>,
        config: SwrConfig,
    ) -> Self {
        Self {
            store,
            key,
            fetcher,
            config,
        }
    }

    pub fn key(&self) -> Option<&CacheKey> {
        self.key.as_ref()
    }

    pub fn config(&self) -> &SwrConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    /// Current `{data, error, is_loading, is_validating}` of the key.
    pub fn state(&self) -> QueryState<T> {
        let Some(key) = &self.key else {
            return QueryState::idle();
        };
        match self.store.snapshot::<T>(key) {
            Some(snapshot) => QueryState {
                is_loading: snapshot.data.is_none() && snapshot.error.is_none(),
                data: snapshot.data,
                error: snapshot.error,
                is_validating: snapshot.is_validating,
            },
            None => QueryState::loading(),
        }
    }

    /// Loads the key, reusing an in-flight request or fresh data when possible.
    pub async fn load(&self) -> QueryState<T> {
        self.fetch_with(FetchOptions::from_config(&self.config))
            .await
    }

    /// Forces a fresh fetch, bypassing the dedupe window.
    pub async fn mutate(&self) -> QueryState<T> {
        self.fetch_with(FetchOptions::from_config(&self.config).forced())
            .await
    }

    /// Refetches unless a request for the key is already running.
    ///
    /// Used for focus, reconnect and explicit revalidation.
    pub async fn revalidate(&self) -> QueryState<T> {
        let options = FetchOptions {
            deduping_interval: Duration::ZERO,
            ..FetchOptions::from_config(&self.config)
        };
        self.fetch_with(options).await
    }

    async fn fetch_with(&self, options: FetchOptions) -> QueryState<T> {
        if let Some(key) = &self.key {
            let fetcher = self.fetcher.clone();
            let fetch_key = key.clone();
            // the outcome is recorded on the entry; `state` reads it back
            let _ = self
                .store
                .fetch_or_reuse(key, options, move || fetcher(fetch_key))
                .await;
        }
        self.state()
    }

    /// Replaces the cached data locally without a request.
    ///
    /// Returns whether the value changed.
    pub fn set_data(&self, value: T) -> bool {
        match &self.key {
            Some(key) => self.store.set(key, value),
            None => false,
        }
    }

    /// Subscribes to changes of the key and registers this query for focus,
    /// reconnect and explicit revalidation.
    ///
    /// Returns `None` for a disabled query.
    pub fn subscribe<F>(&self, on_change: F) -> Option<Subscription>
    where
        F: Fn(&CacheEvent) + Send + Sync + 'static,
    {
        let key = self.key.as_ref()?;
        let query = self.clone();
        let revalidator: Revalidator = Arc::new(move |force| {
            let query = query.clone();
            async move {
                if force {
                    query.mutate().await;
                } else {
                    query.revalidate().await;
                }
            }
            .boxed()
        });
        let listener: Listener = Arc::new(on_change);
        Some(
            self.store
                .register(key, Some(listener), Some((revalidator, self.config.clone()))),
        )
    }
}
