//! Shared runtime components that back the storefront data layer.
//!
//! [`StorefrontRuntime`] owns the cache store, the API client, the session, the
//! mutation queue and the client-side slices. It is constructed once per app
//! (or per test) and handed to components through Dioxus context; every query,
//! mutation and controller is built from it, so nothing here is global.

use std::{sync::Arc, time::Duration};

use futures::FutureExt;
use tokio::task::JoinHandle;

use crate::{
    api::{ApiClient, StorefrontApi},
    cache::{CacheEventKind, CacheStore, Subscription},
    commands::CommandHandler,
    config::{RuntimeConfig, SwrConfig, SwrOverrides},
    errors::DataError,
    key::{CacheKey, keys},
    mutation::{MutationHandle, MutationQueue},
    optimistic::{ChatActions, ChatState, OptimisticRunner, WishlistActions, WishlistState},
    pagination::{InfiniteQuery, PageCursor, PageFetcher, product_pages},
    query::DataQuery,
    schema::*,
    search::SearchController,
    session::Session,
    slice::Slice,
    types::{Action, Fetcher, MutationArgBounds, QueryDataBounds, fetcher},
};

/// Minimum period of the maintenance task
const MIN_MAINTENANCE_INTERVAL: Duration = Duration::from_secs(30);

/// Central runtime that holds onto the data layer's shared handles.
#[derive(Clone)]
pub struct StorefrontRuntime {
    config: RuntimeConfig,
    store: CacheStore,
    api: Arc<dyn StorefrontApi>,
    session: Session,
    queue: MutationQueue,
    wishlist: Slice<WishlistState>,
    chat: Slice<ChatState>,
    selected_category: Slice<Option<CategorySelection>>,
    _slice_syncs: Arc<[Subscription]>,
}

impl StorefrontRuntime {
    /// Construct a runtime around any [`StorefrontApi`] implementation.
    pub fn new(config: RuntimeConfig, api: Arc<dyn StorefrontApi>, session: Session) -> Self {
        let store = match config.max_cache_entries {
            Some(max) => CacheStore::with_max_entries(max),
            None => CacheStore::new(),
        };
        crate::debug_log!("Storefront runtime created for {}", config.base_url);
        let wishlist: Slice<WishlistState> = Slice::default();
        let chat: Slice<ChatState> = Slice::default();
        let slice_syncs: Arc<[Subscription]> = Arc::new([
            sync_on_update(&store, keys::user_wishlist(), &wishlist, |state, products: &Vec<Product>| {
                state.sync_products(products)
            }),
            sync_on_update(&store, keys::messages(), &chat, |state, messages: &Vec<RemoteMessage>| {
                state.sync(messages)
            }),
        ]);
        Self {
            config,
            store,
            api,
            session,
            queue: MutationQueue::new(),
            wishlist,
            chat,
            selected_category: Slice::default(),
            _slice_syncs: slice_syncs,
        }
    }

    /// Construct a runtime talking HTTP to `config.base_url`.
    pub fn http(config: RuntimeConfig, session: Session) -> Self {
        let api = Arc::new(ApiClient::new(config.base_url.clone(), session.clone()));
        Self::new(config, api, session)
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    pub fn store(&self) -> &CacheStore {
        &self.store
    }

    pub fn api(&self) -> Arc<dyn StorefrontApi> {
        self.api.clone()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn queue(&self) -> &MutationQueue {
        &self.queue
    }

    pub fn wishlist_state(&self) -> &Slice<WishlistState> {
        &self.wishlist
    }

    pub fn chat_state(&self) -> &Slice<ChatState> {
        &self.chat
    }

    pub fn selected_category(&self) -> &Slice<Option<CategorySelection>> {
        &self.selected_category
    }

    /// Runtime defaults with `overrides` applied.
    pub fn swr(&self, overrides: &SwrOverrides) -> SwrConfig {
        self.config.swr.merged(overrides)
    }

    /// A query over an arbitrary key and fetcher.
    pub fn query<T: QueryDataBounds>(
        &self,
        key: Option<CacheKey>,
        fetcher: Fetcher<T>,
        overrides: &SwrOverrides,
    ) -> DataQuery<T> {
        DataQuery::new(self.store.clone(), key, fetcher, self.swr(overrides))
    }

    /// A mutation whose triggers are serialized on `lane`.
    pub fn mutation<A, R>(&self, lane: impl Into<String>, action: Action<A, R>) -> MutationHandle<A, R>
    where
        A: MutationArgBounds,
        R: Clone + Send + Sync + 'static,
    {
        MutationHandle::new(lane, action, self.queue.clone(), self.store.clone())
    }

    pub fn optimistic_runner(&self) -> OptimisticRunner {
        OptimisticRunner::new(self.session.clone(), self.queue.clone(), self.store.clone())
    }

    pub fn wishlist_actions(&self) -> WishlistActions {
        WishlistActions::new(self.optimistic_runner(), self.api(), self.wishlist.clone())
    }

    pub fn chat_actions(&self) -> ChatActions {
        ChatActions::new(self.optimistic_runner(), self.api(), self.chat.clone())
    }

    pub fn search_controller(&self) -> SearchController {
        SearchController::new(self.api())
    }

    pub fn command_handler(&self) -> CommandHandler {
        CommandHandler::new(self.clone())
    }

    /// Key of a query that needs a signed-in user: `None` when signed out.
    fn user_key(&self, key: CacheKey) -> Option<CacheKey> {
        self.session.is_authenticated().then_some(key)
    }

    pub fn promoted_products_query(&self) -> DataQuery<Vec<Product>> {
        let api = self.api();
        self.query(
            Some(keys::promoted_products()),
            fetcher(move |_key| {
                let api = api.clone();
                async move { api.promoted_products().await }
            }),
            &SwrOverrides::default(),
        )
    }

    pub fn category_query(&self, selection: Option<CategorySelection>) -> DataQuery<CategoryData> {
        let api = self.api();
        self.query(
            selection.map(keys::category_data),
            fetcher(move |_key| {
                let api = api.clone();
                async move {
                    match selection {
                        Some(selection) => api.category_data(selection).await,
                        None => Err(DataError::Configuration("no category selected".into())),
                    }
                }
            }),
            &SwrOverrides::default(),
        )
    }

    pub fn product_details_query(&self, item_id: Option<ProductId>) -> DataQuery<ProductDetail> {
        let api = self.api();
        self.query(
            item_id.map(keys::item_details),
            fetcher(move |_key| {
                let api = api.clone();
                async move {
                    match item_id {
                        Some(item_id) => api.item_details(item_id).await,
                        None => Err(DataError::Configuration("no item selected".into())),
                    }
                }
            }),
            &SwrOverrides::default(),
        )
    }

    pub fn shop_profile_query(&self, user_id: Option<UserId>) -> DataQuery<ShopProfile> {
        let api = self.api();
        self.query(
            user_id.map(keys::shop_profile),
            fetcher(move |_key| {
                let api = api.clone();
                async move {
                    match user_id {
                        Some(user_id) => api.shop_profile(user_id).await,
                        None => Err(DataError::Configuration("no shop selected".into())),
                    }
                }
            }),
            &SwrOverrides::default(),
        )
    }

    /// Profile of the signed-in user; disabled while signed out.
    pub fn user_profile_query(&self) -> DataQuery<UserProfile> {
        let api = self.api();
        self.query(
            self.user_key(keys::user_profile()),
            fetcher(move |_key| {
                let api = api.clone();
                async move { api.user_profile().await }
            }),
            &SwrOverrides::default(),
        )
    }

    /// Chat history of the signed-in user. Every stored response also
    /// re-syncs the chat slice.
    pub fn messages_query(&self) -> DataQuery<Vec<RemoteMessage>> {
        let api = self.api();
        self.query(
            self.user_key(keys::messages()),
            fetcher(move |_key| {
                let api = api.clone();
                async move { api.messages().await }
            }),
            &SwrOverrides::default(),
        )
    }

    /// Wishlist of the signed-in user. Every stored response also re-syncs
    /// wishlist membership.
    pub fn wishlist_query(&self) -> DataQuery<Vec<Product>> {
        let api = self.api();
        self.query(
            self.user_key(keys::user_wishlist()),
            fetcher(move |_key| {
                let api = api.clone();
                async move { api.wishlist().await }
            }),
            &SwrOverrides::default(),
        )
    }

    /// FAQs never change during a session.
    pub fn faqs_query(&self) -> DataQuery<Vec<Faq>> {
        let api = self.api();
        self.query(
            Some(keys::faqs()),
            fetcher(move |_key| {
                let api = api.clone();
                async move { api.faqs().await }
            }),
            &SwrOverrides::immutable(),
        )
    }

    /// First page of the product list. Shares its cache entry with page 0 of
    /// [`Self::products_query`].
    pub fn products_page_query(&self, filter: ProductFilter) -> DataQuery<Page<Product>> {
        let api = self.api();
        let request = PageRequest::First(filter);
        self.query(
            Some(request.cache_key()),
            fetcher(move |_key| {
                let api = api.clone();
                let request = request.clone();
                async move { api.list_items(request).await }
            }),
            &SwrOverrides::default(),
        )
    }

    /// Infinite product list for `filter`.
    pub fn products_query(&self, filter: ProductFilter) -> InfiniteQuery<Product, PageRequest> {
        let api = self.api();
        let fetch: PageFetcher<PageRequest, Product> = Arc::new(move |request| {
            let api = api.clone();
            async move { api.list_items(request).await }.boxed()
        });
        InfiniteQuery::new(
            self.store.clone(),
            product_pages(filter),
            fetch,
            &self.config.swr,
        )
    }

    /// Starts periodic cleanup of entries unused for `unused_threshold`, plus
    /// LRU eviction when `max_cache_entries` is configured.
    pub fn start_maintenance(&self, unused_threshold: Duration) -> MaintenanceTask {
        let every = std::cmp::max(unused_threshold / 4, MIN_MAINTENANCE_INTERVAL);
        let store = self.store.clone();
        let max_entries = self.config.max_cache_entries;
        let task = tokio::spawn(async move {
            loop {
                tokio::time::sleep(every).await;
                let removed = store.cleanup_unused_entries(unused_threshold);
                let evicted = max_entries
                    .map(|max| store.evict_lru_entries(max))
                    .unwrap_or(0);
                crate::debug_log!(
                    "📊 [SMART-CACHE] Maintenance removed {} and evicted {} entries",
                    removed,
                    evicted
                );
            }
        });
        crate::debug_log!("📊 [SMART-CACHE] Cache maintenance every {:?}", every);
        MaintenanceTask { task }
    }
}

/// Background cache maintenance; stops when dropped
pub struct MaintenanceTask {
    task: JoinHandle<()>,
}

impl Drop for MaintenanceTask {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Folds every value stored under `key` into `slice`.
///
/// Responses the cache drops as stale never reach the slice.
fn sync_on_update<S, T>(
    store: &CacheStore,
    key: CacheKey,
    slice: &Slice<S>,
    sync: impl Fn(&mut S, &T) + Send + Sync + 'static,
) -> Subscription
where
    S: Send + Sync + 'static,
    T: Clone + Send + Sync + 'static,
{
    let reader = store.clone();
    let slice = slice.clone();
    let observed = key.clone();
    store.observe(&key, move |event| {
        if event.kind != CacheEventKind::Updated {
            return;
        }
        if let Some(value) = reader.get::<T>(&observed) {
            slice.reduce(|state| sync(state, &value));
        }
    })
}
