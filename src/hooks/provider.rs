//! # Data hooks
//!
//! Dioxus bindings for the storefront runtime. [`use_storefront_provider`]
//! installs a [`StorefrontRuntime`] at the app root and every other hook reads
//! it from context.
//!
//! Query hooks return a [`DataHandle`]: a `Copy` handle whose reads subscribe
//! the calling component, so the component re-renders whenever the cache entry
//! behind its key changes. Components that pass the same key share one fetch
//! and one cache entry.
//!
//! ## Example
//!
//! ```rust,no_run
//! use dioxus::prelude::*;
//! use dawa_provider::prelude::*;
//!
//! #[component]
//! fn App() -> Element {
//!     use_storefront_provider(|| {
//!         StorefrontRuntime::http(RuntimeConfig::new("https://dawa.example/api"), Session::anonymous())
//!     });
//!     rsx! { Promoted {} }
//! }
//!
//! #[component]
//! fn Promoted() -> Element {
//!     let promoted = use_promoted_products();
//!     let names: Vec<String> = promoted
//!         .data()
//!         .unwrap_or_default()
//!         .into_iter()
//!         .map(|product| product.name)
//!         .collect();
//!     rsx! {
//!         if promoted.is_loading() { "Loading..." }
//!         for name in names { p { "{name}" } }
//!     }
//! }
//! ```

use std::{cell::RefCell, rc::Rc, time::Duration};

use dioxus::core::Task;
use dioxus::prelude::*;
use futures::{StreamExt, channel::mpsc};
use tokio::sync::watch;

use crate::{
    config::SwrOverrides,
    errors::DataError,
    key::CacheKey,
    pagination::{InfiniteQuery, InfiniteState, PageCursor, merge_pages},
    poller::RealtimePoller,
    query::DataQuery,
    runtime::StorefrontRuntime,
    schema::*,
    search::{SearchController, SearchState},
    session::AuthUser,
    state::QueryState,
    types::{Fetcher, QueryDataBounds},
};

/// Installs the runtime built by `runtime` for this component and its children.
///
/// Call it once, in the root component. The factory only runs on first render.
pub fn use_storefront_provider(runtime: impl FnOnce() -> StorefrontRuntime) -> StorefrontRuntime {
    use_context_provider(runtime)
}

/// The runtime installed by an ancestor's [`use_storefront_provider`].
pub fn use_storefront() -> StorefrontRuntime {
    use_context::<StorefrontRuntime>()
}

/// Mirrors a watch channel into a signal for the lifetime of the component.
pub(crate) fn use_watch_signal<S>(receiver: impl FnOnce() -> watch::Receiver<S>) -> Signal<S>
where
    S: Clone + Send + Sync + 'static,
{
    let receiver = use_hook(receiver);
    let mut signal = use_signal(|| receiver.borrow().clone());
    use_hook(move || {
        let mut receiver = receiver;
        spawn(async move {
            while receiver.changed().await.is_ok() {
                let value = receiver.borrow_and_update().clone();
                signal.set(value);
            }
        });
    });
    signal
}

/// The signed-in user. Reading it re-renders the component on sign in and out.
pub fn use_current_user() -> Signal<Option<AuthUser>> {
    let runtime = use_storefront();
    use_watch_signal(move || runtime.session().watch_user())
}

/// Handle to a query bound to a component
pub struct DataHandle<T: 'static> {
    state: Signal<QueryState<T>>,
    query: Signal<DataQuery<T>>,
}

impl<T: 'static> Clone for DataHandle<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static> Copy for DataHandle<T> {}

impl<T: QueryDataBounds> DataHandle<T> {
    /// Current state; subscribes the caller.
    pub fn state(&self) -> QueryState<T> {
        self.state.read().clone()
    }

    pub fn signal(&self) -> Signal<QueryState<T>> {
        self.state
    }

    pub fn data(&self) -> Option<T> {
        self.state.read().data.clone()
    }

    pub fn error(&self) -> Option<DataError> {
        self.state.read().error.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().is_loading
    }

    pub fn is_validating(&self) -> bool {
        self.state.read().is_validating
    }

    /// The key currently bound, `None` while the query is disabled.
    pub fn key(&self) -> Option<CacheKey> {
        self.query.peek().key().cloned()
    }

    /// Refetches now, bypassing deduplication.
    pub fn mutate(&self) {
        let query = self.query.peek().clone();
        spawn(async move {
            query.mutate().await;
        });
    }

    /// Replaces the cached data locally, notifying every subscriber.
    pub fn set_data(&self, value: T) {
        self.query.peek().set_data(value);
    }
}

/// Binds `query` to the calling component.
///
/// The query is rebound whenever its key changes. Its fetcher and config are
/// taken from the render in which the key changed.
pub fn use_query<T: QueryDataBounds>(query: DataQuery<T>) -> DataHandle<T> {
    use_bound_query(query, None)
}

/// Like [`use_query`], additionally refetching every `interval`.
pub fn use_polled_query<T: QueryDataBounds>(query: DataQuery<T>, interval: Duration) -> DataHandle<T> {
    use_bound_query(query, Some(interval))
}

fn use_bound_query<T: QueryDataBounds>(query: DataQuery<T>, poll: Option<Duration>) -> DataHandle<T> {
    let latest = use_hook(|| Rc::new(RefCell::new(query.clone())));
    *latest.borrow_mut() = query.clone();

    let mut state = use_signal(|| query.state());
    let mut current = use_signal(|| query.clone());
    let mut worker: Signal<Option<Task>> = use_signal(|| None);
    let key = query.key().cloned();

    let _ = use_memo(use_reactive!(|key| {
        if let Some(task) = worker.write().take() {
            task.cancel();
        }
        let query = latest.borrow().clone();
        crate::debug_log!("🔄 [BIND] Binding query to key {:?}", key);
        current.set(query.clone());
        state.set(query.state());
        if key.is_some() {
            worker.set(Some(spawn(drive_query(query, poll, state))));
        }
    }));

    DataHandle {
        state,
        query: current,
    }
}

/// Loads the query, then copies its state into `state` on every cache event.
async fn drive_query<T: QueryDataBounds>(
    query: DataQuery<T>,
    poll: Option<Duration>,
    mut state: Signal<QueryState<T>>,
) {
    let (notify, mut changes) = mpsc::unbounded::<()>();
    let _subscription = query.subscribe(move |_event| {
        let _ = notify.unbounded_send(());
    });
    let _poller = poll
        .or(query.config().refresh_interval)
        .map(|interval| RealtimePoller::for_query(query.clone(), interval));

    let loaded = query.load().await;
    if *state.peek() != loaded {
        state.set(loaded);
    }
    while changes.next().await.is_some() {
        // coalesce bursts of events into one update
        while changes.try_recv().is_ok() {}
        let next = query.state();
        if *state.peek() != next {
            state.set(next);
        }
    }
}

/// A query over any key and fetcher, with per-query config overrides.
pub fn use_data<T: QueryDataBounds>(
    key: Option<CacheKey>,
    fetcher: Fetcher<T>,
    overrides: SwrOverrides,
) -> DataHandle<T> {
    let runtime = use_storefront();
    use_query(runtime.query(key, fetcher, &overrides))
}

/// First page of the product list for `filter`.
pub fn use_products_data(filter: ProductFilter) -> DataHandle<Page<Product>> {
    let runtime = use_storefront();
    use_query(runtime.products_page_query(filter))
}

pub fn use_promoted_products() -> DataHandle<Vec<Product>> {
    let runtime = use_storefront();
    use_query(runtime.promoted_products_query())
}

/// Products of a category or subcategory; disabled while `selection` is `None`.
pub fn use_category_data(selection: Option<CategorySelection>) -> DataHandle<CategoryData> {
    let runtime = use_storefront();
    use_query(runtime.category_query(selection))
}

pub fn use_product_details(item_id: Option<ProductId>) -> DataHandle<ProductDetail> {
    let runtime = use_storefront();
    use_query(runtime.product_details_query(item_id))
}

pub fn use_shop_profile(user_id: Option<UserId>) -> DataHandle<ShopProfile> {
    let runtime = use_storefront();
    use_query(runtime.shop_profile_query(user_id))
}

/// Profile of the signed-in user; disabled while signed out.
pub fn use_user_profile() -> DataHandle<UserProfile> {
    let runtime = use_storefront();
    let _signed_in = use_current_user().read().is_some();
    use_query(runtime.user_profile_query())
}

/// Chat history of the signed-in user; disabled while signed out.
pub fn use_messages() -> DataHandle<Vec<RemoteMessage>> {
    let runtime = use_storefront();
    let _signed_in = use_current_user().read().is_some();
    use_query(runtime.messages_query())
}

/// Wishlist of the signed-in user; disabled while signed out.
pub fn use_wishlist() -> DataHandle<Vec<Product>> {
    let runtime = use_storefront();
    let _signed_in = use_current_user().read().is_some();
    use_query(runtime.wishlist_query())
}

pub fn use_faqs() -> DataHandle<Vec<Faq>> {
    let runtime = use_storefront();
    use_query(runtime.faqs_query())
}

/// Chat history refetched every `interval`, or the runtime's poll interval.
///
/// Polling pauses while the window is hidden or offline and stops when the
/// component unmounts.
pub fn use_realtime_updates(interval: Option<Duration>) -> DataHandle<Vec<RemoteMessage>> {
    let runtime = use_storefront();
    let _signed_in = use_current_user().read().is_some();
    let interval = interval.unwrap_or(runtime.config().poll_interval);
    use_polled_query(runtime.messages_query(), interval)
}

/// Handle to an infinite list bound to a component
pub struct InfiniteHandle<T: 'static, R: 'static> {
    state: Signal<InfiniteState<T>>,
    query: Signal<Option<InfiniteQuery<T, R>>>,
}

impl<T: 'static, R: 'static> Clone for InfiniteHandle<T, R> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T: 'static, R: 'static> Copy for InfiniteHandle<T, R> {}

impl<T, R> InfiniteHandle<T, R>
where
    T: Identified + Clone + Send + Sync + 'static,
    R: PageCursor,
{
    pub fn state(&self) -> InfiniteState<T> {
        self.state.read().clone()
    }

    /// Items of all loaded pages, deduplicated by id.
    pub fn items(&self) -> Vec<T> {
        merge_pages(&self.state.read().pages)
    }

    pub fn total_count(&self) -> Option<u64> {
        self.state.read().pages.first().map(|page| page.count)
    }

    pub fn is_loading(&self) -> bool {
        let state = self.state.read();
        state.pages.is_empty() && (state.is_fetching || state.error.is_none())
    }

    pub fn is_loading_more(&self) -> bool {
        self.state.read().is_fetching
    }

    pub fn has_more(&self) -> bool {
        self.state.read().has_more()
    }

    pub fn error(&self) -> Option<DataError> {
        self.state.read().error.clone()
    }

    /// Fetches the next page, if any.
    pub fn load_more(&self) {
        self.run(|query| async move { query.load_more().await.map(|_| ()) });
    }

    pub fn set_size(&self, size: usize) {
        self.run(move |query| async move { query.set_size(size).await });
    }

    /// Drops every page and reloads from the first.
    pub fn reset(&self) {
        self.run(|query| async move { query.reset().await });
    }

    fn run<F, Fut>(&self, op: F)
    where
        F: FnOnce(InfiniteQuery<T, R>) -> Fut,
        Fut: std::future::Future<Output = crate::errors::DataResult<()>> + 'static,
    {
        let Some(query) = self.query.peek().clone() else {
            return;
        };
        let pending = op(query);
        spawn(async move {
            if let Err(error) = pending.await {
                crate::log_pagination!("Page request failed: {}", error);
            }
        });
    }
}

/// Paginated product list for `filter`; starts over when the filter changes.
pub fn use_infinite_products(filter: ProductFilter) -> InfiniteHandle<Product, PageRequest> {
    let runtime = use_storefront();
    let mut state = use_signal(InfiniteState::default);
    let mut query: Signal<Option<InfiniteQuery<Product, PageRequest>>> = use_signal(|| None);
    let mut worker: Signal<Option<Task>> = use_signal(|| None);

    let _ = use_memo(use_reactive!(|filter| {
        if let Some(task) = worker.write().take() {
            task.cancel();
        }
        let next = runtime.products_query(filter);
        query.set(Some(next.clone()));
        state.set(next.snapshot());
        worker.set(Some(spawn(drive_infinite(next, state))));
    }));

    InfiniteHandle { state, query }
}

async fn drive_infinite<T, R>(query: InfiniteQuery<T, R>, mut state: Signal<InfiniteState<T>>)
where
    T: Identified + Clone + Send + Sync + 'static,
    R: PageCursor,
{
    let mut changes = query.watch();
    let first_page = async {
        if let Err(error) = query.load().await {
            crate::log_pagination!("First page failed: {}", error);
        }
    };
    let forward = async {
        while changes.changed().await.is_ok() {
            let next = changes.borrow_and_update().clone();
            state.set(next);
        }
    };
    futures::join!(first_page, forward);
}

/// Cancellable search bound to a component
#[derive(Clone)]
pub struct SearchHandle {
    controller: SearchController,
    state: Signal<SearchState>,
}

impl SearchHandle {
    /// Searches for `query`, superseding any search still running.
    pub fn search(&self, query: impl Into<String>) {
        let controller = self.controller.clone();
        let query = query.into();
        spawn(async move {
            let _ = controller.search(query).await;
        });
    }

    pub fn cancel(&self) {
        self.controller.cancel();
    }

    pub fn state(&self) -> SearchState {
        self.state.read().clone()
    }

    pub fn results(&self) -> Vec<Product> {
        self.state.read().results.clone()
    }

    pub fn is_searching(&self) -> bool {
        self.state.read().is_searching
    }
}

/// Product search whose in-flight request is aborted by the next keystroke
/// and on unmount.
pub fn use_search_products() -> SearchHandle {
    let runtime = use_storefront();
    let controller = use_hook(|| runtime.search_controller());
    let watched = controller.clone();
    let state = use_watch_signal(move || watched.watch());
    let on_drop = controller.clone();
    use_drop(move || on_drop.cancel());
    SearchHandle { controller, state }
}
