//! Infinite lists over cursor-paginated endpoints
//!
//! [`InfiniteQuery`] keeps the pages fetched so far and the number of pages the
//! UI wants (`size`). A key function derives the request for page `i` from page
//! `i - 1`; it returning `None` is the only way a list ends. The visible item
//! list is [`merge_pages`] of all pages.
//!
//! Every page goes through the [`CacheStore`], so two lists over the same filter
//! share their page requests.

use std::{collections::HashMap, sync::Arc};

use futures::future::BoxFuture;
use tokio::sync::{Mutex as AsyncMutex, watch};

use crate::{
    cache::{CacheStore, FetchOptions},
    config::SwrConfig,
    errors::{DataError, DataResult},
    key::CacheKey,
    schema::{Identified, Page, PageRequest, Product, ProductFilter},
    slice::Slice,
};

/// Derives the request for page `index` from the previous page
pub type PageKeyFn<R, T> = Arc<dyn Fn(usize, Option<&Page<T>>) -> Option<R> + Send + Sync>;

/// Fetches one page
pub type PageFetcher<R, T> = Arc<dyn Fn(R) -> BoxFuture<'static, DataResult<Page<T>>> + Send + Sync>;

/// Requests that identify a cached page
pub trait PageCursor: Clone + Send + Sync + 'static {
    fn cache_key(&self) -> CacheKey;
}

impl PageCursor for PageRequest {
    /// The first page embeds the serialized filter; later pages use the cursor URL.
    fn cache_key(&self) -> CacheKey {
        match self {
            PageRequest::First(filter) => CacheKey::with_params("getitems", filter)
                .unwrap_or_else(|_| CacheKey::new("getitems")),
            PageRequest::Cursor(url) => CacheKey::from_parts(["getitems", url.as_str()]),
        }
    }
}

/// Concatenates pages in order and removes duplicate ids.
///
/// A duplicated item keeps the position of its first occurrence and the value
/// of its last one, so a later page can refresh an item that moved.
pub fn merge_pages<T: Identified + Clone>(pages: &[Page<T>]) -> Vec<T> {
    let mut positions: HashMap<T::Id, usize> = HashMap::new();
    let mut items: Vec<T> = Vec::new();
    for item in pages.iter().flat_map(|page| page.results.iter()) {
        match positions.get(&item.id()) {
            Some(&position) => items[position] = item.clone(),
            None => {
                positions.insert(item.id(), items.len());
                items.push(item.clone());
            }
        }
    }
    items
}

/// Key function of the product list: page 0 posts `filter`, later pages
/// follow the server's `next` cursor.
pub fn product_pages(filter: ProductFilter) -> PageKeyFn<PageRequest, Product> {
    Arc::new(move |index: usize, previous: Option<&Page<Product>>| match (index, previous) {
        (0, _) => Some(PageRequest::First(filter.clone())),
        (_, Some(page)) => page.next.clone().map(PageRequest::Cursor),
        (_, None) => None,
    })
}

/// Observable state of an infinite list
#[derive(Debug, Clone, PartialEq)]
pub struct InfiniteState<T> {
    pub pages: Vec<Page<T>>,
    /// Number of pages requested
    pub size: usize,
    pub error: Option<DataError>,
    pub is_fetching: bool,
    generation: u64,
}

impl<T> Default for InfiniteState<T> {
    fn default() -> Self {
        Self {
            pages: Vec::new(),
            size: 1,
            error: None,
            is_fetching: false,
            generation: 0,
        }
    }
}

impl<T> InfiniteState<T> {
    /// Whether the last fetched page points to another one.
    pub fn has_more(&self) -> bool {
        self.pages.last().is_none_or(|page| page.next.is_some())
    }
}

/// A growing list of pages
pub struct InfiniteQuery<T, R> {
    store: CacheStore,
    key_fn: PageKeyFn<R, T>,
    fetcher: PageFetcher<R, T>,
    options: FetchOptions,
    state: Slice<InfiniteState<T>>,
    fill_lock: Arc<AsyncMutex<()>>,
}

impl<T, R> Clone for InfiniteQuery<T, R> {
    fn clone(&self) -> Self {
        Self {
            store: self.store.clone(),
            key_fn: self.key_fn.clone(),
            fetcher: self.fetcher.clone(),
            options: self.options.clone(),
            state: self.state.clone(),
            fill_lock: self.fill_lock.clone(),
        }
    }
}

impl<T, R> InfiniteQuery<T, R>
where
    T: Identified + Clone + Send + Sync + 'static,
    R: PageCursor,
{
    pub fn new(
        store: CacheStore,
        key_fn: PageKeyFn<R, T>,
        fetcher: PageFetcher<R, T>,
        config: &SwrConfig,
    ) -> Self {
        Self {
            store,
            key_fn,
            fetcher,
            options: FetchOptions::from_config(config),
            state: Slice::default(),
            fill_lock: Arc::new(AsyncMutex::new(())),
        }
    }

    /// Fetches pages until `size` pages exist or the list ends.
    pub async fn load(&self) -> DataResult<()> {
        let _fill = self.fill_lock.lock().await;
        loop {
            let next = self.state.read(|state| {
                if state.pages.len() >= state.size {
                    return None;
                }
                let request = (self.key_fn)(state.pages.len(), state.pages.last())?;
                Some((state.pages.len(), request, state.generation))
            });
            let Some((index, request, generation)) = next else {
                return Ok(());
            };

            self.state.reduce(|state| state.is_fetching = true);
            let key = request.cache_key();
            crate::log_pagination!("Fetching page {} with key: {}", index, key);
            let fetcher = self.fetcher.clone();
            let result = self
                .store
                .fetch_or_reuse(&key, self.options.clone(), move || fetcher(request))
                .await;

            let mut stale = false;
            self.state.reduce(|state| {
                if state.generation != generation {
                    stale = true;
                    return;
                }
                state.is_fetching = false;
                match &result {
                    Ok(page) => {
                        if state.pages.len() == index {
                            state.pages.push(page.clone());
                        }
                        state.error = None;
                    }
                    Err(error) => state.error = Some(error.clone()),
                }
            });
            if stale {
                return Ok(());
            }
            result?;
        }
    }

    /// Sets the number of wanted pages and fetches the missing ones.
    pub async fn set_size(&self, size: usize) -> DataResult<()> {
        self.state.reduce(|state| state.size = size.max(1));
        self.load().await
    }

    /// Requests one more page, or retries a missing one. Does nothing once the
    /// list has ended.
    pub async fn load_more(&self) -> DataResult<bool> {
        let grow = self.state.read(|state| {
            if state.pages.is_empty() || !state.has_more() {
                None
            } else {
                Some(state.pages.len() >= state.size)
            }
        });
        let Some(grow) = grow else {
            return Ok(false);
        };
        if grow {
            self.state.reduce(|state| state.size += 1);
        }
        self.load().await?;
        Ok(true)
    }

    /// Drops every page and starts over from page 0.
    pub async fn reset(&self) -> DataResult<()> {
        let keys: Vec<CacheKey> = self.state.read(|state| {
            (0..state.pages.len())
                .filter_map(|index| {
                    let previous = index.checked_sub(1).and_then(|i| state.pages.get(i));
                    (self.key_fn)(index, previous).map(|request| request.cache_key())
                })
                .collect()
        });
        for key in &keys {
            self.store.invalidate(key);
        }
        self.state.reduce(|state| {
            let generation = state.generation + 1;
            *state = InfiniteState {
                generation,
                ..InfiniteState::default()
            };
        });
        self.load().await
    }

    /// All items of all pages, deduplicated by id.
    pub fn items(&self) -> Vec<T> {
        self.state.read(|state| merge_pages(&state.pages))
    }

    /// Server-reported total, from the first page.
    pub fn total_count(&self) -> Option<u64> {
        self.state
            .read(|state| state.pages.first().map(|page| page.count))
    }

    pub fn next_page_url(&self) -> Option<String> {
        self.state
            .read(|state| state.pages.last().and_then(|page| page.next.clone()))
    }

    /// True until the first page exists.
    pub fn is_loading(&self) -> bool {
        self.state.read(|state| {
            state.pages.is_empty() && (state.is_fetching || state.error.is_none())
        })
    }

    /// True while any page is being fetched, including the first.
    pub fn is_loading_more(&self) -> bool {
        self.state.read(|state| state.is_fetching)
    }

    pub fn has_more(&self) -> bool {
        self.state.read(InfiniteState::has_more)
    }

    pub fn size(&self) -> usize {
        self.state.read(|state| state.size)
    }

    pub fn error(&self) -> Option<DataError> {
        self.state.read(|state| state.error.clone())
    }

    pub fn watch(&self) -> watch::Receiver<InfiniteState<T>> {
        self.state.watch()
    }

    pub fn snapshot(&self) -> InfiniteState<T> {
        self.state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{api::StorefrontApi, fake_api::FakeApi};
    use futures::FutureExt;
    use serde_json::json;

    fn page(ids: &[(i64, &str)], next: Option<&str>) -> Page<Product> {
        serde_json::from_value(json!({
            "results": ids.iter().map(|(id, name)| json!({"id": id, "name": name})).collect::<Vec<_>>(),
            "next": next,
            "count": 3,
        }))
        .unwrap()
    }

    fn product_query(api: Arc<FakeApi>) -> InfiniteQuery<Product, PageRequest> {
        let fetch: PageFetcher<PageRequest, Product> = Arc::new(move |request| {
            let api = api.clone();
            async move { api.list_items(request).await }.boxed()
        });
        InfiniteQuery::new(
            CacheStore::new(),
            product_pages(ProductFilter::default()),
            fetch,
            &SwrConfig::default(),
        )
    }

    #[test]
    fn duplicates_keep_first_position_and_last_value() {
        let pages = vec![
            page(&[(1, "A"), (2, "X")], Some("p2")),
            page(&[(1, "B"), (3, "Y")], None),
        ];
        let merged = merge_pages(&pages);
        let names: Vec<_> = merged.iter().map(|p| (p.id, p.name.as_str())).collect();
        assert_eq!(names, vec![(1, "B"), (2, "X"), (3, "Y")]);
    }

    #[test]
    fn key_fn_stops_after_last_page() {
        let key_fn = product_pages(ProductFilter::default());
        let last = page(&[(1, "A")], None);
        let more = page(&[(1, "A")], Some("https://dawa.example/getitems/?page=2"));

        assert!(matches!(key_fn(0, None), Some(PageRequest::First(_))));
        assert_eq!(key_fn(1, Some(&last)), None);
        assert_eq!(
            key_fn(1, Some(&more)),
            Some(PageRequest::Cursor(
                "https://dawa.example/getitems/?page=2".into()
            ))
        );
    }

    #[tokio::test]
    async fn load_more_stops_at_null_cursor() {
        let api = FakeApi::new();
        api.respond(
            "list_items:first",
            serde_json::to_value(page(&[(1, "A"), (2, "X")], Some("p2"))).unwrap(),
        );
        api.respond(
            "list_items:p2",
            serde_json::to_value(page(&[(1, "B"), (3, "Y")], None)).unwrap(),
        );
        let query = product_query(api.clone());

        assert!(query.is_loading());
        query.load().await.unwrap();
        assert!(!query.is_loading());
        assert!(query.load_more().await.unwrap());
        assert!(!query.load_more().await.unwrap());
        query.set_size(5).await.unwrap();

        assert_eq!(api.call_count("list_items"), 2);
        assert_eq!(query.size(), 5);
        assert_eq!(query.next_page_url(), None);
        assert_eq!(query.total_count(), Some(3));
        let names: Vec<_> = query.items().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["B", "X", "Y"]);
    }

    #[tokio::test]
    async fn failed_page_keeps_earlier_pages() {
        let api = FakeApi::new();
        api.respond(
            "list_items:first",
            serde_json::to_value(page(&[(1, "A")], Some("p2"))).unwrap(),
        );
        api.fail("list_items:p2", DataError::Network("offline".into()));
        let query = product_query(api);

        query.load().await.unwrap();
        let result = query.load_more().await;

        assert_eq!(result, Err(DataError::Network("offline".into())));
        assert_eq!(query.items().len(), 1);
        assert!(!query.is_loading_more());
        assert_eq!(query.error(), Some(DataError::Network("offline".into())));
    }

    #[tokio::test]
    async fn reset_refetches_from_first_page() {
        let api = FakeApi::new();
        api.respond(
            "list_items:first",
            serde_json::to_value(page(&[(1, "A")], Some("p2"))).unwrap(),
        );
        api.respond(
            "list_items:p2",
            serde_json::to_value(page(&[(2, "B")], None)).unwrap(),
        );
        let query = product_query(api.clone());
        query.set_size(2).await.unwrap();
        assert_eq!(query.items().len(), 2);

        query.reset().await.unwrap();

        assert_eq!(query.size(), 1);
        assert_eq!(query.items().len(), 1);
        assert_eq!(api.call_count("list_items:first"), 2);
    }
}
