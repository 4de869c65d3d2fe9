//! Cancellable product search
//!
//! Each keystroke issues a search; [`SearchController::search`] aborts the
//! previous request before sending the next one, and a generation counter
//! makes sure a late response can never replace newer results. An empty query
//! clears the results without a request.

use std::sync::{
    Arc, Mutex, MutexGuard, PoisonError,
    atomic::{AtomicU64, Ordering},
};

use futures::future::{AbortHandle, Abortable};
use tokio::sync::watch;

use crate::{
    api::StorefrontApi,
    errors::{DataError, DataResult},
    schema::Product,
    slice::Slice,
};

/// Results of the latest search
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SearchState {
    pub query: String,
    pub results: Vec<Product>,
    pub error: Option<DataError>,
    pub is_searching: bool,
}

/// Issues searches, keeping only the latest one alive
pub struct SearchController {
    api: Arc<dyn StorefrontApi>,
    state: Slice<SearchState>,
    generation: Arc<AtomicU64>,
    in_flight: Arc<Mutex<Option<AbortHandle>>>,
}

impl Clone for SearchController {
    fn clone(&self) -> Self {
        Self {
            api: self.api.clone(),
            state: self.state.clone(),
            generation: self.generation.clone(),
            in_flight: self.in_flight.clone(),
        }
    }
}

impl SearchController {
    pub fn new(api: Arc<dyn StorefrontApi>) -> Self {
        Self {
            api,
            state: Slice::default(),
            generation: Arc::new(AtomicU64::new(0)),
            in_flight: Arc::new(Mutex::new(None)),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Option<AbortHandle>> {
        self.in_flight.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Searches for `query`, aborting any search still in flight.
    ///
    /// Resolves to `Cancelled` if a newer search superseded this one.
    pub async fn search(&self, query: impl Into<String>) -> DataResult<Vec<Product>> {
        let query = query.into();
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.cancel_in_flight();

        let trimmed = query.trim().to_string();
        if trimmed.is_empty() {
            self.state.replace(SearchState::default());
            return Ok(Vec::new());
        }

        let (abort, registration) = AbortHandle::new_pair();
        *self.lock() = Some(abort);
        self.state.reduce(|state| {
            state.query = query.clone();
            state.is_searching = true;
        });

        let request = Abortable::new(self.api.search(trimmed), registration);
        let outcome = match request.await {
            Ok(result) => result,
            Err(_aborted) => {
                crate::debug_log!("Search '{}' aborted by a newer query", query);
                return Err(DataError::Cancelled);
            }
        };

        if self.generation.load(Ordering::SeqCst) != generation {
            return Err(DataError::Cancelled);
        }
        *self.lock() = None;
        self.state.reduce(|state| {
            state.is_searching = false;
            match &outcome {
                Ok(results) => {
                    state.results = results.clone();
                    state.error = None;
                }
                Err(error) => state.error = Some(error.clone()),
            }
        });
        outcome
    }

    /// Aborts the in-flight search, if any.
    pub fn cancel(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cancel_in_flight();
        self.state.reduce(|state| state.is_searching = false);
    }

    fn cancel_in_flight(&self) {
        if let Some(abort) = self.lock().take() {
            abort.abort();
        }
    }

    pub fn state(&self) -> SearchState {
        self.state.snapshot()
    }

    pub fn watch(&self) -> watch::Receiver<SearchState> {
        self.state.watch()
    }
}

impl Drop for SearchController {
    fn drop(&mut self) {
        // last handle gone: nobody can observe the result any more
        if Arc::strong_count(&self.in_flight) == 1 {
            self.cancel_in_flight();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake_api::{FakeApi, product};
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn controller() -> (Arc<FakeApi>, SearchController) {
        let api = FakeApi::new();
        api.respond("search:a", json!([product(1, "Armchair")]));
        api.respond("search:ab", json!([product(2, "Abacus")]));
        api.delay("search:a", Duration::from_millis(200));
        api.delay("search:ab", Duration::from_millis(20));
        (api.clone(), SearchController::new(api))
    }

    #[tokio::test(start_paused = true)]
    async fn newer_query_cancels_older() {
        let (api, search) = controller();

        let first = search.search("a");
        let second = async {
            sleep(Duration::from_millis(5)).await;
            search.search("ab").await
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(first, Err(DataError::Cancelled));
        let names: Vec<_> = second.unwrap().into_iter().map(|p| p.name).collect();
        assert_eq!(names, vec!["Abacus"]);

        // let the aborted request's timer pass; nothing may change
        sleep(Duration::from_millis(500)).await;
        let state = search.state();
        assert_eq!(state.query, "ab");
        assert_eq!(state.results[0].name, "Abacus");
        assert!(!state.is_searching);
        assert_eq!(api.calls(), vec!["search:a", "search:ab"]);
    }

    #[tokio::test]
    async fn empty_query_clears_without_request() {
        let (api, search) = controller();
        api.delay("search:ab", Duration::ZERO);
        search.search("ab").await.unwrap();

        assert_eq!(search.search("   ").await, Ok(Vec::new()));

        assert_eq!(search.state(), SearchState::default());
        assert_eq!(api.call_count("search"), 1);
    }

    #[tokio::test]
    async fn failures_keep_previous_results() {
        let (api, search) = controller();
        api.delay("search:ab", Duration::ZERO);
        api.fail("search:zz", DataError::api(503, "search unavailable"));
        search.search("ab").await.unwrap();

        assert!(search.search("zz").await.is_err());

        let state = search.state();
        assert_eq!(state.results.len(), 1);
        assert_eq!(state.error, Some(DataError::api(503, "search unavailable")));
    }
}
