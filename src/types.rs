//! Common types and aliases used throughout dawa-provider

use std::sync::Arc;

use futures::future::BoxFuture;

use crate::{errors::DataResult, key::CacheKey};

/// Common trait bounds for data held in the cache
pub trait QueryDataBounds: Clone + PartialEq + Send + Sync + 'static {}
impl<T> QueryDataBounds for T where T: Clone + PartialEq + Send + Sync + 'static {}

/// Common trait bounds for mutation arguments
pub trait MutationArgBounds: Send + 'static {}
impl<T> MutationArgBounds for T where T: Send + 'static {}

/// Async function turning a cache key into data
pub type Fetcher<T> = Arc<dyn Fn(CacheKey) -> BoxFuture<'static, DataResult<T>> + Send + Sync>;

/// Async function performing one remote write
pub type Action<A, R> = Arc<dyn Fn(A) -> BoxFuture<'static, DataResult<R>> + Send + Sync>;

/// Wraps an async closure into a [`Fetcher`].
pub fn fetcher<T, F, Fut>(f: F) -> Fetcher<T>
where
    F: Fn(CacheKey) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = DataResult<T>> + Send + 'static,
{
    use futures::FutureExt;
    Arc::new(move |key| f(key).boxed())
}

/// Wraps an async closure into an [`Action`].
pub fn action<A, R, F, Fut>(f: F) -> Action<A, R>
where
    F: Fn(A) -> Fut + Send + Sync + 'static,
    Fut: std::future::Future<Output = DataResult<R>> + Send + 'static,
{
    use futures::FutureExt;
    Arc::new(move |arg| f(arg).boxed())
}
