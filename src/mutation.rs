//! Mutations: remote writes with observable state
//!
//! [`MutationHandle`] wraps one remote [`Action`] and exposes
//! `{trigger, is_mutating, error}`. Every trigger runs through a
//! [`MutationQueue`] lane: writes sharing a lane execute one after another,
//! in trigger order, so their responses cannot arrive out of order.
//!
//! Mutations never touch the cache on their own. Keys passed to
//! [`MutationHandle::invalidates`] are revalidated after each success.
//!
//! ```rust,no_run
//! use dawa_provider::prelude::*;
//!
//! # async fn demo(runtime: StorefrontRuntime) -> Result<(), DataError> {
//! let api = runtime.api();
//! let send = runtime
//!     .mutation("sendmessage", action(move |message: OutgoingMessage| {
//!         let api = api.clone();
//!         async move { api.send_message(message).await }
//!     }))
//!     .invalidates([keys::messages()]);
//!
//! send.trigger(OutgoingMessage { recipient_id: 2, item_id: None, body: "Hi".into() })
//!     .await?;
//! # Ok(())
//! # }
//! ```

use std::{
    collections::HashMap,
    future::Future,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use futures::{FutureExt, future::BoxFuture};
use tokio::sync::{mpsc, oneshot, watch};

use crate::{
    cache::CacheStore,
    errors::{DataError, DataResult},
    key::CacheKey,
    slice::Slice,
    state::MutationState,
    types::{Action, MutationArgBounds},
};

type Job = BoxFuture<'static, ()>;

/// Serializes writes per lane
///
/// Each lane is drained by a single consumer task, spawned on first use.
#[derive(Clone, Default)]
pub struct MutationQueue {
    lanes: Arc<Mutex<HashMap<String, mpsc::UnboundedSender<Job>>>>,
}

impl MutationQueue {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, mpsc::UnboundedSender<Job>>> {
        self.lanes.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn sender(&self, lane: &str) -> mpsc::UnboundedSender<Job> {
        let mut lanes = self.lock();
        if let Some(sender) = lanes.get(lane)
            && !sender.is_closed()
        {
            return sender.clone();
        }

        let (sender, mut receiver) = mpsc::unbounded_channel::<Job>();
        let name = lane.to_string();
        tokio::spawn(async move {
            while let Some(job) = receiver.recv().await {
                job.await;
            }
            crate::debug_log!("Mutation lane '{}' closed", name);
        });
        lanes.insert(lane.to_string(), sender.clone());
        sender
    }

    /// Runs `job` after every job queued earlier on `lane`.
    pub async fn run<R, Fut>(&self, lane: &str, job: Fut) -> DataResult<R>
    where
        R: Send + 'static,
        Fut: Future<Output = DataResult<R>> + Send + 'static,
    {
        let (reply, response) = oneshot::channel();
        let job: Job = async move {
            let _ = reply.send(job.await);
        }
        .boxed();

        if let Err(mpsc::error::SendError(job)) = self.sender(lane).send(job) {
            // the consumer is gone; start a fresh one
            self.lock().remove(lane);
            self.sender(lane)
                .send(job)
                .map_err(|_| DataError::Cancelled)?;
        }
        response.await.map_err(|_| DataError::Cancelled)?
    }

    /// Number of lanes created so far.
    pub fn lane_count(&self) -> usize {
        self.lock().len()
    }
}

/// A remote write with `{trigger, is_mutating, error}` state
pub struct MutationHandle<A, R> {
    action: Action<A, R>,
    lane: String,
    queue: MutationQueue,
    store: CacheStore,
    invalidates: Vec<CacheKey>,
    state: Slice<MutationState<R>>,
}

impl<A, R> Clone for MutationHandle<A, R> {
    fn clone(&self) -> Self {
        Self {
            action: self.action.clone(),
            lane: self.lane.clone(),
            queue: self.queue.clone(),
            store: self.store.clone(),
            invalidates: self.invalidates.clone(),
            state: self.state.clone(),
        }
    }
}

impl<A, R> MutationHandle<A, R>
where
    A: MutationArgBounds,
    R: Clone + Send + Sync + 'static,
{
    /// Creates a handle whose triggers run on `lane` of `queue`.
    pub fn new(
        lane: impl Into<String>,
        action: Action<A, R>,
        queue: MutationQueue,
        store: CacheStore,
    ) -> Self {
        Self {
            action,
            lane: lane.into(),
            queue,
            store,
            invalidates: Vec::new(),
            state: Slice::default(),
        }
    }

    /// Revalidates `keys` after every successful trigger.
    pub fn invalidates(mut self, keys: impl IntoIterator<Item = CacheKey>) -> Self {
        self.invalidates.extend(keys);
        self
    }

    pub fn lane(&self) -> &str {
        &self.lane
    }

    /// Performs exactly one remote call with `arg`. No retry.
    ///
    /// The call and its state updates finish even if the returned future is
    /// dropped.
    pub async fn trigger(&self, arg: A) -> DataResult<R> {
        crate::log_mutation_start!("Triggering mutation on lane: {}", self.lane);
        self.state.reduce(|state| state.in_flight += 1);

        let settle = tokio::spawn(self.clone().settle((self.action)(arg)));
        settle.await.map_err(|_| DataError::Cancelled)?
    }

    async fn settle(self, job: BoxFuture<'static, DataResult<R>>) -> DataResult<R> {
        let result = self.queue.run(&self.lane, job).await;

        match &result {
            Ok(response) => {
                self.state.reduce(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    state.error = None;
                    state.data = Some(response.clone());
                });
                crate::log_mutation_success!("Mutation succeeded on lane: {}", self.lane);
                for key in &self.invalidates {
                    self.store.revalidate(key).await;
                }
            }
            Err(error) => {
                self.state.reduce(|state| {
                    state.in_flight = state.in_flight.saturating_sub(1);
                    state.error = Some(error.clone());
                });
                crate::log_mutation_error!("Mutation failed on lane: {}: {}", self.lane, error);
            }
        }
        result
    }

    pub fn is_mutating(&self) -> bool {
        self.state.read(MutationState::is_mutating)
    }

    pub fn error(&self) -> Option<DataError> {
        self.state.read(|state| state.error.clone())
    }

    pub fn state(&self) -> MutationState<R> {
        self.state.snapshot()
    }

    /// Receives every state change.
    pub fn watch(&self) -> watch::Receiver<MutationState<R>> {
        self.state.watch()
    }

    /// Clears the recorded error and response.
    pub fn reset(&self) {
        self.state.reduce(|state| {
            state.error = None;
            state.data = None;
        });
    }
}
