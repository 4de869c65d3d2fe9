//! # Mutation hooks
//!
//! Writes bound to a component. Every hook here keeps its core handle for the
//! component's lifetime and mirrors the handle's state into a signal, so
//! `is_mutating()` and `error()` re-render the component when they change.

use dioxus::prelude::*;

use crate::{
    commands::{CommandHandler, CommandOutcome, StorefrontCommand},
    errors::{DataError, DataResult},
    key::{CacheKey, keys},
    mutation::MutationHandle,
    optimistic::{ChatActions, ChatMessage, ChatState, Membership, MessageId, WishlistActions, WishlistState},
    schema::*,
    state::MutationState,
    types::{Action, MutationArgBounds, action},
};

use super::provider::{use_storefront, use_watch_signal};

/// A mutation handle bound to a component
pub struct UseMutation<A: 'static, R: 'static> {
    handle: MutationHandle<A, R>,
    state: Signal<MutationState<R>>,
}

impl<A: 'static, R: 'static> Clone for UseMutation<A, R> {
    fn clone(&self) -> Self {
        Self {
            handle: self.handle.clone(),
            state: self.state,
        }
    }
}

impl<A, R> UseMutation<A, R>
where
    A: MutationArgBounds,
    R: Clone + Send + Sync + 'static,
{
    /// Fires the mutation in the background. The outcome lands in [`Self::state`].
    pub fn trigger(&self, arg: A) {
        let handle = self.handle.clone();
        spawn(async move {
            let _ = handle.trigger(arg).await;
        });
    }

    /// Runs the mutation and returns its result.
    pub async fn trigger_async(&self, arg: A) -> DataResult<R> {
        self.handle.trigger(arg).await
    }

    pub fn state(&self) -> MutationState<R> {
        self.state.read().clone()
    }

    pub fn is_mutating(&self) -> bool {
        self.state.read().is_mutating()
    }

    pub fn error(&self) -> Option<DataError> {
        self.state.read().error.clone()
    }

    /// Response of the last successful trigger.
    pub fn data(&self) -> Option<R> {
        self.state.read().data.clone()
    }

    pub fn reset(&self) {
        self.handle.reset();
    }

    pub fn handle(&self) -> &MutationHandle<A, R> {
        &self.handle
    }
}

/// Binds a mutation on `lane` that revalidates `invalidates` after each success.
///
/// Lane, action and keys are read on first render only.
pub fn use_mutation<A, R>(
    lane: impl Into<String>,
    action: Action<A, R>,
    invalidates: Vec<CacheKey>,
) -> UseMutation<A, R>
where
    A: MutationArgBounds,
    R: Clone + Send + Sync + 'static,
{
    let runtime = use_storefront();
    let handle = use_hook(|| runtime.mutation(lane, action).invalidates(invalidates));
    let watched = handle.clone();
    let state = use_watch_signal(move || watched.watch());
    UseMutation { handle, state }
}

/// Creates a listing. The seller's shop page is refreshed afterwards.
pub fn use_add_new_product() -> UseMutation<ItemForm, Product> {
    let runtime = use_storefront();
    let api = runtime.api();
    let store = runtime.store().clone();
    let session = runtime.session().clone();
    use_mutation(
        "additem",
        action(move |form: ItemForm| {
            let api = api.clone();
            let store = store.clone();
            let session = session.clone();
            async move {
                session.require_user("add_item")?;
                let product = api.add_item(form).await?;
                if let Some(seller_id) = product.seller_id {
                    store.revalidate(&keys::shop_profile(seller_id)).await;
                }
                Ok(product)
            }
        }),
        Vec::new(),
    )
}

/// Edits a listing. Its detail page and the seller's shop page are refreshed
/// afterwards.
pub fn use_update_product() -> UseMutation<(ProductId, ItemForm), Product> {
    let runtime = use_storefront();
    let api = runtime.api();
    let store = runtime.store().clone();
    let session = runtime.session().clone();
    use_mutation(
        "updateitem",
        action(move |(item_id, form): (ProductId, ItemForm)| {
            let api = api.clone();
            let store = store.clone();
            let session = session.clone();
            async move {
                session.require_user("update_item")?;
                let product = api.update_item(item_id, form).await?;
                store.revalidate(&keys::item_details(item_id)).await;
                if let Some(seller_id) = product.seller_id {
                    store.revalidate(&keys::shop_profile(seller_id)).await;
                }
                Ok(product)
            }
        }),
        Vec::new(),
    )
}

/// Optimistic chat bound to a component
#[derive(Clone)]
pub struct ChatHandle {
    actions: ChatActions,
    state: Signal<ChatState>,
}

impl ChatHandle {
    /// Shows `message` immediately as sending, then posts it.
    pub fn send(&self, message: OutgoingMessage) {
        let actions = self.actions.clone();
        spawn(async move {
            let _ = actions.send(message).await;
        });
    }

    /// Resends a message whose delivery failed.
    pub fn retry(&self, id: MessageId) {
        let actions = self.actions.clone();
        spawn(async move {
            let _ = actions.retry(id).await;
        });
    }

    pub fn messages(&self) -> Vec<ChatMessage> {
        self.state.read().messages().to_vec()
    }

    /// Messages exchanged with `user_id`, oldest first.
    pub fn conversation(&self, user_id: UserId) -> Vec<ChatMessage> {
        self.state
            .read()
            .conversation(user_id)
            .into_iter()
            .cloned()
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.state.read().pending_count()
    }
}

pub fn use_send_message() -> ChatHandle {
    let runtime = use_storefront();
    let actions = use_hook(|| runtime.chat_actions());
    let watched = actions.clone();
    let state = use_watch_signal(move || watched.state().watch());
    ChatHandle { actions, state }
}

/// Optimistic wishlist bound to a component
#[derive(Clone)]
pub struct WishlistHandle {
    actions: WishlistActions,
    state: Signal<WishlistState>,
}

impl WishlistHandle {
    /// Flips membership of `item_id` now and confirms it with the server.
    ///
    /// Signed-out users get a login prompt instead.
    pub fn toggle(&self, item_id: ProductId) {
        let actions = self.actions.clone();
        spawn(async move {
            let _ = actions.toggle(item_id).await;
        });
    }

    pub fn membership(&self, item_id: ProductId) -> Membership {
        self.state.read().membership(item_id)
    }

    pub fn contains(&self, item_id: ProductId) -> bool {
        self.state.read().contains(item_id)
    }

    pub fn is_pending(&self, item_id: ProductId) -> bool {
        self.state.read().is_pending(item_id)
    }

    pub fn len(&self) -> usize {
        self.state.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().is_empty()
    }
}

pub fn use_wishlist_actions() -> WishlistHandle {
    let runtime = use_storefront();
    let actions = use_hook(|| runtime.wishlist_actions());
    let watched = actions.clone();
    let state = use_watch_signal(move || watched.state().watch());
    WishlistHandle { actions, state }
}

/// Command dispatch bound to a component
#[derive(Clone)]
pub struct CommandHandle {
    handler: CommandHandler,
    last: Signal<Option<DataResult<CommandOutcome>>>,
    running: Signal<usize>,
}

impl CommandHandle {
    /// Dispatches `command` in the background; its outcome becomes [`Self::last`].
    pub fn dispatch(&self, command: StorefrontCommand) {
        let handler = self.handler.clone();
        let mut last = self.last;
        let mut running = self.running;
        running += 1;
        spawn(async move {
            let outcome = handler.dispatch(command).await;
            last.set(Some(outcome));
            running -= 1;
        });
    }

    /// Outcome of the most recently finished command.
    pub fn last(&self) -> Option<DataResult<CommandOutcome>> {
        self.last.read().clone()
    }

    pub fn is_running(&self) -> bool {
        *self.running.read() > 0
    }

    pub fn handler(&self) -> &CommandHandler {
        &self.handler
    }
}

pub fn use_command_handler() -> CommandHandle {
    let runtime = use_storefront();
    let handler = use_hook(|| runtime.command_handler());
    let last = use_signal(|| None);
    let running = use_signal(|| 0);
    CommandHandle {
        handler,
        last,
        running,
    }
}
