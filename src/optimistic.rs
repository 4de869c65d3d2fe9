//! Optimistic mutations
//!
//! An [`OptimisticMutation`] describes a write whose effect is shown before the
//! server confirms it. [`OptimisticRunner::run`] drives every such write the
//! same way:
//!
//! 1. without a signed-in user, signal `LoginRequired` and fail with
//!    [`DataError::AuthRequired`] before any network call;
//! 2. apply the optimistic change to its [`Slice`];
//! 3. commit through the mutation's queue lane;
//! 4. on success reconcile with the server response and revalidate the
//!    mutation's keys, on failure roll the change back.
//!
//! The wishlist toggle and chat send are the two implementations.

use std::{
    collections::{HashMap, HashSet},
    sync::Arc,
};

use chrono::{DateTime, Utc};
use futures::{FutureExt, future::BoxFuture};
use uuid::Uuid;

use crate::{
    api::StorefrontApi,
    cache::CacheStore,
    errors::{DataError, DataResult},
    key::{CacheKey, keys},
    mutation::MutationQueue,
    schema::{OutgoingMessage, Product, ProductId, RemoteMessage, UserId, WishStatus},
    session::{AuthUser, Session},
    slice::Slice,
};

/// A write with an immediate local effect
pub trait OptimisticMutation: Send + 'static {
    /// State the optimistic effect is applied to
    type State: Send + Sync + 'static;
    /// Server response of the commit
    type Output: Send + 'static;

    /// Action name reported with `LoginRequired`
    fn name(&self) -> &'static str;

    /// Queue lane; commits sharing a lane run in order
    fn lane(&self) -> String;

    /// Refuses the mutation before anything is applied.
    fn precondition(&self, _state: &Self::State) -> DataResult<()> {
        Ok(())
    }

    fn apply(&self, state: &mut Self::State, user: &AuthUser);

    fn commit(&self) -> BoxFuture<'static, DataResult<Self::Output>>;

    fn reconcile(&self, state: &mut Self::State, output: &Self::Output);

    /// Undoes exactly what `apply` did.
    fn rollback(&self, state: &mut Self::State, error: &DataError);

    /// Keys revalidated after a successful commit
    fn invalidates(&self) -> Vec<CacheKey> {
        Vec::new()
    }
}

/// Runs optimistic mutations against the session, queue and cache
#[derive(Clone)]
pub struct OptimisticRunner {
    session: Session,
    queue: MutationQueue,
    store: CacheStore,
}

impl OptimisticRunner {
    pub fn new(session: Session, queue: MutationQueue, store: CacheStore) -> Self {
        Self {
            session,
            queue,
            store,
        }
    }

    pub async fn run<M: OptimisticMutation>(
        &self,
        slice: &Slice<M::State>,
        mutation: M,
    ) -> DataResult<M::Output> {
        let user = self.session.require_user(mutation.name())?;

        let mut refused = None;
        slice.reduce_if(|state| match mutation.precondition(state) {
            Ok(()) => {
                mutation.apply(state, &user);
                true
            }
            Err(error) => {
                refused = Some(error);
                false
            }
        });
        if let Some(error) = refused {
            crate::debug_log!("Refused {}: {}", mutation.name(), error);
            return Err(error);
        }

        let lane = mutation.lane();
        crate::log_optimistic!("Applied {} on lane: {}", mutation.name(), lane);

        // once applied, the change is settled even if the caller goes away
        let settle = tokio::spawn(Self::settle(
            self.queue.clone(),
            self.store.clone(),
            slice.clone(),
            mutation,
            lane,
        ));
        settle.await.map_err(|_| DataError::Cancelled)?
    }

    async fn settle<M: OptimisticMutation>(
        queue: MutationQueue,
        store: CacheStore,
        slice: Slice<M::State>,
        mutation: M,
        lane: String,
    ) -> DataResult<M::Output> {
        match queue.run(&lane, mutation.commit()).await {
            Ok(output) => {
                slice.reduce(|state| mutation.reconcile(state, &output));
                crate::log_mutation_success!("{} confirmed on lane: {}", mutation.name(), lane);
                for key in mutation.invalidates() {
                    store.revalidate(&key).await;
                }
                Ok(output)
            }
            Err(error) => {
                slice.reduce(|state| mutation.rollback(state, &error));
                crate::log_rollback!("Rolled back {} on lane: {}: {}", mutation.name(), lane, error);
                Err(error)
            }
        }
    }
}

/// Direction of an unconfirmed wishlist toggle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PendingToggle {
    Add,
    Remove,
}

/// Wishlist membership of one product as the UI should show it
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Membership {
    NotInWishlist,
    Pending(PendingToggle),
    InWishlist,
}

/// Wishlisted product ids, with unconfirmed toggles already applied
#[derive(Debug, Clone, Default, PartialEq)]
pub struct WishlistState {
    ids: HashSet<ProductId>,
    pending: HashMap<ProductId, PendingToggle>,
}

impl WishlistState {
    pub fn from_ids(ids: impl IntoIterator<Item = ProductId>) -> Self {
        Self {
            ids: ids.into_iter().collect(),
            pending: HashMap::new(),
        }
    }

    pub fn membership(&self, item_id: ProductId) -> Membership {
        match self.pending.get(&item_id) {
            Some(toggle) => Membership::Pending(*toggle),
            None if self.ids.contains(&item_id) => Membership::InWishlist,
            None => Membership::NotInWishlist,
        }
    }

    /// Whether the item shows as wishlisted, counting pending adds.
    pub fn contains(&self, item_id: ProductId) -> bool {
        self.ids.contains(&item_id)
    }

    pub fn is_pending(&self, item_id: ProductId) -> bool {
        self.pending.contains_key(&item_id)
    }

    /// Wishlisted ids in ascending order.
    pub fn ids(&self) -> Vec<ProductId> {
        let mut ids: Vec<_> = self.ids.iter().copied().collect();
        ids.sort_unstable();
        ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Resets membership to the server's list, then re-applies pending toggles.
    pub fn sync(&mut self, server_ids: impl IntoIterator<Item = ProductId>) {
        self.ids = server_ids.into_iter().collect();
        for (item_id, toggle) in &self.pending {
            match toggle {
                PendingToggle::Add => self.ids.insert(*item_id),
                PendingToggle::Remove => self.ids.remove(item_id),
            };
        }
    }

    pub fn sync_products(&mut self, products: &[Product]) {
        self.sync(products.iter().map(|product| product.id));
    }
}

/// Adds or removes one product through `/wishunwish/`
pub struct WishlistToggle {
    api: Arc<dyn StorefrontApi>,
    item_id: ProductId,
}

impl WishlistToggle {
    pub fn new(api: Arc<dyn StorefrontApi>, item_id: ProductId) -> Self {
        Self { api, item_id }
    }
}

impl OptimisticMutation for WishlistToggle {
    type State = WishlistState;
    type Output = WishStatus;

    fn name(&self) -> &'static str {
        "wishlist"
    }

    fn lane(&self) -> String {
        format!("wishunwish/{}", self.item_id)
    }

    fn precondition(&self, state: &WishlistState) -> DataResult<()> {
        if state.is_pending(self.item_id) {
            return Err(DataError::MutationPending(format!(
                "wishlist item {}",
                self.item_id
            )));
        }
        Ok(())
    }

    fn apply(&self, state: &mut WishlistState, _user: &AuthUser) {
        let toggle = if state.ids.remove(&self.item_id) {
            PendingToggle::Remove
        } else {
            state.ids.insert(self.item_id);
            PendingToggle::Add
        };
        state.pending.insert(self.item_id, toggle);
    }

    fn commit(&self) -> BoxFuture<'static, DataResult<WishStatus>> {
        let api = self.api.clone();
        let item_id = self.item_id;
        async move { api.wish_unwish(item_id).await }.boxed()
    }

    fn reconcile(&self, state: &mut WishlistState, output: &WishStatus) {
        state.pending.remove(&self.item_id);
        if output.wished {
            state.ids.insert(self.item_id);
        } else {
            state.ids.remove(&self.item_id);
        }
    }

    fn rollback(&self, state: &mut WishlistState, _error: &DataError) {
        match state.pending.remove(&self.item_id) {
            Some(PendingToggle::Add) => {
                state.ids.remove(&self.item_id);
            }
            Some(PendingToggle::Remove) => {
                state.ids.insert(self.item_id);
            }
            None => {}
        }
    }

    fn invalidates(&self) -> Vec<CacheKey> {
        vec![keys::user_wishlist()]
    }
}

/// Wishlist actions bound to a runtime
#[derive(Clone)]
pub struct WishlistActions {
    runner: OptimisticRunner,
    api: Arc<dyn StorefrontApi>,
    state: Slice<WishlistState>,
}

impl WishlistActions {
    pub fn new(
        runner: OptimisticRunner,
        api: Arc<dyn StorefrontApi>,
        state: Slice<WishlistState>,
    ) -> Self {
        Self { runner, api, state }
    }

    /// Flips membership of `item_id` optimistically.
    ///
    /// Fails with `MutationPending` while an earlier toggle of the same item is
    /// unconfirmed.
    pub async fn toggle(&self, item_id: ProductId) -> DataResult<WishStatus> {
        self.runner
            .run(&self.state, WishlistToggle::new(self.api.clone(), item_id))
            .await
    }

    pub fn membership(&self, item_id: ProductId) -> Membership {
        self.state.read(|state| state.membership(item_id))
    }

    pub fn state(&self) -> &Slice<WishlistState> {
        &self.state
    }
}

/// Identity of a chat message: local until the server assigns one
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageId {
    Local(Uuid),
    Remote(i64),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryStatus {
    Sending,
    Sent,
    Error,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    pub id: MessageId,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    pub item_id: Option<ProductId>,
    pub body: String,
    pub sent_at: DateTime<Utc>,
    pub status: DeliveryStatus,
}

impl From<&RemoteMessage> for ChatMessage {
    fn from(message: &RemoteMessage) -> Self {
        Self {
            id: MessageId::Remote(message.id),
            sender_id: message.sender_id,
            recipient_id: message.recipient_id,
            item_id: message.item_id,
            body: message.body.clone(),
            sent_at: message.sent_at,
            status: DeliveryStatus::Sent,
        }
    }
}

/// Chat messages: server history plus local, unconfirmed sends
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatState {
    messages: Vec<ChatMessage>,
}

impl ChatState {
    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn get(&self, id: MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|message| message.id == id)
    }

    fn get_mut(&mut self, id: MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|message| message.id == id)
    }

    /// Messages exchanged with `user_id`, oldest first.
    pub fn conversation(&self, user_id: UserId) -> Vec<&ChatMessage> {
        self.messages
            .iter()
            .filter(|message| message.sender_id == user_id || message.recipient_id == user_id)
            .collect()
    }

    pub fn pending_count(&self) -> usize {
        self.messages
            .iter()
            .filter(|message| message.status == DeliveryStatus::Sending)
            .count()
    }

    /// Replaces confirmed messages with the server's history, keeping
    /// unconfirmed local ones after it.
    pub fn sync(&mut self, remote: &[RemoteMessage]) {
        let local: Vec<ChatMessage> = self
            .messages
            .drain(..)
            .filter(|message| matches!(message.id, MessageId::Local(_)))
            .collect();
        self.messages = remote.iter().map(ChatMessage::from).collect();
        self.messages.sort_by_key(|message| message.sent_at);
        self.messages.extend(local);
    }

    fn remove(&mut self, id: MessageId) -> Option<ChatMessage> {
        let index = self.messages.iter().position(|message| message.id == id)?;
        Some(self.messages.remove(index))
    }
}

/// Sends one chat message through `/sendmessage/`
pub struct ChatSend {
    api: Arc<dyn StorefrontApi>,
    local_id: Uuid,
    message: OutgoingMessage,
}

impl ChatSend {
    pub fn new(api: Arc<dyn StorefrontApi>, message: OutgoingMessage) -> Self {
        Self {
            api,
            local_id: Uuid::new_v4(),
            message,
        }
    }

    pub fn local_id(&self) -> MessageId {
        MessageId::Local(self.local_id)
    }
}

impl OptimisticMutation for ChatSend {
    type State = ChatState;
    type Output = RemoteMessage;

    fn name(&self) -> &'static str {
        "chat"
    }

    fn lane(&self) -> String {
        format!("sendmessage/{}", self.message.recipient_id)
    }

    fn apply(&self, state: &mut ChatState, user: &AuthUser) {
        state.messages.push(ChatMessage {
            id: self.local_id(),
            sender_id: user.id,
            recipient_id: self.message.recipient_id,
            item_id: self.message.item_id,
            body: self.message.body.clone(),
            sent_at: Utc::now(),
            status: DeliveryStatus::Sending,
        });
    }

    fn commit(&self) -> BoxFuture<'static, DataResult<RemoteMessage>> {
        let api = self.api.clone();
        let message = self.message.clone();
        async move { api.send_message(message).await }.boxed()
    }

    fn reconcile(&self, state: &mut ChatState, output: &RemoteMessage) {
        if let Some(message) = state.get_mut(self.local_id()) {
            message.id = MessageId::Remote(output.id);
            message.sent_at = output.sent_at;
            message.status = DeliveryStatus::Sent;
        }
    }

    fn rollback(&self, state: &mut ChatState, _error: &DataError) {
        if let Some(message) = state.get_mut(self.local_id()) {
            message.status = DeliveryStatus::Error;
        }
    }

    fn invalidates(&self) -> Vec<CacheKey> {
        vec![keys::messages()]
    }
}

/// Chat actions bound to a runtime
#[derive(Clone)]
pub struct ChatActions {
    runner: OptimisticRunner,
    api: Arc<dyn StorefrontApi>,
    state: Slice<ChatState>,
}

impl ChatActions {
    pub fn new(runner: OptimisticRunner, api: Arc<dyn StorefrontApi>, state: Slice<ChatState>) -> Self {
        Self { runner, api, state }
    }

    /// Shows the message as `Sending` right away and sends it.
    ///
    /// On failure the message stays in the list marked `Error`.
    pub async fn send(&self, message: OutgoingMessage) -> DataResult<RemoteMessage> {
        self.runner
            .run(&self.state, ChatSend::new(self.api.clone(), message))
            .await
    }

    /// Sends a failed message again under a new local id.
    pub async fn retry(&self, id: MessageId) -> DataResult<RemoteMessage> {
        let mut failed = None;
        self.state.reduce_if(|state| {
            if state
                .get(id)
                .is_some_and(|message| message.status == DeliveryStatus::Error)
            {
                failed = state.remove(id);
            }
            failed.is_some()
        });
        let Some(failed) = failed else {
            return Err(DataError::Configuration(format!(
                "no failed message with id {id:?}"
            )));
        };
        self.send(OutgoingMessage {
            recipient_id: failed.recipient_id,
            item_id: failed.item_id,
            body: failed.body,
        })
        .await
    }

    pub fn state(&self) -> &Slice<ChatState> {
        &self.state
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{fake_api::FakeApi, session::SessionEvent};
    use serde_json::json;
    use std::time::Duration;

    fn signed_in() -> Session {
        Session::signed_in(AuthUser {
            id: 1,
            token: "token".into(),
        })
    }

    fn wishlist(api: Arc<FakeApi>, session: Session) -> WishlistActions {
        let runner = OptimisticRunner::new(session, MutationQueue::new(), CacheStore::new());
        WishlistActions::new(runner, api, Slice::default())
    }

    #[tokio::test]
    async fn unauthenticated_toggle_makes_no_call() {
        let api = FakeApi::new();
        let session = Session::anonymous();
        let mut events = session.events();
        let actions = wishlist(api.clone(), session);

        assert_eq!(actions.toggle(8).await, Err(DataError::AuthRequired));

        assert!(api.calls().is_empty());
        assert_eq!(actions.membership(8), Membership::NotInWishlist);
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoginRequired {
                action: "wishlist".into()
            }
        );
    }

    #[tokio::test]
    async fn failed_toggle_rolls_back() {
        let api = FakeApi::new();
        api.fail("wish_unwish", DataError::api(500, "server error"));
        let actions = wishlist(api.clone(), signed_in());

        let result = actions.toggle(8).await;

        assert_eq!(result, Err(DataError::api(500, "server error")));
        assert_eq!(actions.membership(8), Membership::NotInWishlist);
        assert_eq!(api.call_count("wish_unwish"), 1);
    }

    #[tokio::test]
    async fn removal_rollback_restores_membership() {
        let api = FakeApi::new();
        api.fail("wish_unwish", DataError::Network("offline".into()));
        let actions = wishlist(api, signed_in());
        actions.state().replace(WishlistState::from_ids([8]));

        assert!(actions.toggle(8).await.is_err());
        assert_eq!(actions.membership(8), Membership::InWishlist);
    }

    #[tokio::test(start_paused = true)]
    async fn toggle_while_pending_is_refused() {
        let api = FakeApi::new();
        api.respond("wish_unwish", json!({"item_id": 8, "wished": true}));
        api.delay("wish_unwish", Duration::from_millis(50));
        let actions = wishlist(api.clone(), signed_in());

        let first = actions.toggle(8);
        let second = async {
            tokio::task::yield_now().await;
            assert_eq!(
                actions.membership(8),
                Membership::Pending(PendingToggle::Add)
            );
            actions.toggle(8).await
        };
        let (first, second) = tokio::join!(first, second);

        assert_eq!(
            first,
            Ok(WishStatus {
                item_id: 8,
                wished: true
            })
        );
        assert!(matches!(second, Err(DataError::MutationPending(_))));
        assert_eq!(actions.membership(8), Membership::InWishlist);
        assert_eq!(api.call_count("wish_unwish"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_toggle_still_settles() {
        let api = FakeApi::new();
        api.respond("wish_unwish", json!({"item_id": 8, "wished": true}));
        api.delay("wish_unwish", Duration::from_millis(50));
        let actions = wishlist(api.clone(), signed_in());

        let toggling = actions.clone();
        let task = tokio::spawn(async move { toggling.toggle(8).await });
        tokio::task::yield_now().await;
        assert_eq!(
            actions.membership(8),
            Membership::Pending(PendingToggle::Add)
        );
        task.abort();

        tokio::time::sleep(Duration::from_secs(1)).await;

        assert_eq!(actions.membership(8), Membership::InWishlist);
        api.respond("wish_unwish", json!({"item_id": 8, "wished": false}));
        assert!(actions.toggle(8).await.is_ok());
        assert_eq!(actions.membership(8), Membership::NotInWishlist);
        assert_eq!(api.call_count("wish_unwish"), 2);
    }

    #[test]
    fn sync_keeps_pending_toggles() {
        let mut state = WishlistState::from_ids([1, 2]);
        let user = AuthUser {
            id: 1,
            token: String::new(),
        };
        let api: Arc<dyn StorefrontApi> = FakeApi::new();
        WishlistToggle::new(api, 3).apply(&mut state, &user);

        state.sync([2]);

        assert_eq!(state.ids(), vec![2, 3]);
        assert_eq!(state.membership(3), Membership::Pending(PendingToggle::Add));
        assert_eq!(state.membership(1), Membership::NotInWishlist);
    }

    #[tokio::test]
    async fn chat_send_marks_sent_or_error() {
        let api = FakeApi::new();
        api.respond(
            "send_message:hello",
            json!({"id": 41, "sender_id": 1, "recipient_id": 2, "body": "hello",
                   "sent_at": "2024-05-01T10:00:00Z"}),
        );
        api.fail("send_message:fails", DataError::Network("offline".into()));
        let runner = OptimisticRunner::new(signed_in(), MutationQueue::new(), CacheStore::new());
        let chat = ChatActions::new(runner, api.clone(), Slice::default());

        let sent = chat
            .send(OutgoingMessage {
                recipient_id: 2,
                item_id: None,
                body: "hello".into(),
            })
            .await
            .unwrap();
        let failed = chat
            .send(OutgoingMessage {
                recipient_id: 2,
                item_id: None,
                body: "fails".into(),
            })
            .await;

        assert_eq!(sent.id, 41);
        assert_eq!(failed, Err(DataError::Network("offline".into())));
        let state = chat.state().snapshot();
        let statuses: Vec<_> = state
            .messages()
            .iter()
            .map(|message| (message.body.as_str(), message.status))
            .collect();
        assert_eq!(
            statuses,
            vec![
                ("hello", DeliveryStatus::Sent),
                ("fails", DeliveryStatus::Error)
            ]
        );
        assert_eq!(state.messages()[0].id, MessageId::Remote(41));
    }

    #[tokio::test]
    async fn unauthenticated_send_makes_no_call() {
        let api = FakeApi::new();
        let session = Session::anonymous();
        let mut events = session.events();
        let runner = OptimisticRunner::new(session, MutationQueue::new(), CacheStore::new());
        let chat = ChatActions::new(runner, api.clone(), Slice::default());

        let result = chat
            .send(OutgoingMessage {
                recipient_id: 2,
                item_id: None,
                body: "hello".into(),
            })
            .await;

        assert_eq!(result, Err(DataError::AuthRequired));
        assert!(api.calls().is_empty());
        assert_eq!(
            events.try_recv().unwrap(),
            SessionEvent::LoginRequired {
                action: "chat".into()
            }
        );
        assert!(chat.state().read(|state| state.messages().is_empty()));
    }

    #[tokio::test(start_paused = true)]
    async fn abandoned_send_is_still_confirmed() {
        let api = FakeApi::new();
        api.respond(
            "send_message",
            json!({"id": 12, "sender_id": 1, "recipient_id": 2, "body": "still there?",
                   "sent_at": "2024-05-01T10:00:00Z"}),
        );
        api.delay("send_message", Duration::from_millis(50));
        let runner = OptimisticRunner::new(signed_in(), MutationQueue::new(), CacheStore::new());
        let chat = ChatActions::new(runner, api, Slice::default());

        let sending = chat.clone();
        let task = tokio::spawn(async move {
            sending
                .send(OutgoingMessage {
                    recipient_id: 2,
                    item_id: None,
                    body: "still there?".into(),
                })
                .await
        });
        tokio::task::yield_now().await;
        assert_eq!(chat.state().read(ChatState::pending_count), 1);
        task.abort();

        tokio::time::sleep(Duration::from_secs(1)).await;

        let state = chat.state().snapshot();
        assert_eq!(state.pending_count(), 0);
        assert_eq!(state.messages()[0].id, MessageId::Remote(12));
        assert_eq!(state.messages()[0].status, DeliveryStatus::Sent);
    }

    #[tokio::test]
    async fn retry_resends_failed_message() {
        let api = FakeApi::new();
        api.fail("send_message", DataError::Network("offline".into()));
        let runner = OptimisticRunner::new(signed_in(), MutationQueue::new(), CacheStore::new());
        let chat = ChatActions::new(runner, api.clone(), Slice::default());
        let outgoing = OutgoingMessage {
            recipient_id: 2,
            item_id: Some(5),
            body: "again".into(),
        };
        assert!(chat.send(outgoing).await.is_err());
        let failed_id = chat.state().read(|state| state.messages()[0].id);

        api.respond(
            "send_message",
            json!({"id": 7, "sender_id": 1, "recipient_id": 2, "item_id": 5,
                   "body": "again", "sent_at": "2024-05-01T10:00:00Z"}),
        );
        let resent = chat.retry(failed_id).await.unwrap();

        assert_eq!(resent.id, 7);
        assert_eq!(chat.state().read(|state| state.messages().len()), 1);
        assert!(chat.retry(failed_id).await.is_err());
    }

    #[test]
    fn sync_keeps_local_messages_after_history() {
        let mut state = ChatState::default();
        state.messages.push(ChatMessage {
            id: MessageId::Local(Uuid::new_v4()),
            sender_id: 1,
            recipient_id: 2,
            item_id: None,
            body: "pending".into(),
            sent_at: Utc::now(),
            status: DeliveryStatus::Sending,
        });
        let remote: Vec<RemoteMessage> = serde_json::from_value(json!([
            {"id": 2, "sender_id": 2, "recipient_id": 1, "body": "b", "sent_at": "2024-05-01T10:05:00Z"},
            {"id": 1, "sender_id": 1, "recipient_id": 2, "body": "a", "sent_at": "2024-05-01T10:00:00Z"}
        ]))
        .unwrap();

        state.sync(&remote);

        let bodies: Vec<_> = state.messages().iter().map(|m| m.body.as_str()).collect();
        assert_eq!(bodies, vec!["a", "b", "pending"]);
        assert_eq!(state.pending_count(), 1);
        assert_eq!(state.conversation(2).len(), 3);
    }
}
