//! In-memory [`StorefrontApi`] for unit tests
//!
//! Responses are canned JSON values (or errors) per method name; every call is
//! recorded so tests can assert on network traffic.

use std::{
    collections::{HashMap, VecDeque},
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{
    api::StorefrontApi,
    errors::{DataError, DataResult},
    schema::*,
};

#[derive(Default)]
pub(crate) struct FakeApi {
    responses: Mutex<HashMap<String, DataResult<Value>>>,
    once: Mutex<HashMap<String, VecDeque<Value>>>,
    delays: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl FakeApi {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn respond(&self, call: &str, value: Value) {
        self.responses
            .lock()
            .unwrap()
            .insert(call.to_string(), Ok(value));
    }

    /// Answers the next `call` with `value`, chosen when the call starts.
    pub(crate) fn respond_once(&self, call: &str, value: Value) {
        self.once
            .lock()
            .unwrap()
            .entry(call.to_string())
            .or_default()
            .push_back(value);
    }

    pub(crate) fn fail(&self, call: &str, error: DataError) {
        self.responses
            .lock()
            .unwrap()
            .insert(call.to_string(), Err(error));
    }

    pub(crate) fn delay(&self, call: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(call.to_string(), delay);
    }

    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|call| call.starts_with(prefix))
            .count()
    }

    /// Looks up `call` first, then its method name (the part before `:`).
    async fn answer<T: DeserializeOwned>(&self, call: String) -> DataResult<T> {
        self.calls.lock().unwrap().push(call.clone());
        let method = call.split(':').next().unwrap_or(&call).to_string();
        let scripted = {
            let mut once = self.once.lock().unwrap();
            [&call, &method]
                .into_iter()
                .find_map(|name| once.get_mut(name.as_str())?.pop_front())
        };

        let delay = {
            let delays = self.delays.lock().unwrap();
            delays.get(&call).or_else(|| delays.get(&method)).copied()
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let response = match scripted {
            Some(value) => Some(Ok(value)),
            None => {
                let responses = self.responses.lock().unwrap();
                responses
                    .get(&call)
                    .or_else(|| responses.get(&method))
                    .cloned()
            }
        };
        match response {
            Some(Ok(value)) => Ok(serde_json::from_value(value)?),
            Some(Err(error)) => Err(error),
            None => Err(DataError::api(404, format!("no canned response for {call}"))),
        }
    }
}

#[async_trait]
impl StorefrontApi for FakeApi {
    async fn list_items(&self, request: PageRequest) -> DataResult<Page<Product>> {
        match request {
            PageRequest::First(_) => self.answer("list_items:first".into()).await,
            PageRequest::Cursor(url) => self.answer(format!("list_items:{url}")).await,
        }
    }

    async fn promoted_products(&self) -> DataResult<Vec<Product>> {
        self.answer("promoted_products".into()).await
    }

    async fn category_data(&self, selection: CategorySelection) -> DataResult<CategoryData> {
        self.answer(format!("category_data:{}", selection.to_body()))
            .await
    }

    async fn item_details(&self, item_id: ProductId) -> DataResult<ProductDetail> {
        self.answer(format!("item_details:{item_id}")).await
    }

    async fn add_item(&self, form: ItemForm) -> DataResult<Product> {
        self.answer(format!("add_item:{}", form.name)).await
    }

    async fn update_item(&self, item_id: ProductId, _form: ItemForm) -> DataResult<Product> {
        self.answer(format!("update_item:{item_id}")).await
    }

    async fn delete_item_image(&self, image_id: ImageId) -> DataResult<ApiMessage> {
        self.answer(format!("delete_item_image:{image_id}")).await
    }

    async fn report_abuse(&self, report: AbuseReport) -> DataResult<ApiMessage> {
        self.answer(format!("report_abuse:{}", report.item_id)).await
    }

    async fn submit_review(&self, review: ReviewSubmission) -> DataResult<ReviewEntry> {
        self.answer(format!("submit_review:{}", review.item_id)).await
    }

    async fn user_profile(&self) -> DataResult<UserProfile> {
        self.answer("user_profile".into()).await
    }

    async fn update_user_profile(&self, _form: ProfileForm) -> DataResult<UserProfile> {
        self.answer("update_user_profile".into()).await
    }

    async fn change_password(&self, _change: PasswordChange) -> DataResult<ApiMessage> {
        self.answer("change_password".into()).await
    }

    async fn messages(&self) -> DataResult<Vec<RemoteMessage>> {
        self.answer("messages".into()).await
    }

    async fn send_message(&self, message: OutgoingMessage) -> DataResult<RemoteMessage> {
        self.answer(format!("send_message:{}", message.body)).await
    }

    async fn wishlist(&self) -> DataResult<Vec<Product>> {
        self.answer("wishlist".into()).await
    }

    async fn wish_unwish(&self, item_id: ProductId) -> DataResult<WishStatus> {
        self.answer(format!("wish_unwish:{item_id}")).await
    }

    async fn shop_profile(&self, user_id: UserId) -> DataResult<ShopProfile> {
        self.answer(format!("shop_profile:{user_id}")).await
    }

    async fn faqs(&self) -> DataResult<Vec<Faq>> {
        self.answer("faqs".into()).await
    }

    async fn subscribe_newsletter(&self, email: String) -> DataResult<ApiMessage> {
        self.answer(format!("subscribe_newsletter:{email}")).await
    }

    async fn contact_us(&self, _form: ContactForm) -> DataResult<ApiMessage> {
        self.answer("contact_us".into()).await
    }

    async fn search(&self, query: String) -> DataResult<Vec<Product>> {
        self.answer(format!("search:{query}")).await
    }
}

/// Minimal product JSON
pub(crate) fn product(id: i64, name: &str) -> Value {
    serde_json::json!({ "id": id, "name": name })
}
