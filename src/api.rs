//! Fetchers for the storefront API
//!
//! [`StorefrontApi`] is the seam between the data layer and the server: one
//! async method per endpoint, each returning a typed payload. [`ApiClient`] is
//! the HTTP implementation; tests substitute their own.
//!
//! Response conventions of the storefront server:
//! - product lists are pages `{"results": [...], "next": url|null, "count": n}`;
//! - other reads and entity-returning writes are wrapped as `{"data": ...}`;
//! - acknowledgements are `{"message": "..."}`;
//! - failures are non-2xx with `{"message"|"detail": "...", "errors": {field: [msg]}}`.

use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{
    RequestBuilder, StatusCode,
    multipart::{Form, Part},
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    errors::{DataError, DataResult},
    schema::*,
    session::Session,
};

/// One async method per storefront endpoint
#[async_trait]
pub trait StorefrontApi: Send + Sync + 'static {
    /// `/getitems/` (first page, filter as body) or the cursor URL of a later page
    async fn list_items(&self, request: PageRequest) -> DataResult<Page<Product>>;
    async fn promoted_products(&self) -> DataResult<Vec<Product>>;
    async fn category_data(&self, selection: CategorySelection) -> DataResult<CategoryData>;
    async fn item_details(&self, item_id: ProductId) -> DataResult<ProductDetail>;
    async fn add_item(&self, form: ItemForm) -> DataResult<Product>;
    async fn update_item(&self, item_id: ProductId, form: ItemForm) -> DataResult<Product>;
    async fn delete_item_image(&self, image_id: ImageId) -> DataResult<ApiMessage>;
    async fn report_abuse(&self, report: AbuseReport) -> DataResult<ApiMessage>;
    async fn submit_review(&self, review: ReviewSubmission) -> DataResult<ReviewEntry>;
    async fn user_profile(&self) -> DataResult<UserProfile>;
    async fn update_user_profile(&self, form: ProfileForm) -> DataResult<UserProfile>;
    async fn change_password(&self, change: PasswordChange) -> DataResult<ApiMessage>;
    async fn messages(&self) -> DataResult<Vec<RemoteMessage>>;
    async fn send_message(&self, message: OutgoingMessage) -> DataResult<RemoteMessage>;
    async fn wishlist(&self) -> DataResult<Vec<Product>>;
    async fn wish_unwish(&self, item_id: ProductId) -> DataResult<WishStatus>;
    async fn shop_profile(&self, user_id: UserId) -> DataResult<ShopProfile>;
    async fn faqs(&self) -> DataResult<Vec<Faq>>;
    async fn subscribe_newsletter(&self, email: String) -> DataResult<ApiMessage>;
    async fn contact_us(&self, form: ContactForm) -> DataResult<ApiMessage>;
    async fn search(&self, query: String) -> DataResult<Vec<Product>>;
}

/// HTTP client for the storefront API.
pub struct ApiClient {
    address: String,
    inner_client: reqwest::Client,
    session: Session,
}

/// Helper methods for http actions
impl ApiClient {
    pub fn new(address: impl Into<String>, session: Session) -> Self {
        Self::with_client(address, reqwest::Client::new(), session)
    }

    pub fn with_client(
        address: impl Into<String>,
        inner_client: reqwest::Client,
        session: Session,
    ) -> Self {
        Self {
            address: address.into().trim_end_matches('/').to_string(),
            inner_client,
            session,
        }
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    fn format_url(&self, path: &str) -> String {
        format!("{}/{}", self.address, path.trim_start_matches('/'))
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        match self.session.token() {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    async fn get<T: DeserializeOwned>(&self, path: &str) -> DataResult<T> {
        self.get_url(&self.format_url(path)).await
    }

    async fn get_url<T: DeserializeOwned>(&self, url: &str) -> DataResult<T> {
        let response = self.authorize(self.inner_client.get(url)).send().await?;
        ok_body(response).await
    }

    async fn get_query<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &(impl Serialize + ?Sized),
    ) -> DataResult<T> {
        let request = self.inner_client.get(self.format_url(path)).query(query);
        let response = self.authorize(request).send().await?;
        ok_body(response).await
    }

    async fn post<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized),
    ) -> DataResult<T> {
        let request = self.inner_client.post(self.format_url(path)).json(body);
        let response = self.authorize(request).send().await?;
        ok_body(response).await
    }

    async fn post_multipart<T: DeserializeOwned>(&self, path: &str, form: Form) -> DataResult<T> {
        let request = self.inner_client.post(self.format_url(path)).multipart(form);
        let response = self.authorize(request).send().await?;
        ok_body(response).await
    }

    async fn get_data<T: DeserializeOwned>(&self, path: &str) -> DataResult<T> {
        self.get::<Envelope<T>>(path).await.map(|envelope| envelope.data)
    }

    async fn post_data<T: DeserializeOwned>(
        &self,
        path: &str,
        body: &(impl Serialize + ?Sized),
    ) -> DataResult<T> {
        self.post::<Envelope<T>>(path, body)
            .await
            .map(|envelope| envelope.data)
    }
}

/// Methods on the storefront API
#[async_trait]
impl StorefrontApi for ApiClient {
    async fn list_items(&self, request: PageRequest) -> DataResult<Page<Product>> {
        match request {
            PageRequest::First(filter) => self.post("getitems/", &filter).await,
            PageRequest::Cursor(url) => self.get_url(&url).await,
        }
    }

    async fn promoted_products(&self) -> DataResult<Vec<Product>> {
        self.get_data("getpromoteditems/").await
    }

    async fn category_data(&self, selection: CategorySelection) -> DataResult<CategoryData> {
        self.post_data("getcategorydata/", &selection.to_body()).await
    }

    async fn item_details(&self, item_id: ProductId) -> DataResult<ProductDetail> {
        self.get_query::<Envelope<ProductDetail>>("getitemdetails/", &ItemLookup { item_id })
            .await
            .map(|envelope| envelope.data)
    }

    async fn add_item(&self, form: ItemForm) -> DataResult<Product> {
        let multipart = item_multipart(&form, None)?;
        self.post_multipart::<Envelope<Product>>("additem/", multipart)
            .await
            .map(|envelope| envelope.data)
    }

    async fn update_item(&self, item_id: ProductId, form: ItemForm) -> DataResult<Product> {
        let multipart = item_multipart(&form, Some(item_id))?;
        self.post_multipart::<Envelope<Product>>("updateitem/", multipart)
            .await
            .map(|envelope| envelope.data)
    }

    async fn delete_item_image(&self, image_id: ImageId) -> DataResult<ApiMessage> {
        self.post("deleteitemimage/", &DeleteImage { image_id })
            .await
    }

    async fn report_abuse(&self, report: AbuseReport) -> DataResult<ApiMessage> {
        self.post("makereportofabuse/", &report).await
    }

    async fn submit_review(&self, review: ReviewSubmission) -> DataResult<ReviewEntry> {
        self.post_data("submitreview/", &review).await
    }

    async fn user_profile(&self) -> DataResult<UserProfile> {
        self.get_data("getuserprofile/").await
    }

    async fn update_user_profile(&self, form: ProfileForm) -> DataResult<UserProfile> {
        let mut multipart = Form::new()
            .text("first_name", form.first_name)
            .text("last_name", form.last_name);
        if let Some(phone) = form.phone {
            multipart = multipart.text("phone", phone);
        }
        if let Some(location) = form.location {
            multipart = multipart.text("location", location);
        }
        if let Some(avatar) = &form.avatar {
            multipart = multipart.part("avatar", image_part(avatar)?);
        }
        self.post_multipart::<Envelope<UserProfile>>("updateuserprofile/", multipart)
            .await
            .map(|envelope| envelope.data)
    }

    async fn change_password(&self, change: PasswordChange) -> DataResult<ApiMessage> {
        self.post("changepassword/", &change).await
    }

    async fn messages(&self) -> DataResult<Vec<RemoteMessage>> {
        self.get_data("getmessages/").await
    }

    async fn send_message(&self, message: OutgoingMessage) -> DataResult<RemoteMessage> {
        self.post_data("sendmessage/", &message).await
    }

    async fn wishlist(&self) -> DataResult<Vec<Product>> {
        self.get_data("getwishlist/").await
    }

    async fn wish_unwish(&self, item_id: ProductId) -> DataResult<WishStatus> {
        self.post_data("wishunwish/", &WishToggle { item_id }).await
    }

    async fn shop_profile(&self, user_id: UserId) -> DataResult<ShopProfile> {
        self.post_data("getshopprofile/", &ShopLookup { user_id })
            .await
    }

    async fn faqs(&self) -> DataResult<Vec<Faq>> {
        self.get_data("faqs/").await
    }

    async fn subscribe_newsletter(&self, email: String) -> DataResult<ApiMessage> {
        self.post("subscribe/", &NewsletterSubscription { email })
            .await
    }

    async fn contact_us(&self, form: ContactForm) -> DataResult<ApiMessage> {
        self.post("contactus/", &form).await
    }

    async fn search(&self, query: String) -> DataResult<Vec<Product>> {
        self.get_query::<Envelope<Vec<Product>>>("search/", &[("q", query)])
            .await
            .map(|envelope| envelope.data)
    }
}

fn image_part(upload: &ImageUpload) -> DataResult<Part> {
    Ok(Part::bytes(upload.bytes.clone())
        .file_name(upload.file_name.clone())
        .mime_str(&upload.mime_type)?)
}

fn item_multipart(form: &ItemForm, item_id: Option<ProductId>) -> DataResult<Form> {
    let mut multipart = Form::new()
        .text("name", form.name.clone())
        .text("description", form.description.clone())
        .text("price", form.price.to_string())
        .text("category_id", form.category_id.to_string())
        .text("location", form.location.clone());
    if let Some(item_id) = item_id {
        multipart = multipart.text("item_id", item_id.to_string());
    }
    if let Some(subcategory_id) = form.subcategory_id {
        multipart = multipart.text("subcategory_id", subcategory_id.to_string());
    }
    for upload in &form.images {
        multipart = multipart.part("images", image_part(upload)?);
    }
    Ok(multipart)
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(String),
    Many(Vec<String>),
}

#[derive(Deserialize, Default)]
struct ErrorBody {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    errors: BTreeMap<String, OneOrMany>,
}

fn api_error(status: StatusCode, body: &str) -> DataError {
    let parsed: ErrorBody = serde_json::from_str(body).unwrap_or_default();
    let field_errors = parsed
        .errors
        .into_iter()
        .map(|(field, messages)| {
            let messages = match messages {
                OneOrMany::One(message) => vec![message],
                OneOrMany::Many(messages) => messages,
            };
            (field, messages)
        })
        .collect();
    let message = parsed
        .message
        .or(parsed.detail)
        .unwrap_or_else(|| body.to_string());
    DataError::Api {
        status: status.as_u16(),
        message,
        field_errors,
    }
}

/// Deserialize a successful response into the desired type, or return an
/// appropriate error.
pub async fn ok_body<T: DeserializeOwned>(response: reqwest::Response) -> DataResult<T> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(api_error(status, &body));
    }
    serde_json::from_str(&body).map_err(|error| {
        DataError::Schema(format!("{error} in response body: {body}"))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_errors_accept_strings_and_lists() {
        let error = api_error(
            StatusCode::BAD_REQUEST,
            r#"{"message": "invalid form", "errors": {"price": "required", "name": ["too short", "taken"]}}"#,
        );
        let DataError::Api {
            status,
            message,
            field_errors,
        } = error
        else {
            panic!("expected an api error");
        };
        assert_eq!(status, 400);
        assert_eq!(message, "invalid form");
        assert_eq!(field_errors["price"], vec!["required".to_string()]);
        assert_eq!(field_errors["name"].len(), 2);
    }

    #[test]
    fn non_json_error_bodies_become_messages() {
        let error = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert_eq!(error, DataError::api(502, "upstream down"));
    }

    #[test]
    fn urls_are_joined_without_double_slashes() {
        let client = ApiClient::new("https://dawa.example/api/", Session::anonymous());
        assert_eq!(
            client.format_url("/getitems/"),
            "https://dawa.example/api/getitems/"
        );
    }
}
