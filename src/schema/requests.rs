use serde::{Deserialize, Serialize};

use super::{ImageId, ProductId, UserId};

/// Filters of the product list; serialized into the first page's body and key
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProductFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subcategory_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
}

/// Request for one page of the product list
#[derive(Debug, Clone, PartialEq)]
pub enum PageRequest {
    /// First page, posted with the filter as body
    First(ProductFilter),
    /// A later page, fetched from the server-provided cursor URL
    Cursor(String),
}

/// Which listing a category page shows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategorySelection {
    Category(i64),
    Subcategory(i64),
}

impl CategorySelection {
    /// Body of `/getcategorydata/`: `{"category_id": n}` or `{"subcategory_id": n}`.
    pub fn to_body(self) -> serde_json::Value {
        match self {
            Self::Category(id) => serde_json::json!({ "category_id": id }),
            Self::Subcategory(id) => serde_json::json!({ "subcategory_id": id }),
        }
    }
}

/// A file attached to a multipart form
#[derive(Debug, Clone, PartialEq)]
pub struct ImageUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

/// Fields of the post-ad and edit-ad forms
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ItemForm {
    pub name: String,
    pub description: String,
    pub price: f64,
    pub category_id: i64,
    pub subcategory_id: Option<i64>,
    pub location: String,
    pub images: Vec<ImageUpload>,
}

/// Fields of the profile form
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProfileForm {
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub location: Option<String>,
    pub avatar: Option<ImageUpload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PasswordChange {
    pub old_password: String,
    pub new_password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteImage {
    pub image_id: ImageId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbuseReport {
    pub item_id: ProductId,
    pub reason: String,
    #[serde(default)]
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewSubmission {
    pub item_id: ProductId,
    pub rating: u8,
    pub comment: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutgoingMessage {
    pub recipient_id: UserId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<ProductId>,
    pub body: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishToggle {
    pub item_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemLookup {
    pub item_id: ProductId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopLookup {
    pub user_id: UserId,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewsletterSubscription {
    pub email: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContactForm {
    pub name: String,
    pub email: String,
    pub subject: String,
    pub message: String,
}
