use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Identified, ImageId, ProductId, UserId};

/// Object responses are wrapped as `{"data": ...}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Envelope<T> {
    pub data: T,
}

/// One page of a cursor-paginated list
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Page<T> {
    pub results: Vec<T>,
    /// Absolute URL of the next page, `None` on the last page
    pub next: Option<String>,
    #[serde(default)]
    pub count: u64,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next.is_none()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductImage {
    pub id: ImageId,
    pub image: String,
}

/// A listing as shown on cards and lists
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub images: Vec<ProductImage>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub category_id: Option<i64>,
    #[serde(default)]
    pub subcategory_id: Option<i64>,
    #[serde(default)]
    pub is_promoted: bool,
    #[serde(default)]
    pub seller_id: Option<UserId>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

impl Identified for Product {
    type Id = ProductId;

    fn id(&self) -> ProductId {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subcategory {
    pub id: i64,
    pub name: String,
    pub category_id: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub icon: Option<String>,
    #[serde(default)]
    pub subcategories: Vec<Subcategory>,
}

/// Items of a category or subcategory
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryData {
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub subcategory: Option<Subcategory>,
    pub items: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SellerSummary {
    pub id: UserId,
    pub name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub joined_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReviewEntry {
    pub id: i64,
    pub rating: u8,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub reviewer: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductDetail {
    pub item: Product,
    #[serde(default)]
    pub description: String,
    pub seller: SellerSummary,
    #[serde(default)]
    pub reviews: Vec<ReviewEntry>,
    #[serde(default)]
    pub similar: Vec<Product>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub avatar: Option<String>,
    #[serde(default)]
    pub location: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShopProfile {
    pub seller: SellerSummary,
    #[serde(default)]
    pub items: Vec<Product>,
    #[serde(default)]
    pub rating: Option<f64>,
    #[serde(default)]
    pub review_count: u32,
}

/// A chat message as stored by the server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteMessage {
    pub id: i64,
    pub sender_id: UserId,
    pub recipient_id: UserId,
    #[serde(default)]
    pub item_id: Option<ProductId>,
    pub body: String,
    pub sent_at: DateTime<Utc>,
}

impl Identified for RemoteMessage {
    type Id = i64;

    fn id(&self) -> i64 {
        self.id
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Faq {
    pub id: i64,
    pub question: String,
    pub answer: String,
}

/// Wishlist toggle result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WishStatus {
    pub item_id: ProductId,
    pub wished: bool,
}

/// Generic acknowledgement of a write
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiMessage {
    pub message: String,
}
