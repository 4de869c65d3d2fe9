//! Cache keys
//!
//! A [`CacheKey`] is the stable identity of one logical request: the endpoint
//! name plus a canonical serialization of its parameters. Two queries with the
//! same key share one cache entry and at most one in-flight request.

use std::fmt;

use serde::Serialize;

use crate::errors::DataResult;

/// Stable identifier for one logical fetch request
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key for an endpoint without parameters, e.g. `CacheKey::new("faqs")`.
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self(endpoint.into())
    }

    /// Key for an endpoint plus serialized parameters.
    ///
    /// Struct fields serialize in declaration order and maps are sorted by
    /// `serde_json`, so equal parameters always produce equal keys.
    pub fn with_params<P: Serialize + ?Sized>(endpoint: &str, params: &P) -> DataResult<Self> {
        let encoded = serde_json::to_string(params)?;
        Ok(Self(format!("{endpoint}?{encoded}")))
    }

    /// Key from tuple-like parts, joined with `/`.
    pub fn from_parts<I, S>(parts: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let joined = parts
            .into_iter()
            .map(|part| part.as_ref().to_string())
            .collect::<Vec<_>>()
            .join("/");
        Self(joined)
    }

    /// The raw key string
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The endpoint part of the key (everything before the parameters).
    pub fn endpoint(&self) -> &str {
        self.0.split('?').next().unwrap_or(&self.0)
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<String> for CacheKey {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Well-known keys shared between queries and the mutations that refresh them
pub mod keys {
    use super::CacheKey;
    use crate::schema::CategorySelection;

    pub fn promoted_products() -> CacheKey {
        CacheKey::new("promotedProducts")
    }

    pub fn user_wishlist() -> CacheKey {
        CacheKey::new("userWishlist")
    }

    pub fn messages() -> CacheKey {
        CacheKey::new("messages")
    }

    pub fn user_profile() -> CacheKey {
        CacheKey::new("userProfile")
    }

    pub fn faqs() -> CacheKey {
        CacheKey::new("faqs")
    }

    pub fn item_details(item_id: i64) -> CacheKey {
        CacheKey::from_parts(["getitemdetails".to_string(), item_id.to_string()])
    }

    pub fn shop_profile(user_id: i64) -> CacheKey {
        CacheKey::from_parts(["getshopprofile".to_string(), user_id.to_string()])
    }

    pub fn category_data(selection: CategorySelection) -> CacheKey {
        match selection {
            CategorySelection::Category(id) => CacheKey::new(format!("getcategorydata/category/{id}")),
            CategorySelection::Subcategory(id) => {
                CacheKey::new(format!("getcategorydata/subcategory/{id}"))
            }
        }
    }
}
