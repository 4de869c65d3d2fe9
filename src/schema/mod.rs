//! Typed payloads of the storefront API
//!
//! Responses are parsed into these records at the HTTP boundary; a body that
//! does not match fails with [`crate::errors::DataError::Schema`].

pub mod requests;
pub mod responses;

pub use requests::*;
pub use responses::*;

use std::hash::Hash;

pub type ProductId = i64;
pub type UserId = i64;
pub type ImageId = i64;

/// Entities with a stable identity, used to dedupe merged pages
pub trait Identified {
    type Id: Eq + Hash + Clone;

    fn id(&self) -> Self::Id;
}
