//! Storefront hooks for Dioxus applications

mod mutation;
mod provider;

pub use mutation::*;
pub use provider::*;
