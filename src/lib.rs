#![doc = include_str!("../README.md")]

// Core modules
pub mod api;
pub mod cache;
pub mod commands;
pub mod config;
pub mod errors;
#[cfg(test)]
mod fake_api;
pub mod hooks;
pub mod key;
mod log_utils;
pub mod mutation;
pub mod optimistic;
pub mod pagination;
pub mod poller;
pub mod query;
pub mod runtime;
pub mod schema;
pub mod search;
pub mod session;
pub mod slice;
pub mod state;
pub mod types;

// Re-export commonly used items at crate root for convenience
pub use config::RuntimeConfig;
pub use runtime::StorefrontRuntime;

pub mod prelude {
    //! The prelude exports the most common types and functions for using dawa-provider.

    // Runtime and configuration
    pub use crate::config::{RuntimeConfig, SwrConfig, SwrOverrides};
    pub use crate::runtime::{MaintenanceTask, StorefrontRuntime};
    pub use crate::session::{AuthUser, Session, SessionEvent};

    // Context, data and mutation hooks
    pub use crate::hooks::*;

    // Cache keys and the stores behind them
    pub use crate::cache::{CacheEvent, CacheEventKind, CacheStore, Subscription};
    pub use crate::key::{CacheKey, keys};

    // Building blocks for custom queries and mutations
    pub use crate::mutation::{MutationHandle, MutationQueue};
    pub use crate::query::DataQuery;
    pub use crate::state::{AsyncState, MutationState, QueryState};
    pub use crate::types::{Action, Fetcher, action, fetcher};

    // Optimistic flows, pagination, polling and search
    pub use crate::optimistic::{
        ChatActions, ChatMessage, ChatState, DeliveryStatus, Membership, MessageId,
        OptimisticMutation, WishlistActions, WishlistState,
    };
    pub use crate::pagination::{InfiniteQuery, InfiniteState};
    pub use crate::poller::RealtimePoller;
    pub use crate::search::{SearchController, SearchState};

    // Commands
    pub use crate::commands::{CommandHandler, CommandOutcome, StorefrontCommand};

    // API surface and wire types
    pub use crate::api::{ApiClient, StorefrontApi};
    pub use crate::errors::{DataError, DataResult};
    pub use crate::schema::*;
}
