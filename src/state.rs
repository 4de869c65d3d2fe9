//! State: observable state of queries and mutations
//!
//! This module provides [`QueryState`], [`MutationState`] and the [`AsyncState`]
//! trait shared by both. Unlike a plain loading/success/error enum, a query keeps
//! its last data while an error is shown (stale-while-error), so the state is a
//! struct rather than an enum.

use crate::errors::DataError;

/// Common trait for async state types
///
/// This trait provides a unified interface for the different state types in
/// dawa-provider, such as `QueryState` and `MutationState`.
pub trait AsyncState {
    /// The type of successful data
    type Data;

    /// Returns true if the operation is in progress and nothing is known yet
    fn is_loading(&self) -> bool;

    /// Returns true if the state contains data
    fn is_success(&self) -> bool {
        self.data().is_some()
    }

    /// Returns true if the state contains an error
    fn is_error(&self) -> bool {
        self.error().is_some()
    }

    /// Returns the data if present
    fn data(&self) -> Option<&Self::Data>;

    /// Returns the error if the last attempt failed
    fn error(&self) -> Option<&DataError>;
}

/// State of a data query: `{data, error, is_loading}` plus background validation
#[derive(Clone, PartialEq, Debug)]
pub struct QueryState<T> {
    /// Last successfully fetched data, kept across failed refetches
    pub data: Option<T>,
    /// Error of the last fetch, if it failed
    pub error: Option<DataError>,
    /// A key is set but neither data nor an error has arrived yet
    pub is_loading: bool,
    /// A fetch for the key is in flight
    pub is_validating: bool,
}

impl<T> Default for QueryState<T> {
    fn default() -> Self {
        Self::idle()
    }
}

impl<T> QueryState<T> {
    /// State of a query without a key: nothing fetched, nothing loading.
    pub fn idle() -> Self {
        Self {
            data: None,
            error: None,
            is_loading: false,
            is_validating: false,
        }
    }

    /// State of a query whose first fetch is pending.
    pub fn loading() -> Self {
        Self {
            is_loading: true,
            ..Self::idle()
        }
    }

    /// Maps the data, keeping error and flags.
    pub fn map<U, F>(self, op: F) -> QueryState<U>
    where
        F: FnOnce(T) -> U,
    {
        QueryState {
            data: self.data.map(op),
            error: self.error,
            is_loading: self.is_loading,
            is_validating: self.is_validating,
        }
    }

    /// Borrowing version of [`QueryState::map`].
    pub fn as_ref(&self) -> QueryState<&T> {
        QueryState {
            data: self.data.as_ref(),
            error: self.error.clone(),
            is_loading: self.is_loading,
            is_validating: self.is_validating,
        }
    }
}

impl<T> AsyncState for QueryState<T> {
    type Data = T;

    fn is_loading(&self) -> bool {
        self.is_loading
    }

    fn data(&self) -> Option<&T> {
        self.data.as_ref()
    }

    fn error(&self) -> Option<&DataError> {
        self.error.as_ref()
    }
}

/// State of a mutation handle: `{is_mutating, error}` plus the last response
#[derive(Clone, PartialEq, Debug)]
pub struct MutationState<R> {
    /// Number of triggers currently queued or running
    pub in_flight: usize,
    /// Error of the most recent failed trigger, cleared by the next success
    pub error: Option<DataError>,
    /// Response of the most recent successful trigger
    pub data: Option<R>,
}

impl<R> Default for MutationState<R> {
    fn default() -> Self {
        Self {
            in_flight: 0,
            error: None,
            data: None,
        }
    }
}

impl<R> MutationState<R> {
    pub fn is_mutating(&self) -> bool {
        self.in_flight > 0
    }
}

impl<R> AsyncState for MutationState<R> {
    type Data = R;

    fn is_loading(&self) -> bool {
        self.is_mutating()
    }

    fn data(&self) -> Option<&R> {
        self.data.as_ref()
    }

    fn error(&self) -> Option<&DataError> {
        self.error.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stale_data_and_error_coexist() {
        let state = QueryState {
            data: Some(3),
            error: Some(DataError::Cancelled),
            is_loading: false,
            is_validating: false,
        };
        assert!(state.is_success());
        assert!(state.is_error());
        assert_eq!(state.map(|n| n * 2).data, Some(6));
    }

    #[test]
    fn idle_is_not_loading() {
        let state = QueryState::<u8>::idle();
        assert!(!AsyncState::is_loading(&state));
        assert!(QueryState::<u8>::loading().is_loading);
    }

    #[test]
    fn mutation_state_tracks_in_flight() {
        let mut state = MutationState::<()>::default();
        assert!(!state.is_mutating());
        state.in_flight = 2;
        assert!(state.is_mutating());
    }
}
