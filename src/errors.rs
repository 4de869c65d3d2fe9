//! Error types for the storefront data layer
//!
//! Every failure a fetcher, query or mutation can produce is a [`DataError`].
//! The type is `Clone + PartialEq` because errors are stored in cache entries
//! and mirrored into component state alongside the last good data.

use std::{collections::BTreeMap, time::Duration};

/// Errors produced by the storefront data layer
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DataError {
    /// The request never produced an HTTP response
    #[error("Network error: {0}")]
    Network(String),

    /// The server answered with a non-2xx status
    #[error("API error ({status}): {message}")]
    Api {
        status: u16,
        message: String,
        /// Field-level form errors, as sent in `{"errors": {"field": ["msg"]}}`
        field_errors: BTreeMap<String, Vec<String>>,
    },

    /// The response body did not match the expected schema
    #[error("Unexpected response shape: {0}")]
    Schema(String),

    /// The request did not finish within the configured timeout
    #[error("Request timed out after {0:?}")]
    TimedOut(Duration),

    /// The request was aborted before it completed
    #[error("Request was cancelled")]
    Cancelled,

    /// The action needs a logged-in user
    #[error("Authentication required")]
    AuthRequired,

    /// A mutation for the same item is still in flight
    #[error("A mutation is already pending for {0}")]
    MutationPending(String),

    /// Invalid configuration or missing runtime
    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl DataError {
    /// Builds an [`DataError::Api`] without field errors.
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
            field_errors: BTreeMap::new(),
        }
    }

    /// Field-level errors reported by the server, if any.
    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Api { field_errors, .. } if !field_errors.is_empty() => Some(field_errors),
            _ => None,
        }
    }

    /// Whether the error came from the transport rather than the server.
    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Network(_) | Self::TimedOut(_))
    }
}

impl From<reqwest::Error> for DataError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            // reqwest does not expose the configured duration
            return Self::TimedOut(Duration::ZERO);
        }
        if error.is_decode() {
            return Self::Schema(error.to_string());
        }
        Self::Network(error.to_string())
    }
}

impl From<serde_json::Error> for DataError {
    fn from(error: serde_json::Error) -> Self {
        Self::Schema(error.to_string())
    }
}

/// Result alias used across the crate
pub type DataResult<T> = Result<T, DataError>;
