//! Read-only view of the signed-in user
//!
//! The data layer never logs anyone in. It only asks "is there a user?" before
//! optimistic writes and, when there is none, publishes
//! [`SessionEvent::LoginRequired`] so the UI can open its auth dialog.

use std::sync::Arc;

use tokio::sync::{broadcast, watch};

use crate::{errors::DataError, schema::UserId};

const EVENT_CAPACITY: usize = 16;

/// The authenticated user, as handed over by the auth provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: UserId,
    /// Bearer token sent with API requests
    pub token: String,
}

/// Session notifications for the UI
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// An action needs a user; the UI should prompt for login
    LoginRequired { action: String },
    SignedIn(UserId),
    SignedOut,
}

/// Shared handle to the current session
#[derive(Clone)]
pub struct Session {
    user: Arc<watch::Sender<Option<AuthUser>>>,
    events: broadcast::Sender<SessionEvent>,
}

impl Default for Session {
    fn default() -> Self {
        Self::anonymous()
    }
}

impl Session {
    /// A session without a user.
    pub fn anonymous() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            user: Arc::new(watch::Sender::new(None)),
            events,
        }
    }

    /// A session with `user` already signed in.
    pub fn signed_in(user: AuthUser) -> Self {
        let session = Self::anonymous();
        session.user.send_replace(Some(user));
        session
    }

    pub fn current_user(&self) -> Option<AuthUser> {
        self.user.borrow().clone()
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.borrow().is_some()
    }

    pub fn token(&self) -> Option<String> {
        self.user.borrow().as_ref().map(|user| user.token.clone())
    }

    pub fn sign_in(&self, user: AuthUser) {
        let id = user.id;
        self.user.send_replace(Some(user));
        let _ = self.events.send(SessionEvent::SignedIn(id));
    }

    pub fn sign_out(&self) {
        self.user.send_replace(None);
        let _ = self.events.send(SessionEvent::SignedOut);
    }

    /// Returns the user, or signals `LoginRequired` and fails with `AuthRequired`.
    pub fn require_user(&self, action: &str) -> Result<AuthUser, DataError> {
        match self.current_user() {
            Some(user) => Ok(user),
            None => {
                crate::debug_log!("🔒 [AUTH] '{}' needs a signed-in user", action);
                let _ = self.events.send(SessionEvent::LoginRequired {
                    action: action.to_string(),
                });
                Err(DataError::AuthRequired)
            }
        }
    }

    /// Receives session events from now on.
    pub fn events(&self) -> broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Watches the current user.
    pub fn watch_user(&self) -> watch::Receiver<Option<AuthUser>> {
        self.user.subscribe()
    }
}
