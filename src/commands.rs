//! Storefront commands
//!
//! UI intents are values of [`StorefrontCommand`], handled in one place by
//! [`CommandHandler::dispatch`]. Components send commands instead of threading
//! callbacks through props.

use serde::{Deserialize, Serialize};

use crate::{
    errors::DataResult,
    key::CacheKey,
    runtime::StorefrontRuntime,
    schema::*,
    search::SearchController,
};

/// Something the user asked the storefront to do
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StorefrontCommand {
    ToggleWishlist {
        item_id: ProductId,
    },
    SendMessage {
        recipient_id: UserId,
        #[serde(default)]
        item_id: Option<ProductId>,
        body: String,
    },
    Search {
        query: String,
    },
    ReportAbuse {
        item_id: ProductId,
        reason: String,
        #[serde(default)]
        details: String,
    },
    SubmitReview {
        item_id: ProductId,
        rating: u8,
        comment: String,
    },
    SubscribeNewsletter {
        email: String,
    },
    SelectCategory {
        selection: CategorySelection,
    },
    /// Revalidate one cache key
    Refresh {
        key: String,
    },
}

impl StorefrontCommand {
    /// Name used in logs and login prompts.
    pub fn name(&self) -> &'static str {
        match self {
            Self::ToggleWishlist { .. } => "toggle_wishlist",
            Self::SendMessage { .. } => "send_message",
            Self::Search { .. } => "search",
            Self::ReportAbuse { .. } => "report_abuse",
            Self::SubmitReview { .. } => "submit_review",
            Self::SubscribeNewsletter { .. } => "subscribe_newsletter",
            Self::SelectCategory { .. } => "select_category",
            Self::Refresh { .. } => "refresh",
        }
    }
}

/// Result of a handled command
#[derive(Debug, Clone, PartialEq)]
pub enum CommandOutcome {
    Wishlist(WishStatus),
    MessageSent(RemoteMessage),
    SearchResults(Vec<Product>),
    Acknowledged(ApiMessage),
    ReviewSubmitted(ReviewEntry),
    CategoryLoaded(CategoryData),
    Refreshed { revalidated: bool },
}

/// Handles every [`StorefrontCommand`] against one runtime
#[derive(Clone)]
pub struct CommandHandler {
    runtime: StorefrontRuntime,
    search: SearchController,
}

impl CommandHandler {
    pub fn new(runtime: StorefrontRuntime) -> Self {
        let search = runtime.search_controller();
        Self { runtime, search }
    }

    /// Search controller used by `Search` commands.
    pub fn search(&self) -> &SearchController {
        &self.search
    }

    pub async fn dispatch(&self, command: StorefrontCommand) -> DataResult<CommandOutcome> {
        crate::debug_log!("Dispatching command: {}", command.name());
        let api = self.runtime.api();
        match command {
            StorefrontCommand::ToggleWishlist { item_id } => self
                .runtime
                .wishlist_actions()
                .toggle(item_id)
                .await
                .map(CommandOutcome::Wishlist),
            StorefrontCommand::SendMessage {
                recipient_id,
                item_id,
                body,
            } => self
                .runtime
                .chat_actions()
                .send(OutgoingMessage {
                    recipient_id,
                    item_id,
                    body,
                })
                .await
                .map(CommandOutcome::MessageSent),
            StorefrontCommand::Search { query } => self
                .search
                .search(query)
                .await
                .map(CommandOutcome::SearchResults),
            StorefrontCommand::ReportAbuse {
                item_id,
                reason,
                details,
            } => {
                self.runtime.session().require_user("report_abuse")?;
                api.report_abuse(AbuseReport {
                    item_id,
                    reason,
                    details,
                })
                .await
                .map(CommandOutcome::Acknowledged)
            }
            StorefrontCommand::SubmitReview {
                item_id,
                rating,
                comment,
            } => {
                self.runtime.session().require_user("submit_review")?;
                let review = self
                    .runtime
                    .mutation("submitreview", crate::types::action(move |review: ReviewSubmission| {
                        let api = api.clone();
                        async move { api.submit_review(review).await }
                    }))
                    .invalidates([crate::key::keys::item_details(item_id)]);
                review
                    .trigger(ReviewSubmission {
                        item_id,
                        rating,
                        comment,
                    })
                    .await
                    .map(CommandOutcome::ReviewSubmitted)
            }
            StorefrontCommand::SubscribeNewsletter { email } => api
                .subscribe_newsletter(email)
                .await
                .map(CommandOutcome::Acknowledged),
            StorefrontCommand::SelectCategory { selection } => {
                self.runtime
                    .selected_category()
                    .replace(Some(selection));
                let state = self.runtime.category_query(Some(selection)).load().await;
                match (state.data, state.error) {
                    (_, Some(error)) => Err(error),
                    (Some(data), None) => Ok(CommandOutcome::CategoryLoaded(data)),
                    (None, None) => Err(crate::errors::DataError::Cancelled),
                }
            }
            StorefrontCommand::Refresh { key } => {
                let revalidated = self.runtime.store().revalidate(&CacheKey::new(key)).await;
                Ok(CommandOutcome::Refreshed { revalidated })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        config::RuntimeConfig,
        errors::DataError,
        fake_api::{FakeApi, product},
        session::{AuthUser, Session},
    };
    use serde_json::json;
    use std::sync::Arc;

    fn handler(api: Arc<FakeApi>, session: Session) -> CommandHandler {
        StorefrontRuntime::new(RuntimeConfig::default(), api, session).command_handler()
    }

    fn signed_in() -> Session {
        Session::signed_in(AuthUser {
            id: 1,
            token: "t".into(),
        })
    }

    #[test]
    fn commands_are_tagged_by_type() {
        let command: StorefrontCommand =
            serde_json::from_value(json!({"type": "toggle_wishlist", "item_id": 12})).unwrap();
        assert_eq!(command, StorefrontCommand::ToggleWishlist { item_id: 12 });
        assert_eq!(command.name(), "toggle_wishlist");
    }

    #[tokio::test]
    async fn report_abuse_requires_login() {
        let api = FakeApi::new();
        let handler = handler(api.clone(), Session::anonymous());

        let result = handler
            .dispatch(StorefrontCommand::ReportAbuse {
                item_id: 3,
                reason: "spam".into(),
                details: String::new(),
            })
            .await;

        assert_eq!(result, Err(DataError::AuthRequired));
        assert!(api.calls().is_empty());
    }

    #[tokio::test]
    async fn select_category_loads_and_remembers_selection() {
        let api = FakeApi::new();
        api.respond("category_data", json!({"items": [product(5, "Bike")]}));
        let handler = handler(api, Session::anonymous());

        let outcome = handler
            .dispatch(StorefrontCommand::SelectCategory {
                selection: CategorySelection::Category(2),
            })
            .await
            .unwrap();

        let CommandOutcome::CategoryLoaded(data) = outcome else {
            panic!("unexpected outcome");
        };
        assert_eq!(data.items[0].name, "Bike");
        assert_eq!(
            handler.runtime.selected_category().snapshot(),
            Some(CategorySelection::Category(2))
        );
    }

    #[tokio::test]
    async fn toggle_and_message_go_through_optimistic_flows() {
        let api = FakeApi::new();
        api.respond("wish_unwish", json!({"item_id": 7, "wished": true}));
        api.respond(
            "send_message",
            json!({"id": 1, "sender_id": 1, "recipient_id": 4, "body": "Still available?",
                   "sent_at": "2024-05-01T10:00:00Z"}),
        );
        let handler = handler(api.clone(), signed_in());

        let toggled = handler
            .dispatch(StorefrontCommand::ToggleWishlist { item_id: 7 })
            .await;
        let sent = handler
            .dispatch(StorefrontCommand::SendMessage {
                recipient_id: 4,
                item_id: Some(7),
                body: "Still available?".into(),
            })
            .await;

        assert!(matches!(toggled, Ok(CommandOutcome::Wishlist(WishStatus { wished: true, .. }))));
        assert!(matches!(sent, Ok(CommandOutcome::MessageSent(_))));
        assert!(handler.runtime.wishlist_state().read(|state| state.contains(7)));
        assert_eq!(api.calls(), vec!["wish_unwish:7", "send_message:Still available?"]);
    }

    #[tokio::test]
    async fn refresh_reports_whether_anything_refetched() {
        let handler = handler(FakeApi::new(), Session::anonymous());
        let outcome = handler
            .dispatch(StorefrontCommand::Refresh {
                key: "faqs".into(),
            })
            .await;
        assert_eq!(outcome, Ok(CommandOutcome::Refreshed { revalidated: false }));
    }
}
