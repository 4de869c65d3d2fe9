use dawa_provider::prelude::*;
use httpmock::MockServer;

fn init_logs() {
    let _ = tracing_subscriber::fmt().with_test_writer().try_init();
}

fn signed_in() -> Session {
    Session::signed_in(AuthUser {
        id: 7,
        token: "secret-token".into(),
    })
}

#[tokio::test]
async fn refused_wishlist_toggle_rolls_back() {
    init_logs();
    let server = MockServer::start_async().await;
    let toggle = server
        .mock_async(|when, then| {
            when.method("POST").path("/wishunwish/");
            then.status(500)
                .header("content-type", "application/json")
                .body(r#"{"detail": "database unavailable"}"#);
        })
        .await;
    let runtime = StorefrontRuntime::http(RuntimeConfig::new(server.base_url()), signed_in());
    let wishlist = runtime.wishlist_actions();

    let result = wishlist.toggle(21).await;

    toggle.assert_async().await;
    assert_eq!(result, Err(DataError::api(500, "database unavailable")));
    assert_eq!(wishlist.membership(21), Membership::NotInWishlist);
}

#[tokio::test]
async fn signed_out_toggle_asks_for_login() {
    init_logs();
    // any request would fail as a transport error instead
    let session = Session::anonymous();
    let mut events = session.events();
    let runtime = StorefrontRuntime::http(RuntimeConfig::new("http://127.0.0.1:9"), session);

    let result = runtime.wishlist_actions().toggle(21).await;

    assert_eq!(result, Err(DataError::AuthRequired));
    assert!(matches!(
        events.try_recv(),
        Ok(SessionEvent::LoginRequired { .. })
    ));
    assert!(runtime.wishlist_state().read(WishlistState::is_empty));
}

#[tokio::test]
async fn signed_out_message_asks_for_login() {
    init_logs();
    let session = Session::anonymous();
    let mut events = session.events();
    let runtime = StorefrontRuntime::http(RuntimeConfig::new("http://127.0.0.1:9"), session);

    let result = runtime
        .chat_actions()
        .send(OutgoingMessage {
            recipient_id: 4,
            item_id: Some(21),
            body: "Is the sofa still available?".into(),
        })
        .await;

    assert_eq!(result, Err(DataError::AuthRequired));
    assert!(matches!(
        events.try_recv(),
        Ok(SessionEvent::LoginRequired { .. })
    ));
    let chat = runtime.chat_state().snapshot();
    assert!(chat.messages().is_empty());
    assert_eq!(chat.pending_count(), 0);
}

#[tokio::test]
async fn sent_message_is_confirmed_with_the_server_id() {
    init_logs();
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/sendmessage/")
                .header("authorization", "Bearer secret-token")
                .json_body_partial(r#"{"recipient_id": 4, "body": "Is the sofa still available?"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": {"id": 91, "sender_id": 7, "recipient_id": 4, "body": "Is the sofa still available?", "sent_at": "2024-05-01T10:00:00Z"}}"#);
        })
        .await;
    let runtime = StorefrontRuntime::http(RuntimeConfig::new(server.base_url()), signed_in());

    let sent = runtime
        .chat_actions()
        .send(OutgoingMessage {
            recipient_id: 4,
            item_id: None,
            body: "Is the sofa still available?".into(),
        })
        .await
        .expect("message accepted");

    assert_eq!(sent.id, 91);
    let chat = runtime.chat_state().snapshot();
    assert_eq!(chat.messages().len(), 1);
    assert_eq!(chat.messages()[0].id, MessageId::Remote(91));
    assert_eq!(chat.messages()[0].status, DeliveryStatus::Sent);
}

#[tokio::test]
async fn newsletter_command_posts_the_email() {
    init_logs();
    let server = MockServer::start_async().await;
    let subscribe = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/subscribe/")
                .json_body_partial(r#"{"email": "buyer@example.com"}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"message": "Subscribed"}"#);
        })
        .await;
    let runtime = StorefrontRuntime::http(RuntimeConfig::new(server.base_url()), Session::anonymous());

    let outcome = runtime
        .command_handler()
        .dispatch(StorefrontCommand::SubscribeNewsletter {
            email: "buyer@example.com".into(),
        })
        .await;

    subscribe.assert_async().await;
    assert_eq!(
        outcome,
        Ok(CommandOutcome::Acknowledged(ApiMessage {
            message: "Subscribed".into()
        }))
    );
}

#[tokio::test]
async fn product_details_are_cached_per_item() {
    init_logs();
    let server = MockServer::start_async().await;
    let details = server
        .mock_async(|when, then| {
            when.method("GET")
                .path("/getitemdetails/")
                .query_param("item_id", "5");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": {"item": {"id": 5, "name": "Bike"}, "seller": {"id": 2, "name": "Amina"}}}"#);
        })
        .await;
    let runtime = StorefrontRuntime::http(RuntimeConfig::new(server.base_url()), Session::anonymous());

    let first = runtime.product_details_query(Some(5)).load().await;
    let second = runtime.product_details_query(Some(5)).load().await;

    details.assert_async().await;
    assert!(first.error.is_none(), "got {:?}", first.error);
    assert_eq!(first.data, second.data);
}
