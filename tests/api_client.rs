use dawa_provider::prelude::*;
use httpmock::MockServer;

fn signed_in() -> Session {
    Session::signed_in(AuthUser {
        id: 7,
        token: "secret-token".into(),
    })
}

fn client(server: &MockServer, session: Session) -> ApiClient {
    ApiClient::new(server.base_url(), session)
}

#[tokio::test]
async fn promoted_items_unwrap_the_data_envelope() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("GET").path("/getpromoteditems/");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": [{"id": 1, "name": "Lamp", "price": 12.5, "is_promoted": true}]}"#);
        })
        .await;

    let products = client(&server, Session::anonymous())
        .promoted_products()
        .await
        .expect("promoted items");

    mock.assert_async().await;
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].name, "Lamp");
    assert!(products[0].is_promoted);
}

#[tokio::test]
async fn signed_in_requests_carry_the_bearer_token() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/wishunwish/")
                .header("authorization", "Bearer secret-token")
                .json_body_partial(r#"{"item_id": 12}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": {"item_id": 12, "wished": true}}"#);
        })
        .await;

    let status = client(&server, signed_in())
        .wish_unwish(12)
        .await
        .expect("wish status");

    mock.assert_async().await;
    assert_eq!(
        status,
        WishStatus {
            item_id: 12,
            wished: true
        }
    );
}

#[tokio::test]
async fn search_sends_the_query_parameter() {
    let server = MockServer::start_async().await;
    let search = server
        .mock_async(|when, then| {
            when.method("GET").path("/search/").query_param("q", "red bike");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": [{"id": 4, "name": "Red bike"}]}"#);
        })
        .await;

    let results = client(&server, Session::anonymous())
        .search("red bike".into())
        .await
        .expect("search results");

    search.assert_async().await;
    assert_eq!(results[0].id, 4);
}

#[tokio::test]
async fn validation_failures_keep_field_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("POST").path("/makereportofabuse/");
            then.status(400)
                .header("content-type", "application/json")
                .body(r#"{"message": "invalid report", "errors": {"reason": ["This field is required."]}}"#);
        })
        .await;

    let error = client(&server, signed_in())
        .report_abuse(AbuseReport {
            item_id: 3,
            reason: String::new(),
            details: String::new(),
        })
        .await
        .expect_err("rejected report");

    let DataError::Api {
        status, message, ..
    } = &error
    else {
        panic!("expected an api error, got {error:?}");
    };
    assert_eq!(*status, 400);
    assert_eq!(message, "invalid report");
    assert_eq!(
        error.field_errors().map(|fields| fields["reason"].clone()),
        Some(vec!["This field is required.".to_string()])
    );
}

#[tokio::test]
async fn unexpected_shapes_are_schema_errors() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method("GET").path("/faqs/");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"data": {"question": "not a list"}}"#);
        })
        .await;

    let error = client(&server, Session::anonymous())
        .faqs()
        .await
        .expect_err("malformed faqs");

    assert!(matches!(error, DataError::Schema(_)), "got {error:?}");
}

#[tokio::test]
async fn review_ratings_are_judged_by_the_server() {
    let server = MockServer::start_async().await;
    let review = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/submitreview/")
                .json_body_partial(r#"{"item_id": 3, "rating": 9}"#);
            then.status(400)
                .header("content-type", "application/json")
                .body(r#"{"message": "invalid review", "errors": {"rating": ["Ensure this value is less than or equal to 5."]}}"#);
        })
        .await;

    let error = client(&server, signed_in())
        .submit_review(ReviewSubmission {
            item_id: 3,
            rating: 9,
            comment: "great".into(),
        })
        .await
        .expect_err("rating out of range");

    review.assert_async().await;
    assert!(matches!(error, DataError::Api { status: 400, .. }), "got {error:?}");
    assert!(error.field_errors().is_some_and(|fields| fields.contains_key("rating")));
}

#[tokio::test]
async fn unreachable_server_is_a_network_error() {
    let error = ApiClient::new("http://127.0.0.1:9", Session::anonymous())
        .faqs()
        .await
        .expect_err("nothing listens on the discard port");

    assert!(error.is_transport(), "got {error:?}");
}

#[tokio::test]
async fn infinite_products_follow_the_cursor() {
    let server = MockServer::start_async().await;
    let next = server.url("/getitems/?page=2");
    let first = server
        .mock_async(|when, then| {
            when.method("POST")
                .path("/getitems/")
                .json_body_partial(r#"{"category_id": 3}"#);
            then.status(200)
                .header("content-type", "application/json")
                .body(format!(
                    r#"{{"results": [{{"id": 1, "name": "Sofa"}}, {{"id": 2, "name": "Desk"}}], "next": "{next}", "count": 3}}"#
                ));
        })
        .await;
    let second = server
        .mock_async(|when, then| {
            when.method("GET").path("/getitems/").query_param("page", "2");
            then.status(200)
                .header("content-type", "application/json")
                .body(r#"{"results": [{"id": 2, "name": "Desk (reduced)"}, {"id": 3, "name": "Chair"}], "next": null, "count": 3}"#);
        })
        .await;

    let runtime = StorefrontRuntime::http(RuntimeConfig::new(server.base_url()), Session::anonymous());
    let products = runtime.products_query(ProductFilter {
        category_id: Some(3),
        ..ProductFilter::default()
    });

    products.load().await.expect("first page");
    assert!(products.has_more());
    assert!(products.load_more().await.expect("second page"));
    assert!(!products.load_more().await.expect("list ended"));

    first.assert_async().await;
    second.assert_async().await;
    let names: Vec<_> = products.items().into_iter().map(|product| product.name).collect();
    assert_eq!(names, vec!["Sofa", "Desk (reduced)", "Chair"]);
    assert_eq!(products.total_count(), Some(3));
    assert!(!products.has_more());
}
