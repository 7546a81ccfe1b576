//! Integration tests for `ShopifyClient` using wiremock HTTP mocks.

use profitlens_shopify::{ShopifyClient, SourceError};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn test_client(base_url: &str) -> ShopifyClient {
    ShopifyClient::with_base_url(
        "example.myshopify.com",
        "shpat_test",
        "2024-01",
        30,
        2,
        0,
        base_url,
    )
    .expect("client construction should not fail")
}

#[tokio::test]
async fn products_page_sends_token_and_parses_records() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/products.json"))
        .and(query_param("limit", "250"))
        .and(header("X-Shopify-Access-Token", "shpat_test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "products": [ { "id": 1, "title": "Widget", "variants": [] } ]
        })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let (items, cursor) = client.products_page(250, None).await.unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["id"], 1);
    assert!(cursor.is_none(), "no Link header means last page");
}

#[tokio::test]
async fn orders_page_follows_link_header_cursor() {
    let server = MockServer::start().await;
    let next_url = format!(
        "{}/admin/api/2024-01/orders.json?limit=2&page_info=NEXT_CURSOR",
        server.uri()
    );

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/orders.json"))
        .and(query_param("status", "any"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("Link", format!("<{next_url}>; rel=\"next\"").as_str())
                .set_body_json(json!({ "orders": [ { "id": 10 }, { "id": 11 } ] })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let (items, cursor) = client.orders_page(2, None).await.unwrap();
    assert_eq!(items.len(), 2, "a full page with a cursor is not terminal");
    assert_eq!(cursor.as_deref(), Some("NEXT_CURSOR"));
}

#[tokio::test]
async fn full_final_page_without_link_header_terminates() {
    let server = MockServer::start().await;

    // Exactly `limit` records but no rel="next": completion is signaled by
    // cursor absence, never inferred from the record count.
    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/orders.json"))
        .and(query_param("page_info", "LAST_PAGE"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "orders": [ { "id": 10 }, { "id": 11 } ] })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let (items, cursor) = client.orders_page(2, Some("LAST_PAGE")).await.unwrap();
    assert_eq!(items.len(), 2);
    assert!(cursor.is_none());
}

#[tokio::test]
async fn rate_limited_request_is_retried() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/customers.json"))
        .respond_with(
            ResponseTemplate::new(429).insert_header("Retry-After", "0"),
        )
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/customers.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "customers": [ { "id": 5 } ] })),
        )
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let (items, _) = client.customers_page(250, None).await.unwrap();
    assert_eq!(items.len(), 1);
}

#[tokio::test]
async fn unauthorized_is_surfaced_without_retry() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/products.json"))
        .respond_with(ResponseTemplate::new(401))
        .expect(1)
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.products_page(250, None).await.unwrap_err();
    assert!(matches!(err, SourceError::Unauthorized { .. }));
}

#[tokio::test]
async fn order_refunds_hits_per_order_endpoint() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/orders/42/refunds.json"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({ "refunds": [ { "id": 7 } ] })),
        )
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let refunds = client.order_refunds(42).await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0]["id"], 7);
}

#[tokio::test]
async fn missing_payload_key_is_a_deserialize_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/admin/api/2024-01/products.json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "errors": "nope" })))
        .mount(&server)
        .await;

    let client = test_client(&server.uri());
    let err = client.products_page(250, None).await.unwrap_err();
    assert!(matches!(err, SourceError::Deserialize { .. }));
}
