use super::*;

fn client() -> ShopifyClient {
    ShopifyClient::new(
        "example.myshopify.com",
        "shpat_test_token",
        "2024-01",
        30,
        0,
        0,
    )
    .unwrap()
}

#[test]
fn page_url_first_page_carries_filters() {
    let url = client().page_url("orders", 250, None, &[("status", "any")]);
    assert_eq!(
        url,
        "https://example.myshopify.com/admin/api/2024-01/orders.json?limit=250&status=any"
    );
}

#[test]
fn page_url_with_cursor_drops_filters() {
    let url = client().page_url("orders", 250, Some("CURSOR"), &[("status", "any")]);
    assert_eq!(
        url,
        "https://example.myshopify.com/admin/api/2024-01/orders.json?limit=250&page_info=CURSOR"
    );
}

#[test]
fn page_url_zero_limit_omits_parameter() {
    let url = client().page_url("orders/42/refunds", 0, None, &[]);
    assert_eq!(
        url,
        "https://example.myshopify.com/admin/api/2024-01/orders/42/refunds.json"
    );
}

#[test]
fn base_url_trailing_slash_is_stripped() {
    let c = ShopifyClient::with_base_url(
        "example.myshopify.com",
        "tok",
        "2024-01",
        30,
        0,
        0,
        "http://127.0.0.1:9999/",
    )
    .unwrap();
    let url = c.page_url("products", 50, None, &[]);
    assert_eq!(url, "http://127.0.0.1:9999/admin/api/2024-01/products.json?limit=50");
}

#[test]
fn rejects_scheme_qualified_shop_domain() {
    let err = ShopifyClient::new("https://example.myshopify.com", "tok", "2024-01", 30, 0, 0)
        .unwrap_err();
    assert!(matches!(err, SourceError::InvalidShopDomain { .. }));
}

#[test]
fn debug_redacts_access_token() {
    let rendered = format!("{:?}", client());
    assert!(!rendered.contains("shpat_test_token"));
    assert!(rendered.contains("[redacted]"));
}
