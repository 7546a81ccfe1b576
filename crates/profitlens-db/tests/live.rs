//! Live integration tests for the Postgres store using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated database spun up by the sqlx test
//! harness. The `migrations` path is relative to the crate root
//! (`crates/profitlens-db/`), so `"../../migrations"` resolves to the
//! workspace migration directory. The suite is ignored by default; run it
//! with `cargo test -p profitlens-db -- --ignored` against a configured
//! `DATABASE_URL`.

use chrono::{TimeZone, Utc};
use rust_decimal::Decimal;

use profitlens_core::{
    Customer, LineItem, Order, OrderProfit, Product, ProductPerformance, Refund, RefundLineItem,
    RefundTransaction, StoreError, SyncState, TenantRecord, TenantStore, Variant,
};
use profitlens_db::PgStore;

const TENANT: &str = "demo-shop.myshopify.com";

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

fn test_product(id: i64) -> Product {
    Product {
        upstream_product_id: id,
        title: format!("Widget {id}"),
        handle: Some(format!("widget-{id}")),
        vendor: Some("Acme".to_owned()),
        product_type: Some("Gadget".to_owned()),
        status: "active".to_owned(),
        tags: vec!["featured".to_owned()],
        created_at: Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()),
        updated_at: None,
        variants: vec![Variant {
            upstream_variant_id: id * 10 + 1,
            title: "Default".to_owned(),
            sku: Some(format!("W-{id}")),
            price: dec("50.00"),
            unit_cost: Some(dec("20.00")),
            inventory_quantity: 5,
            position: Some(1),
        }],
        performance: None,
    }
}

fn test_order(id: i64, customer_id: i64) -> Order {
    Order {
        upstream_order_id: id,
        order_number: Some(format!("#{id}")),
        customer_upstream_id: Some(customer_id),
        total_price: dec("100.00"),
        subtotal_price: dec("100.00"),
        total_discounts: Decimal::ZERO,
        financial_status: "paid".to_owned(),
        currency: "USD".to_owned(),
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        profit: None,
    }
}

fn test_line_item(id: i64, order_id: i64) -> LineItem {
    LineItem {
        upstream_line_item_id: id,
        order_upstream_id: order_id,
        product_upstream_id: Some(1),
        variant_upstream_id: Some(11),
        title: "Widget 1".to_owned(),
        sku: Some("W-1".to_owned()),
        quantity: 2,
        price: dec("50.00"),
        total_discount: Decimal::ZERO,
        unit_cost: None,
        created_at: Utc.with_ymd_and_hms(2024, 2, 1, 0, 0, 0).unwrap(),
        profit: None,
    }
}

fn test_customer(id: i64) -> Customer {
    Customer {
        upstream_customer_id: id,
        email: Some(format!("c{id}@example.com")),
        first_name: Some("Ada".to_owned()),
        last_name: None,
        reported_orders_count: 1,
        reported_total_spent: dec("100.00"),
        tags: Vec::new(),
        created_at: None,
        metrics: None,
    }
}

fn test_refund(id: i64, order_id: i64) -> Refund {
    Refund {
        upstream_refund_id: id,
        order_upstream_id: order_id,
        note: None,
        created_at: Utc.with_ymd_and_hms(2024, 2, 5, 0, 0, 0).unwrap(),
        line_items: vec![RefundLineItem {
            line_item_upstream_id: 1001,
            quantity: 1,
            subtotal: dec("25.00"),
        }],
        transactions: vec![RefundTransaction {
            amount: dec("25.00"),
            kind: "refund".to_owned(),
            status: "success".to_owned(),
        }],
        impact: None,
    }
}

fn test_performance() -> ProductPerformance {
    ProductPerformance {
        total_quantity_sold: 2,
        total_revenue: dec("100.00"),
        total_profit: dec("60.00"),
        profit_margin: Some(dec("60")),
        average_order_value: dec("100.00"),
        last_sold_at: None,
        computed_at: Utc::now(),
        variant_metrics: Vec::new(),
    }
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn tenant_record_round_trips(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let record = TenantRecord::new(TENANT, "shpat_secret");

    store.upsert_tenant(&record).await.unwrap();
    let loaded = store.get_tenant(TENANT).await.unwrap().unwrap();

    assert_eq!(loaded.shop_domain, TENANT);
    assert_eq!(loaded.access_token, "shpat_secret");
    assert!(loaded.is_active);
    assert_eq!(loaded.sync.state, SyncState::NotStarted);
    assert!(store.get_tenant("other.myshopify.com").await.unwrap().is_none());
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn product_upsert_is_idempotent_and_preserves_performance(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    let mut product = test_product(1);

    store.upsert_product(TENANT, &product).await.unwrap();
    store
        .set_product_performance(TENANT, 1, &test_performance())
        .await
        .unwrap();

    // Raw re-upsert with changed mirror fields must keep the derived jsonb.
    product.title = "Widget 1 (renamed)".to_owned();
    store.upsert_product(TENANT, &product).await.unwrap();

    assert_eq!(store.count_products(TENANT).await.unwrap(), 1);
    let loaded = store.get_product(TENANT, 1).await.unwrap().unwrap();
    assert_eq!(loaded.title, "Widget 1 (renamed)");
    let performance = loaded.performance.expect("performance clobbered by upsert");
    assert_eq!(performance.total_profit, dec("60.00"));
    assert_eq!(loaded.variants.len(), 1);
    assert_eq!(loaded.variants[0].unit_cost, Some(dec("20.00")));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn set_derived_on_missing_record_is_not_found(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);

    let err = store
        .set_order_profit(
            TENANT,
            999,
            &OrderProfit {
                total_cost: Decimal::ZERO,
                gross_profit: Decimal::ZERO,
                profit_margin: None,
                refund_impact: Decimal::ZERO,
                cost_data_available: false,
                computed_at: Utc::now(),
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, StoreError::NotFound { collection: "orders", .. }));
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn orders_for_customer_are_sorted_ascending(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);

    let mut late = test_order(101, 7);
    late.created_at = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
    store.upsert_order(TENANT, &late).await.unwrap();
    store.upsert_order(TENANT, &test_order(100, 7)).await.unwrap();
    store.upsert_order(TENANT, &test_order(200, 8)).await.unwrap();

    let orders = store.list_orders_for_customer(TENANT, 7).await.unwrap();
    assert_eq!(orders.len(), 2);
    assert_eq!(orders[0].upstream_order_id, 100);
    assert_eq!(orders[1].upstream_order_id, 101);
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn tenants_are_isolated(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    store.upsert_product(TENANT, &test_product(1)).await.unwrap();
    store
        .upsert_product("other.myshopify.com", &test_product(1))
        .await
        .unwrap();

    assert_eq!(store.count_products(TENANT).await.unwrap(), 1);
    assert_eq!(store.delete_products(TENANT).await.unwrap(), 1);
    assert_eq!(
        store.count_products("other.myshopify.com").await.unwrap(),
        1
    );
}

#[sqlx::test(migrations = "../../migrations")]
#[ignore = "requires a live Postgres via DATABASE_URL"]
async fn refund_and_line_item_round_trip(pool: sqlx::PgPool) {
    let store = PgStore::new(pool);
    store.upsert_order(TENANT, &test_order(100, 7)).await.unwrap();
    store
        .upsert_line_item(TENANT, &test_line_item(1001, 100))
        .await
        .unwrap();
    store.upsert_refund(TENANT, &test_refund(9001, 100)).await.unwrap();
    store.upsert_customer(TENANT, &test_customer(7)).await.unwrap();

    let line_items = store.list_line_items_for_order(TENANT, 100).await.unwrap();
    assert_eq!(line_items.len(), 1);
    assert_eq!(line_items[0].quantity, 2);

    let refunds = store.list_refunds_for_order(TENANT, 100).await.unwrap();
    assert_eq!(refunds.len(), 1);
    assert_eq!(refunds[0].total_refunded(), dec("25.00"));

    let customers = store.list_customers(TENANT).await.unwrap();
    assert_eq!(customers[0].email.as_deref(), Some("c7@example.com"));
}
