//! End-to-end pipeline tests: ingestion, metrics passes, and cleanup over
//! an in-memory store and a canned source.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde_json::{json, Value};

use profitlens_core::{MemoryStore, Segment, SyncState, TenantRecord, TenantStore};
use profitlens_shopify::SourceError;
use profitlens_sync::{
    run_full_sync, Cleaner, IngestOptions, Ingestor, MetricsOptions, Page, SourceReader,
};

const TENANT: &str = "demo-shop.myshopify.com";

fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}

/// Canned source: each entity type is a fixed list of pages, with cursors
/// encoded as page indices. Failure toggles simulate a dead upstream.
#[derive(Default)]
struct FakeSource {
    product_pages: Vec<Vec<Value>>,
    customer_pages: Vec<Vec<Value>>,
    order_pages: Vec<Vec<Value>>,
    refunds: HashMap<i64, Vec<Value>>,
    fail_products: bool,
    fail_customers: bool,
    fail_orders: bool,
    product_calls: AtomicU32,
}

fn page_at(pages: &[Vec<Value>], cursor: Option<&str>) -> Page {
    let index = cursor.and_then(|c| c.parse::<usize>().ok()).unwrap_or(0);
    let items = pages.get(index).cloned().unwrap_or_default();
    let next_cursor = (index + 1 < pages.len()).then(|| (index + 1).to_string());
    Page { items, next_cursor }
}

fn upstream_unavailable() -> SourceError {
    SourceError::UnexpectedStatus {
        status: 500,
        url: format!("https://{TENANT}/admin"),
    }
}

#[async_trait]
impl SourceReader for FakeSource {
    async fn products_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        self.product_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_products {
            return Err(upstream_unavailable());
        }
        Ok(page_at(&self.product_pages, cursor))
    }

    async fn customers_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        if self.fail_customers {
            return Err(upstream_unavailable());
        }
        Ok(page_at(&self.customer_pages, cursor))
    }

    async fn orders_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        if self.fail_orders {
            return Err(upstream_unavailable());
        }
        Ok(page_at(&self.order_pages, cursor))
    }

    async fn order_refunds(&self, order_id: i64) -> Result<Vec<Value>, SourceError> {
        Ok(self.refunds.get(&order_id).cloned().unwrap_or_default())
    }
}

fn product_json(id: i64, variant_id: i64, price: &str, cost: Option<&str>) -> Value {
    json!({
        "id": id,
        "title": format!("Widget {id}"),
        "handle": format!("widget-{id}"),
        "vendor": "Acme",
        "product_type": "Gadget",
        "status": "active",
        "tags": "featured, sale",
        "created_at": "2024-01-01T00:00:00Z",
        "updated_at": "2024-01-02T00:00:00Z",
        "variants": [{
            "id": variant_id,
            "title": "Default",
            "sku": format!("W-{id}"),
            "price": price,
            "cost": cost,
            "inventory_quantity": 5,
            "position": 1
        }]
    })
}

fn customer_json(id: i64) -> Value {
    json!({
        "id": id,
        "email": format!("c{id}@example.com"),
        "first_name": "Ada",
        "last_name": "Lovelace",
        "orders_count": 0,
        "total_spent": "0.00",
        "tags": "vip, wholesale",
        "created_at": "2024-01-01T00:00:00Z"
    })
}

fn order_json(
    id: i64,
    customer_id: i64,
    total: &str,
    line_item_id: i64,
    variant_id: i64,
    quantity: i64,
    price: &str,
    created_at: &str,
) -> Value {
    json!({
        "id": id,
        "name": format!("#{id}"),
        "customer": {"id": customer_id},
        "total_price": total,
        "subtotal_price": total,
        "total_discounts": "0.00",
        "financial_status": "paid",
        "currency": "USD",
        "created_at": created_at,
        "line_items": [{
            "id": line_item_id,
            "product_id": 1,
            "variant_id": variant_id,
            "title": "Widget 1",
            "sku": "W-1",
            "quantity": quantity,
            "price": price,
            "total_discount": "0.00"
        }]
    })
}

fn refund_json(id: i64, order_id: i64, line_item_id: i64, amount: &str) -> Value {
    json!({
        "id": id,
        "order_id": order_id,
        "note": "damaged in transit",
        "created_at": "2024-02-05T00:00:00Z",
        "refund_line_items": [{"line_item_id": line_item_id, "quantity": 1, "subtotal": amount}],
        "transactions": [{"amount": amount, "kind": "refund", "status": "success"}]
    })
}

/// One product (variant cost 20), one customer, one two-unit order of 100
/// with a 25 refund on one unit.
fn seeded_source() -> FakeSource {
    FakeSource {
        product_pages: vec![vec![product_json(1, 11, "50.00", Some("20.00"))]],
        customer_pages: vec![vec![customer_json(7)]],
        order_pages: vec![vec![order_json(
            100,
            7,
            "100.00",
            1001,
            11,
            2,
            "50.00",
            "2024-02-01T00:00:00Z",
        )]],
        refunds: HashMap::from([(100, vec![refund_json(9001, 100, 1001, "25.00")])]),
        ..FakeSource::default()
    }
}

async fn seeded_store() -> MemoryStore {
    let store = MemoryStore::new();
    store
        .upsert_tenant(&TenantRecord::new(TENANT, "shpat_test"))
        .await
        .unwrap();
    store
}

#[tokio::test]
async fn ingestion_mirrors_all_entity_types() {
    let source = seeded_source();
    let store = seeded_store().await;

    let report = Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;

    assert!(report.success, "error: {:?}", report.error);
    assert_eq!(report.stats.products, 1);
    assert_eq!(report.stats.customers, 1);
    assert_eq!(report.stats.orders, 1);
    assert_eq!(report.stats.line_items, 1);
    assert_eq!(report.stats.refunds, 1);
    assert_eq!(report.stats.errors, 0);

    let record = store.get_tenant(TENANT).await.unwrap().unwrap();
    assert_eq!(record.sync.state, SyncState::Completed);
    assert!(record.sync.last_synced_at.is_some());
    assert!(record.metrics_stale, "new raw data must mark metrics stale");
}

#[tokio::test]
async fn reingestion_is_idempotent() {
    let source = seeded_source();
    let store = seeded_store().await;
    let ingestor = Ingestor::new(&source, &store, IngestOptions::default());

    let first = ingestor.run(TENANT).await;
    let second = ingestor.run(TENANT).await;

    assert!(first.success && second.success);
    assert_eq!(first.stats, second.stats);
    assert_eq!(store.count_products(TENANT).await.unwrap(), 1);
    assert_eq!(store.count_customers(TENANT).await.unwrap(), 1);
    assert_eq!(store.count_orders(TENANT).await.unwrap(), 1);
    assert_eq!(store.count_line_items(TENANT).await.unwrap(), 1);
    assert_eq!(store.count_refunds(TENANT).await.unwrap(), 1);
}

#[tokio::test]
async fn pagination_follows_cursors_until_absent() {
    let mut source = seeded_source();
    source.product_pages = vec![
        vec![product_json(1, 11, "50.00", None)],
        vec![product_json(2, 21, "30.00", None)],
    ];
    let store = seeded_store().await;

    let report = Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;

    assert!(report.success);
    assert_eq!(report.stats.products, 2);
    assert_eq!(source.product_calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn full_final_page_without_cursor_terminates() {
    let source = seeded_source();
    let store = seeded_store().await;

    Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;

    // The only page carries items but no cursor; there is no trailing
    // empty-page fetch.
    assert_eq!(source.product_calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn customer_failure_degrades_but_run_completes() {
    let mut source = seeded_source();
    source.fail_customers = true;
    let store = seeded_store().await;

    let report = Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;

    assert!(report.success, "customer data is enrichment only");
    assert_eq!(report.stats.customers, 0);
    assert!(report.stats.errors >= 1);
    assert_eq!(report.stats.orders, 1);
    let record = store.get_tenant(TENANT).await.unwrap().unwrap();
    assert_eq!(record.sync.state, SyncState::Completed);
}

#[tokio::test]
async fn product_failure_fails_run_and_skips_metrics() {
    let mut source = seeded_source();
    source.fail_products = true;
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;

    assert!(!outcome.sync.success);
    assert!(outcome.metrics.is_empty());
    assert!(!outcome.success());
    let record = store.get_tenant(TENANT).await.unwrap().unwrap();
    assert_eq!(record.sync.state, SyncState::Failed);
    assert!(record.sync.last_error.is_some());
}

#[tokio::test]
async fn order_failure_leaves_mirrored_products_and_customers_intact() {
    let mut source = seeded_source();
    source.fail_orders = true;
    let store = seeded_store().await;

    let report = Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;

    assert!(!report.success);
    assert_eq!(store.count_products(TENANT).await.unwrap(), 1);
    assert_eq!(store.count_customers(TENANT).await.unwrap(), 1);
    assert_eq!(store.count_orders(TENANT).await.unwrap(), 0);
}

#[tokio::test]
async fn unknown_tenant_fails_ingestion() {
    let source = seeded_source();
    let store = MemoryStore::new();

    let report = Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;

    assert!(!report.success);
    assert!(report.error.unwrap().contains("no tenant record"));
}

#[tokio::test]
async fn profit_pass_computes_line_refund_and_order_figures() {
    let source = seeded_source();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    // Line: 2 × 50 revenue, 2 × 20 cost.
    let line_items = store.list_line_items_for_order(TENANT, 100).await.unwrap();
    let line_profit = line_items[0].profit.as_ref().unwrap();
    assert!(line_profit.cost_known);
    assert_eq!(line_profit.unit_cost, dec("20.00"));
    assert_eq!(line_profit.total_cost, dec("40.00"));
    assert_eq!(line_profit.gross_profit, dec("60.00"));

    // Refund: 25 returned, 1 × 20 cost recovered.
    let refunds = store.list_refunds_for_order(TENANT, 100).await.unwrap();
    let impact = refunds[0].impact.as_ref().unwrap();
    assert_eq!(impact.total_refunded, dec("25.00"));
    assert_eq!(impact.cost_recovered, dec("20.00"));
    assert_eq!(impact.profit_impact, dec("5.00"));

    // Order: 100 − 40 − 5.
    let orders = store.list_orders(TENANT).await.unwrap();
    let profit = orders[0].profit.as_ref().unwrap();
    assert!(profit.cost_data_available);
    assert_eq!(profit.total_cost, dec("40.00"));
    assert_eq!(profit.refund_impact, dec("5.00"));
    assert_eq!(profit.gross_profit, dec("55.00"));
    assert_eq!(profit.profit_margin.unwrap(), dec("55"));
}

#[tokio::test]
async fn order_profit_subtracts_cost_and_refund_from_revenue() {
    // 100.00 order, 60.00 cost, 10.00 order-level refund with no returned
    // units: 100 − 60 − 10 = 30 gross, 30% margin.
    let source = FakeSource {
        product_pages: vec![vec![product_json(2, 21, "100.00", Some("60.00"))]],
        customer_pages: vec![vec![customer_json(7)]],
        order_pages: vec![vec![order_json(
            200,
            7,
            "100.00",
            2001,
            21,
            1,
            "100.00",
            "2024-02-01T00:00:00Z",
        )]],
        refunds: HashMap::from([(
            200,
            vec![json!({
                "id": 9002,
                "order_id": 200,
                "note": "goodwill",
                "created_at": "2024-02-05T00:00:00Z",
                "refund_line_items": [],
                "transactions": [{"amount": "10.00", "kind": "refund", "status": "success"}]
            })],
        )]),
        ..FakeSource::default()
    };
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    let refunds = store.list_refunds_for_order(TENANT, 200).await.unwrap();
    let impact = refunds[0].impact.as_ref().unwrap();
    assert_eq!(impact.total_refunded, dec("10.00"));
    assert_eq!(impact.cost_recovered, Decimal::ZERO);
    assert_eq!(impact.profit_impact, dec("10.00"));

    let orders = store.list_orders(TENANT).await.unwrap();
    let profit = orders[0].profit.as_ref().unwrap();
    assert!(profit.cost_data_available);
    assert_eq!(profit.total_cost, dec("60.00"));
    assert_eq!(profit.gross_profit, dec("30.00"));
    assert_eq!(profit.profit_margin.unwrap(), dec("30"));
}

#[tokio::test]
async fn margin_is_absent_without_cost_data() {
    let mut source = seeded_source();
    source.product_pages = vec![vec![product_json(1, 11, "50.00", None)]];
    source.refunds.clear();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    let orders = store.list_orders(TENANT).await.unwrap();
    let profit = orders[0].profit.as_ref().unwrap();
    assert!(!profit.cost_data_available);
    assert_eq!(profit.profit_margin, None, "no margin from fabricated zero costs");
    assert_eq!(profit.total_cost, Decimal::ZERO);

    let products = store.list_products(TENANT).await.unwrap();
    let performance = products[0].performance.as_ref().unwrap();
    assert_eq!(performance.profit_margin, None);
}

#[tokio::test]
async fn ltv_pass_recomputes_from_order_mirror() {
    let source = seeded_source();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    let customers = store.list_customers(TENANT).await.unwrap();
    let metrics = customers[0].metrics.as_ref().unwrap();
    // Recomputed from the mirror, not the reported_* fields (which said 0).
    assert_eq!(metrics.orders_count, 1);
    assert_eq!(metrics.total_spent, dec("100.00"));
    assert_eq!(metrics.lifetime_value, dec("100.00"));
    assert_eq!(metrics.average_order_value, dec("100.00"));
    // 1 order: multiplier floor of 5 applies.
    assert_eq!(metrics.predicted_ltv, dec("500.00"));
    assert!(metrics.first_order_at.is_some());
    assert_eq!(metrics.first_order_at, metrics.last_order_at);
}

#[tokio::test]
async fn high_spend_customer_is_vip_despite_stale_recency() {
    let mut source = seeded_source();
    source.order_pages = vec![vec![
        order_json(100, 7, "500.00", 1001, 11, 1, "500.00", "2023-01-01T00:00:00Z"),
        order_json(101, 7, "500.00", 1011, 11, 1, "500.00", "2023-02-01T00:00:00Z"),
        order_json(102, 7, "500.00", 1021, 11, 1, "500.00", "2023-03-01T00:00:00Z"),
    ]];
    source.refunds.clear();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    let customers = store.list_customers(TENANT).await.unwrap();
    let metrics = customers[0].metrics.as_ref().unwrap();
    assert_eq!(metrics.orders_count, 3);
    assert_eq!(metrics.total_spent, dec("1500.00"));
    // Orders are years old, but total spend over 1000 wins.
    assert_eq!(metrics.segment, Segment::Vip);
    // aov 500 × (2 × 3 orders) = 3000.
    assert_eq!(metrics.predicted_ltv, dec("3000.00"));
}

#[tokio::test]
async fn performance_pass_aggregates_per_product() {
    let source = seeded_source();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    let product = store.get_product(TENANT, 1).await.unwrap().unwrap();
    let performance = product.performance.as_ref().unwrap();
    assert_eq!(performance.total_quantity_sold, 2);
    assert_eq!(performance.total_revenue, dec("100.00"));
    assert_eq!(performance.total_profit, dec("60.00"));
    assert_eq!(performance.profit_margin.unwrap(), dec("60"));
    // One distinct order.
    assert_eq!(performance.average_order_value, dec("100.00"));
    assert!(performance.last_sold_at.is_some());

    let variant = &performance.variant_metrics[0];
    assert_eq!(variant.upstream_variant_id, 11);
    assert_eq!(variant.profit_per_unit.unwrap(), dec("30.00"));
    assert_eq!(variant.gross_margin.unwrap(), dec("60"));
}

#[tokio::test]
async fn reingestion_preserves_derived_fields() {
    let source = seeded_source();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    // Raw re-ingestion must not clobber previously computed metrics.
    let report = Ingestor::new(&source, &store, IngestOptions::default())
        .run(TENANT)
        .await;
    assert!(report.success);

    let product = store.get_product(TENANT, 1).await.unwrap().unwrap();
    assert!(product.performance.is_some());
    let customers = store.list_customers(TENANT).await.unwrap();
    assert!(customers[0].metrics.is_some());
    let orders = store.list_orders(TENANT).await.unwrap();
    assert!(orders[0].profit.is_some());
}

#[tokio::test]
async fn full_sync_marks_metrics_fresh() {
    let source = seeded_source();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;

    assert!(outcome.success());
    assert_eq!(outcome.metrics.len(), 3);
    let record = store.get_tenant(TENANT).await.unwrap().unwrap();
    assert!(record.metrics_computed_at.is_some());
    assert!(!record.metrics_stale);
}

#[tokio::test]
async fn cleanup_removes_every_trace_and_verifies() {
    let source = seeded_source();
    let store = seeded_store().await;

    let outcome = run_full_sync(
        &source,
        &store,
        TENANT,
        IngestOptions::default(),
        MetricsOptions::default(),
    )
    .await;
    assert!(outcome.success());

    let report = Cleaner::new(&store).run(TENANT).await;

    assert!(report.success, "error: {:?}", report.error);
    assert!(report.verified);
    assert_eq!(report.deleted.products, 1);
    assert_eq!(report.deleted.customers, 1);
    assert_eq!(report.deleted.orders, 1);
    assert_eq!(report.deleted.line_items, 1);
    assert_eq!(report.deleted.refunds, 1);

    assert_eq!(store.count_products(TENANT).await.unwrap(), 0);
    assert_eq!(store.count_orders(TENANT).await.unwrap(), 0);
    assert!(store.get_tenant(TENANT).await.unwrap().is_none());
}

#[tokio::test]
async fn cleanup_of_empty_tenant_is_a_verified_noop() {
    let store = seeded_store().await;

    let report = Cleaner::new(&store).run(TENANT).await;

    assert!(report.success);
    assert!(report.verified);
    assert_eq!(report.deleted.total_records(), 0);
}
