//! [`TenantStore`] over Postgres.
//!
//! Every mirrored entity maps to one table keyed by `(tenant, upstream id)`.
//! Upserts are `ON CONFLICT DO UPDATE` statements restricted to raw mirror
//! columns, so the derived jsonb columns written by the `set_*` methods
//! survive re-ingestion. Embedded collections and derived metric groups are
//! serialized as jsonb rather than flattened into tables; nothing queries
//! inside them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde_json::Value;
use sqlx::PgPool;

use profitlens_core::{
    Customer, CustomerMetrics, LineItem, LineItemProfit, Order, OrderProfit, Product,
    ProductPerformance, Refund, RefundImpact, StoreError, SyncStatus, TenantRecord, TenantStore,
};

/// Postgres-backed tenant store.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn is_duplicate_key(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

/// Error mapping for the second upsert attempt: a duplicate key that
/// survived the retry becomes a typed conflict, anything else is a backend
/// failure.
fn retried_err(
    collection: &'static str,
    tenant: &str,
    upstream_id: i64,
    err: sqlx::Error,
) -> StoreError {
    if is_duplicate_key(&err) {
        StoreError::DuplicateKey {
            collection,
            tenant: tenant.to_owned(),
            upstream_id,
        }
    } else {
        StoreError::backend(err)
    }
}

fn to_json<T: serde::Serialize>(value: &T) -> Result<Value, StoreError> {
    serde_json::to_value(value).map_err(StoreError::backend)
}

fn from_json<T: serde::de::DeserializeOwned>(value: Value) -> Result<T, StoreError> {
    serde_json::from_value(value).map_err(StoreError::backend)
}

fn opt_from_json<T: serde::de::DeserializeOwned>(
    value: Option<Value>,
) -> Result<Option<T>, StoreError> {
    value.map(from_json).transpose()
}

fn count_to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or_default()
}

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

#[derive(sqlx::FromRow)]
struct TenantRow {
    shop_domain: String,
    access_token: String,
    is_active: bool,
    installed_at: DateTime<Utc>,
    uninstalled_at: Option<DateTime<Utc>>,
    sync_state: String,
    sync_started_at: Option<DateTime<Utc>>,
    last_synced_at: Option<DateTime<Utc>>,
    last_sync_error: Option<String>,
    sync_stats: Value,
    metrics_computed_at: Option<DateTime<Utc>>,
    metrics_stale: bool,
}

impl TenantRow {
    fn into_record(self) -> Result<TenantRecord, StoreError> {
        Ok(TenantRecord {
            shop_domain: self.shop_domain,
            access_token: self.access_token,
            is_active: self.is_active,
            installed_at: self.installed_at,
            uninstalled_at: self.uninstalled_at,
            sync: SyncStatus {
                state: self.sync_state.parse().map_err(StoreError::backend)?,
                started_at: self.sync_started_at,
                last_synced_at: self.last_synced_at,
                last_error: self.last_sync_error,
                stats: from_json(self.sync_stats)?,
            },
            metrics_computed_at: self.metrics_computed_at,
            metrics_stale: self.metrics_stale,
        })
    }
}

#[derive(sqlx::FromRow)]
struct ProductRow {
    upstream_product_id: i64,
    title: String,
    handle: Option<String>,
    vendor: Option<String>,
    product_type: Option<String>,
    status: String,
    tags: Vec<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    variants: Value,
    performance: Option<Value>,
}

impl ProductRow {
    fn into_product(self) -> Result<Product, StoreError> {
        Ok(Product {
            upstream_product_id: self.upstream_product_id,
            title: self.title,
            handle: self.handle,
            vendor: self.vendor,
            product_type: self.product_type,
            status: self.status,
            tags: self.tags,
            created_at: self.created_at,
            updated_at: self.updated_at,
            variants: from_json(self.variants)?,
            performance: opt_from_json(self.performance)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CustomerRow {
    upstream_customer_id: i64,
    email: Option<String>,
    first_name: Option<String>,
    last_name: Option<String>,
    reported_orders_count: i64,
    reported_total_spent: Decimal,
    tags: Vec<String>,
    created_at: Option<DateTime<Utc>>,
    metrics: Option<Value>,
}

impl CustomerRow {
    fn into_customer(self) -> Result<Customer, StoreError> {
        Ok(Customer {
            upstream_customer_id: self.upstream_customer_id,
            email: self.email,
            first_name: self.first_name,
            last_name: self.last_name,
            reported_orders_count: self.reported_orders_count,
            reported_total_spent: self.reported_total_spent,
            tags: self.tags,
            created_at: self.created_at,
            metrics: opt_from_json(self.metrics)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct OrderRow {
    upstream_order_id: i64,
    order_number: Option<String>,
    customer_upstream_id: Option<i64>,
    total_price: Decimal,
    subtotal_price: Decimal,
    total_discounts: Decimal,
    financial_status: String,
    currency: String,
    created_at: DateTime<Utc>,
    profit: Option<Value>,
}

impl OrderRow {
    fn into_order(self) -> Result<Order, StoreError> {
        Ok(Order {
            upstream_order_id: self.upstream_order_id,
            order_number: self.order_number,
            customer_upstream_id: self.customer_upstream_id,
            total_price: self.total_price,
            subtotal_price: self.subtotal_price,
            total_discounts: self.total_discounts,
            financial_status: self.financial_status,
            currency: self.currency,
            created_at: self.created_at,
            profit: opt_from_json(self.profit)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct LineItemRow {
    upstream_line_item_id: i64,
    order_upstream_id: i64,
    product_upstream_id: Option<i64>,
    variant_upstream_id: Option<i64>,
    title: String,
    sku: Option<String>,
    quantity: i64,
    price: Decimal,
    total_discount: Decimal,
    unit_cost: Option<Decimal>,
    created_at: DateTime<Utc>,
    profit: Option<Value>,
}

impl LineItemRow {
    fn into_line_item(self) -> Result<LineItem, StoreError> {
        Ok(LineItem {
            upstream_line_item_id: self.upstream_line_item_id,
            order_upstream_id: self.order_upstream_id,
            product_upstream_id: self.product_upstream_id,
            variant_upstream_id: self.variant_upstream_id,
            title: self.title,
            sku: self.sku,
            quantity: self.quantity,
            price: self.price,
            total_discount: self.total_discount,
            unit_cost: self.unit_cost,
            created_at: self.created_at,
            profit: opt_from_json(self.profit)?,
        })
    }
}

#[derive(sqlx::FromRow)]
struct RefundRow {
    upstream_refund_id: i64,
    order_upstream_id: i64,
    note: Option<String>,
    created_at: DateTime<Utc>,
    line_items: Value,
    transactions: Value,
    impact: Option<Value>,
}

impl RefundRow {
    fn into_refund(self) -> Result<Refund, StoreError> {
        Ok(Refund {
            upstream_refund_id: self.upstream_refund_id,
            order_upstream_id: self.order_upstream_id,
            note: self.note,
            created_at: self.created_at,
            line_items: from_json(self.line_items)?,
            transactions: from_json(self.transactions)?,
            impact: opt_from_json(self.impact)?,
        })
    }
}

// ---------------------------------------------------------------------------
// Raw upsert statements, split out so the duplicate-key retry can run each
// exactly twice.
// ---------------------------------------------------------------------------

impl PgStore {
    async fn upsert_product_once(
        &self,
        tenant: &str,
        product: &Product,
        variants: &Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO products \
                 (tenant, upstream_product_id, title, handle, vendor, product_type, \
                  status, tags, created_at, updated_at, variants) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11::jsonb) \
             ON CONFLICT (tenant, upstream_product_id) DO UPDATE SET \
                 title        = EXCLUDED.title, \
                 handle       = EXCLUDED.handle, \
                 vendor       = EXCLUDED.vendor, \
                 product_type = EXCLUDED.product_type, \
                 status       = EXCLUDED.status, \
                 tags         = EXCLUDED.tags, \
                 created_at   = EXCLUDED.created_at, \
                 updated_at   = EXCLUDED.updated_at, \
                 variants     = EXCLUDED.variants",
        )
        .bind(tenant)
        .bind(product.upstream_product_id)
        .bind(&product.title)
        .bind(&product.handle)
        .bind(&product.vendor)
        .bind(&product.product_type)
        .bind(&product.status)
        .bind(&product.tags)
        .bind(product.created_at)
        .bind(product.updated_at)
        .bind(variants)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_customer_once(
        &self,
        tenant: &str,
        customer: &Customer,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO customers \
                 (tenant, upstream_customer_id, email, first_name, last_name, \
                  reported_orders_count, reported_total_spent, tags, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (tenant, upstream_customer_id) DO UPDATE SET \
                 email                 = EXCLUDED.email, \
                 first_name            = EXCLUDED.first_name, \
                 last_name             = EXCLUDED.last_name, \
                 reported_orders_count = EXCLUDED.reported_orders_count, \
                 reported_total_spent  = EXCLUDED.reported_total_spent, \
                 tags                  = EXCLUDED.tags, \
                 created_at            = EXCLUDED.created_at",
        )
        .bind(tenant)
        .bind(customer.upstream_customer_id)
        .bind(&customer.email)
        .bind(&customer.first_name)
        .bind(&customer.last_name)
        .bind(customer.reported_orders_count)
        .bind(customer.reported_total_spent)
        .bind(&customer.tags)
        .bind(customer.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_order_once(&self, tenant: &str, order: &Order) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO orders \
                 (tenant, upstream_order_id, order_number, customer_upstream_id, \
                  total_price, subtotal_price, total_discounts, financial_status, \
                  currency, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10) \
             ON CONFLICT (tenant, upstream_order_id) DO UPDATE SET \
                 order_number         = EXCLUDED.order_number, \
                 customer_upstream_id = EXCLUDED.customer_upstream_id, \
                 total_price          = EXCLUDED.total_price, \
                 subtotal_price       = EXCLUDED.subtotal_price, \
                 total_discounts      = EXCLUDED.total_discounts, \
                 financial_status     = EXCLUDED.financial_status, \
                 currency             = EXCLUDED.currency, \
                 created_at           = EXCLUDED.created_at",
        )
        .bind(tenant)
        .bind(order.upstream_order_id)
        .bind(&order.order_number)
        .bind(order.customer_upstream_id)
        .bind(order.total_price)
        .bind(order.subtotal_price)
        .bind(order.total_discounts)
        .bind(&order.financial_status)
        .bind(&order.currency)
        .bind(order.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_line_item_once(
        &self,
        tenant: &str,
        line_item: &LineItem,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO line_items \
                 (tenant, upstream_line_item_id, order_upstream_id, product_upstream_id, \
                  variant_upstream_id, title, sku, quantity, price, total_discount, \
                  unit_cost, created_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             ON CONFLICT (tenant, upstream_line_item_id) DO UPDATE SET \
                 order_upstream_id   = EXCLUDED.order_upstream_id, \
                 product_upstream_id = EXCLUDED.product_upstream_id, \
                 variant_upstream_id = EXCLUDED.variant_upstream_id, \
                 title               = EXCLUDED.title, \
                 sku                 = EXCLUDED.sku, \
                 quantity            = EXCLUDED.quantity, \
                 price               = EXCLUDED.price, \
                 total_discount      = EXCLUDED.total_discount, \
                 unit_cost           = EXCLUDED.unit_cost, \
                 created_at          = EXCLUDED.created_at",
        )
        .bind(tenant)
        .bind(line_item.upstream_line_item_id)
        .bind(line_item.order_upstream_id)
        .bind(line_item.product_upstream_id)
        .bind(line_item.variant_upstream_id)
        .bind(&line_item.title)
        .bind(&line_item.sku)
        .bind(line_item.quantity)
        .bind(line_item.price)
        .bind(line_item.total_discount)
        .bind(line_item.unit_cost)
        .bind(line_item.created_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn upsert_refund_once(
        &self,
        tenant: &str,
        refund: &Refund,
        line_items: &Value,
        transactions: &Value,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO refunds \
                 (tenant, upstream_refund_id, order_upstream_id, note, created_at, \
                  line_items, transactions) \
             VALUES ($1, $2, $3, $4, $5, $6::jsonb, $7::jsonb) \
             ON CONFLICT (tenant, upstream_refund_id) DO UPDATE SET \
                 order_upstream_id = EXCLUDED.order_upstream_id, \
                 note              = EXCLUDED.note, \
                 created_at        = EXCLUDED.created_at, \
                 line_items        = EXCLUDED.line_items, \
                 transactions      = EXCLUDED.transactions",
        )
        .bind(tenant)
        .bind(refund.upstream_refund_id)
        .bind(refund.order_upstream_id)
        .bind(&refund.note)
        .bind(refund.created_at)
        .bind(line_items)
        .bind(transactions)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn count(&self, table: &'static str, tenant: &str) -> Result<u64, StoreError> {
        let count: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM {table} WHERE tenant = $1"))
                .bind(tenant)
                .fetch_one(&self.pool)
                .await
                .map_err(StoreError::backend)?;
        Ok(count_to_u64(count))
    }

    async fn delete_all(&self, table: &'static str, tenant: &str) -> Result<u64, StoreError> {
        let result = sqlx::query(&format!("DELETE FROM {table} WHERE tenant = $1"))
            .bind(tenant)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    /// Writes one derived jsonb column, mapping a missed row to `NotFound`.
    async fn set_derived(
        &self,
        collection: &'static str,
        statement: &str,
        tenant: &str,
        upstream_id: i64,
        value: &Value,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(statement)
            .bind(tenant)
            .bind(upstream_id)
            .bind(value)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection,
                tenant: tenant.to_owned(),
                upstream_id,
            });
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// TenantStore
// ---------------------------------------------------------------------------

#[async_trait]
impl TenantStore for PgStore {
    async fn get_tenant(&self, tenant: &str) -> Result<Option<TenantRecord>, StoreError> {
        let row: Option<TenantRow> =
            sqlx::query_as("SELECT * FROM tenants WHERE shop_domain = $1")
                .bind(tenant)
                .fetch_optional(&self.pool)
                .await
                .map_err(StoreError::backend)?;
        row.map(TenantRow::into_record).transpose()
    }

    async fn upsert_tenant(&self, record: &TenantRecord) -> Result<(), StoreError> {
        let stats = to_json(&record.sync.stats)?;
        sqlx::query(
            "INSERT INTO tenants \
                 (shop_domain, access_token, is_active, installed_at, uninstalled_at, \
                  sync_state, sync_started_at, last_synced_at, last_sync_error, \
                  sync_stats, metrics_computed_at, metrics_stale) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10::jsonb, $11, $12) \
             ON CONFLICT (shop_domain) DO UPDATE SET \
                 access_token        = EXCLUDED.access_token, \
                 is_active           = EXCLUDED.is_active, \
                 installed_at        = EXCLUDED.installed_at, \
                 uninstalled_at      = EXCLUDED.uninstalled_at, \
                 sync_state          = EXCLUDED.sync_state, \
                 sync_started_at     = EXCLUDED.sync_started_at, \
                 last_synced_at      = EXCLUDED.last_synced_at, \
                 last_sync_error     = EXCLUDED.last_sync_error, \
                 sync_stats          = EXCLUDED.sync_stats, \
                 metrics_computed_at = EXCLUDED.metrics_computed_at, \
                 metrics_stale       = EXCLUDED.metrics_stale",
        )
        .bind(&record.shop_domain)
        .bind(&record.access_token)
        .bind(record.is_active)
        .bind(record.installed_at)
        .bind(record.uninstalled_at)
        .bind(record.sync.state.as_str())
        .bind(record.sync.started_at)
        .bind(record.sync.last_synced_at)
        .bind(&record.sync.last_error)
        .bind(&stats)
        .bind(record.metrics_computed_at)
        .bind(record.metrics_stale)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        Ok(())
    }

    async fn update_sync_status(
        &self,
        tenant: &str,
        status: &SyncStatus,
    ) -> Result<(), StoreError> {
        let stats = to_json(&status.stats)?;
        let result = sqlx::query(
            "UPDATE tenants SET \
                 sync_state      = $2, \
                 sync_started_at = $3, \
                 last_synced_at  = $4, \
                 last_sync_error = $5, \
                 sync_stats      = $6::jsonb \
             WHERE shop_domain = $1",
        )
        .bind(tenant)
        .bind(status.state.as_str())
        .bind(status.started_at)
        .bind(status.last_synced_at)
        .bind(&status.last_error)
        .bind(&stats)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: "tenants",
                tenant: tenant.to_owned(),
                upstream_id: 0,
            });
        }
        Ok(())
    }

    async fn set_metrics_state(
        &self,
        tenant: &str,
        computed_at: Option<DateTime<Utc>>,
        stale: bool,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            "UPDATE tenants SET metrics_computed_at = $2, metrics_stale = $3 \
             WHERE shop_domain = $1",
        )
        .bind(tenant)
        .bind(computed_at)
        .bind(stale)
        .execute(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound {
                collection: "tenants",
                tenant: tenant.to_owned(),
                upstream_id: 0,
            });
        }
        Ok(())
    }

    async fn delete_tenant(&self, tenant: &str) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM tenants WHERE shop_domain = $1")
            .bind(tenant)
            .execute(&self.pool)
            .await
            .map_err(StoreError::backend)?;
        Ok(result.rows_affected())
    }

    // -- products -----------------------------------------------------------

    async fn upsert_product(&self, tenant: &str, product: &Product) -> Result<(), StoreError> {
        let variants = to_json(&product.variants)?;
        match self.upsert_product_once(tenant, product, &variants).await {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate_key(&e) => self
                .upsert_product_once(tenant, product, &variants)
                .await
                .map_err(|e| retried_err("products", tenant, product.upstream_product_id, e)),
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn get_product(
        &self,
        tenant: &str,
        upstream_product_id: i64,
    ) -> Result<Option<Product>, StoreError> {
        let row: Option<ProductRow> = sqlx::query_as(
            "SELECT upstream_product_id, title, handle, vendor, product_type, status, \
                    tags, created_at, updated_at, variants, performance \
             FROM products WHERE tenant = $1 AND upstream_product_id = $2",
        )
        .bind(tenant)
        .bind(upstream_product_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        row.map(ProductRow::into_product).transpose()
    }

    async fn list_products(&self, tenant: &str) -> Result<Vec<Product>, StoreError> {
        let rows: Vec<ProductRow> = sqlx::query_as(
            "SELECT upstream_product_id, title, handle, vendor, product_type, status, \
                    tags, created_at, updated_at, variants, performance \
             FROM products WHERE tenant = $1 ORDER BY upstream_product_id",
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(ProductRow::into_product).collect()
    }

    async fn count_products(&self, tenant: &str) -> Result<u64, StoreError> {
        self.count("products", tenant).await
    }

    async fn delete_products(&self, tenant: &str) -> Result<u64, StoreError> {
        self.delete_all("products", tenant).await
    }

    async fn set_product_performance(
        &self,
        tenant: &str,
        upstream_product_id: i64,
        performance: &ProductPerformance,
    ) -> Result<(), StoreError> {
        let value = to_json(performance)?;
        self.set_derived(
            "products",
            "UPDATE products SET performance = $3::jsonb \
             WHERE tenant = $1 AND upstream_product_id = $2",
            tenant,
            upstream_product_id,
            &value,
        )
        .await
    }

    // -- customers ----------------------------------------------------------

    async fn upsert_customer(&self, tenant: &str, customer: &Customer) -> Result<(), StoreError> {
        match self.upsert_customer_once(tenant, customer).await {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate_key(&e) => self
                .upsert_customer_once(tenant, customer)
                .await
                .map_err(|e| retried_err("customers", tenant, customer.upstream_customer_id, e)),
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn list_customers(&self, tenant: &str) -> Result<Vec<Customer>, StoreError> {
        let rows: Vec<CustomerRow> = sqlx::query_as(
            "SELECT upstream_customer_id, email, first_name, last_name, \
                    reported_orders_count, reported_total_spent, tags, created_at, metrics \
             FROM customers WHERE tenant = $1 ORDER BY upstream_customer_id",
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(CustomerRow::into_customer).collect()
    }

    async fn count_customers(&self, tenant: &str) -> Result<u64, StoreError> {
        self.count("customers", tenant).await
    }

    async fn delete_customers(&self, tenant: &str) -> Result<u64, StoreError> {
        self.delete_all("customers", tenant).await
    }

    async fn set_customer_metrics(
        &self,
        tenant: &str,
        upstream_customer_id: i64,
        metrics: &CustomerMetrics,
    ) -> Result<(), StoreError> {
        let value = to_json(metrics)?;
        self.set_derived(
            "customers",
            "UPDATE customers SET metrics = $3::jsonb \
             WHERE tenant = $1 AND upstream_customer_id = $2",
            tenant,
            upstream_customer_id,
            &value,
        )
        .await
    }

    // -- orders -------------------------------------------------------------

    async fn upsert_order(&self, tenant: &str, order: &Order) -> Result<(), StoreError> {
        match self.upsert_order_once(tenant, order).await {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate_key(&e) => self
                .upsert_order_once(tenant, order)
                .await
                .map_err(|e| retried_err("orders", tenant, order.upstream_order_id, e)),
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn list_orders(&self, tenant: &str) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT upstream_order_id, order_number, customer_upstream_id, total_price, \
                    subtotal_price, total_discounts, financial_status, currency, \
                    created_at, profit \
             FROM orders WHERE tenant = $1 ORDER BY created_at",
        )
        .bind(tenant)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn list_orders_for_customer(
        &self,
        tenant: &str,
        customer_upstream_id: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let rows: Vec<OrderRow> = sqlx::query_as(
            "SELECT upstream_order_id, order_number, customer_upstream_id, total_price, \
                    subtotal_price, total_discounts, financial_status, currency, \
                    created_at, profit \
             FROM orders WHERE tenant = $1 AND customer_upstream_id = $2 \
             ORDER BY created_at",
        )
        .bind(tenant)
        .bind(customer_upstream_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(OrderRow::into_order).collect()
    }

    async fn count_orders(&self, tenant: &str) -> Result<u64, StoreError> {
        self.count("orders", tenant).await
    }

    async fn delete_orders(&self, tenant: &str) -> Result<u64, StoreError> {
        self.delete_all("orders", tenant).await
    }

    async fn set_order_profit(
        &self,
        tenant: &str,
        upstream_order_id: i64,
        profit: &OrderProfit,
    ) -> Result<(), StoreError> {
        let value = to_json(profit)?;
        self.set_derived(
            "orders",
            "UPDATE orders SET profit = $3::jsonb \
             WHERE tenant = $1 AND upstream_order_id = $2",
            tenant,
            upstream_order_id,
            &value,
        )
        .await
    }

    // -- line items ---------------------------------------------------------

    async fn upsert_line_item(
        &self,
        tenant: &str,
        line_item: &LineItem,
    ) -> Result<(), StoreError> {
        match self.upsert_line_item_once(tenant, line_item).await {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate_key(&e) => {
                self.upsert_line_item_once(tenant, line_item)
                    .await
                    .map_err(|e| {
                        retried_err("line_items", tenant, line_item.upstream_line_item_id, e)
                    })
            }
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn list_line_items_for_order(
        &self,
        tenant: &str,
        order_upstream_id: i64,
    ) -> Result<Vec<LineItem>, StoreError> {
        let rows: Vec<LineItemRow> = sqlx::query_as(
            "SELECT upstream_line_item_id, order_upstream_id, product_upstream_id, \
                    variant_upstream_id, title, sku, quantity, price, total_discount, \
                    unit_cost, created_at, profit \
             FROM line_items WHERE tenant = $1 AND order_upstream_id = $2 \
             ORDER BY upstream_line_item_id",
        )
        .bind(tenant)
        .bind(order_upstream_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(LineItemRow::into_line_item).collect()
    }

    async fn list_line_items_for_product(
        &self,
        tenant: &str,
        product_upstream_id: i64,
    ) -> Result<Vec<LineItem>, StoreError> {
        let rows: Vec<LineItemRow> = sqlx::query_as(
            "SELECT upstream_line_item_id, order_upstream_id, product_upstream_id, \
                    variant_upstream_id, title, sku, quantity, price, total_discount, \
                    unit_cost, created_at, profit \
             FROM line_items WHERE tenant = $1 AND product_upstream_id = $2 \
             ORDER BY upstream_line_item_id",
        )
        .bind(tenant)
        .bind(product_upstream_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(LineItemRow::into_line_item).collect()
    }

    async fn count_line_items(&self, tenant: &str) -> Result<u64, StoreError> {
        self.count("line_items", tenant).await
    }

    async fn delete_line_items(&self, tenant: &str) -> Result<u64, StoreError> {
        self.delete_all("line_items", tenant).await
    }

    async fn set_line_item_profit(
        &self,
        tenant: &str,
        upstream_line_item_id: i64,
        profit: &LineItemProfit,
    ) -> Result<(), StoreError> {
        let value = to_json(profit)?;
        self.set_derived(
            "line_items",
            "UPDATE line_items SET profit = $3::jsonb \
             WHERE tenant = $1 AND upstream_line_item_id = $2",
            tenant,
            upstream_line_item_id,
            &value,
        )
        .await
    }

    // -- refunds ------------------------------------------------------------

    async fn upsert_refund(&self, tenant: &str, refund: &Refund) -> Result<(), StoreError> {
        let line_items = to_json(&refund.line_items)?;
        let transactions = to_json(&refund.transactions)?;
        match self
            .upsert_refund_once(tenant, refund, &line_items, &transactions)
            .await
        {
            Ok(()) => Ok(()),
            Err(e) if is_duplicate_key(&e) => self
                .upsert_refund_once(tenant, refund, &line_items, &transactions)
                .await
                .map_err(|e| retried_err("refunds", tenant, refund.upstream_refund_id, e)),
            Err(e) => Err(StoreError::backend(e)),
        }
    }

    async fn list_refunds_for_order(
        &self,
        tenant: &str,
        order_upstream_id: i64,
    ) -> Result<Vec<Refund>, StoreError> {
        let rows: Vec<RefundRow> = sqlx::query_as(
            "SELECT upstream_refund_id, order_upstream_id, note, created_at, \
                    line_items, transactions, impact \
             FROM refunds WHERE tenant = $1 AND order_upstream_id = $2 \
             ORDER BY upstream_refund_id",
        )
        .bind(tenant)
        .bind(order_upstream_id)
        .fetch_all(&self.pool)
        .await
        .map_err(StoreError::backend)?;
        rows.into_iter().map(RefundRow::into_refund).collect()
    }

    async fn count_refunds(&self, tenant: &str) -> Result<u64, StoreError> {
        self.count("refunds", tenant).await
    }

    async fn delete_refunds(&self, tenant: &str) -> Result<u64, StoreError> {
        self.delete_all("refunds", tenant).await
    }

    async fn set_refund_impact(
        &self,
        tenant: &str,
        upstream_refund_id: i64,
        impact: &RefundImpact,
    ) -> Result<(), StoreError> {
        let value = to_json(impact)?;
        self.set_derived(
            "refunds",
            "UPDATE refunds SET impact = $3::jsonb \
             WHERE tenant = $1 AND upstream_refund_id = $2",
            tenant,
            upstream_refund_id,
            &value,
        )
        .await
    }
}
