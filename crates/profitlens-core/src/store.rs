//! The tenant store capability consumed by the pipeline.
//!
//! [`TenantStore`] is the only durable state the pipeline touches. The
//! method families are deliberately disjoint: `upsert_*` writes raw mirror
//! fields and must preserve any derived fields already stored (field-level
//! merge, not document replace), while `set_*` writes derived metric groups
//! and is called only by the metrics jobs. Adapters enforce uniqueness on
//! `(tenant, upstream-id)` for every mirrored entity.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::customers::{Customer, CustomerMetrics};
use crate::orders::{LineItem, LineItemProfit, Order, OrderProfit};
use crate::products::{Product, ProductPerformance};
use crate::refunds::{Refund, RefundImpact};
use crate::tenant::{SyncStatus, TenantRecord};

/// Errors surfaced by a [`TenantStore`] adapter.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The referenced record does not exist.
    #[error("{collection} record not found for tenant {tenant}, upstream id {upstream_id}")]
    NotFound {
        collection: &'static str,
        tenant: String,
        upstream_id: i64,
    },

    /// A uniqueness violation that survived the adapter's single internal
    /// retry. Under concurrent ingestion of the same tenant one race is
    /// expected and absorbed; a second is surfaced.
    #[error("duplicate key for {collection} ({tenant}, {upstream_id})")]
    DuplicateKey {
        collection: &'static str,
        tenant: String,
        upstream_id: i64,
    },

    /// Any other storage-backend failure.
    #[error("storage backend error: {0}")]
    Backend(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wraps an arbitrary backend error.
    pub fn backend<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Backend(Box::new(err))
    }
}

/// Document-store capability scoped by tenant. See the module docs for the
/// raw-mirror vs. derived-field writer split.
#[async_trait]
pub trait TenantStore: Send + Sync {
    // -- tenant records -----------------------------------------------------

    async fn get_tenant(&self, tenant: &str) -> Result<Option<TenantRecord>, StoreError>;

    /// Inserts or fully replaces the tenant record. Unlike entity upserts
    /// the record is authoritative as a whole; there is exactly one per
    /// tenant.
    async fn upsert_tenant(&self, record: &TenantRecord) -> Result<(), StoreError>;

    /// Persists the sync-status block without touching credentials or
    /// metrics flags.
    async fn update_sync_status(&self, tenant: &str, status: &SyncStatus)
        -> Result<(), StoreError>;

    /// Persists the metrics freshness flags.
    async fn set_metrics_state(
        &self,
        tenant: &str,
        computed_at: Option<DateTime<Utc>>,
        stale: bool,
    ) -> Result<(), StoreError>;

    /// Removes the tenant record entirely. Returns the number of records
    /// removed (0 or 1).
    async fn delete_tenant(&self, tenant: &str) -> Result<u64, StoreError>;

    // -- products -----------------------------------------------------------

    async fn upsert_product(&self, tenant: &str, product: &Product) -> Result<(), StoreError>;
    async fn get_product(
        &self,
        tenant: &str,
        upstream_product_id: i64,
    ) -> Result<Option<Product>, StoreError>;
    async fn list_products(&self, tenant: &str) -> Result<Vec<Product>, StoreError>;
    async fn count_products(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn delete_products(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn set_product_performance(
        &self,
        tenant: &str,
        upstream_product_id: i64,
        performance: &ProductPerformance,
    ) -> Result<(), StoreError>;

    // -- customers ----------------------------------------------------------

    async fn upsert_customer(&self, tenant: &str, customer: &Customer) -> Result<(), StoreError>;
    async fn list_customers(&self, tenant: &str) -> Result<Vec<Customer>, StoreError>;
    async fn count_customers(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn delete_customers(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn set_customer_metrics(
        &self,
        tenant: &str,
        upstream_customer_id: i64,
        metrics: &CustomerMetrics,
    ) -> Result<(), StoreError>;

    // -- orders -------------------------------------------------------------

    async fn upsert_order(&self, tenant: &str, order: &Order) -> Result<(), StoreError>;
    async fn list_orders(&self, tenant: &str) -> Result<Vec<Order>, StoreError>;
    /// Orders referencing the given customer, sorted by `created_at`
    /// ascending.
    async fn list_orders_for_customer(
        &self,
        tenant: &str,
        customer_upstream_id: i64,
    ) -> Result<Vec<Order>, StoreError>;
    async fn count_orders(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn delete_orders(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn set_order_profit(
        &self,
        tenant: &str,
        upstream_order_id: i64,
        profit: &OrderProfit,
    ) -> Result<(), StoreError>;

    // -- line items ---------------------------------------------------------

    async fn upsert_line_item(&self, tenant: &str, line_item: &LineItem)
        -> Result<(), StoreError>;
    async fn list_line_items_for_order(
        &self,
        tenant: &str,
        order_upstream_id: i64,
    ) -> Result<Vec<LineItem>, StoreError>;
    async fn list_line_items_for_product(
        &self,
        tenant: &str,
        product_upstream_id: i64,
    ) -> Result<Vec<LineItem>, StoreError>;
    async fn count_line_items(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn delete_line_items(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn set_line_item_profit(
        &self,
        tenant: &str,
        upstream_line_item_id: i64,
        profit: &LineItemProfit,
    ) -> Result<(), StoreError>;

    // -- refunds ------------------------------------------------------------

    async fn upsert_refund(&self, tenant: &str, refund: &Refund) -> Result<(), StoreError>;
    async fn list_refunds_for_order(
        &self,
        tenant: &str,
        order_upstream_id: i64,
    ) -> Result<Vec<Refund>, StoreError>;
    async fn count_refunds(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn delete_refunds(&self, tenant: &str) -> Result<u64, StoreError>;
    async fn set_refund_impact(
        &self,
        tenant: &str,
        upstream_refund_id: i64,
        impact: &RefundImpact,
    ) -> Result<(), StoreError>;
}
