//! In-memory [`TenantStore`] adapter.
//!
//! Backs the pipeline tests and local dry runs. Mirrors the merge semantics
//! of the Postgres adapter exactly: entity upserts replace raw mirror fields
//! and preserve any derived metric group already stored, so both adapters
//! honour the derived-field-isolation invariant.

use std::collections::BTreeMap;
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::customers::{Customer, CustomerMetrics};
use crate::orders::{LineItem, LineItemProfit, Order, OrderProfit};
use crate::products::{Product, ProductPerformance};
use crate::refunds::{Refund, RefundImpact};
use crate::store::{StoreError, TenantStore};
use crate::tenant::{SyncStatus, TenantRecord};

type Key = (String, i64);

#[derive(Default)]
struct Collections {
    tenants: BTreeMap<String, TenantRecord>,
    products: BTreeMap<Key, Product>,
    customers: BTreeMap<Key, Customer>,
    orders: BTreeMap<Key, Order>,
    line_items: BTreeMap<Key, LineItem>,
    refunds: BTreeMap<Key, Refund>,
}

/// In-memory document store, safe to share across tasks.
#[derive(Default)]
pub struct MemoryStore {
    inner: RwLock<Collections>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Collections> {
        self.inner.read().expect("memory store lock poisoned")
    }

    fn write(&self) -> RwLockWriteGuard<'_, Collections> {
        self.inner.write().expect("memory store lock poisoned")
    }
}

fn key(tenant: &str, upstream_id: i64) -> Key {
    (tenant.to_owned(), upstream_id)
}

/// All keys for `tenant` lie in this half-open range of the key space.
fn tenant_range(tenant: &str) -> std::ops::RangeInclusive<Key> {
    (tenant.to_owned(), i64::MIN)..=(tenant.to_owned(), i64::MAX)
}

fn list_for_tenant<T: Clone>(map: &BTreeMap<Key, T>, tenant: &str) -> Vec<T> {
    map.range(tenant_range(tenant)).map(|(_, v)| v.clone()).collect()
}

fn count_for_tenant<T>(map: &BTreeMap<Key, T>, tenant: &str) -> u64 {
    map.range(tenant_range(tenant)).count() as u64
}

fn delete_for_tenant<T>(map: &mut BTreeMap<Key, T>, tenant: &str) -> u64 {
    let keys: Vec<Key> = map.range(tenant_range(tenant)).map(|(k, _)| k.clone()).collect();
    for k in &keys {
        map.remove(k);
    }
    keys.len() as u64
}

fn not_found(collection: &'static str, tenant: &str, upstream_id: i64) -> StoreError {
    StoreError::NotFound {
        collection,
        tenant: tenant.to_owned(),
        upstream_id,
    }
}

#[async_trait]
impl TenantStore for MemoryStore {
    async fn get_tenant(&self, tenant: &str) -> Result<Option<TenantRecord>, StoreError> {
        Ok(self.read().tenants.get(tenant).cloned())
    }

    async fn upsert_tenant(&self, record: &TenantRecord) -> Result<(), StoreError> {
        self.write()
            .tenants
            .insert(record.shop_domain.clone(), record.clone());
        Ok(())
    }

    async fn update_sync_status(
        &self,
        tenant: &str,
        status: &SyncStatus,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let record = inner
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| not_found("tenants", tenant, 0))?;
        record.sync = status.clone();
        Ok(())
    }

    async fn set_metrics_state(
        &self,
        tenant: &str,
        computed_at: Option<DateTime<Utc>>,
        stale: bool,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let record = inner
            .tenants
            .get_mut(tenant)
            .ok_or_else(|| not_found("tenants", tenant, 0))?;
        record.metrics_computed_at = computed_at;
        record.metrics_stale = stale;
        Ok(())
    }

    async fn delete_tenant(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(u64::from(self.write().tenants.remove(tenant).is_some()))
    }

    async fn upsert_product(&self, tenant: &str, product: &Product) -> Result<(), StoreError> {
        let mut inner = self.write();
        let slot = inner
            .products
            .entry(key(tenant, product.upstream_product_id));
        match slot {
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                let performance = occupied.get().performance.clone();
                let mut replacement = product.clone();
                replacement.performance = performance;
                occupied.insert(replacement);
            }
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(product.clone());
            }
        }
        Ok(())
    }

    async fn get_product(
        &self,
        tenant: &str,
        upstream_product_id: i64,
    ) -> Result<Option<Product>, StoreError> {
        Ok(self
            .read()
            .products
            .get(&key(tenant, upstream_product_id))
            .cloned())
    }

    async fn list_products(&self, tenant: &str) -> Result<Vec<Product>, StoreError> {
        Ok(list_for_tenant(&self.read().products, tenant))
    }

    async fn count_products(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(count_for_tenant(&self.read().products, tenant))
    }

    async fn delete_products(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(delete_for_tenant(&mut self.write().products, tenant))
    }

    async fn set_product_performance(
        &self,
        tenant: &str,
        upstream_product_id: i64,
        performance: &ProductPerformance,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let product = inner
            .products
            .get_mut(&key(tenant, upstream_product_id))
            .ok_or_else(|| not_found("products", tenant, upstream_product_id))?;
        product.performance = Some(performance.clone());
        Ok(())
    }

    async fn upsert_customer(&self, tenant: &str, customer: &Customer) -> Result<(), StoreError> {
        let mut inner = self.write();
        let slot = inner
            .customers
            .entry(key(tenant, customer.upstream_customer_id));
        match slot {
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                let metrics = occupied.get().metrics.clone();
                let mut replacement = customer.clone();
                replacement.metrics = metrics;
                occupied.insert(replacement);
            }
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(customer.clone());
            }
        }
        Ok(())
    }

    async fn list_customers(&self, tenant: &str) -> Result<Vec<Customer>, StoreError> {
        Ok(list_for_tenant(&self.read().customers, tenant))
    }

    async fn count_customers(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(count_for_tenant(&self.read().customers, tenant))
    }

    async fn delete_customers(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(delete_for_tenant(&mut self.write().customers, tenant))
    }

    async fn set_customer_metrics(
        &self,
        tenant: &str,
        upstream_customer_id: i64,
        metrics: &CustomerMetrics,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let customer = inner
            .customers
            .get_mut(&key(tenant, upstream_customer_id))
            .ok_or_else(|| not_found("customers", tenant, upstream_customer_id))?;
        customer.metrics = Some(metrics.clone());
        Ok(())
    }

    async fn upsert_order(&self, tenant: &str, order: &Order) -> Result<(), StoreError> {
        let mut inner = self.write();
        let slot = inner.orders.entry(key(tenant, order.upstream_order_id));
        match slot {
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                let profit = occupied.get().profit.clone();
                let mut replacement = order.clone();
                replacement.profit = profit;
                occupied.insert(replacement);
            }
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(order.clone());
            }
        }
        Ok(())
    }

    async fn list_orders(&self, tenant: &str) -> Result<Vec<Order>, StoreError> {
        Ok(list_for_tenant(&self.read().orders, tenant))
    }

    async fn list_orders_for_customer(
        &self,
        tenant: &str,
        customer_upstream_id: i64,
    ) -> Result<Vec<Order>, StoreError> {
        let mut orders: Vec<Order> = self
            .read()
            .orders
            .range(tenant_range(tenant))
            .filter(|(_, o)| o.customer_upstream_id == Some(customer_upstream_id))
            .map(|(_, o)| o.clone())
            .collect();
        orders.sort_by_key(|o| o.created_at);
        Ok(orders)
    }

    async fn count_orders(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(count_for_tenant(&self.read().orders, tenant))
    }

    async fn delete_orders(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(delete_for_tenant(&mut self.write().orders, tenant))
    }

    async fn set_order_profit(
        &self,
        tenant: &str,
        upstream_order_id: i64,
        profit: &OrderProfit,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let order = inner
            .orders
            .get_mut(&key(tenant, upstream_order_id))
            .ok_or_else(|| not_found("orders", tenant, upstream_order_id))?;
        order.profit = Some(profit.clone());
        Ok(())
    }

    async fn upsert_line_item(
        &self,
        tenant: &str,
        line_item: &LineItem,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let slot = inner
            .line_items
            .entry(key(tenant, line_item.upstream_line_item_id));
        match slot {
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                let profit = occupied.get().profit.clone();
                let mut replacement = line_item.clone();
                replacement.profit = profit;
                occupied.insert(replacement);
            }
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(line_item.clone());
            }
        }
        Ok(())
    }

    async fn list_line_items_for_order(
        &self,
        tenant: &str,
        order_upstream_id: i64,
    ) -> Result<Vec<LineItem>, StoreError> {
        Ok(self
            .read()
            .line_items
            .range(tenant_range(tenant))
            .filter(|(_, li)| li.order_upstream_id == order_upstream_id)
            .map(|(_, li)| li.clone())
            .collect())
    }

    async fn list_line_items_for_product(
        &self,
        tenant: &str,
        product_upstream_id: i64,
    ) -> Result<Vec<LineItem>, StoreError> {
        Ok(self
            .read()
            .line_items
            .range(tenant_range(tenant))
            .filter(|(_, li)| li.product_upstream_id == Some(product_upstream_id))
            .map(|(_, li)| li.clone())
            .collect())
    }

    async fn count_line_items(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(count_for_tenant(&self.read().line_items, tenant))
    }

    async fn delete_line_items(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(delete_for_tenant(&mut self.write().line_items, tenant))
    }

    async fn set_line_item_profit(
        &self,
        tenant: &str,
        upstream_line_item_id: i64,
        profit: &LineItemProfit,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let line_item = inner
            .line_items
            .get_mut(&key(tenant, upstream_line_item_id))
            .ok_or_else(|| not_found("line_items", tenant, upstream_line_item_id))?;
        line_item.profit = Some(profit.clone());
        Ok(())
    }

    async fn upsert_refund(&self, tenant: &str, refund: &Refund) -> Result<(), StoreError> {
        let mut inner = self.write();
        let slot = inner.refunds.entry(key(tenant, refund.upstream_refund_id));
        match slot {
            std::collections::btree_map::Entry::Occupied(mut occupied) => {
                let impact = occupied.get().impact.clone();
                let mut replacement = refund.clone();
                replacement.impact = impact;
                occupied.insert(replacement);
            }
            std::collections::btree_map::Entry::Vacant(vacant) => {
                vacant.insert(refund.clone());
            }
        }
        Ok(())
    }

    async fn list_refunds_for_order(
        &self,
        tenant: &str,
        order_upstream_id: i64,
    ) -> Result<Vec<Refund>, StoreError> {
        Ok(self
            .read()
            .refunds
            .range(tenant_range(tenant))
            .filter(|(_, r)| r.order_upstream_id == order_upstream_id)
            .map(|(_, r)| r.clone())
            .collect())
    }

    async fn count_refunds(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(count_for_tenant(&self.read().refunds, tenant))
    }

    async fn delete_refunds(&self, tenant: &str) -> Result<u64, StoreError> {
        Ok(delete_for_tenant(&mut self.write().refunds, tenant))
    }

    async fn set_refund_impact(
        &self,
        tenant: &str,
        upstream_refund_id: i64,
        impact: &RefundImpact,
    ) -> Result<(), StoreError> {
        let mut inner = self.write();
        let refund = inner
            .refunds
            .get_mut(&key(tenant, upstream_refund_id))
            .ok_or_else(|| not_found("refunds", tenant, upstream_refund_id))?;
        refund.impact = Some(impact.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
