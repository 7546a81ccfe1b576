//! The customer LTV pass: recomputes order history aggregates, lifetime
//! value, and the behavioural segment for every mirrored customer.

use chrono::Utc;
use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use tokio::time::Instant;
use uuid::Uuid;

use profitlens_core::{
    predicted_ltv, Customer, CustomerMetrics, MetricsJobKind, MetricsReport, Segment, StoreError,
    TenantStore,
};

use super::{finish_report, MetricsOptions};

/// Derives [`CustomerMetrics`] for every customer of a tenant.
///
/// Figures come from the local order mirror, not the `reported_*` fields
/// the upstream API shipped: the mirror is the source of truth once synced,
/// and the two can legitimately disagree.
pub struct CustomerLtvJob<'a> {
    store: &'a dyn TenantStore,
    options: MetricsOptions,
}

impl<'a> CustomerLtvJob<'a> {
    #[must_use]
    pub fn new(store: &'a dyn TenantStore, options: MetricsOptions) -> Self {
        Self { store, options }
    }

    pub async fn run(&self, tenant: &str) -> MetricsReport {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        tracing::info!(%run_id, tenant, "computing customer LTV metrics");

        let customers = match self.store.list_customers(tenant).await {
            Ok(customers) => customers,
            Err(e) => {
                return finish_report(
                    run_id,
                    tenant,
                    MetricsJobKind::CustomerLtv,
                    0,
                    0,
                    start,
                    Some(format!("failed to list customers: {e}")),
                );
            }
        };

        let outcomes: Vec<(i64, Result<(), StoreError>)> =
            stream::iter(customers.into_iter().map(|customer| {
                let customer_id = customer.upstream_customer_id;
                async move { (customer_id, self.process_customer(tenant, customer).await) }
            }))
            .buffer_unordered(self.options.max_concurrent)
            .collect()
            .await;

        let mut processed = 0u64;
        let mut failed = 0u64;
        for (customer_id, outcome) in outcomes {
            match outcome {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(tenant, customer_id, error = %e, "LTV computation failed; skipping customer");
                }
            }
        }

        finish_report(
            run_id,
            tenant,
            MetricsJobKind::CustomerLtv,
            processed,
            failed,
            start,
            None,
        )
    }

    async fn process_customer(&self, tenant: &str, customer: Customer) -> Result<(), StoreError> {
        let now = Utc::now();
        // Sorted by created_at ascending, so first/last are the endpoints.
        let orders = self
            .store
            .list_orders_for_customer(tenant, customer.upstream_customer_id)
            .await?;

        let orders_count = u32::try_from(orders.len()).unwrap_or(u32::MAX);
        let total_spent: Decimal = orders.iter().map(|o| o.total_price).sum();
        let first_order_at = orders.first().map(|o| o.created_at);
        let last_order_at = orders.last().map(|o| o.created_at);
        let days_since_last_order = last_order_at.map(|t| (now - t).num_days());
        let average_order_value = if orders_count == 0 {
            Decimal::ZERO
        } else {
            total_spent / Decimal::from(orders_count)
        };

        let metrics = CustomerMetrics {
            orders_count,
            total_spent,
            first_order_at,
            last_order_at,
            days_since_last_order,
            average_order_value,
            lifetime_value: total_spent,
            predicted_ltv: predicted_ltv(average_order_value, orders_count),
            segment: Segment::classify(orders_count, total_spent, days_since_last_order),
            computed_at: now,
        };
        self.store
            .set_customer_metrics(tenant, customer.upstream_customer_id, &metrics)
            .await
    }
}
