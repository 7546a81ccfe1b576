//! The product performance pass: aggregates sales figures per product and
//! snapshots per-variant unit economics.

use std::collections::HashSet;

use chrono::Utc;
use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use tokio::time::Instant;
use uuid::Uuid;

use profitlens_core::{
    profit_margin, MetricsJobKind, MetricsReport, Product, ProductPerformance, StoreError,
    TenantStore, VariantMetrics,
};

use super::{finish_report, MetricsOptions};

/// Derives [`ProductPerformance`] for every product of a tenant.
///
/// Prefers the line-item profit figures written by the profit pass; for
/// line items the profit pass has not touched yet it falls back to
/// resolving costs from the product's own variants, so the pass still
/// produces sane aggregates when run standalone.
pub struct ProductPerformanceJob<'a> {
    store: &'a dyn TenantStore,
    options: MetricsOptions,
}

impl<'a> ProductPerformanceJob<'a> {
    #[must_use]
    pub fn new(store: &'a dyn TenantStore, options: MetricsOptions) -> Self {
        Self { store, options }
    }

    pub async fn run(&self, tenant: &str) -> MetricsReport {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        tracing::info!(%run_id, tenant, "computing product performance metrics");

        let products = match self.store.list_products(tenant).await {
            Ok(products) => products,
            Err(e) => {
                return finish_report(
                    run_id,
                    tenant,
                    MetricsJobKind::ProductPerformance,
                    0,
                    0,
                    start,
                    Some(format!("failed to list products: {e}")),
                );
            }
        };

        let outcomes: Vec<(i64, Result<(), StoreError>)> =
            stream::iter(products.into_iter().map(|product| {
                let product_id = product.upstream_product_id;
                async move { (product_id, self.process_product(tenant, product).await) }
            }))
            .buffer_unordered(self.options.max_concurrent)
            .collect()
            .await;

        let mut processed = 0u64;
        let mut failed = 0u64;
        for (product_id, outcome) in outcomes {
            match outcome {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(tenant, product_id, error = %e, "performance computation failed; skipping product");
                }
            }
        }

        finish_report(
            run_id,
            tenant,
            MetricsJobKind::ProductPerformance,
            processed,
            failed,
            start,
            None,
        )
    }

    async fn process_product(&self, tenant: &str, product: Product) -> Result<(), StoreError> {
        let now = Utc::now();
        let line_items = self
            .store
            .list_line_items_for_product(tenant, product.upstream_product_id)
            .await?;

        let mut total_quantity_sold = 0i64;
        let mut total_revenue = Decimal::ZERO;
        let mut total_profit = Decimal::ZERO;
        let mut any_cost_known = false;
        let mut order_ids: HashSet<i64> = HashSet::new();
        let mut last_sold_at = None;

        for line_item in &line_items {
            total_quantity_sold += line_item.quantity;
            let revenue = line_item.net_revenue();
            total_revenue += revenue;
            order_ids.insert(line_item.order_upstream_id);
            if last_sold_at.is_none_or(|t| line_item.created_at > t) {
                last_sold_at = Some(line_item.created_at);
            }

            match &line_item.profit {
                Some(profit) => {
                    total_profit += profit.gross_profit;
                    any_cost_known |= profit.cost_known;
                }
                None => {
                    let unit_cost = line_item
                        .unit_cost
                        .filter(|c| *c > Decimal::ZERO)
                        .or_else(|| {
                            line_item
                                .variant_upstream_id
                                .and_then(|id| product.find_variant(id))
                                .and_then(|v| v.unit_cost.filter(|c| *c > Decimal::ZERO))
                        });
                    total_profit +=
                        revenue - unit_cost.unwrap_or(Decimal::ZERO) * Decimal::from(line_item.quantity);
                    any_cost_known |= unit_cost.is_some();
                }
            }
        }

        let average_order_value = if order_ids.is_empty() {
            Decimal::ZERO
        } else {
            total_revenue / Decimal::from(order_ids.len())
        };

        let variant_metrics = product
            .variants
            .iter()
            .map(|v| VariantMetrics {
                upstream_variant_id: v.upstream_variant_id,
                profit_per_unit: v.profit_per_unit(),
                gross_margin: v.profit_per_unit().and_then(|p| {
                    if v.price.is_zero() {
                        None
                    } else {
                        Some(p / v.price * Decimal::ONE_HUNDRED)
                    }
                }),
            })
            .collect();

        let performance = ProductPerformance {
            total_quantity_sold,
            total_revenue,
            total_profit,
            profit_margin: any_cost_known.then(|| profit_margin(total_profit, total_revenue)),
            average_order_value,
            last_sold_at,
            computed_at: now,
            variant_metrics,
        };
        self.store
            .set_product_performance(tenant, product.upstream_product_id, &performance)
            .await
    }
}
