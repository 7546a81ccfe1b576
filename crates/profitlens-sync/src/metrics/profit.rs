//! The profit pass: resolves unit costs, then writes derived profit onto
//! every line item, refund, and order of a tenant.

use std::collections::HashMap;

use chrono::Utc;
use futures::{stream, StreamExt};
use rust_decimal::Decimal;
use tokio::time::Instant;
use uuid::Uuid;

use profitlens_core::{
    profit_margin, LineItem, LineItemProfit, MetricsJobKind, MetricsReport, Order, OrderProfit,
    RefundImpact, StoreError, TenantStore,
};

use super::{finish_report, MetricsOptions};

/// Computes line-item, refund, and order profit for one tenant.
///
/// Unit costs resolve in two steps: the cost carried on the line item
/// itself wins when positive, otherwise the cost recorded on the matching
/// product variant. When neither source has a positive cost the line
/// contributes zero cost and is flagged `cost_known = false`; an order
/// where no line had a known cost gets `profit_margin = None` rather than
/// a margin fabricated from zero costs.
pub struct ProfitJob<'a> {
    store: &'a dyn TenantStore,
    options: MetricsOptions,
}

impl<'a> ProfitJob<'a> {
    #[must_use]
    pub fn new(store: &'a dyn TenantStore, options: MetricsOptions) -> Self {
        Self { store, options }
    }

    pub async fn run(&self, tenant: &str) -> MetricsReport {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        tracing::info!(%run_id, tenant, "computing profit metrics");

        let costs = match self.variant_costs(tenant).await {
            Ok(costs) => costs,
            Err(e) => {
                return finish_report(
                    run_id,
                    tenant,
                    MetricsJobKind::Profit,
                    0,
                    0,
                    start,
                    Some(format!("failed to load variant costs: {e}")),
                );
            }
        };
        let orders = match self.store.list_orders(tenant).await {
            Ok(orders) => orders,
            Err(e) => {
                return finish_report(
                    run_id,
                    tenant,
                    MetricsJobKind::Profit,
                    0,
                    0,
                    start,
                    Some(format!("failed to list orders: {e}")),
                );
            }
        };

        let outcomes: Vec<(i64, Result<(), StoreError>)> =
            stream::iter(orders.into_iter().map(|order| {
                let order_id = order.upstream_order_id;
                let costs = &costs;
                async move { (order_id, self.process_order(tenant, order, costs).await) }
            }))
            .buffer_unordered(self.options.max_concurrent)
            .collect()
            .await;

        let mut processed = 0u64;
        let mut failed = 0u64;
        for (order_id, outcome) in outcomes {
            match outcome {
                Ok(()) => processed += 1,
                Err(e) => {
                    failed += 1;
                    tracing::warn!(tenant, order_id, error = %e, "profit computation failed; skipping order");
                }
            }
        }

        finish_report(
            run_id,
            tenant,
            MetricsJobKind::Profit,
            processed,
            failed,
            start,
            None,
        )
    }

    /// Positive variant unit costs for the whole catalogue, keyed by
    /// upstream variant ID.
    async fn variant_costs(&self, tenant: &str) -> Result<HashMap<i64, Decimal>, StoreError> {
        let mut costs = HashMap::new();
        for product in self.store.list_products(tenant).await? {
            for variant in &product.variants {
                if let Some(cost) = variant.unit_cost {
                    if cost > Decimal::ZERO {
                        costs.insert(variant.upstream_variant_id, cost);
                    }
                }
            }
        }
        Ok(costs)
    }

    async fn process_order(
        &self,
        tenant: &str,
        order: Order,
        costs: &HashMap<i64, Decimal>,
    ) -> Result<(), StoreError> {
        let computed_at = Utc::now();
        let line_items = self
            .store
            .list_line_items_for_order(tenant, order.upstream_order_id)
            .await?;

        let mut total_cost = Decimal::ZERO;
        let mut cost_data_available = false;
        // Resolved costs by line-item ID, reused for refund cost recovery.
        let mut resolved: HashMap<i64, Decimal> = HashMap::with_capacity(line_items.len());

        for line_item in &line_items {
            let unit_cost = resolve_unit_cost(line_item, costs);
            let cost_known = unit_cost.is_some();
            let unit_cost_or_zero = unit_cost.unwrap_or(Decimal::ZERO);
            let line_cost = unit_cost_or_zero * Decimal::from(line_item.quantity);
            let profit = LineItemProfit {
                unit_cost: unit_cost_or_zero,
                total_cost: line_cost,
                gross_profit: line_item.net_revenue() - line_cost,
                cost_known,
                computed_at,
            };
            self.store
                .set_line_item_profit(tenant, line_item.upstream_line_item_id, &profit)
                .await?;
            if let Some(cost) = unit_cost {
                resolved.insert(line_item.upstream_line_item_id, cost);
            }
            cost_data_available |= cost_known;
            total_cost += line_cost;
        }

        let mut refund_impact = Decimal::ZERO;
        let refunds = self
            .store
            .list_refunds_for_order(tenant, order.upstream_order_id)
            .await?;
        for refund in refunds {
            let total_refunded = refund.total_refunded();
            let cost_recovered: Decimal = refund
                .line_items
                .iter()
                .map(|line| {
                    resolved
                        .get(&line.line_item_upstream_id)
                        .copied()
                        .unwrap_or(Decimal::ZERO)
                        * Decimal::from(line.quantity)
                })
                .sum();
            let impact = RefundImpact {
                total_refunded,
                cost_recovered,
                profit_impact: total_refunded - cost_recovered,
                computed_at,
            };
            self.store
                .set_refund_impact(tenant, refund.upstream_refund_id, &impact)
                .await?;
            refund_impact += impact.profit_impact;
        }

        let gross_profit = order.total_price - total_cost - refund_impact;
        let profit = OrderProfit {
            total_cost,
            gross_profit,
            profit_margin: cost_data_available
                .then(|| profit_margin(gross_profit, order.total_price)),
            refund_impact,
            cost_data_available,
            computed_at,
        };
        self.store
            .set_order_profit(tenant, order.upstream_order_id, &profit)
            .await
    }
}

/// The line item's own cost wins when positive; otherwise the catalogue
/// cost for its variant.
fn resolve_unit_cost(line_item: &LineItem, costs: &HashMap<i64, Decimal>) -> Option<Decimal> {
    line_item
        .unit_cost
        .filter(|c| *c > Decimal::ZERO)
        .or_else(|| {
            line_item
                .variant_upstream_id
                .and_then(|id| costs.get(&id).copied())
        })
}
