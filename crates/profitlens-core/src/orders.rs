use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// An order mirrored from the upstream store, keyed by
/// `(tenant, upstream_order_id)`. Line items live in their own collection
/// (see [`LineItem`]) linked by the order's upstream ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    /// Shopify numeric order ID.
    pub upstream_order_id: i64,
    /// Human-facing order name, e.g. `"#1001"`.
    pub order_number: Option<String>,
    /// Weak reference to the customer's upstream ID; no FK enforcement.
    pub customer_upstream_id: Option<i64>,
    pub total_price: Decimal,
    pub subtotal_price: Decimal,
    pub total_discounts: Decimal,
    /// Shopify financial status, e.g. `"paid"`, `"refunded"`.
    pub financial_status: String,
    /// ISO 4217 currency code.
    pub currency: String,
    pub created_at: DateTime<Utc>,
    /// Derived profit figures; `None` until the profit job has run.
    pub profit: Option<OrderProfit>,
}

/// Derived order-level profit, written only by the profit job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderProfit {
    /// Sum of line-item costs at the resolved unit costs.
    pub total_cost: Decimal,
    /// `total_price − total_cost − Σ refund profit impact`.
    pub gross_profit: Decimal,
    /// `gross_profit / total_price × 100`; zero for a free order; `None`
    /// when no line item carried cost data, because a margin computed from
    /// fabricated zero costs would mislead dashboard consumers.
    pub profit_margin: Option<Decimal>,
    /// Total profit impact of refunds already subtracted from
    /// `gross_profit`.
    pub refund_impact: Decimal,
    /// `false` when no line item on the order had a known unit cost.
    pub cost_data_available: bool,
    pub computed_at: DateTime<Utc>,
}

/// A single order line, keyed by `(tenant, upstream_line_item_id)` and
/// linked to its order by `order_upstream_id`. Line items arrive embedded in
/// the upstream order payload; there is no separate pagination for them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItem {
    /// Shopify numeric line-item ID.
    pub upstream_line_item_id: i64,
    pub order_upstream_id: i64,
    /// Weak reference to the sold product; absent for custom line items.
    pub product_upstream_id: Option<i64>,
    pub variant_upstream_id: Option<i64>,
    pub title: String,
    pub sku: Option<String>,
    pub quantity: i64,
    /// Unit price charged.
    pub price: Decimal,
    pub total_discount: Decimal,
    /// Unit cost as shipped in the upstream payload, when present. Usually
    /// absent; the profit job resolves it from the product variant.
    pub unit_cost: Option<Decimal>,
    /// Inherited from the order; used as the sale timestamp.
    pub created_at: DateTime<Utc>,
    /// Derived profit figures; `None` until the profit job has run.
    pub profit: Option<LineItemProfit>,
}

impl LineItem {
    /// Revenue net of discount: `price × quantity − total_discount`.
    #[must_use]
    pub fn net_revenue(&self) -> Decimal {
        self.price * Decimal::from(self.quantity) - self.total_discount
    }
}

/// Derived line-item profit, written only by the profit job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LineItemProfit {
    /// Resolved unit cost; zero when no cost source was available.
    pub unit_cost: Decimal,
    /// `unit_cost × quantity`.
    pub total_cost: Decimal,
    /// `(price × quantity − total_discount) − total_cost`.
    pub gross_profit: Decimal,
    /// `true` when `unit_cost` came from real data rather than a zero
    /// default.
    pub cost_known: bool,
    pub computed_at: DateTime<Utc>,
}

/// Margin as a percentage of `total`: `gross / total × 100`, zero when
/// `total` is zero.
#[must_use]
pub fn profit_margin(gross: Decimal, total: Decimal) -> Decimal {
    if total.is_zero() {
        Decimal::ZERO
    } else {
        gross / total * Decimal::ONE_HUNDRED
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        s.parse().unwrap()
    }

    #[test]
    fn margin_of_zero_total_is_zero() {
        assert_eq!(profit_margin(dec("10"), Decimal::ZERO), Decimal::ZERO);
    }

    #[test]
    fn margin_is_percentage() {
        assert_eq!(profit_margin(dec("30"), dec("100")), dec("30"));
        assert_eq!(profit_margin(dec("60"), dec("100")), dec("60"));
    }

    #[test]
    fn net_revenue_subtracts_discount() {
        let li = LineItem {
            upstream_line_item_id: 1,
            order_upstream_id: 1,
            product_upstream_id: None,
            variant_upstream_id: None,
            title: "Widget".to_owned(),
            sku: None,
            quantity: 2,
            price: dec("50.00"),
            total_discount: dec("10.00"),
            unit_cost: None,
            created_at: Utc::now(),
            profit: None,
        };
        assert_eq!(li.net_revenue(), dec("90.00"));
    }
}
