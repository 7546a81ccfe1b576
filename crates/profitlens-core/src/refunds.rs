use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A refund mirrored from the upstream store, keyed by
/// `(tenant, upstream_refund_id)` and linked to its order. Refunds are not
/// enumerable upstream; ingestion fetches them per already-mirrored order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Refund {
    /// Shopify numeric refund ID.
    pub upstream_refund_id: i64,
    pub order_upstream_id: i64,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
    /// Refunded lines, embedded as in the upstream payload.
    pub line_items: Vec<RefundLineItem>,
    /// Money movements attached to the refund.
    pub transactions: Vec<RefundTransaction>,
    /// Derived impact; `None` until the profit job has run.
    pub impact: Option<RefundImpact>,
}

impl Refund {
    /// Total amount returned to the customer.
    ///
    /// Sums successful `refund` transactions; when the refund carries no
    /// usable transactions (e.g. a pure restock), falls back to the refund
    /// line subtotals.
    #[must_use]
    pub fn total_refunded(&self) -> Decimal {
        let from_transactions: Decimal = self
            .transactions
            .iter()
            .filter(|t| t.kind == "refund" && t.status == "success")
            .map(|t| t.amount)
            .sum();
        if from_transactions > Decimal::ZERO {
            from_transactions
        } else {
            self.line_items.iter().map(|li| li.subtotal).sum()
        }
    }
}

/// One refunded order line.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundLineItem {
    /// Upstream ID of the order line item being refunded.
    pub line_item_upstream_id: i64,
    pub quantity: i64,
    /// Amount refunded for this line, pre-tax.
    pub subtotal: Decimal,
}

/// One money movement attached to a refund.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundTransaction {
    pub amount: Decimal,
    /// Shopify transaction kind, e.g. `"refund"`.
    pub kind: String,
    /// Shopify transaction status, e.g. `"success"`.
    pub status: String,
}

/// Derived refund impact, written only by the profit job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundImpact {
    pub total_refunded: Decimal,
    /// Cost of goods recovered by restocking: refunded qty × unit cost.
    pub cost_recovered: Decimal,
    /// `total_refunded − cost_recovered`; subtracted from the order's gross
    /// profit.
    pub profit_impact: Decimal,
    pub computed_at: DateTime<Utc>,
}
