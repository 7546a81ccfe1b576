use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::segment::Segment;

/// A customer mirrored from the upstream store, keyed by
/// `(tenant, upstream_customer_id)`.
///
/// `reported_*` fields are whatever the upstream API claimed at ingestion
/// time; the LTV job recomputes authoritative figures from the local order
/// mirror into [`Customer::metrics`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Customer {
    /// Shopify numeric customer ID.
    pub upstream_customer_id: i64,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// Order count as reported by the upstream API.
    pub reported_orders_count: i64,
    /// Total spend as reported by the upstream API; never negative.
    pub reported_total_spent: Decimal,
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    /// Derived lifetime-value metrics; `None` until the LTV job has run.
    pub metrics: Option<CustomerMetrics>,
}

impl Customer {
    /// Display name assembled from the available name parts, falling back
    /// to the email address.
    #[must_use]
    pub fn display_name(&self) -> Option<String> {
        match (self.first_name.as_deref(), self.last_name.as_deref()) {
            (Some(first), Some(last)) => Some(format!("{first} {last}")),
            (Some(one), None) | (None, Some(one)) => Some(one.to_owned()),
            (None, None) => self.email.clone(),
        }
    }
}

/// Derived customer metrics, recomputed from the local order mirror on every
/// run of the LTV job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomerMetrics {
    pub orders_count: u32,
    pub total_spent: Decimal,
    pub first_order_at: Option<DateTime<Utc>>,
    pub last_order_at: Option<DateTime<Utc>>,
    pub days_since_last_order: Option<i64>,
    pub average_order_value: Decimal,
    /// Realised lifetime value; equals `total_spent` in the simple model.
    pub lifetime_value: Decimal,
    /// Projected LTV per [`crate::segment::predicted_ltv`].
    pub predicted_ltv: Decimal,
    pub segment: Segment,
    pub computed_at: DateTime<Utc>,
}
