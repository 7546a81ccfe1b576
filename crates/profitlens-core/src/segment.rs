//! Customer segmentation and lifetime-value heuristics.
//!
//! Pure rules, no I/O. The segment decision order matters: the spend rule
//! takes precedence over recency, so a high spender who also ordered
//! recently is `Vip`, not `Active`.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Spend threshold above which a customer is `Vip` regardless of recency.
const VIP_TOTAL_SPENT: Decimal = Decimal::from_parts(1000, 0, 0, false, 0);

/// Days since last order within which a customer counts as `Active`.
const ACTIVE_WINDOW_DAYS: i64 = 30;

/// Days since last order within which a customer counts as `AtRisk`.
const AT_RISK_WINDOW_DAYS: i64 = 90;

/// Behavioural segment assigned to a customer by the LTV job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Segment {
    New,
    Active,
    AtRisk,
    Lost,
    Vip,
}

impl Segment {
    /// Classifies a customer from its recomputed order history.
    ///
    /// Rule order: no orders → `New`; spend over the VIP threshold → `Vip`;
    /// then recency windows. A customer with orders but no resolvable last
    /// order date falls through to `Lost`.
    #[must_use]
    pub fn classify(
        orders_count: u32,
        total_spent: Decimal,
        days_since_last_order: Option<i64>,
    ) -> Self {
        if orders_count == 0 {
            return Self::New;
        }
        if total_spent > VIP_TOTAL_SPENT {
            return Self::Vip;
        }
        match days_since_last_order {
            Some(days) if days <= ACTIVE_WINDOW_DAYS => Self::Active,
            Some(days) if days <= AT_RISK_WINDOW_DAYS => Self::AtRisk,
            _ => Self::Lost,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Active => "active",
            Self::AtRisk => "at_risk",
            Self::Lost => "lost",
            Self::Vip => "vip",
        }
    }
}

impl std::fmt::Display for Segment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Projected lifetime value: `average_order_value × max(orders_count × 2, 5)`.
///
/// An explicit heuristic, not a statistical model; the multiplier floor of 5
/// keeps one-order customers from projecting a trivial LTV.
#[must_use]
pub fn predicted_ltv(average_order_value: Decimal, orders_count: u32) -> Decimal {
    let multiplier = u64::from(orders_count).saturating_mul(2).max(5);
    average_order_value * Decimal::from(multiplier)
}
