use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A product mirrored from the upstream store, keyed by
/// `(tenant, upstream_product_id)`.
///
/// Raw mirror fields are written only by the ingestion orchestrator;
/// [`Product::performance`] is written only by the product-performance
/// metrics job. The two groups never share a write path.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    /// Shopify numeric product ID.
    pub upstream_product_id: i64,
    pub title: String,
    /// Shopify URL slug, e.g. `"hi-boy-blood-orange-5mg"`.
    pub handle: Option<String>,
    pub vendor: Option<String>,
    pub product_type: Option<String>,
    /// Shopify product status: `"active"`, `"archived"`, or `"draft"`.
    pub status: String,
    /// Individual tags, trimmed, split from upstream comma-joined strings
    /// where the API returns them joined.
    pub tags: Vec<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    /// Purchasable variants, embedded as in the upstream payload.
    pub variants: Vec<Variant>,
    /// Derived aggregates; `None` until the performance job has run.
    pub performance: Option<ProductPerformance>,
}

impl Product {
    /// Returns the total number of variants for this product.
    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.variants.len()
    }

    /// Finds an embedded variant by its upstream variant ID.
    #[must_use]
    pub fn find_variant(&self, upstream_variant_id: i64) -> Option<&Variant> {
        self.variants
            .iter()
            .find(|v| v.upstream_variant_id == upstream_variant_id)
    }

    /// Returns `true` if at least one variant carries a positive unit cost.
    #[must_use]
    pub fn has_cost_data(&self) -> bool {
        self.variants
            .iter()
            .any(|v| v.unit_cost.is_some_and(|c| c > Decimal::ZERO))
    }
}

/// A single purchasable variant of a [`Product`].
///
/// Raw mirror data only; per-variant derived metrics live in
/// [`ProductPerformance::variant_metrics`] so that re-ingestion can replace
/// this struct wholesale without touching computed values.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Variant {
    /// Shopify numeric variant ID.
    pub upstream_variant_id: i64,
    /// Variant display title, e.g. `"Small / Black"`.
    pub title: String,
    pub sku: Option<String>,
    pub price: Decimal,
    /// Per-unit cost of goods. `None` means the store has never recorded a
    /// cost for this variant; absence is meaningful and must not be folded
    /// into zero at the mirror layer.
    pub unit_cost: Option<Decimal>,
    pub inventory_quantity: i64,
    /// Shopify position; `1` is the storefront default variant.
    pub position: Option<i32>,
}

impl Variant {
    /// Profit for one unit at the current price, when a positive unit cost
    /// is known.
    #[must_use]
    pub fn profit_per_unit(&self) -> Option<Decimal> {
        match self.unit_cost {
            Some(cost) if cost > Decimal::ZERO => Some(self.price - cost),
            _ => None,
        }
    }
}

/// Derived sales aggregates for one product, recomputed from scratch on
/// every run of the product-performance job.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductPerformance {
    pub total_quantity_sold: i64,
    pub total_revenue: Decimal,
    pub total_profit: Decimal,
    /// `None` when the product's line items carry no cost data.
    pub profit_margin: Option<Decimal>,
    /// Revenue per distinct order containing this product.
    pub average_order_value: Decimal,
    /// Timestamp of the most recent line item selling this product.
    pub last_sold_at: Option<DateTime<Utc>>,
    pub computed_at: DateTime<Utc>,
    /// Per-variant unit economics, parallel to [`Product::variants`].
    pub variant_metrics: Vec<VariantMetrics>,
}

/// Derived unit economics for one variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VariantMetrics {
    pub upstream_variant_id: i64,
    /// `price - unit_cost`; `None` when no positive unit cost is known.
    pub profit_per_unit: Option<Decimal>,
    /// Percentage of price retained as profit; `None` without cost data or
    /// with a zero price.
    pub gross_margin: Option<Decimal>,
}
