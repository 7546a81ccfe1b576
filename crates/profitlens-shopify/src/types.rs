//! Raw Shopify Admin REST response shapes.
//!
//! ## Observed-shape notes
//!
//! ### Money
//! The Admin API serialises money as decimal strings (`"12.99"`), except a
//! few legacy refund fields that arrive as JSON numbers. `rust_decimal`'s
//! deserializer accepts both, so monetary fields are modelled as `Decimal`
//! directly and precision is preserved end to end.
//!
//! ### Tags
//! `customers.json` and `orders.json` return tags as one comma-joined string
//! (`"vip, wholesale"`); the storefront `products.json` endpoint returns a
//! JSON array. [`TagField`] accepts either and normalization splits/trims.
//!
//! ### Optionality
//! Almost every field can be `null` or absent depending on API version and
//! store age, so everything that is not structurally required carries
//! `#[serde(default)]`. Records are deserialized one at a time from the
//! page payload, so one malformed record is a per-record error rather than
//! a page failure.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

/// Tags as returned by Shopify: comma-joined string or JSON array.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum TagField {
    Joined(String),
    List(Vec<String>),
}

impl Default for TagField {
    fn default() -> Self {
        Self::Joined(String::new())
    }
}

impl TagField {
    /// Splits into trimmed, non-empty tag strings.
    #[must_use]
    pub fn into_tags(self) -> Vec<String> {
        match self {
            Self::Joined(joined) => joined
                .split(',')
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_owned)
                .collect(),
            Self::List(list) => list
                .into_iter()
                .map(|t| t.trim().to_owned())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// A product record from `GET /admin/api/{version}/products.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyProduct {
    pub id: i64,
    pub title: String,
    #[serde(default)]
    pub handle: Option<String>,
    #[serde(default)]
    pub vendor: Option<String>,
    #[serde(default)]
    pub product_type: Option<String>,
    /// `"active"`, `"archived"`, or `"draft"`; absent on some endpoints and
    /// defaulted to `"active"` in normalization.
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub tags: TagField,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub variants: Vec<ShopifyVariant>,
}

/// A variant embedded in a [`ShopifyProduct`].
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyVariant {
    pub id: i64,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub price: Decimal,
    /// Per-unit cost of goods. Only present when the store maintains cost
    /// data; absence is preserved through normalization.
    #[serde(default)]
    pub cost: Option<Decimal>,
    #[serde(default)]
    pub inventory_quantity: Option<i64>,
    /// `1` marks the storefront-default variant.
    #[serde(default)]
    pub position: Option<i32>,
}

/// A customer record from `GET /admin/api/{version}/customers.json`.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyCustomer {
    pub id: i64,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub first_name: Option<String>,
    #[serde(default)]
    pub last_name: Option<String>,
    #[serde(default)]
    pub orders_count: Option<i64>,
    #[serde(default)]
    pub total_spent: Option<Decimal>,
    #[serde(default)]
    pub tags: TagField,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// An order record from `GET /admin/api/{version}/orders.json?status=any`.
/// Line items arrive embedded; there is no separate line-item pagination.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyOrder {
    pub id: i64,
    /// Human-facing order name, e.g. `"#1001"`.
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub customer: Option<CustomerRef>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub subtotal_price: Option<Decimal>,
    #[serde(default)]
    pub total_discounts: Option<Decimal>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub line_items: Vec<ShopifyLineItem>,
}

/// The embedded customer reference on an order; only the ID is consumed.
#[derive(Debug, Clone, Deserialize)]
pub struct CustomerRef {
    pub id: i64,
}

/// A line item embedded in a [`ShopifyOrder`].
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyLineItem {
    pub id: i64,
    #[serde(default)]
    pub product_id: Option<i64>,
    #[serde(default)]
    pub variant_id: Option<i64>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
    pub quantity: i64,
    pub price: Decimal,
    #[serde(default)]
    pub total_discount: Option<Decimal>,
    /// Unit cost when the store ships it with the payload; usually absent.
    #[serde(default)]
    pub cost: Option<Decimal>,
}

/// A refund record from `GET /admin/api/{version}/orders/{id}/refunds.json`.
/// Refunds are not separately enumerable; ingestion makes one call per
/// mirrored order.
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyRefund {
    pub id: i64,
    #[serde(default)]
    pub order_id: Option<i64>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub refund_line_items: Vec<ShopifyRefundLineItem>,
    #[serde(default)]
    pub transactions: Vec<ShopifyTransaction>,
}

/// One refunded line inside a [`ShopifyRefund`].
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyRefundLineItem {
    pub line_item_id: i64,
    #[serde(default)]
    pub quantity: Option<i64>,
    /// Arrives as a JSON number on older API versions and as a string on
    /// newer ones; `Decimal` accepts both.
    #[serde(default)]
    pub subtotal: Option<Decimal>,
}

/// One money movement inside a [`ShopifyRefund`].
#[derive(Debug, Clone, Deserialize)]
pub struct ShopifyTransaction {
    pub amount: Decimal,
    #[serde(default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tag_field_splits_joined_string() {
        let tags: TagField = serde_json::from_str(r#""vip, wholesale ,  ""#).unwrap();
        assert_eq!(tags.into_tags(), vec!["vip", "wholesale"]);
    }

    #[test]
    fn tag_field_accepts_array() {
        let tags: TagField = serde_json::from_str(r#"["vip", " wholesale "]"#).unwrap();
        assert_eq!(tags.into_tags(), vec!["vip", "wholesale"]);
    }

    #[test]
    fn refund_subtotal_accepts_number_and_string() {
        let numeric: ShopifyRefundLineItem =
            serde_json::from_str(r#"{"line_item_id": 1, "quantity": 1, "subtotal": 40.0}"#)
                .unwrap();
        let stringy: ShopifyRefundLineItem =
            serde_json::from_str(r#"{"line_item_id": 1, "quantity": 1, "subtotal": "40.00"}"#)
                .unwrap();
        assert_eq!(numeric.subtotal.unwrap(), "40".parse().unwrap());
        assert_eq!(stringy.subtotal.unwrap(), "40.00".parse().unwrap());
    }
}
