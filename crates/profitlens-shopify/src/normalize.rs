//! Normalization from raw Admin API records to the canonical
//! `profitlens-core` entities.
//!
//! Each function takes one raw record as a `serde_json::Value`, validates it
//! against the typed shape in [`crate::types`], and converts it. Failures
//! are typed, record-scoped errors that the ingestion orchestrator counts
//! and skips; an unknown shape is never silently zero-filled. No side
//! effects, no I/O.

use chrono::Utc;
use rust_decimal::Decimal;
use serde_json::Value;

use profitlens_core::{
    Customer, LineItem, Order, Product, Refund, RefundLineItem, RefundTransaction, Variant,
};

use crate::error::SourceError;
use crate::types::{ShopifyCustomer, ShopifyOrder, ShopifyProduct, ShopifyRefund, ShopifyVariant};

/// Best-effort upstream ID for error context on records that failed typed
/// deserialization.
fn record_id(raw: &Value) -> i64 {
    raw.get("id").and_then(Value::as_i64).unwrap_or(0)
}

fn decode<T: serde::de::DeserializeOwned>(
    raw: &Value,
    entity: &'static str,
) -> Result<T, SourceError> {
    serde_json::from_value(raw.clone()).map_err(|e| SourceError::Deserialize {
        context: format!("{entity} record (upstream id {})", record_id(raw)),
        source: e,
    })
}

fn reject_negative(
    entity: &'static str,
    upstream_id: i64,
    field: &str,
    value: Decimal,
) -> Result<(), SourceError> {
    if value < Decimal::ZERO {
        return Err(SourceError::Normalization {
            entity,
            upstream_id,
            reason: format!("negative {field}: {value}"),
        });
    }
    Ok(())
}

/// Normalizes one raw product record.
///
/// # Errors
///
/// Returns [`SourceError::Deserialize`] for an unexpected shape, or
/// [`SourceError::Normalization`] for an empty title or negative money.
pub fn normalize_product(raw: &Value) -> Result<Product, SourceError> {
    let product: ShopifyProduct = decode(raw, "product")?;

    if product.title.trim().is_empty() {
        return Err(SourceError::Normalization {
            entity: "product",
            upstream_id: product.id,
            reason: "empty title".to_owned(),
        });
    }

    let variants = product
        .variants
        .into_iter()
        .map(|v| normalize_variant(v, product.id))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Product {
        upstream_product_id: product.id,
        title: product.title,
        handle: product.handle,
        vendor: product.vendor,
        product_type: product.product_type.filter(|s| !s.is_empty()),
        status: product.status.unwrap_or_else(|| "active".to_owned()),
        tags: product.tags.into_tags(),
        created_at: product.created_at,
        updated_at: product.updated_at,
        variants,
        performance: None,
    })
}

fn normalize_variant(variant: ShopifyVariant, product_id: i64) -> Result<Variant, SourceError> {
    reject_negative("product", product_id, "variant price", variant.price)?;
    if let Some(cost) = variant.cost {
        reject_negative("product", product_id, "variant cost", cost)?;
    }
    Ok(Variant {
        upstream_variant_id: variant.id,
        title: variant.title.unwrap_or_else(|| "Default".to_owned()),
        sku: variant.sku.filter(|s| !s.is_empty()),
        price: variant.price,
        unit_cost: variant.cost,
        inventory_quantity: variant.inventory_quantity.unwrap_or(0),
        position: variant.position,
    })
}

/// Normalizes one raw customer record. Absent monetary fields default to
/// zero; a negative reported spend is rejected.
///
/// # Errors
///
/// Returns [`SourceError::Deserialize`] or [`SourceError::Normalization`].
pub fn normalize_customer(raw: &Value) -> Result<Customer, SourceError> {
    let customer: ShopifyCustomer = decode(raw, "customer")?;

    let total_spent = customer.total_spent.unwrap_or(Decimal::ZERO);
    reject_negative("customer", customer.id, "total_spent", total_spent)?;

    Ok(Customer {
        upstream_customer_id: customer.id,
        email: customer.email.filter(|e| !e.is_empty()),
        first_name: customer.first_name.filter(|n| !n.is_empty()),
        last_name: customer.last_name.filter(|n| !n.is_empty()),
        reported_orders_count: customer.orders_count.unwrap_or(0),
        reported_total_spent: total_spent,
        tags: customer.tags.into_tags(),
        created_at: customer.created_at,
        metrics: None,
    })
}

/// Normalizes one raw order record together with its embedded line items.
/// Line items inherit the order's creation timestamp as their sale time.
///
/// # Errors
///
/// Returns [`SourceError::Deserialize`] for an unexpected shape, or
/// [`SourceError::Normalization`] for a missing creation date or negative
/// money.
pub fn normalize_order(raw: &Value) -> Result<(Order, Vec<LineItem>), SourceError> {
    let order: ShopifyOrder = decode(raw, "order")?;

    let created_at = order.created_at.ok_or_else(|| SourceError::Normalization {
        entity: "order",
        upstream_id: order.id,
        reason: "missing created_at".to_owned(),
    })?;

    let total_price = order.total_price.unwrap_or(Decimal::ZERO);
    reject_negative("order", order.id, "total_price", total_price)?;

    let line_items = order
        .line_items
        .into_iter()
        .map(|li| {
            reject_negative("order", order.id, "line item price", li.price)?;
            Ok(LineItem {
                upstream_line_item_id: li.id,
                order_upstream_id: order.id,
                product_upstream_id: li.product_id,
                variant_upstream_id: li.variant_id,
                title: li.title.unwrap_or_default(),
                sku: li.sku.filter(|s| !s.is_empty()),
                quantity: li.quantity,
                price: li.price,
                total_discount: li.total_discount.unwrap_or(Decimal::ZERO),
                unit_cost: li.cost,
                created_at,
                profit: None,
            })
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    let normalized = Order {
        upstream_order_id: order.id,
        order_number: order.name,
        customer_upstream_id: order.customer.map(|c| c.id),
        total_price,
        subtotal_price: order.subtotal_price.unwrap_or(Decimal::ZERO),
        total_discounts: order.total_discounts.unwrap_or(Decimal::ZERO),
        financial_status: order
            .financial_status
            .unwrap_or_else(|| "unknown".to_owned()),
        currency: order.currency.unwrap_or_else(|| "USD".to_owned()),
        created_at,
        profit: None,
    };

    Ok((normalized, line_items))
}

/// Normalizes one raw refund record for the given order.
///
/// The upstream payload's own `order_id` is advisory; the caller passes the
/// order it fetched the refund for, which wins on mismatch.
///
/// # Errors
///
/// Returns [`SourceError::Deserialize`] or [`SourceError::Normalization`].
pub fn normalize_refund(order_upstream_id: i64, raw: &Value) -> Result<Refund, SourceError> {
    let refund: ShopifyRefund = decode(raw, "refund")?;

    let line_items = refund
        .refund_line_items
        .into_iter()
        .map(|li| {
            let subtotal = li.subtotal.unwrap_or(Decimal::ZERO);
            reject_negative("refund", refund.id, "refund line subtotal", subtotal)?;
            Ok(RefundLineItem {
                line_item_upstream_id: li.line_item_id,
                quantity: li.quantity.unwrap_or(0),
                subtotal,
            })
        })
        .collect::<Result<Vec<_>, SourceError>>()?;

    let transactions = refund
        .transactions
        .into_iter()
        .map(|t| RefundTransaction {
            amount: t.amount,
            kind: t.kind.unwrap_or_else(|| "refund".to_owned()),
            status: t.status.unwrap_or_else(|| "success".to_owned()),
        })
        .collect();

    Ok(Refund {
        upstream_refund_id: refund.id,
        order_upstream_id,
        note: refund.note.filter(|n| !n.is_empty()),
        created_at: refund.created_at.unwrap_or_else(Utc::now),
        line_items,
        transactions,
        impact: None,
    })
}

#[cfg(test)]
#[path = "normalize_test.rs"]
mod tests;
