pub mod client;
pub mod error;
pub mod normalize;
pub mod pagination;
mod retry;
pub mod types;

pub use client::{ShopifyClient, PAGE_SIZE_CEILING};
pub use error::SourceError;
pub use normalize::{normalize_customer, normalize_order, normalize_product, normalize_refund};
pub use types::{
    ShopifyCustomer, ShopifyLineItem, ShopifyOrder, ShopifyProduct, ShopifyRefund, ShopifyVariant,
};
