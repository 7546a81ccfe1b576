//! The paginated source capability consumed by the ingestion orchestrator.
//!
//! [`SourceReader`] hides cursor extraction behind a uniform page contract:
//! a page is complete when `next_cursor` is `None`, never when the record
//! count falls short of the page size, so a final page that is exactly full
//! still terminates the loop. The production implementation wraps the
//! per-tenant Admin API client; tests script their own reader.

use async_trait::async_trait;
use serde_json::Value;

use profitlens_shopify::{ShopifyClient, SourceError};

/// One page of raw upstream records.
#[derive(Debug, Default)]
pub struct Page {
    pub items: Vec<Value>,
    /// Opaque token for the next page; `None` signals completion.
    pub next_cursor: Option<String>,
}

/// Paginated read access to one tenant's upstream data.
#[async_trait]
pub trait SourceReader: Send + Sync {
    async fn products_page(&self, cursor: Option<&str>) -> Result<Page, SourceError>;
    async fn customers_page(&self, cursor: Option<&str>) -> Result<Page, SourceError>;
    /// Orders embed their line items; there is no separate line-item page.
    async fn orders_page(&self, cursor: Option<&str>) -> Result<Page, SourceError>;
    /// Refunds are not enumerable upstream; one call per mirrored order.
    async fn order_refunds(&self, order_id: i64) -> Result<Vec<Value>, SourceError>;
}

/// [`SourceReader`] backed by the Shopify Admin API client.
#[derive(Debug)]
pub struct ShopifySource {
    client: ShopifyClient,
    page_size: u32,
}

impl ShopifySource {
    #[must_use]
    pub fn new(client: ShopifyClient, page_size: u32) -> Self {
        Self { client, page_size }
    }
}

#[async_trait]
impl SourceReader for ShopifySource {
    async fn products_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        let (items, next_cursor) = self.client.products_page(self.page_size, cursor).await?;
        Ok(Page { items, next_cursor })
    }

    async fn customers_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        let (items, next_cursor) = self.client.customers_page(self.page_size, cursor).await?;
        Ok(Page { items, next_cursor })
    }

    async fn orders_page(&self, cursor: Option<&str>) -> Result<Page, SourceError> {
        let (items, next_cursor) = self.client.orders_page(self.page_size, cursor).await?;
        Ok(Page { items, next_cursor })
    }

    async fn order_refunds(&self, order_id: i64) -> Result<Vec<Value>, SourceError> {
        self.client.order_refunds(order_id).await
    }
}
