//! HTTP client for the Shopify Admin REST API.
//!
//! One client per tenant: it carries the shop domain and the Admin API
//! access token, sent as `X-Shopify-Access-Token` on every request. Page
//! payloads are returned as per-record `serde_json::Value`s so that one
//! malformed record surfaces as a record-scoped error downstream instead of
//! failing the whole page. Pagination cursors are extracted from the `Link`
//! response header for callers to drive multi-page fetches.

use std::time::Duration;

use reqwest::Client;
use serde_json::Value;

use crate::error::SourceError;
use crate::pagination::next_page_cursor;
use crate::retry::retry_with_backoff;

/// The Admin API's page-size ceiling.
pub const PAGE_SIZE_CEILING: u32 = 250;

/// Wait applied to a 429 that carries no parseable `Retry-After`.
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;

/// Per-tenant client for the Admin REST API.
///
/// Use [`ShopifyClient::new`] for production or
/// [`ShopifyClient::with_base_url`] to point at a mock server in tests.
pub struct ShopifyClient {
    client: Client,
    shop_domain: String,
    access_token: String,
    /// Origin without a trailing slash, e.g. `https://shop.myshopify.com`.
    base_url: String,
    api_version: String,
    max_retries: u32,
    backoff_base_secs: u64,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[redacted]")
            .field("base_url", &self.base_url)
            .field("api_version", &self.api_version)
            .field("max_retries", &self.max_retries)
            .field("backoff_base_secs", &self.backoff_base_secs)
            .finish_non_exhaustive()
    }
}

impl ShopifyClient {
    /// Creates a client pointed at `https://{shop_domain}`.
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::InvalidShopDomain`] for an empty or
    /// scheme-qualified domain, or [`SourceError::Http`] if the underlying
    /// `reqwest::Client` cannot be constructed.
    pub fn new(
        shop_domain: &str,
        access_token: &str,
        api_version: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_secs: u64,
    ) -> Result<Self, SourceError> {
        if shop_domain.is_empty() || shop_domain.contains('/') || shop_domain.contains("://") {
            return Err(SourceError::InvalidShopDomain {
                shop: shop_domain.to_owned(),
                reason: "expected a bare domain like example.myshopify.com".to_owned(),
            });
        }
        let base_url = format!("https://{shop_domain}");
        Self::with_base_url(
            shop_domain,
            access_token,
            api_version,
            timeout_secs,
            max_retries,
            backoff_base_secs,
            &base_url,
        )
    }

    /// Creates a client with an explicit base URL (for wiremock tests).
    ///
    /// # Errors
    ///
    /// Returns [`SourceError::Http`] if the underlying `reqwest::Client`
    /// cannot be constructed.
    #[allow(clippy::too_many_arguments)]
    pub fn with_base_url(
        shop_domain: &str,
        access_token: &str,
        api_version: &str,
        timeout_secs: u64,
        max_retries: u32,
        backoff_base_secs: u64,
        base_url: &str,
    ) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(10))
            .user_agent("profitlens/0.1 (profit-analytics)")
            .build()?;

        Ok(Self {
            client,
            shop_domain: shop_domain.to_owned(),
            access_token: access_token.to_owned(),
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_version: api_version.to_owned(),
            max_retries,
            backoff_base_secs,
        })
    }

    /// The tenant this client is bound to.
    #[must_use]
    pub fn shop_domain(&self) -> &str {
        &self.shop_domain
    }

    /// Fetches one page of products.
    ///
    /// Returns the raw records and the cursor for the next page, if any.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_page`] for the error surface.
    pub async fn products_page(
        &self,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<(Vec<Value>, Option<String>), SourceError> {
        self.fetch_page("products", "products", limit, page_info, &[])
            .await
    }

    /// Fetches one page of customers.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_page`].
    pub async fn customers_page(
        &self,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<(Vec<Value>, Option<String>), SourceError> {
        self.fetch_page("customers", "customers", limit, page_info, &[])
            .await
    }

    /// Fetches one page of orders across all statuses. Line items arrive
    /// embedded in each order record.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_page`].
    pub async fn orders_page(
        &self,
        limit: u32,
        page_info: Option<&str>,
    ) -> Result<(Vec<Value>, Option<String>), SourceError> {
        self.fetch_page("orders", "orders", limit, page_info, &[("status", "any")])
            .await
    }

    /// Fetches all refunds for one order. The endpoint is not paginated.
    ///
    /// # Errors
    ///
    /// See [`Self::fetch_page`].
    pub async fn order_refunds(&self, order_id: i64) -> Result<Vec<Value>, SourceError> {
        let resource = format!("orders/{order_id}/refunds");
        let (items, _) = self
            .fetch_page(&resource, "refunds", 0, None, &[])
            .await?;
        Ok(items)
    }

    /// One page fetch with automatic retry on transient errors.
    ///
    /// When `page_info` is set, only `limit` and `page_info` are sent — the
    /// Admin API rejects filter parameters alongside a cursor, so filters
    /// like `status=any` apply to the first page only and are baked into the
    /// cursor thereafter. A `limit` of 0 omits the parameter (unpaginated
    /// endpoints).
    ///
    /// # Errors
    ///
    /// - [`SourceError::Unauthorized`] — 401/403, not retried.
    /// - [`SourceError::NotFound`] — 404, not retried.
    /// - [`SourceError::RateLimited`] — 429 after all retries exhausted.
    /// - [`SourceError::UnexpectedStatus`] — other non-2xx (5xx retried).
    /// - [`SourceError::Http`] — network failure after retries exhausted.
    /// - [`SourceError::Deserialize`] — body is not the expected envelope.
    async fn fetch_page(
        &self,
        resource: &str,
        payload_key: &'static str,
        limit: u32,
        page_info: Option<&str>,
        first_page_params: &[(&str, &str)],
    ) -> Result<(Vec<Value>, Option<String>), SourceError> {
        let url = self.page_url(resource, limit, page_info, first_page_params);

        retry_with_backoff(self.max_retries, self.backoff_base_secs, || {
            let url = url.clone();
            async move {
                let response = self
                    .client
                    .get(&url)
                    .header("X-Shopify-Access-Token", &self.access_token)
                    .header(reqwest::header::ACCEPT, "application/json")
                    .send()
                    .await?;

                let status = response.status();
                if status == reqwest::StatusCode::UNAUTHORIZED
                    || status == reqwest::StatusCode::FORBIDDEN
                {
                    return Err(SourceError::Unauthorized {
                        shop: self.shop_domain.clone(),
                    });
                }
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(SourceError::NotFound { url: url.clone() });
                }
                if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
                    let retry_after_secs = response
                        .headers()
                        .get(reqwest::header::RETRY_AFTER)
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<f64>().ok())
                        .map_or(DEFAULT_RETRY_AFTER_SECS, |secs| secs.ceil() as u64);
                    return Err(SourceError::RateLimited {
                        shop: self.shop_domain.clone(),
                        retry_after_secs,
                    });
                }
                if !status.is_success() {
                    return Err(SourceError::UnexpectedStatus {
                        status: status.as_u16(),
                        url: url.clone(),
                    });
                }

                let link_header = response
                    .headers()
                    .get(reqwest::header::LINK)
                    .and_then(|v| v.to_str().ok())
                    .map(str::to_owned);

                let body = response.text().await?;
                let envelope: Value =
                    serde_json::from_str(&body).map_err(|e| SourceError::Deserialize {
                        context: format!("{resource} page body"),
                        source: e,
                    })?;

                let items = match envelope.get(payload_key).and_then(Value::as_array) {
                    Some(array) => array.clone(),
                    None => {
                        return Err(SourceError::Deserialize {
                            context: format!("{resource} page body"),
                            source: serde::de::Error::custom(format!(
                                "missing \"{payload_key}\" array in response"
                            )),
                        })
                    }
                };

                Ok((items, next_page_cursor(link_header.as_deref())))
            }
        })
        .await
    }

    /// Builds the request URL for one page of `resource`.
    fn page_url(
        &self,
        resource: &str,
        limit: u32,
        page_info: Option<&str>,
        first_page_params: &[(&str, &str)],
    ) -> String {
        let mut url = format!(
            "{}/admin/api/{}/{resource}.json",
            self.base_url, self.api_version
        );
        let mut sep = '?';
        let mut push = |url: &mut String, key: &str, value: &str| {
            url.push(sep);
            url.push_str(key);
            url.push('=');
            url.push_str(value);
            sep = '&';
        };
        if limit > 0 {
            push(&mut url, "limit", &limit.to_string());
        }
        if let Some(cursor) = page_info {
            push(&mut url, "page_info", cursor);
        } else {
            for (key, value) in first_page_params {
                push(&mut url, key, value);
            }
        }
        url
    }
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
