use thiserror::Error;

/// Errors surfaced by the Shopify Admin API client and the normalizer.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Network or TLS failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// HTTP 401/403 — the access token is missing, expired, or revoked.
    /// Never retried; the tenant must re-authorize.
    #[error("unauthorized for shop {shop}")]
    Unauthorized { shop: String },

    /// HTTP 404 — the resource does not exist. Not retried.
    #[error("endpoint not found: {url}")]
    NotFound { url: String },

    /// HTTP 429 — throttled by the Admin API. Retried after the advertised
    /// `Retry-After` delay.
    #[error("rate limited by {shop} (retry after {retry_after_secs}s)")]
    RateLimited { shop: String, retry_after_secs: u64 },

    /// Any other non-2xx status. 5xx is retried; remaining 4xx is not.
    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body (or a single record within it) does not match the
    /// expected shape. Not retried.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// A structurally valid record failed canonical validation.
    #[error("normalization error for {entity} {upstream_id}: {reason}")]
    Normalization {
        entity: &'static str,
        upstream_id: i64,
        reason: String,
    },

    /// The shop domain could not be turned into a base URL.
    #[error("invalid shop domain \"{shop}\": {reason}")]
    InvalidShopDomain { shop: String, reason: String },
}
