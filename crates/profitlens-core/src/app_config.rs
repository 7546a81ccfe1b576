#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Environment {
    Development,
    Test,
    Production,
}

impl std::fmt::Display for Environment {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Environment::Development => write!(f, "development"),
            Environment::Test => write!(f, "test"),
            Environment::Production => write!(f, "production"),
        }
    }
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub env: Environment,
    pub log_level: String,
    pub db_max_connections: u32,
    pub db_min_connections: u32,
    pub db_acquire_timeout_secs: u64,
    /// Shopify Admin API version path segment, e.g. `"2024-01"`.
    pub shopify_api_version: String,
    pub shopify_request_timeout_secs: u64,
    pub shopify_max_retries: u32,
    pub shopify_retry_backoff_base_secs: u64,
    /// Records requested per page; the Admin API caps this at 250.
    pub sync_page_size: u32,
    /// Deadline for a single page fetch inside the orchestrator loop.
    pub sync_page_timeout_secs: u64,
    /// Overall deadline for one ingestion run; expiry fails the run.
    pub sync_deadline_secs: u64,
    /// Records in flight per metrics derivation pass.
    pub metrics_max_concurrent_records: usize,
}

impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("database_url", &"[redacted]")
            .field("env", &self.env)
            .field("log_level", &self.log_level)
            .field("db_max_connections", &self.db_max_connections)
            .field("db_min_connections", &self.db_min_connections)
            .field("db_acquire_timeout_secs", &self.db_acquire_timeout_secs)
            .field("shopify_api_version", &self.shopify_api_version)
            .field(
                "shopify_request_timeout_secs",
                &self.shopify_request_timeout_secs,
            )
            .field("shopify_max_retries", &self.shopify_max_retries)
            .field(
                "shopify_retry_backoff_base_secs",
                &self.shopify_retry_backoff_base_secs,
            )
            .field("sync_page_size", &self.sync_page_size)
            .field("sync_page_timeout_secs", &self.sync_page_timeout_secs)
            .field("sync_deadline_secs", &self.sync_deadline_secs)
            .field(
                "metrics_max_concurrent_records",
                &self.metrics_max_concurrent_records,
            )
            .finish()
    }
}
