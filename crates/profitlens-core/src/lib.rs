pub mod app_config;
pub mod config;
pub mod customers;
pub mod memory;
pub mod orders;
pub mod products;
pub mod refunds;
pub mod report;
pub mod segment;
pub mod store;
pub mod tenant;

pub use app_config::{AppConfig, Environment};
pub use config::{load_app_config, load_app_config_from_env, ConfigError};
pub use customers::{Customer, CustomerMetrics};
pub use memory::MemoryStore;
pub use orders::{profit_margin, LineItem, LineItemProfit, Order, OrderProfit};
pub use products::{Product, ProductPerformance, Variant, VariantMetrics};
pub use refunds::{Refund, RefundImpact, RefundLineItem, RefundTransaction};
pub use report::{CleanupReport, MetricsJobKind, MetricsReport, SyncReport, SyncStats};
pub use segment::{predicted_ltv, Segment};
pub use store::{StoreError, TenantStore};
pub use tenant::{SyncState, SyncStatus, TenantRecord, UnknownSyncState};
