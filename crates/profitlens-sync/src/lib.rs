//! Pipeline orchestration for profitlens: historical ingestion, metrics
//! derivation, and tenant cleanup.
//!
//! Everything here is written against the [`SourceReader`] and
//! [`profitlens_core::TenantStore`] capabilities, so the same orchestration
//! runs unchanged against the live Shopify API plus Postgres or against
//! in-memory fakes in tests.

pub mod cleanup;
pub mod ingest;
pub mod metrics;
pub mod source;

pub use cleanup::Cleaner;
pub use ingest::{IngestOptions, Ingestor};
pub use metrics::{CustomerLtvJob, MetricsOptions, ProductPerformanceJob, ProfitJob};
pub use source::{Page, ShopifySource, SourceReader};

use chrono::Utc;

use profitlens_core::{MetricsReport, SyncReport, TenantStore};

/// Combined result of a full sync: ingestion followed by all metrics
/// passes.
#[derive(Debug, Clone)]
pub struct FullSyncOutcome {
    pub sync: SyncReport,
    /// Empty when ingestion failed; metrics never run over a mirror whose
    /// load-bearing entities are incomplete.
    pub metrics: Vec<MetricsReport>,
}

impl FullSyncOutcome {
    /// `true` when ingestion and every metrics pass succeeded.
    #[must_use]
    pub fn success(&self) -> bool {
        self.sync.success && self.metrics.iter().all(|m| m.success)
    }
}

/// Runs all metrics passes for one tenant and, when every pass succeeds,
/// marks the tenant's metrics as fresh.
pub async fn run_metrics(
    store: &dyn TenantStore,
    tenant: &str,
    options: MetricsOptions,
) -> Vec<MetricsReport> {
    let reports = metrics::run_all(store, tenant, options).await;
    if reports.iter().all(|m| m.success) {
        if let Err(e) = store.set_metrics_state(tenant, Some(Utc::now()), false).await {
            tracing::error!(tenant, error = %e, "failed to mark metrics as fresh");
        }
    }
    reports
}

/// Runs the full pipeline for one tenant: historical ingestion, then the
/// three metrics passes, then the metrics freshness flags on the tenant
/// record.
pub async fn run_full_sync(
    source: &dyn SourceReader,
    store: &dyn TenantStore,
    tenant: &str,
    ingest_options: IngestOptions,
    metrics_options: MetricsOptions,
) -> FullSyncOutcome {
    let sync = Ingestor::new(source, store, ingest_options).run(tenant).await;
    if !sync.success {
        return FullSyncOutcome {
            sync,
            metrics: Vec::new(),
        };
    }

    let metrics = run_metrics(store, tenant, metrics_options).await;
    FullSyncOutcome { sync, metrics }
}
