//! The three metrics derivation passes: profit, customer LTV, and product
//! performance. All three are pure functions of the mirrored raw data and
//! can be re-run at any time; each run recomputes derived fields from
//! scratch and overwrites the previous values.
//!
//! Per-record failures are caught, counted, and logged; one bad record
//! never aborts a pass. A pass only reports failure outright when it cannot
//! even enumerate its input records.

mod ltv;
mod performance;
mod profit;

pub use ltv::CustomerLtvJob;
pub use performance::ProductPerformanceJob;
pub use profit::ProfitJob;

use tokio::time::Instant;
use uuid::Uuid;

use profitlens_core::{AppConfig, MetricsJobKind, MetricsReport, TenantStore};

/// Tunables shared by all three jobs.
#[derive(Debug, Clone, Copy)]
pub struct MetricsOptions {
    /// Records processed concurrently within one pass.
    pub max_concurrent: usize,
}

impl Default for MetricsOptions {
    fn default() -> Self {
        Self { max_concurrent: 8 }
    }
}

impl MetricsOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            max_concurrent: config.metrics_max_concurrent_records,
        }
    }
}

/// Runs all three passes in dependency order. Profit must land first: the
/// LTV and performance passes read the line-item and order profit fields it
/// writes. A failed pass does not stop the later ones; each still derives
/// what it can from the raw mirror.
pub async fn run_all(
    store: &dyn TenantStore,
    tenant: &str,
    options: MetricsOptions,
) -> Vec<MetricsReport> {
    vec![
        ProfitJob::new(store, options).run(tenant).await,
        CustomerLtvJob::new(store, options).run(tenant).await,
        ProductPerformanceJob::new(store, options).run(tenant).await,
    ]
}

/// Builds the terminal report for a pass and emits the matching log line.
pub(crate) fn finish_report(
    run_id: Uuid,
    tenant: &str,
    job: MetricsJobKind,
    processed: u64,
    failed: u64,
    start: Instant,
    error: Option<String>,
) -> MetricsReport {
    let duration_secs = start.elapsed().as_secs_f64();
    match &error {
        None => tracing::info!(
            %run_id,
            tenant,
            job = %job,
            processed,
            failed,
            duration_secs,
            "metrics pass completed"
        ),
        Some(message) => tracing::error!(
            %run_id,
            tenant,
            job = %job,
            error = %message,
            duration_secs,
            "metrics pass failed"
        ),
    }
    MetricsReport {
        run_id,
        tenant: tenant.to_owned(),
        job,
        success: error.is_none(),
        processed,
        failed,
        duration_secs,
        error,
    }
}
