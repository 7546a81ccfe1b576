//! Structured job-result contract returned by the ingestion orchestrator,
//! each metrics job, and the cleanup orchestrator.
//!
//! Pipeline entry points never propagate errors past their boundary; the
//! calling route/CLI layer only ever sees one of these report objects.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Per-entity-type record counters accumulated during a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncStats {
    pub products: u64,
    pub customers: u64,
    pub orders: u64,
    pub line_items: u64,
    pub refunds: u64,
    /// Per-record errors that were caught, counted, and skipped.
    pub errors: u64,
}

impl SyncStats {
    /// Total mirrored records across all entity types, excluding errors.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.products + self.customers + self.orders + self.line_items + self.refunds
    }
}

/// Result of one ingestion run for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct SyncReport {
    pub run_id: Uuid,
    pub tenant: String,
    pub success: bool,
    pub stats: SyncStats,
    pub duration_secs: f64,
    /// Terminal failure message when `success` is `false`.
    pub error: Option<String>,
}

/// The three derivation passes, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MetricsJobKind {
    Profit,
    CustomerLtv,
    ProductPerformance,
}

impl MetricsJobKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Profit => "profit",
            Self::CustomerLtv => "customer_ltv",
            Self::ProductPerformance => "product_performance",
        }
    }
}

impl std::fmt::Display for MetricsJobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one metrics derivation pass for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsReport {
    pub run_id: Uuid,
    pub tenant: String,
    pub job: MetricsJobKind,
    pub success: bool,
    /// Records processed to completion.
    pub processed: u64,
    /// Records skipped after a caught per-record error.
    pub failed: u64,
    pub duration_secs: f64,
    pub error: Option<String>,
}

/// Result of one cleanup run for one tenant.
#[derive(Debug, Clone, Serialize)]
pub struct CleanupReport {
    pub run_id: Uuid,
    pub tenant: String,
    /// `false` only when a delete step itself errored.
    pub success: bool,
    /// Documents removed per entity type (the `errors` counter is unused).
    pub deleted: SyncStats,
    /// `true` when the post-delete recount found zero residue. Distinct
    /// from `success`: deletion can run cleanly while concurrent writes
    /// leave residue behind.
    pub verified: bool,
    pub duration_secs: f64,
    pub error: Option<String>,
}
