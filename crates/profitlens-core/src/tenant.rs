use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::report::SyncStats;

/// Per-tenant metadata record: credentials, activation flag, and sync
/// status. One active record per tenant; deactivation on uninstall is a
/// soft flag until cleanup removes the record entirely.
#[derive(Clone, Serialize, Deserialize)]
pub struct TenantRecord {
    /// The tenant identifier: the shop domain, e.g.
    /// `"example.myshopify.com"`.
    pub shop_domain: String,
    /// Admin API access token. Encryption at rest is the deployment's
    /// concern; in-process the token is redacted from all `Debug` output.
    pub access_token: String,
    pub is_active: bool,
    pub installed_at: DateTime<Utc>,
    pub uninstalled_at: Option<DateTime<Utc>>,
    pub sync: SyncStatus,
    /// When the last full metrics pass completed.
    pub metrics_computed_at: Option<DateTime<Utc>>,
    /// `true` whenever ingestion has written data the metrics jobs have not
    /// yet processed, so dashboards can flag stale figures.
    pub metrics_stale: bool,
}

impl TenantRecord {
    /// Creates a fresh, active record for a newly installed tenant.
    #[must_use]
    pub fn new(shop_domain: &str, access_token: &str) -> Self {
        Self {
            shop_domain: shop_domain.to_owned(),
            access_token: access_token.to_owned(),
            is_active: true,
            installed_at: Utc::now(),
            uninstalled_at: None,
            sync: SyncStatus::default(),
            metrics_computed_at: None,
            metrics_stale: false,
        }
    }
}

impl std::fmt::Debug for TenantRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TenantRecord")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[redacted]")
            .field("is_active", &self.is_active)
            .field("installed_at", &self.installed_at)
            .field("uninstalled_at", &self.uninstalled_at)
            .field("sync", &self.sync)
            .field("metrics_computed_at", &self.metrics_computed_at)
            .field("metrics_stale", &self.metrics_stale)
            .finish()
    }
}

/// Phases of the historical-sync state machine. Transitions are strictly
/// sequential on success; `Failed` is terminal for the run and recovery is
/// re-running the whole orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncState {
    NotStarted,
    FetchingProducts,
    FetchingCustomers,
    FetchingOrders,
    FetchingRefunds,
    Completed,
    Failed,
}

impl SyncState {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotStarted => "not_started",
            Self::FetchingProducts => "fetching_products",
            Self::FetchingCustomers => "fetching_customers",
            Self::FetchingOrders => "fetching_orders",
            Self::FetchingRefunds => "fetching_refunds",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    /// `true` for the two terminal states.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

impl std::fmt::Display for SyncState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for SyncState {
    type Err = UnknownSyncState;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "not_started" => Ok(Self::NotStarted),
            "fetching_products" => Ok(Self::FetchingProducts),
            "fetching_customers" => Ok(Self::FetchingCustomers),
            "fetching_orders" => Ok(Self::FetchingOrders),
            "fetching_refunds" => Ok(Self::FetchingRefunds),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            other => Err(UnknownSyncState(other.to_owned())),
        }
    }
}

/// A persisted sync-state string no current [`SyncState`] matches.
#[derive(Debug, thiserror::Error)]
#[error("unknown sync state {0:?}")]
pub struct UnknownSyncState(pub String);

/// Current sync status persisted on the tenant record after every phase
/// transition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncStatus {
    pub state: SyncState,
    pub started_at: Option<DateTime<Utc>>,
    /// Set only when a run reaches `Completed`.
    pub last_synced_at: Option<DateTime<Utc>>,
    /// Human-readable failure message from the last failed run.
    pub last_error: Option<String>,
    pub stats: SyncStats,
}

impl Default for SyncStatus {
    fn default() -> Self {
        Self {
            state: SyncState::NotStarted,
            started_at: None,
            last_synced_at: None,
            last_error: None,
            stats: SyncStats::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn debug_redacts_access_token() {
        let record = TenantRecord::new("example.myshopify.com", "shpat_secret");
        let rendered = format!("{record:?}");
        assert!(!rendered.contains("shpat_secret"));
        assert!(rendered.contains("[redacted]"));
    }

    #[test]
    fn terminal_states() {
        assert!(SyncState::Completed.is_terminal());
        assert!(SyncState::Failed.is_terminal());
        assert!(!SyncState::FetchingOrders.is_terminal());
    }

    #[test]
    fn sync_state_round_trips_through_str() {
        for state in [
            SyncState::NotStarted,
            SyncState::FetchingProducts,
            SyncState::FetchingCustomers,
            SyncState::FetchingOrders,
            SyncState::FetchingRefunds,
            SyncState::Completed,
            SyncState::Failed,
        ] {
            assert_eq!(state.as_str().parse::<SyncState>().unwrap(), state);
        }
        assert!("bogus".parse::<SyncState>().is_err());
    }
}
