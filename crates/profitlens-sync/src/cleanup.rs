//! The cleanup orchestrator: removes every trace of a tenant after
//! uninstall, children before parents, then recounts to prove the purge.

use tokio::time::Instant;
use uuid::Uuid;

use profitlens_core::{CleanupReport, StoreError, SyncStats, TenantStore};

/// Deletes all mirrored data and the tenant record for one tenant.
///
/// Deletion runs in reverse dependency order (refunds, line items, orders,
/// customers, products, then the tenant record) so an interruption never
/// leaves children pointing at deleted parents. A failed step aborts the
/// run with the counts accumulated so far; re-running resumes safely since
/// every step is a bulk delete by tenant.
pub struct Cleaner<'a> {
    store: &'a dyn TenantStore,
}

impl<'a> Cleaner<'a> {
    #[must_use]
    pub fn new(store: &'a dyn TenantStore) -> Self {
        Self { store }
    }

    /// Never returns an error; every failure mode lands in the report.
    pub async fn run(&self, tenant: &str) -> CleanupReport {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        tracing::info!(%run_id, tenant, "starting tenant data cleanup");

        let mut deleted = SyncStats::default();
        let error = self
            .delete_all(tenant, &mut deleted)
            .await
            .err()
            .map(|e| e.to_string());
        // Verification is a separate verdict: deletion can succeed while a
        // concurrent sync writes residue behind it.
        let verified = error.is_none() && self.verify(tenant).await;

        let duration_secs = start.elapsed().as_secs_f64();
        match &error {
            None => tracing::info!(
                %run_id,
                tenant,
                records = deleted.total_records(),
                verified,
                duration_secs,
                "tenant data cleanup completed"
            ),
            Some(message) => tracing::error!(
                %run_id,
                tenant,
                records = deleted.total_records(),
                error = %message,
                duration_secs,
                "tenant data cleanup failed"
            ),
        }

        CleanupReport {
            run_id,
            tenant: tenant.to_owned(),
            success: error.is_none(),
            deleted,
            verified,
            duration_secs,
            error,
        }
    }

    async fn delete_all(
        &self,
        tenant: &str,
        deleted: &mut SyncStats,
    ) -> Result<(), StoreError> {
        deleted.refunds = self.store.delete_refunds(tenant).await?;
        deleted.line_items = self.store.delete_line_items(tenant).await?;
        deleted.orders = self.store.delete_orders(tenant).await?;
        deleted.customers = self.store.delete_customers(tenant).await?;
        deleted.products = self.store.delete_products(tenant).await?;
        let tenant_records = self.store.delete_tenant(tenant).await?;
        tracing::debug!(tenant, tenant_records, "tenant record removed");
        Ok(())
    }

    /// Recounts every collection after deletion. A count that fails or
    /// finds residue makes the purge unverified, not failed.
    async fn verify(&self, tenant: &str) -> bool {
        let counts = [
            ("products", self.store.count_products(tenant).await),
            ("customers", self.store.count_customers(tenant).await),
            ("orders", self.store.count_orders(tenant).await),
            ("line_items", self.store.count_line_items(tenant).await),
            ("refunds", self.store.count_refunds(tenant).await),
        ];

        let mut verified = true;
        for (collection, count) in counts {
            match count {
                Ok(0) => {}
                Ok(residue) => {
                    verified = false;
                    tracing::warn!(tenant, collection, residue, "cleanup left residue behind");
                }
                Err(e) => {
                    verified = false;
                    tracing::warn!(tenant, collection, error = %e, "cleanup verification recount failed");
                }
            }
        }
        match self.store.get_tenant(tenant).await {
            Ok(None) => {}
            Ok(Some(_)) => {
                verified = false;
                tracing::warn!(tenant, "tenant record survived cleanup");
            }
            Err(e) => {
                verified = false;
                tracing::warn!(tenant, error = %e, "cleanup verification tenant lookup failed");
            }
        }
        verified
    }
}
