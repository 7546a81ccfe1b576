//! The ingestion orchestrator: drives the full historical sync for one
//! tenant through the phase machine `NotStarted → FetchingProducts →
//! FetchingCustomers → FetchingOrders → FetchingRefunds → Completed |
//! Failed`, persisting every transition on the tenant record.
//!
//! Failure policy is asymmetric. Products and orders are load-bearing: a
//! page fetch that fails after client-level retries fails the whole run and
//! no metrics jobs are scheduled. Customers and refunds are enrichments
//! whose failures are logged, counted, and the run still completes.
//!
//! Ingestion is idempotent within each entity type but not transactional
//! across types: a partial failure leaves already-written records intact,
//! and the supported recovery is re-running the whole orchestrator.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use tokio::time::Instant;
use uuid::Uuid;

use profitlens_core::{
    AppConfig, SyncReport, SyncState, SyncStats, SyncStatus, StoreError, TenantStore,
};
use profitlens_shopify::{
    normalize_customer, normalize_order, normalize_product, normalize_refund, SourceError,
};

use crate::source::{Page, SourceReader};

/// Tunables for one ingestion run.
#[derive(Debug, Clone, Copy)]
pub struct IngestOptions {
    /// Deadline for a single upstream page fetch (on top of the client's
    /// own request timeout and retries).
    pub page_timeout: Duration,
    /// Overall deadline for the run; expiry transitions to `Failed` instead
    /// of blocking forever on a stuck upstream.
    pub run_deadline: Duration,
    /// Guard against cycling cursors.
    pub max_pages: usize,
}

impl Default for IngestOptions {
    fn default() -> Self {
        Self {
            page_timeout: Duration::from_secs(60),
            run_deadline: Duration::from_secs(3600),
            max_pages: 500,
        }
    }
}

impl IngestOptions {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            page_timeout: Duration::from_secs(config.sync_page_timeout_secs),
            run_deadline: Duration::from_secs(config.sync_deadline_secs),
            ..Self::default()
        }
    }
}

/// Internal run-failure reasons; callers only ever see the rendered message
/// inside the [`SyncReport`].
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    #[error("{entity} ingestion failed: {source}")]
    Entity {
        entity: &'static str,
        #[source]
        source: SourceError,
    },

    #[error("{entity} page fetch timed out after {timeout:?}")]
    PageTimeout {
        entity: &'static str,
        timeout: Duration,
    },

    #[error("{entity} pagination exceeded {max_pages} pages")]
    PaginationLimit {
        entity: &'static str,
        max_pages: usize,
    },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Drives Reader → Normalizer → Writer across all entity types in
/// dependency order for one tenant. Collaborators are injected; the
/// orchestrator holds no ambient state.
pub struct Ingestor<'a> {
    source: &'a dyn SourceReader,
    store: &'a dyn TenantStore,
    options: IngestOptions,
}

impl<'a> Ingestor<'a> {
    #[must_use]
    pub fn new(
        source: &'a dyn SourceReader,
        store: &'a dyn TenantStore,
        options: IngestOptions,
    ) -> Self {
        Self {
            source,
            store,
            options,
        }
    }

    /// Runs the full historical sync for `tenant`.
    ///
    /// Never returns an error: every failure mode is captured in the
    /// returned [`SyncReport`] so a tenant's failure cannot crash a process
    /// serving other tenants.
    pub async fn run(&self, tenant: &str) -> SyncReport {
        let run_id = Uuid::new_v4();
        let start = Instant::now();
        let started_at = Utc::now();
        tracing::info!(%run_id, tenant, "starting historical sync");

        let record = match self.store.get_tenant(tenant).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                return self.report(run_id, tenant, SyncStats::default(), start, Some(
                    format!("no tenant record for {tenant}"),
                ));
            }
            Err(e) => {
                return self.report(run_id, tenant, SyncStats::default(), start, Some(
                    format!("failed to load tenant record: {e}"),
                ));
            }
        };
        let previous_synced_at = record.sync.last_synced_at;

        let mut stats = SyncStats::default();
        let phases = self.run_phases(tenant, started_at, previous_synced_at, &mut stats);
        let error = match tokio::time::timeout(self.options.run_deadline, phases).await {
            Ok(Ok(())) => None,
            Ok(Err(e)) => Some(e.to_string()),
            Err(_) => Some(format!(
                "ingestion deadline of {:?} exceeded",
                self.options.run_deadline
            )),
        };

        let terminal = SyncStatus {
            state: if error.is_none() {
                SyncState::Completed
            } else {
                SyncState::Failed
            },
            started_at: Some(started_at),
            last_synced_at: if error.is_none() {
                Some(Utc::now())
            } else {
                previous_synced_at
            },
            last_error: error.clone(),
            stats,
        };
        if let Err(e) = self.store.update_sync_status(tenant, &terminal).await {
            tracing::error!(tenant, error = %e, "failed to persist terminal sync status");
        }

        if error.is_none() {
            // New raw data invalidates previously computed metrics until the
            // derivation jobs run again.
            if let Err(e) = self
                .store
                .set_metrics_state(tenant, record.metrics_computed_at, true)
                .await
            {
                tracing::error!(tenant, error = %e, "failed to flag metrics as stale");
            }
        }

        self.report(run_id, tenant, stats, start, error)
    }

    fn report(
        &self,
        run_id: Uuid,
        tenant: &str,
        stats: SyncStats,
        start: Instant,
        error: Option<String>,
    ) -> SyncReport {
        let duration_secs = start.elapsed().as_secs_f64();
        match &error {
            None => tracing::info!(
                %run_id,
                tenant,
                products = stats.products,
                customers = stats.customers,
                orders = stats.orders,
                line_items = stats.line_items,
                refunds = stats.refunds,
                errors = stats.errors,
                duration_secs,
                "historical sync completed"
            ),
            Some(message) => tracing::error!(
                %run_id,
                tenant,
                error = %message,
                duration_secs,
                "historical sync failed"
            ),
        }
        SyncReport {
            run_id,
            tenant: tenant.to_owned(),
            success: error.is_none(),
            stats,
            duration_secs,
            error,
        }
    }

    async fn run_phases(
        &self,
        tenant: &str,
        started_at: DateTime<Utc>,
        previous_synced_at: Option<DateTime<Utc>>,
        stats: &mut SyncStats,
    ) -> Result<(), SyncError> {
        self.enter_phase(tenant, SyncState::FetchingProducts, started_at, previous_synced_at, stats)
            .await?;
        self.ingest_products(tenant, stats).await?;

        self.enter_phase(tenant, SyncState::FetchingCustomers, started_at, previous_synced_at, stats)
            .await?;
        if let Err(e) = self.ingest_customers(tenant, stats).await {
            // Enrichment data: degrade instead of failing the run. The
            // counter is reset so partial customer data is not reported as
            // synced.
            stats.customers = 0;
            stats.errors += 1;
            tracing::warn!(tenant, error = %e, "customer ingestion degraded; continuing");
        }

        self.enter_phase(tenant, SyncState::FetchingOrders, started_at, previous_synced_at, stats)
            .await?;
        self.ingest_orders(tenant, stats).await?;

        self.enter_phase(tenant, SyncState::FetchingRefunds, started_at, previous_synced_at, stats)
            .await?;
        self.ingest_refunds(tenant, stats).await;

        Ok(())
    }

    async fn enter_phase(
        &self,
        tenant: &str,
        state: SyncState,
        started_at: DateTime<Utc>,
        previous_synced_at: Option<DateTime<Utc>>,
        stats: &SyncStats,
    ) -> Result<(), SyncError> {
        tracing::info!(tenant, phase = %state, "entering sync phase");
        let status = SyncStatus {
            state,
            started_at: Some(started_at),
            last_synced_at: previous_synced_at,
            last_error: None,
            stats: *stats,
        };
        self.store.update_sync_status(tenant, &status).await?;
        Ok(())
    }

    async fn fetch_page<F>(&self, entity: &'static str, fetch: F) -> Result<Page, SyncError>
    where
        F: Future<Output = Result<Page, SourceError>>,
    {
        match tokio::time::timeout(self.options.page_timeout, fetch).await {
            Ok(Ok(page)) => Ok(page),
            Ok(Err(source)) => Err(SyncError::Entity { entity, source }),
            Err(_) => Err(SyncError::PageTimeout {
                entity,
                timeout: self.options.page_timeout,
            }),
        }
    }

    async fn ingest_products(
        &self,
        tenant: &str,
        stats: &mut SyncStats,
    ) -> Result<(), SyncError> {
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            pages += 1;
            if pages > self.options.max_pages {
                return Err(SyncError::PaginationLimit {
                    entity: "products",
                    max_pages: self.options.max_pages,
                });
            }

            let page = self
                .fetch_page("products", self.source.products_page(cursor.as_deref()))
                .await?;

            for raw in &page.items {
                match normalize_product(raw) {
                    Ok(product) => match self.store.upsert_product(tenant, &product).await {
                        Ok(()) => stats.products += 1,
                        Err(e) => {
                            stats.errors += 1;
                            tracing::warn!(tenant, error = %e, "product write failed; skipping record");
                        }
                    },
                    Err(e) => {
                        stats.errors += 1;
                        tracing::warn!(tenant, error = %e, "product normalization failed; skipping record");
                    }
                }
            }

            cursor = page.next_cursor;
            if page.items.is_empty() || cursor.is_none() {
                return Ok(());
            }
        }
    }

    async fn ingest_customers(
        &self,
        tenant: &str,
        stats: &mut SyncStats,
    ) -> Result<(), SyncError> {
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            pages += 1;
            if pages > self.options.max_pages {
                return Err(SyncError::PaginationLimit {
                    entity: "customers",
                    max_pages: self.options.max_pages,
                });
            }

            let page = self
                .fetch_page("customers", self.source.customers_page(cursor.as_deref()))
                .await?;

            for raw in &page.items {
                match normalize_customer(raw) {
                    Ok(customer) => match self.store.upsert_customer(tenant, &customer).await {
                        Ok(()) => stats.customers += 1,
                        Err(e) => {
                            stats.errors += 1;
                            tracing::warn!(tenant, error = %e, "customer write failed; skipping record");
                        }
                    },
                    Err(e) => {
                        stats.errors += 1;
                        tracing::warn!(tenant, error = %e, "customer normalization failed; skipping record");
                    }
                }
            }

            cursor = page.next_cursor;
            if page.items.is_empty() || cursor.is_none() {
                return Ok(());
            }
        }
    }

    async fn ingest_orders(&self, tenant: &str, stats: &mut SyncStats) -> Result<(), SyncError> {
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;
        loop {
            pages += 1;
            if pages > self.options.max_pages {
                return Err(SyncError::PaginationLimit {
                    entity: "orders",
                    max_pages: self.options.max_pages,
                });
            }

            let page = self
                .fetch_page("orders", self.source.orders_page(cursor.as_deref()))
                .await?;

            for raw in &page.items {
                let (order, line_items) = match normalize_order(raw) {
                    Ok(parts) => parts,
                    Err(e) => {
                        stats.errors += 1;
                        tracing::warn!(tenant, error = %e, "order normalization failed; skipping record");
                        continue;
                    }
                };
                if let Err(e) = self.store.upsert_order(tenant, &order).await {
                    stats.errors += 1;
                    tracing::warn!(tenant, error = %e, "order write failed; skipping record");
                    continue;
                }
                stats.orders += 1;
                // Line items arrive embedded in the order payload; they are
                // ingested inline rather than as a separate paginated type.
                for line_item in &line_items {
                    match self.store.upsert_line_item(tenant, line_item).await {
                        Ok(()) => stats.line_items += 1,
                        Err(e) => {
                            stats.errors += 1;
                            tracing::warn!(tenant, error = %e, "line item write failed; skipping record");
                        }
                    }
                }
            }

            cursor = page.next_cursor;
            if page.items.is_empty() || cursor.is_none() {
                return Ok(());
            }
        }
    }

    /// Refund ingestion is O(orders): one upstream call per mirrored order,
    /// iterating the local order set written by the orders phase. Failures
    /// are per-order and never fail the run.
    async fn ingest_refunds(&self, tenant: &str, stats: &mut SyncStats) {
        let orders = match self.store.list_orders(tenant).await {
            Ok(orders) => orders,
            Err(e) => {
                stats.errors += 1;
                tracing::warn!(tenant, error = %e, "could not list orders for refund ingestion");
                return;
            }
        };

        for order in orders {
            let order_id = order.upstream_order_id;
            let fetched = tokio::time::timeout(
                self.options.page_timeout,
                self.source.order_refunds(order_id),
            )
            .await;
            let items = match fetched {
                Ok(Ok(items)) => items,
                Ok(Err(e)) => {
                    stats.errors += 1;
                    tracing::warn!(tenant, order_id, error = %e, "refund fetch failed; skipping order");
                    continue;
                }
                Err(_) => {
                    stats.errors += 1;
                    tracing::warn!(tenant, order_id, "refund fetch timed out; skipping order");
                    continue;
                }
            };

            for raw in &items {
                match normalize_refund(order_id, raw) {
                    Ok(refund) => match self.store.upsert_refund(tenant, &refund).await {
                        Ok(()) => stats.refunds += 1,
                        Err(e) => {
                            stats.errors += 1;
                            tracing::warn!(tenant, order_id, error = %e, "refund write failed; skipping record");
                        }
                    },
                    Err(e) => {
                        stats.errors += 1;
                        tracing::warn!(tenant, order_id, error = %e, "refund normalization failed; skipping record");
                    }
                }
            }
        }
    }
}
