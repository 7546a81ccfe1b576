//! Command handlers, called from `main` after config and the database pool
//! are established. Pipeline entry points return reports rather than
//! errors; handlers render the report and set the exit code.

use profitlens_core::{AppConfig, MetricsReport, SyncReport, TenantRecord, TenantStore};
use profitlens_db::PgStore;
use profitlens_shopify::ShopifyClient;
use profitlens_sync::{
    run_full_sync, run_metrics, Cleaner, CustomerLtvJob, IngestOptions, Ingestor, MetricsOptions,
    ProductPerformanceJob, ProfitJob, ShopifySource,
};

/// Metrics pass selector for `metrics --job`.
#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub(crate) enum MetricsJobArg {
    Profit,
    Ltv,
    Performance,
}

pub(crate) async fn install(store: &PgStore, shop: &str, token: &str) -> anyhow::Result<()> {
    let record = match store.get_tenant(shop).await? {
        Some(mut existing) => {
            existing.access_token = token.to_owned();
            existing.is_active = true;
            existing.uninstalled_at = None;
            existing
        }
        None => TenantRecord::new(shop, token),
    };
    store.upsert_tenant(&record).await?;
    println!("tenant {shop} installed");
    Ok(())
}

fn build_source(
    config: &AppConfig,
    shop: &str,
    access_token: &str,
) -> anyhow::Result<ShopifySource> {
    let client = ShopifyClient::new(
        shop,
        access_token,
        &config.shopify_api_version,
        config.shopify_request_timeout_secs,
        config.shopify_max_retries,
        config.shopify_retry_backoff_base_secs,
    )?;
    Ok(ShopifySource::new(client, config.sync_page_size))
}

pub(crate) async fn sync(
    store: &PgStore,
    config: &AppConfig,
    shop: &str,
    skip_metrics: bool,
) -> anyhow::Result<()> {
    let record = store
        .get_tenant(shop)
        .await?
        .ok_or_else(|| anyhow::anyhow!("tenant '{shop}' is not installed"))?;
    let source = build_source(config, shop, &record.access_token)?;
    let ingest_options = IngestOptions::from_app_config(config);

    if skip_metrics {
        let report = Ingestor::new(&source, store, ingest_options).run(shop).await;
        print_sync_report(&report);
        if !report.success {
            anyhow::bail!("sync failed");
        }
        return Ok(());
    }

    let outcome = run_full_sync(
        &source,
        store,
        shop,
        ingest_options,
        MetricsOptions::from_app_config(config),
    )
    .await;
    print_sync_report(&outcome.sync);
    for report in &outcome.metrics {
        print_metrics_report(report);
    }
    if !outcome.success() {
        anyhow::bail!("full sync completed with failures");
    }
    Ok(())
}

pub(crate) async fn metrics(
    store: &PgStore,
    config: &AppConfig,
    shop: &str,
    job: Option<MetricsJobArg>,
) -> anyhow::Result<()> {
    store
        .get_tenant(shop)
        .await?
        .ok_or_else(|| anyhow::anyhow!("tenant '{shop}' is not installed"))?;

    let options = MetricsOptions::from_app_config(config);
    let reports = match job {
        None => run_metrics(store, shop, options).await,
        Some(MetricsJobArg::Profit) => vec![ProfitJob::new(store, options).run(shop).await],
        Some(MetricsJobArg::Ltv) => vec![CustomerLtvJob::new(store, options).run(shop).await],
        Some(MetricsJobArg::Performance) => {
            vec![ProductPerformanceJob::new(store, options).run(shop).await]
        }
    };
    for report in &reports {
        print_metrics_report(report);
    }
    if reports.iter().any(|r| !r.success) {
        anyhow::bail!("metrics derivation completed with failures");
    }
    Ok(())
}

pub(crate) async fn cleanup(store: &PgStore, shop: &str, dry_run: bool) -> anyhow::Result<()> {
    if dry_run {
        let products = store.count_products(shop).await?;
        let customers = store.count_customers(shop).await?;
        let orders = store.count_orders(shop).await?;
        let line_items = store.count_line_items(shop).await?;
        let refunds = store.count_refunds(shop).await?;
        let tenant = u64::from(store.get_tenant(shop).await?.is_some());
        println!(
            "dry-run: would delete {products} products, {customers} customers, \
             {orders} orders, {line_items} line items, {refunds} refunds, \
             {tenant} tenant record(s) for {shop}"
        );
        return Ok(());
    }

    let report = Cleaner::new(store).run(shop).await;
    println!(
        "cleanup {}: removed {} records for {} in {:.1}s (verified: {})",
        if report.success { "succeeded" } else { "FAILED" },
        report.deleted.total_records(),
        report.tenant,
        report.duration_secs,
        report.verified,
    );
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
    if !report.success {
        anyhow::bail!("cleanup failed");
    }
    Ok(())
}

fn print_sync_report(report: &SyncReport) {
    println!(
        "sync {} (run {}): {} products, {} customers, {} orders, {} line items, \
         {} refunds, {} errors in {:.1}s",
        if report.success { "succeeded" } else { "FAILED" },
        report.run_id,
        report.stats.products,
        report.stats.customers,
        report.stats.orders,
        report.stats.line_items,
        report.stats.refunds,
        report.stats.errors,
        report.duration_secs,
    );
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
}

fn print_metrics_report(report: &MetricsReport) {
    println!(
        "metrics pass {} {}: {} processed, {} failed in {:.1}s",
        report.job,
        if report.success { "succeeded" } else { "FAILED" },
        report.processed,
        report.failed,
        report.duration_secs,
    );
    if let Some(error) = &report.error {
        println!("  error: {error}");
    }
}

pub(crate) async fn status(store: &PgStore, shop: &str) -> anyhow::Result<()> {
    let record = store
        .get_tenant(shop)
        .await?
        .ok_or_else(|| anyhow::anyhow!("tenant '{shop}' is not installed"))?;

    println!("tenant:        {}", record.shop_domain);
    println!("active:        {}", record.is_active);
    println!("installed at:  {}", record.installed_at);
    println!("sync state:    {}", record.sync.state);
    if let Some(started) = record.sync.started_at {
        println!("sync started:  {started}");
    }
    if let Some(synced) = record.sync.last_synced_at {
        println!("last synced:   {synced}");
    }
    if let Some(error) = &record.sync.last_error {
        println!("last error:    {error}");
    }
    let stats = record.sync.stats;
    println!(
        "records:       {} products, {} customers, {} orders, {} line items, \
         {} refunds ({} errors)",
        stats.products, stats.customers, stats.orders, stats.line_items, stats.refunds,
        stats.errors,
    );
    match record.metrics_computed_at {
        Some(at) => println!(
            "metrics:       computed {at}{}",
            if record.metrics_stale { " (stale)" } else { "" }
        ),
        None => println!("metrics:       never computed"),
    }
    Ok(())
}
