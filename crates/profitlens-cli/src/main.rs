mod commands;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "profitlens")]
#[command(about = "Shopify profit analytics: data mirroring and metrics derivation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Register a tenant (or refresh its token) so it can be synced.
    Install {
        /// Shop domain, e.g. example.myshopify.com
        #[arg(long)]
        shop: String,
        /// Admin API access token.
        #[arg(long, env = "SHOPIFY_ACCESS_TOKEN", hide_env_values = true)]
        token: String,
    },
    /// Run the historical sync, then the metrics passes.
    Sync {
        #[arg(long)]
        shop: String,
        /// Mirror raw data only; leave metrics derivation for later.
        #[arg(long)]
        skip_metrics: bool,
    },
    /// Recompute derived metrics from the mirrored data.
    Metrics {
        #[arg(long)]
        shop: String,
        /// Run a single pass instead of all three. Running one pass leaves
        /// the tenant's metrics marked stale.
        #[arg(long, value_enum)]
        job: Option<commands::MetricsJobArg>,
    },
    /// Delete all mirrored data and the tenant record.
    Cleanup {
        #[arg(long)]
        shop: String,
        /// Print current record counts without deleting anything.
        #[arg(long)]
        dry_run: bool,
    },
    /// Show the tenant's sync and metrics status.
    Status {
        #[arg(long)]
        shop: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let config = profitlens_core::load_app_config()?;
    let env_filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(config.log_level.clone()))?;
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let pool_config = profitlens_db::PoolConfig::from_app_config(&config);
    let pool = profitlens_db::connect_pool(&config.database_url, pool_config).await?;
    profitlens_db::run_migrations(&pool).await?;
    let store = profitlens_db::PgStore::new(pool);

    let cli = Cli::parse();
    match cli.command {
        Commands::Install { shop, token } => commands::install(&store, &shop, &token).await,
        Commands::Sync { shop, skip_metrics } => {
            commands::sync(&store, &config, &shop, skip_metrics).await
        }
        Commands::Metrics { shop, job } => commands::metrics(&store, &config, &shop, job).await,
        Commands::Cleanup { shop, dry_run } => commands::cleanup(&store, &shop, dry_run).await,
        Commands::Status { shop } => commands::status(&store, &shop).await,
    }
}
