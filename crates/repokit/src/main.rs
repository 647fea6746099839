mod demo;

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use repokit::cache::{CacheBroker, CacheEntryOptions, MemoryCache};
use repokit::config::Config;
use repokit::context::Database;
use repokit::migrations::MigrationRunner;
use repokit::repository::{
    CachedPrimaryEntityRepository, EntityRepository, PrimaryEntityRepositoryBase,
};
use repokit::storage::SqliteStore;
use repokit_core::cache::Cache;
use repokit_core::entity::not_deleted;
use repokit_core::model::ContextDefinition;
use repokit_core::options::{CommandOptions, QueryOptions, TrackingMode};

use crate::demo::{Audit, AuditRecord, Catalog, Product};

/// repokit - Generic repositories over a unit of work
#[derive(Parser, Debug)]
#[command(name = "repokit")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the SQLite database file
    #[arg(long, env = "SQLITE_PATH")]
    database: Option<String>,

    /// Tracking for queries that ask for the default
    #[arg(long, env = "DEFAULT_TRACKING")]
    tracking: Option<TrackingMode>,

    /// Cache entries in Redis instead of process memory
    #[cfg(feature = "redis")]
    #[arg(long)]
    redis: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Apply pending schema migrations
    Migrate {
        /// Context to migrate; repeat for several. Migrates all when omitted
        #[arg(long = "context", value_name = "NAME")]
        contexts: Vec<String>,
    },
    /// Create sample products and print them as JSON
    Seed {
        /// Number of products to create
        #[arg(long, short, default_value_t = 3)]
        count: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing subscriber
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "repokit=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let mut config = Config::from_env();
    if let Some(path) = cli.database {
        config.sqlite_path = path;
    }
    if let Some(tracking) = cli.tracking {
        config.default_tracking = tracking;
    }

    // Both demo contexts share one database file
    let catalog = open::<Catalog>(&config).await?;
    let audit = open::<Audit>(&config).await?;

    let mut runner = MigrationRunner::new();
    runner.register(catalog.clone()).register(audit.clone());

    match cli.command {
        Command::Migrate { contexts } => {
            let reports = if contexts.is_empty() {
                runner.migrate_all().await?
            } else {
                let names: Vec<&str> = contexts.iter().map(String::as_str).collect();
                runner.migrate_many(&names).await?
            };
            println!("{}", serde_json::to_string_pretty(&reports)?);
        }
        Command::Seed { count } => {
            runner.migrate_all().await?;

            let options = CacheEntryOptions::with_ttl(config.cache_ttl());

            #[cfg(feature = "redis")]
            if cli.redis {
                let cache = repokit::cache::RedisCache::new(&config.redis_url)
                    .await
                    .context("Failed to connect to Redis")?;
                let broker = CacheBroker::new(Arc::new(cache), options);
                return seed(&catalog, &audit, broker, count).await;
            }

            let broker = CacheBroker::new(
                Arc::new(MemoryCache::new(config.cache_max_entries)),
                options,
            );
            seed(&catalog, &audit, broker, count).await?;
        }
    }

    Ok(())
}

async fn open<D: ContextDefinition>(config: &Config) -> Result<Database> {
    let store = SqliteStore::new(&config.sqlite_path)
        .await
        .with_context(|| format!("Failed to open {}", config.sqlite_path))?;
    let model = D::build_model().with_context(|| format!("Invalid model for {}", D::NAME))?;

    Ok(Database::new(Arc::new(store), model).with_default_tracking(config.default_tracking))
}

/// Creates `count` products through the cached repository, records one audit
/// line per product in a single deferred save, and prints the products.
async fn seed<C: Cache + 'static>(
    catalog: &Database,
    audit: &Database,
    broker: CacheBroker<C>,
    count: usize,
) -> Result<()> {
    let products = CachedPrimaryEntityRepository::new(
        Arc::new(PrimaryEntityRepositoryBase::<Product>::with_generated_keys(
            catalog.context(),
        )),
        broker,
    );
    let audit_context = audit.context();
    let records = PrimaryEntityRepositoryBase::<AuditRecord>::new(audit_context.clone());

    let mut created = Vec::with_capacity(count);
    for index in 0..count {
        let product = products
            .create(Product::sample(index), CommandOptions::default())
            .await?;
        records
            .create(AuditRecord::created(&product), CommandOptions::deferred())
            .await?;
        created.push(product);
    }
    let recorded = audit_context.save_changes().await?;

    let live = products
        .get(Some(not_deleted::<Product>()), QueryOptions::no_tracking())
        .count()
        .await?;
    tracing::info!(count = created.len(), recorded, live, "Seeded products");

    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}
