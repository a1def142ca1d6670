//! CLI commands.

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};

use shishacquire::config::Settings;
use shishacquire::repository::{CatalogStorage, SqliteCatalogStore};
use shishacquire::services::scrape::ScrapeService;

#[derive(Parser)]
#[command(name = "shisha")]
#[command(about = "Shisha catalog acquisition system")]
#[command(version)]
pub struct Cli {
    /// Config file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Enumerate brand slugs from the catalog site
    Discover {
        /// Also enumerate each brand's products
        #[arg(long)]
        products: bool,
    },
    /// Discover and persist all brands and products
    Scrape,
    /// Show stored record counts and recent operations
    Status,
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();
    if cli.verbose {
        tracing::debug!("verbose output enabled");
    }
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Discover { products } => discover(settings, products).await,
        Commands::Scrape => scrape(settings).await,
        Commands::Status => status(settings).await,
    }
}

fn open_store(settings: &Settings) -> anyhow::Result<Arc<SqliteCatalogStore>> {
    let store = SqliteCatalogStore::new(&settings.storage.database_path)?;
    Ok(Arc::new(store))
}

async fn discover(settings: Settings, products: bool) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let service = ScrapeService::new(settings, store);

    let brands = service.discover_brands().await?;
    println!(
        "{} brands over {} pages:",
        brands.total_discovered, brands.iterations
    );
    for brand in &brands.identifiers {
        println!("  {brand}");
        if products {
            let outcome = service.discover_products(brand).await?;
            for product in &outcome.identifiers {
                println!("    {product}");
            }
        }
    }

    Ok(())
}

async fn scrape(settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;
    let service = ScrapeService::new(settings, store);

    let summary = service.run_full_scrape().await?;
    println!(
        "scrape complete: {}/{} brands, {}/{} products, {} errors",
        summary.brands_processed,
        summary.brands_discovered,
        summary.products_processed,
        summary.products_discovered,
        summary.errors_encountered,
    );

    Ok(())
}

async fn status(settings: Settings) -> anyhow::Result<()> {
    let store = open_store(&settings)?;

    println!("brands:   {}", store.brand_count().await?);
    println!("products: {}", store.product_count().await?);

    let operations = store.recent_operations(10).await?;
    if operations.is_empty() {
        println!("no operations recorded");
        return Ok(());
    }

    println!("recent operations:");
    for op in operations {
        let finished = op
            .completed_at
            .map(|dt| dt.to_rfc3339())
            .unwrap_or_else(|| "-".to_string());
        println!(
            "  {} {} {} started={} finished={} brands={} products={} errors={}",
            op.id,
            op.kind.as_str(),
            op.status.as_str(),
            op.started_at.to_rfc3339(),
            finished,
            op.brands_processed,
            op.products_processed,
            op.error_count,
        );
    }

    Ok(())
}
