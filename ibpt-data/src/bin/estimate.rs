use std::fs::File;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use ibpt_core::calculations::round_half_up;
use ibpt_data::{AppConfig, LineItemLoader, app};
use tracing::debug;
use tracing_subscriber::EnvFilter;

// ─── CLI definition ──────────────────────────────────────────────────────────

/// Approximate taxes embedded in the items of a sale.
///
/// The items CSV needs the columns `kind,code,exception,subtotal`, where
/// `kind` is `product` or `service`.
#[derive(Debug, Parser)]
#[command(name = "ibpt-estimate")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Path to the CSV file with the document's line items
    #[arg(short, long)]
    items: PathBuf,

    /// Offline IBPTax table (semicolon CSV). Without it, the web service is queried
    #[arg(short, long)]
    table: Option<PathBuf>,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Two-letter state code the rates apply to
    #[arg(long)]
    jurisdiction: Option<String>,

    /// Cache backend (`memory` or `sqlite`)
    #[arg(long)]
    cache_backend: Option<String>,

    /// Cache connection string; for SQLite a file path or `:memory:`
    #[arg(long)]
    cache_db: Option<String>,

    /// Cache lifetime of a rate, in seconds
    #[arg(long)]
    ttl: Option<u64>,

    /// Query the source for every item, bypassing the cache
    #[arg(long, default_value_t = false)]
    no_cache: bool,

    /// Skip items whose rate lookup fails instead of stopping
    #[arg(short, long, default_value_t = false)]
    keep_going: bool,
}

impl Cli {
    fn apply_to(
        &self,
        config: &mut AppConfig,
    ) {
        if let Some(jurisdiction) = &self.jurisdiction {
            config.source.jurisdiction = jurisdiction.clone();
        }
        if let Some(backend) = &self.cache_backend {
            config.store.backend = backend.clone();
        }
        if let Some(db) = &self.cache_db {
            config.store.connection_string = db.clone();
        }
        if let Some(ttl) = self.ttl {
            config.cache.ttl_secs = ttl;
        }
    }
}

// ─── tracing ─────────────────────────────────────────────────────────────────

/// Initialise the tracing subscriber.
///
/// Honours `RUST_LOG` and falls back to `info`. Log lines go to stderr so
/// the report on stdout stays clean.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::from("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .with_target(false)
        .init();
}

// ─── entry point ─────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();

    let mut config = match &cli.config {
        Some(path) => AppConfig::from_path(path)
            .with_context(|| format!("Failed to load config: {}", path.display()))?,
        None => AppConfig::default(),
    };
    config.apply_env();
    cli.apply_to(&mut config);
    debug!(?config, "configuration resolved");

    let file = File::open(&cli.items)
        .with_context(|| format!("Failed to open: {}", cli.items.display()))?;
    let items = LineItemLoader::parse(file)
        .with_context(|| format!("Failed to parse CSV: {}", cli.items.display()))?;
    println!("Parsed {} items from {}", items.len(), cli.items.display());

    let source = app::build_source(&config, cli.table.as_deref())?;
    let provider = app::build_provider(source, &config, !cli.no_cache).await?;

    let estimate = app::estimate(provider, &items, cli.keep_going)
        .await
        .context("Failed to estimate taxes")?;

    println!();
    println!(
        "{:<10}{:<14}{:>12}{:>12}{:>12}{:>12}{:>12}",
        "kind", "code", "subtotal", "federal", "state", "municipal", "taxes"
    );
    for c in &estimate.contributions {
        println!(
            "{:<10}{:<14}{:>12}{:>12}{:>12}{:>12}{:>12}",
            c.key.kind(),
            c.key.code(),
            round_half_up(c.subtotal),
            round_half_up(c.national_domestic + c.national_imported),
            round_half_up(c.state),
            round_half_up(c.municipal),
            round_half_up(c.total()),
        );
    }

    if !estimate.skipped.is_empty() {
        println!();
        println!("Skipped {} items:", estimate.skipped.len());
        for (item, err) in &estimate.skipped {
            println!("  {}: {}", item.key, err);
        }
    }

    println!();
    println!("{}", estimate.summary.rounded());

    Ok(())
}
