//! Wiring shared by the estimate command and its tests.

use std::fs::File;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use ibpt_core::calculations::{AccumulatorError, Contribution, TaxAccumulator, TaxSummary};
use ibpt_core::models::LineItem;
use ibpt_core::provider::{CachingProvider, DirectProvider, RateProvider, RateSource};
use ibpt_core::store::StoreRegistry;
use ibpt_source_http::HttpRateSource;
use ibpt_store_sqlite::SqliteStoreFactory;
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::table::RateTable;

/// Registry with every cache backend this build knows about.
pub fn build_registry() -> StoreRegistry {
    let mut registry = StoreRegistry::with_memory();
    registry.register(Box::new(SqliteStoreFactory));
    registry
}

/// The offline table when `table` is given, the web service otherwise.
pub fn build_source(
    config: &AppConfig,
    table: Option<&Path>,
) -> Result<Arc<dyn RateSource>> {
    match table {
        Some(path) => {
            config.validate_jurisdiction()?;
            let file = File::open(path)
                .with_context(|| format!("Failed to open: {}", path.display()))?;
            let table = RateTable::parse(file, &config.source.jurisdiction)
                .with_context(|| format!("Failed to parse rate table: {}", path.display()))?;
            info!(rates = table.len(), path = %path.display(), "rate table loaded");
            Ok(Arc::new(table))
        }
        None => {
            config.validate_remote()?;
            let source = HttpRateSource::new(config.source.clone())?;
            info!(
                uf = %config.source.jurisdiction,
                endpoint = %config.source.endpoints.products,
                "using remote rate service"
            );
            Ok(Arc::new(source))
        }
    }
}

/// Cache-aside over the configured store, or straight to the source when
/// `use_cache` is false.
pub async fn build_provider(
    source: Arc<dyn RateSource>,
    config: &AppConfig,
    use_cache: bool,
) -> Result<Arc<dyn RateProvider>> {
    if !use_cache {
        return Ok(Arc::new(DirectProvider::new(source)));
    }

    let store = build_registry()
        .create(&config.store)
        .await
        .with_context(|| format!("Failed to open '{}' cache store", config.store.backend))?;
    info!(
        backend = %config.store.backend,
        ttl_secs = config.cache.ttl_secs,
        "rate cache enabled"
    );
    Ok(Arc::new(CachingProvider::new(
        source,
        Arc::from(store),
        config.cache,
    )))
}

/// Outcome of running a document through an accumulator.
#[derive(Debug)]
pub struct Estimate {
    pub contributions: Vec<Contribution>,
    pub skipped: Vec<(LineItem, AccumulatorError)>,
    pub summary: TaxSummary,
}

/// Add every item in order. With `keep_going`, failed items are recorded in
/// [`Estimate::skipped`] and the rest still count; otherwise the first
/// failure is returned.
pub async fn estimate(
    provider: Arc<dyn RateProvider>,
    items: &[LineItem],
    keep_going: bool,
) -> Result<Estimate, AccumulatorError> {
    let mut accumulator = TaxAccumulator::new(provider);
    let mut contributions = Vec::with_capacity(items.len());
    let mut skipped = Vec::new();

    for item in items {
        match accumulator.add_item(item).await {
            Ok(contribution) => contributions.push(contribution),
            Err(err) if keep_going => {
                warn!(key = %item.key, error = %err, "item skipped");
                skipped.push((item.clone(), err));
            }
            Err(err) => return Err(err),
        }
    }

    Ok(Estimate {
        contributions,
        skipped,
        summary: accumulator.summary(),
    })
}
