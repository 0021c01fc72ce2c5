use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use super::{RateError, RateProvider, RateSource};
use crate::config::CacheConfig;
use crate::models::{ProductRate, RateKey, RateRecord, ServiceRate};
use crate::store::RateStore;

/// Time-bounded cache of rate records on top of a [`RateStore`].
///
/// Entries are written with an expiry of now + TTL and simply stop being
/// returned by the store once it passes; nothing here evicts entries.
pub struct RateCache {
    store: Arc<dyn RateStore>,
    config: CacheConfig,
}

impl RateCache {
    pub fn new(
        store: Arc<dyn RateStore>,
        config: CacheConfig,
    ) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// Cached record for `key`, if a live entry exists.
    ///
    /// # Errors
    /// [`RateError::Transport`] when the store fails or the entry cannot be
    /// decoded.
    pub async fn get(
        &self,
        key: &RateKey,
    ) -> Result<Option<RateRecord>, RateError> {
        let cache_key = key.cache_key();
        let Some(fields) = self.store.get(&cache_key).await? else {
            return Ok(None);
        };

        RateRecord::from_fields(key.kind(), &fields)
            .map(Some)
            .map_err(|e| {
                warn!(key = %cache_key, error = %e, "cached rate entry is unreadable");
                e
            })
    }

    /// Stores `record` as the answer for `key`.
    ///
    /// # Errors
    /// [`RateError::Transport`] when the record kind does not match the key
    /// or the store rejects the write.
    pub async fn put(
        &self,
        key: &RateKey,
        record: &RateRecord,
    ) -> Result<(), RateError> {
        if record.kind() != key.kind() {
            return Err(RateError::Transport(format!(
                "source answered {key} with a {} record",
                record.kind()
            )));
        }

        let cache_key = key.cache_key();
        self.store
            .set_with_expiry(&cache_key, &record.to_fields(), self.config.ttl_secs)
            .await?;
        debug!(key = %cache_key, ttl_secs = self.config.ttl_secs, "rate cached");
        Ok(())
    }
}

/// Cache-aside [`RateProvider`].
///
/// A hit is answered from the cache without contacting the source. A miss
/// goes to the source; a successful answer is cached before it is returned,
/// a failure is returned as-is and leaves the cache untouched so the next
/// lookup tries the source again.
///
/// Concurrent misses on the same key each fetch and write the entry. The
/// source is deterministic per key, so the only cost is the extra request.
pub struct CachingProvider {
    source: Arc<dyn RateSource>,
    cache: RateCache,
}

impl CachingProvider {
    pub fn new(
        source: Arc<dyn RateSource>,
        store: Arc<dyn RateStore>,
        config: CacheConfig,
    ) -> Self {
        Self {
            source,
            cache: RateCache::new(store, config),
        }
    }

    pub fn cache(&self) -> &RateCache {
        &self.cache
    }

    async fn lookup(
        &self,
        key: &RateKey,
    ) -> Result<RateRecord, RateError> {
        if let Some(record) = self.cache.get(key).await? {
            debug!(%key, "rate cache hit");
            return Ok(record);
        }

        debug!(%key, "rate cache miss");
        let record = self.source.fetch(key).await?;
        record.validate()?;
        self.cache.put(key, &record).await?;
        Ok(record)
    }
}

#[async_trait]
impl RateProvider for CachingProvider {
    async fn get_product_rate(
        &self,
        code: &str,
        exception: u32,
    ) -> Result<ProductRate, RateError> {
        self.lookup(&RateKey::product(code, exception))
            .await?
            .into_product()
    }

    async fn get_service_rate(
        &self,
        code: &str,
    ) -> Result<ServiceRate, RateError> {
        self.lookup(&RateKey::service(code)).await?.into_service()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use chrono::{TimeZone, Utc};
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::models::FieldMap;
    use crate::provider::testing::{BrokenStore, StubSource, product_record, service_record};
    use crate::store::{Clock, ManualClock, MemoryStore};

    struct Fixture {
        source: Arc<StubSource>,
        store: Arc<MemoryStore>,
        clock: Arc<ManualClock>,
        provider: CachingProvider,
    }

    fn fixture(source: StubSource) -> Fixture {
        fixture_with_config(source, CacheConfig::default())
    }

    fn fixture_with_config(
        source: StubSource,
        config: CacheConfig,
    ) -> Fixture {
        let source = Arc::new(source);
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).unwrap(),
        ));
        let store = Arc::new(MemoryStore::with_clock(clock.clone()));
        let provider = CachingProvider::new(source.clone(), store.clone(), config);
        Fixture {
            source,
            store,
            clock,
            provider,
        }
    }

    fn simple_product() -> RateRecord {
        product_record("123", 0, dec!(4.2), dec!(4.8), dec!(18))
    }

    #[tokio::test]
    async fn first_lookup_fetches_once_and_stores_entry() {
        let f = fixture(StubSource::new().with(simple_product()));

        let rate = f.provider.get_product_rate("123", 0).await.expect("found");

        assert_eq!(f.source.calls(), 1);
        assert_eq!(rate.state, dec!(18));
        assert!(f.store.contains("product:123:0"));
    }

    #[tokio::test]
    async fn second_lookup_within_ttl_is_served_from_cache() {
        let f = fixture(StubSource::new().with(simple_product()));

        let first = f.provider.get_product_rate("123", 0).await.expect("found");
        f.clock.advance_secs(86_399);
        let second = f.provider.get_product_rate("123", 0).await.expect("found");

        assert_eq!(f.source.calls(), 1);
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn lookup_after_ttl_goes_back_to_the_source() {
        let f = fixture(StubSource::new().with(simple_product()));

        f.provider.get_product_rate("123", 0).await.expect("found");
        f.clock.advance_secs(86_400);
        f.provider.get_product_rate("123", 0).await.expect("found");

        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn entry_expiry_follows_configured_ttl() {
        let config = CacheConfig::default().with_ttl(std::time::Duration::from_secs(60));
        let f = fixture_with_config(StubSource::new().with(simple_product()), config);
        let start = f.clock.now();

        f.provider.get_product_rate("123", 0).await.expect("found");

        assert_eq!(
            f.store.expires_at("product:123:0"),
            Some(start + chrono::Duration::seconds(60))
        );
        f.clock.advance_secs(59);
        f.provider.get_product_rate("123", 0).await.expect("found");
        assert_eq!(f.source.calls(), 1);
        f.clock.advance_secs(1);
        f.provider.get_product_rate("123", 0).await.expect("found");
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn not_found_is_never_cached() {
        let f = fixture(StubSource::new());

        let first = f.provider.get_product_rate("123", 0).await;
        let second = f.provider.get_product_rate("123", 0).await;

        let expected = Err(RateError::NotFound(RateKey::product("123", 0)));
        assert_eq!(first, expected);
        assert_eq!(second, expected);
        assert_eq!(f.source.calls(), 2);
        assert!(!f.store.contains("product:123:0"));
    }

    #[tokio::test]
    async fn lookup_succeeds_once_upstream_catalog_is_fixed() {
        let f = fixture(StubSource::new());

        assert!(f.provider.get_product_rate("123", 0).await.is_err());
        f.source.set(RateKey::product("123", 0), Ok(simple_product()));
        let rate = f.provider.get_product_rate("123", 0).await.expect("found now");

        assert_eq!(rate.code, "123");
        assert!(f.store.contains("product:123:0"));
    }

    #[tokio::test]
    async fn identification_and_transport_failures_are_not_cached() {
        let key = RateKey::service("0123");
        let f = fixture(StubSource::new().failing(
            key.clone(),
            RateError::Identification("cnpj=00000000000000 uf=SP".to_string()),
        ));

        let result = f.provider.get_service_rate("0123").await;

        assert_eq!(
            result,
            Err(RateError::Identification("cnpj=00000000000000 uf=SP".to_string()))
        );
        assert!(f.store.is_empty());

        f.source
            .set(key, Err(RateError::Transport("HTTP 418".to_string())));
        let result = f.provider.get_service_rate("0123").await;

        assert_eq!(result, Err(RateError::Transport("HTTP 418".to_string())));
        assert!(f.store.is_empty());
        assert_eq!(f.source.calls(), 2);
    }

    #[tokio::test]
    async fn products_and_services_are_cached_independently() {
        let f = fixture(
            StubSource::new()
                .with(product_record("0123", 0, dec!(1), dec!(2), dec!(3)))
                .with(service_record("0123", dec!(4), dec!(5), dec!(0), dec!(6))),
        );

        let product = f.provider.get_product_rate("0123", 0).await.expect("product");
        let service = f.provider.get_service_rate("0123").await.expect("service");
        f.provider.get_product_rate("0123", 0).await.expect("product");
        f.provider.get_service_rate("0123").await.expect("service");

        assert_eq!(product.national, dec!(1));
        assert_eq!(service.municipal, dec!(6));
        assert_eq!(f.source.calls(), 2);
        assert_eq!(f.store.len(), 2);
    }

    #[tokio::test]
    async fn exception_codes_are_separate_entries() {
        let f = fixture(
            StubSource::new()
                .with(product_record("123", 0, dec!(1), dec!(1), dec!(1)))
                .with(product_record("123", 1, dec!(2), dec!(2), dec!(2))),
        );

        let plain = f.provider.get_product_rate("123", 0).await.expect("ex 0");
        let excepted = f.provider.get_product_rate("123", 1).await.expect("ex 1");

        assert_eq!(plain.national, dec!(1));
        assert_eq!(excepted.national, dec!(2));
        assert!(f.store.contains("product:123:1"));
    }

    #[tokio::test]
    async fn hit_is_decoded_from_entry_written_elsewhere() {
        let f = fixture(StubSource::new());
        let mut fields = FieldMap::new();
        fields.insert("Codigo".to_string(), "0123".to_string());
        fields.insert("UF".to_string(), "SP".to_string());
        fields.insert("Descricao".to_string(), "Serviço".to_string());
        fields.insert("Tipo".to_string(), "NBS".to_string());
        fields.insert("Nacional".to_string(), "13.45".to_string());
        fields.insert("Importado".to_string(), "14.05".to_string());
        fields.insert("Estadual".to_string(), "0".to_string());
        fields.insert("Municipal".to_string(), "4.33".to_string());
        f.store
            .set_with_expiry("service:0123", &fields, 3600)
            .await
            .expect("seed entry");

        let rate = f.provider.get_service_rate("0123").await.expect("cached");

        assert_eq!(f.source.calls(), 0);
        assert_eq!(rate.national, dec!(13.45));
        assert_eq!(rate.kind.as_deref(), Some("NBS"));
    }

    #[tokio::test]
    async fn unreadable_entry_is_a_transport_failure() {
        let f = fixture(StubSource::new().with(simple_product()));
        let mut fields = simple_product().to_fields();
        fields.insert("national".to_string(), "not-a-number".to_string());
        f.store
            .set_with_expiry("product:123:0", &fields, 3600)
            .await
            .expect("seed entry");

        let result = f.provider.get_product_rate("123", 0).await;

        assert!(matches!(result, Err(RateError::Transport(_))));
        assert_eq!(f.source.calls(), 0);
    }

    #[tokio::test]
    async fn store_read_failure_surfaces_without_fetching() {
        let source = Arc::new(StubSource::new().with(simple_product()));
        let provider = CachingProvider::new(
            source.clone(),
            Arc::new(BrokenStore { fail_reads: true }),
            CacheConfig::default(),
        );

        let result = provider.get_product_rate("123", 0).await;

        assert!(matches!(result, Err(RateError::Transport(msg)) if msg.contains("connection refused")));
        assert_eq!(source.calls(), 0);
    }

    #[tokio::test]
    async fn store_write_failure_surfaces() {
        let provider = CachingProvider::new(
            Arc::new(StubSource::new().with(simple_product())),
            Arc::new(BrokenStore { fail_reads: false }),
            CacheConfig::default(),
        );

        let result = provider.get_product_rate("123", 0).await;

        assert!(matches!(result, Err(RateError::Transport(msg)) if msg.contains("disk full")));
    }

    #[tokio::test]
    async fn record_of_wrong_kind_is_rejected_and_not_cached() {
        let f = fixture(StubSource::new().responding(
            RateKey::product("0123", 0),
            Ok(service_record("0123", dec!(1), dec!(1), dec!(1), dec!(1))),
        ));

        let result = f.provider.get_product_rate("0123", 0).await;

        assert!(matches!(result, Err(RateError::Transport(_))));
        assert!(f.store.is_empty());
    }

    #[tokio::test]
    async fn out_of_range_source_record_is_rejected_and_not_cached() {
        let f = fixture(StubSource::new().with(product_record(
            "123",
            0,
            dec!(101),
            dec!(0),
            dec!(0),
        )));

        let result = f.provider.get_product_rate("123", 0).await;

        assert!(matches!(result, Err(RateError::Transport(_))));
        assert!(f.store.is_empty());
    }
}
