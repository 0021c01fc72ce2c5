use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::Deserialize;

use super::memory::MemoryStore;
use super::rate_store::{RateStore, StoreError};

/// Which cache store to open, as read from the `[store]` config table.
///
/// | backend  | connection_string                  |
/// |----------|------------------------------------|
/// | `memory` | unused                             |
/// | `sqlite` | a file path, `sqlite:` URL or `:memory:` |
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub backend: String,
    pub connection_string: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: "memory".to_string(),
            connection_string: String::new(),
        }
    }
}

/// Opens one kind of [`RateStore`].
#[async_trait]
pub trait StoreFactory: Send + Sync {
    /// Lowercase name selected by [`StoreConfig::backend`].
    fn backend_name(&self) -> &'static str;

    async fn create(
        &self,
        config: &StoreConfig,
    ) -> Result<Box<dyn RateStore>, StoreError>;
}

/// Every call yields a fresh, empty [`MemoryStore`].
pub struct MemoryStoreFactory;

#[async_trait]
impl StoreFactory for MemoryStoreFactory {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn create(
        &self,
        _config: &StoreConfig,
    ) -> Result<Box<dyn RateStore>, StoreError> {
        Ok(Box::new(MemoryStore::new()))
    }
}

/// Cache backends known to this build.
///
/// Backend names are matched ignoring case and surrounding whitespace, so
/// `"SQLite"` from a hand-written config selects the `sqlite` factory.
pub struct StoreRegistry {
    factories: BTreeMap<&'static str, Box<dyn StoreFactory>>,
}

impl StoreRegistry {
    pub fn new() -> Self {
        Self {
            factories: BTreeMap::new(),
        }
    }

    pub fn with_memory() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MemoryStoreFactory));
        registry
    }

    /// Later registrations win over earlier ones with the same name.
    pub fn register(
        &mut self,
        factory: Box<dyn StoreFactory>,
    ) {
        self.factories.insert(factory.backend_name(), factory);
    }

    /// Registered backend names in alphabetical order.
    pub fn available_backends(&self) -> Vec<&'static str> {
        self.factories.keys().copied().collect()
    }

    /// Open the store named by `config.backend`.
    ///
    /// # Errors
    /// [`StoreError::Configuration`] naming the known backends when none
    /// matches; otherwise whatever the factory returns.
    pub async fn create(
        &self,
        config: &StoreConfig,
    ) -> Result<Box<dyn RateStore>, StoreError> {
        let name = config.backend.trim().to_ascii_lowercase();
        let Some(factory) = self.factories.get(name.as_str()) else {
            return Err(StoreError::Configuration(format!(
                "unknown cache backend '{}'; available: {}",
                config.backend,
                self.available_backends().join(", ")
            )));
        };
        factory.create(config).await
    }
}

impl Default for StoreRegistry {
    fn default() -> Self {
        Self::new()
    }
}
