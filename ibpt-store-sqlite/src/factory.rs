use async_trait::async_trait;
use ibpt_core::store::{RateStore, StoreConfig, StoreError, StoreFactory};
use tracing::info;

use crate::store::SqliteRateStore;

/// Turn a `connection_string` into a sqlx SQLite URL.
///
/// * `":memory:"` becomes `sqlite::memory:`.
/// * A value already starting with `sqlite:` is used unchanged.
/// * Anything else is a file path, created if it does not exist.
pub fn database_url(connection_string: &str) -> Result<String, StoreError> {
    let trimmed = connection_string.trim();
    if trimmed.is_empty() {
        return Err(StoreError::Configuration(
            "sqlite backend needs a database path or ':memory:'".to_string(),
        ));
    }
    Ok(match trimmed {
        ":memory:" => "sqlite::memory:".to_string(),
        url if url.starts_with("sqlite:") => url.to_string(),
        path => format!("sqlite:{path}?mode=rwc"),
    })
}

/// [`StoreFactory`] for SQLite.
///
/// Register this with a [`ibpt_core::store::StoreRegistry`] to make the
/// `"sqlite"` backend available:
///
/// ```rust,no_run
/// use ibpt_core::store::StoreRegistry;
/// use ibpt_store_sqlite::SqliteStoreFactory;
///
/// let mut registry = StoreRegistry::with_memory();
/// registry.register(Box::new(SqliteStoreFactory));
/// ```
pub struct SqliteStoreFactory;

#[async_trait]
impl StoreFactory for SqliteStoreFactory {
    fn backend_name(&self) -> &'static str {
        "sqlite"
    }

    /// Open the cache database, apply migrations and drop expired rows.
    async fn create(
        &self,
        config: &StoreConfig,
    ) -> Result<Box<dyn RateStore>, StoreError> {
        let url = database_url(&config.connection_string)?;
        let store = SqliteRateStore::new(&url)
            .await
            .map_err(|e| StoreError::Connection(format!("{e:#}")))?;
        store
            .run_migrations()
            .await
            .map_err(|e| StoreError::Backend(format!("{e:#}")))?;

        let purged = store.purge_expired().await?;
        info!(database = %url, purged, "sqlite rate cache ready");
        Ok(Box::new(store))
    }
}

#[cfg(test)]
mod tests {
    use ibpt_core::models::FieldMap;
    use ibpt_core::store::StoreRegistry;
    use pretty_assertions::assert_eq;

    use super::*;

    fn config(connection_string: &str) -> StoreConfig {
        StoreConfig {
            backend: "sqlite".to_string(),
            connection_string: connection_string.to_string(),
        }
    }

    #[test]
    fn backend_name_is_sqlite() {
        assert_eq!(SqliteStoreFactory.backend_name(), "sqlite");
    }

    #[test]
    fn database_url_mapping() {
        assert_eq!(database_url(":memory:"), Ok("sqlite::memory:".to_string()));
        assert_eq!(
            database_url("cache/ibpt.db"),
            Ok("sqlite:cache/ibpt.db?mode=rwc".to_string())
        );
        assert_eq!(
            database_url("sqlite://already.db"),
            Ok("sqlite://already.db".to_string())
        );
        assert!(matches!(
            database_url("  "),
            Err(StoreError::Configuration(_))
        ));
    }

    /// Factory → migrated in-memory store that accepts writes.
    #[tokio::test]
    async fn creates_in_memory_store() {
        let store = SqliteStoreFactory
            .create(&config(":memory:"))
            .await
            .expect("in-memory store");
        let mut fields = FieldMap::new();
        fields.insert("code".to_string(), "0123".to_string());

        store
            .set_with_expiry("service:0123", &fields, 60)
            .await
            .expect("set");

        assert_eq!(store.get("service:0123").await, Ok(Some(fields)));
    }

    #[tokio::test]
    async fn registry_dispatches_to_sqlite() {
        let mut registry = StoreRegistry::with_memory();
        registry.register(Box::new(SqliteStoreFactory));

        assert_eq!(registry.available_backends(), vec!["memory", "sqlite"]);
        assert!(registry.create(&config(":memory:")).await.is_ok());
    }

    #[tokio::test]
    async fn empty_connection_string_is_a_configuration_error() {
        let result = SqliteStoreFactory.create(&config("")).await;

        assert!(matches!(result, Err(StoreError::Configuration(_))));
    }
}
