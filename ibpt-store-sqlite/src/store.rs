use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use ibpt_core::models::FieldMap;
use ibpt_core::store::{Clock, RateStore, StoreError, SystemClock};
use sqlx::Row;
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};
use tracing::debug;

/// [`RateStore`] backed by a SQLite table, one row per cached field.
///
/// Expiry is kept as unix seconds next to every row and checked on read.
/// Expired rows stay on disk until [`purge_expired`](Self::purge_expired)
/// runs or the key is written again.
pub struct SqliteRateStore {
    pool: SqlitePool,
    clock: Arc<dyn Clock>,
}

impl SqliteRateStore {
    pub async fn new(database_url: &str) -> Result<Self> {
        // each connection to `sqlite::memory:` is a separate, empty database
        let options = if database_url.contains(":memory:") {
            SqlitePoolOptions::new()
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(4)
        };
        let pool = options
            .connect(database_url)
            .await
            .with_context(|| format!("Failed to connect to cache database: {}", database_url))?;
        Ok(Self::new_with_pool(pool))
    }

    pub fn new_with_pool(pool: SqlitePool) -> Self {
        Self {
            pool,
            clock: Arc::new(SystemClock),
        }
    }

    /// Replace the clock used to stamp and check expiry.
    pub fn with_clock(
        mut self,
        clock: Arc<dyn Clock>,
    ) -> Self {
        self.clock = clock;
        self
    }

    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run cache database migrations")?;
        Ok(())
    }

    /// Delete every row whose expiry has passed. Returns the number of rows
    /// removed.
    pub async fn purge_expired(&self) -> Result<u64, StoreError> {
        let result = sqlx::query("DELETE FROM rate_cache WHERE expires_at <= ?")
            .bind(self.now_secs())
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(result.rows_affected())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    fn now_secs(&self) -> i64 {
        self.clock.now().timestamp()
    }
}

#[async_trait]
impl RateStore for SqliteRateStore {
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<FieldMap>, StoreError> {
        let rows = sqlx::query(
            "SELECT field, value FROM rate_cache
             WHERE cache_key = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(self.now_secs())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if rows.is_empty() {
            return Ok(None);
        }

        let mut fields = FieldMap::new();
        for row in rows {
            let field: String = row
                .try_get("field")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            let value: String = row
                .try_get("value")
                .map_err(|e| StoreError::Backend(e.to_string()))?;
            fields.insert(field, value);
        }
        Ok(Some(fields))
    }

    async fn set_with_expiry(
        &self,
        key: &str,
        fields: &FieldMap,
        ttl_seconds: u64,
    ) -> Result<(), StoreError> {
        let ttl = i64::try_from(ttl_seconds).unwrap_or(i64::MAX);
        let expires_at = self.now_secs().saturating_add(ttl);

        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query("DELETE FROM rate_cache WHERE cache_key = ?")
            .bind(key)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        for (field, value) in fields {
            sqlx::query(
                "INSERT INTO rate_cache (cache_key, field, value, expires_at)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(key)
            .bind(field)
            .bind(value)
            .bind(expires_at)
            .execute(&mut *tx)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        }

        tx.commit()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        debug!(key, fields = fields.len(), expires_at, "cache entry written");
        Ok(())
    }
}
