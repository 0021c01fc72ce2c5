use async_trait::async_trait;
use thiserror::Error;

use crate::models::FieldMap;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("Store error: {0}")]
    Backend(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

/// Key/value store holding flat field maps with a per-entry expiry.
///
/// An entry whose expiry has passed must no longer be returned by `get`.
/// Whether it is physically removed, and when, is up to the backend.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// All fields stored under `key`, or `None` if absent or expired.
    async fn get(
        &self,
        key: &str,
    ) -> Result<Option<FieldMap>, StoreError>;

    /// Replaces every field under `key` and sets the entry to expire
    /// `ttl_seconds` from now.
    async fn set_with_expiry(
        &self,
        key: &str,
        fields: &FieldMap,
        ttl_seconds: u64,
    ) -> Result<(), StoreError>;
}
