use async_trait::async_trait;
use thiserror::Error;

use crate::models::{RateKey, RateRecord};
use crate::store::StoreError;

/// Failures a rate lookup can end in.
///
/// None of them is ever cached, and callers above the source receive them
/// exactly as the source produced them.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateError {
    /// The item code (and exception, for products) is unknown to the source.
    #[error("{0} not found")]
    NotFound(RateKey),

    /// The credentials presented to the source were missing, expired or
    /// rejected.
    #[error("identification rejected: {0}")]
    Identification(String),

    /// Any other non-success outcome from the source or the cache store.
    #[error("transport failure: {0}")]
    Transport(String),
}

impl From<StoreError> for RateError {
    fn from(err: StoreError) -> Self {
        RateError::Transport(format!("cache store: {err}"))
    }
}

/// Performs a single lookup against the authoritative rate source.
///
/// Implementations own everything about the transport: endpoints,
/// credentials, timeouts and any retry policy.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch(
        &self,
        key: &RateKey,
    ) -> Result<RateRecord, RateError>;
}
