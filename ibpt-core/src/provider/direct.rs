use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use super::{RateError, RateProvider, RateSource};
use crate::models::{ProductRate, RateKey, RateRecord, ServiceRate};

/// Sends every lookup straight to the [`RateSource`].
pub struct DirectProvider {
    source: Arc<dyn RateSource>,
}

impl DirectProvider {
    pub fn new(source: Arc<dyn RateSource>) -> Self {
        Self { source }
    }

    async fn lookup(
        &self,
        key: &RateKey,
    ) -> Result<RateRecord, RateError> {
        debug!(%key, "fetching rate from source");
        let record = self.source.fetch(key).await?;
        record.validate()?;
        Ok(record)
    }
}

#[async_trait]
impl RateProvider for DirectProvider {
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
