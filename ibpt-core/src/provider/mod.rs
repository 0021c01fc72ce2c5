//! Rate provisioning.
//!
//! [`RateProvider`] is what the accumulator consumes. Two strategies
//! implement it:
//!
//! * [`DirectProvider`] sends every lookup to the [`RateSource`].
//! * [`CachingProvider`] checks a [`RateCache`] first and only goes to the
//!   source on a miss, caching successful answers for the configured TTL.
//!
//! The strategy is picked when the provider is constructed.

mod caching;
mod direct;
mod source;

#[cfg(test)]
pub(crate) mod testing;

use async_trait::async_trait;

pub use caching::{CachingProvider, RateCache};
pub use direct::DirectProvider;
pub use source::{RateError, RateSource};

use crate::models::{ProductRate, ServiceRate};

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Rates for a product. Pass `0` as `exception` when the product has no
    /// exception code.
    async fn get_product_rate(
        &self,
        code: &str,
        exception: u32,
    ) -> Result<ProductRate, RateError>;

    async fn get_service_rate(
        &self,
        code: &str,
    ) -> Result<ServiceRate, RateError>;
}
