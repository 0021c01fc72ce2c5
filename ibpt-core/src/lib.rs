pub mod calculations;
pub mod config;
pub mod models;
pub mod provider;
pub mod store;

pub use calculations::{AccumulatorError, Contribution, TaxAccumulator, TaxSummary};
pub use config::{CacheConfig, Endpoints, SourceConfig};
pub use models::*;
pub use provider::{CachingProvider, DirectProvider, RateError, RateProvider, RateSource};
pub use store::{RateStore, StoreConfig, StoreError, StoreRegistry};
