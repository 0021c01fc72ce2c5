//! SQLite backend for the rate cache.

pub mod factory;
pub mod store;

pub use factory::{SqliteStoreFactory, database_url};
pub use store::SqliteRateStore;
