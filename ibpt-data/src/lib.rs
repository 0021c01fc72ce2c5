pub mod app;
pub mod config;
pub mod items;
pub mod table;

pub use config::{AppConfig, ConfigError};
pub use items::{LineItemLoader, LineItemLoaderError, LineItemRecord};
pub use table::{RateTable, RateTableError};
