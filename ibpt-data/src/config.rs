//! Settings for the estimate command.
//!
//! Precedence, lowest first: built-in defaults, the TOML file, `IBPT_*`
//! environment variables, command-line flags.

use std::path::Path;

use ibpt_core::config::{CacheConfig, SourceConfig};
use ibpt_core::store::StoreConfig;
use serde::Deserialize;
use thiserror::Error;

pub const ENV_TOKEN: &str = "IBPT_TOKEN";
pub const ENV_TAX_ID: &str = "IBPT_TAX_ID";
pub const ENV_JURISDICTION: &str = "IBPT_JURISDICTION";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    pub source: SourceConfig,
    pub cache: CacheConfig,
    pub store: StoreConfig,
}

impl AppConfig {
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    pub fn from_toml(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Overlay identity values found through `lookup`. Empty values are
    /// ignored.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) {
        let value = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());
        if let Some(token) = value(ENV_TOKEN) {
            self.source.token = token;
        }
        if let Some(tax_id) = value(ENV_TAX_ID) {
            self.source.tax_id = tax_id;
        }
        if let Some(jurisdiction) = value(ENV_JURISDICTION) {
            self.source.jurisdiction = jurisdiction;
        }
    }

    /// Overlay the process environment.
    pub fn apply_env(&mut self) {
        self.apply_overrides(|name| std::env::var(name).ok());
    }

    /// Checks everything the remote rate service needs.
    pub fn validate_remote(&self) -> Result<(), ConfigError> {
        let source = &self.source;
        if source.token.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "source.token",
                reason: format!("must not be empty (set it in the config file or {ENV_TOKEN})"),
            });
        }
        let digits = source.tax_id.chars().filter(char::is_ascii_digit).count();
        if digits != 14 || digits != source.tax_id.len() {
            return Err(ConfigError::InvalidValue {
                field: "source.tax_id",
                reason: "must be a CNPJ of 14 digits, without punctuation".to_string(),
            });
        }
        self.validate_jurisdiction()?;
        if source.timeout_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "source.timeout_secs",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    pub fn validate_jurisdiction(&self) -> Result<(), ConfigError> {
        let uf = &self.source.jurisdiction;
        if uf.len() != 2 || !uf.chars().all(|c| c.is_ascii_alphabetic()) {
            return Err(ConfigError::InvalidValue {
                field: "source.jurisdiction",
                reason: format!("'{uf}' is not a two-letter state code"),
            });
        }
        Ok(())
    }
}
