//! Construction-time settings for rate sources and the rate cache.

use std::fmt;
use std::time::Duration;

use serde::Deserialize;

/// One day.
pub const DEFAULT_TTL_SECS: u64 = 86_400;

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Lifetime of a cached rate record, in seconds.
    pub ttl_secs: u64,
}

impl CacheConfig {
    pub fn new(ttl_secs: u64) -> Self {
        Self { ttl_secs }
    }

    pub fn with_ttl(
        self,
        ttl: Duration,
    ) -> Self {
        Self {
            ttl_secs: ttl.as_secs(),
        }
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self::new(DEFAULT_TTL_SECS)
    }
}

/// Remote query endpoints, one per record kind.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Endpoints {
    pub products: String,
    pub services: String,
}

impl Default for Endpoints {
    fn default() -> Self {
        Self {
            products: "http://iws.ibpt.org.br/api/Produtos".to_string(),
            services: "http://iws.ibpt.org.br/api/Servicos".to_string(),
        }
    }
}

/// Identity and transport settings for the remote rate service.
///
/// `Debug` output never contains the access token.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    /// Access token issued to the tax id.
    pub token: String,
    /// CNPJ of the company issuing the document, digits only.
    pub tax_id: String,
    /// Two-letter state code (UF) the rates apply to.
    pub jurisdiction: String,
    pub endpoints: Endpoints,
    pub timeout_secs: u64,
}

impl SourceConfig {
    pub fn new(
        token: impl Into<String>,
        tax_id: impl Into<String>,
        jurisdiction: impl Into<String>,
    ) -> Self {
        Self {
            token: token.into(),
            tax_id: tax_id.into(),
            jurisdiction: jurisdiction.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            tax_id: String::new(),
            jurisdiction: String::new(),
            endpoints: Endpoints::default(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }
}

impl fmt::Debug for SourceConfig {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        let token = if self.token.is_empty() { "" } else { "<redacted>" };
        f.debug_struct("SourceConfig")
            .field("token", &token)
            .field("tax_id", &self.tax_id)
            .field("jurisdiction", &self.jurisdiction)
            .field("endpoints", &self.endpoints)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
