use std::fmt;

use serde::{Deserialize, Serialize};

/// Which kind of entity a rate lookup targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateKind {
    Product,
    Service,
}

impl RateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Product => "product",
            Self::Service => "service",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "product" => Some(Self::Product),
            "service" => Some(Self::Service),
            _ => None,
        }
    }
}

impl fmt::Display for RateKind {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Identifies a single rate lookup.
///
/// Products are keyed by their NCM/SH item code plus the exception code
/// (`0` when there is no exception); services by their NBS/LC116 code alone.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RateKey {
    Product { code: String, exception: u32 },
    Service { code: String },
}

impl RateKey {
    pub fn product(
        code: impl Into<String>,
        exception: u32,
    ) -> Self {
        Self::Product {
            code: code.into(),
            exception,
        }
    }

    pub fn service(code: impl Into<String>) -> Self {
        Self::Service { code: code.into() }
    }

    pub fn kind(&self) -> RateKind {
        match self {
            Self::Product { .. } => RateKind::Product,
            Self::Service { .. } => RateKind::Service,
        }
    }

    pub fn code(&self) -> &str {
        match self {
            Self::Product { code, .. } | Self::Service { code } => code,
        }
    }

    /// Key under which the record for this lookup is cached.
    ///
    /// The leading kind tag keeps products and services apart, and the
    /// exception is always the last segment, so two distinct keys never
    /// produce the same string.
    ///
    /// ```
    /// use ibpt_core::RateKey;
    ///
    /// assert_eq!(RateKey::product("12340101", 0).cache_key(), "product:12340101:0");
    /// assert_eq!(RateKey::service("0123").cache_key(), "service:0123");
    /// ```
    pub fn cache_key(&self) -> String {
        match self {
            Self::Product { code, exception } => format!("product:{code}:{exception}"),
            Self::Service { code } => format!("service:{code}"),
        }
    }
}

impl fmt::Display for RateKey {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        match self {
            Self::Product { code, exception } => write!(f, "product {code} (ex {exception})"),
            Self::Service { code } => write!(f, "service {code}"),
        }
    }
}
