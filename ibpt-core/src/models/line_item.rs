use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::rate_key::RateKey;

/// One sold product or service: what to look up and the amount it was sold for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub key: RateKey,
    /// Quantity times unit price.
    pub subtotal: Decimal,
}

impl LineItem {
    pub fn product(
        code: impl Into<String>,
        exception: u32,
        subtotal: Decimal,
    ) -> Self {
        Self {
            key: RateKey::product(code, exception),
            subtotal,
        }
    }

    pub fn service(
        code: impl Into<String>,
        subtotal: Decimal,
    ) -> Self {
        Self {
            key: RateKey::service(code),
            subtotal,
        }
    }
}
