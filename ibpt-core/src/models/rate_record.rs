use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::fields::{FieldMap, FieldReader};
use super::rate_key::{RateKey, RateKind};
use crate::provider::RateError;

// Accepted names per field. The first entry is the canonical name written to
// the cache; the rest are the remote service's own names.
const CODE: &[&str] = &["code", "codigo"];
const JURISDICTION: &[&str] = &["jurisdiction", "uf"];
const EXCEPTION: &[&str] = &["exception", "ex"];
const DESCRIPTION: &[&str] = &["description", "descricao"];
const KIND: &[&str] = &["kind", "tipo"];
const NATIONAL: &[&str] = &["national", "nacional"];
const IMPORTED: &[&str] = &["imported", "importado"];
const STATE: &[&str] = &["state", "estadual"];
const MUNICIPAL: &[&str] = &["municipal"];

/// Approximate tax rates for a product (NCM/SH code plus exception).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductRate {
    pub code: String,
    /// State abbreviation the rates apply to.
    pub jurisdiction: String,
    pub exception: u32,
    pub description: String,

    // Percentages, 0 to 100
    pub national: Decimal,
    pub imported: Decimal,
    pub state: Decimal,
}

/// Approximate tax rates for a service (NBS or LC116 code).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceRate {
    pub code: String,
    pub jurisdiction: String,
    pub description: String,
    /// Nomenclature the code belongs to, e.g. `NBS` or `LC116`.
    pub kind: Option<String>,

    // Percentages, 0 to 100
    pub national: Decimal,
    pub imported: Decimal,
    pub state: Decimal,
    pub municipal: Decimal,
}

/// Result of one successful rate lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RateRecord {
    Product(ProductRate),
    Service(ServiceRate),
}

impl RateRecord {
    pub fn kind(&self) -> RateKind {
        match self {
            Self::Product(_) => RateKind::Product,
            Self::Service(_) => RateKind::Service,
        }
    }

    /// The lookup key this record answers.
    pub fn key(&self) -> RateKey {
        match self {
            Self::Product(p) => RateKey::product(p.code.clone(), p.exception),
            Self::Service(s) => RateKey::service(s.code.clone()),
        }
    }

    pub fn national_rate(&self) -> Decimal {
        match self {
            Self::Product(p) => p.national,
            Self::Service(s) => s.national,
        }
    }

    pub fn imported_rate(&self) -> Decimal {
        match self {
            Self::Product(p) => p.imported,
            Self::Service(s) => s.imported,
        }
    }

    pub fn state_rate(&self) -> Decimal {
        match self {
            Self::Product(p) => p.state,
            Self::Service(s) => s.state,
        }
    }

    /// Always zero for products.
    pub fn municipal_rate(&self) -> Decimal {
        match self {
            Self::Product(_) => Decimal::ZERO,
            Self::Service(s) => s.municipal,
        }
    }

    /// Checks that every rate lies within `0..=100`.
    ///
    /// # Errors
    /// [`RateError::Transport`] naming the offending rate.
    pub fn validate(&self) -> Result<(), RateError> {
        let rates = [
            ("national", self.national_rate()),
            ("imported", self.imported_rate()),
            ("state", self.state_rate()),
            ("municipal", self.municipal_rate()),
        ];

        for (name, rate) in rates {
            if rate < Decimal::ZERO || rate > Decimal::ONE_HUNDRED {
                return Err(RateError::Transport(format!(
                    "{}: {name} rate {rate} is outside 0..=100",
                    self.key()
                )));
            }
        }
        Ok(())
    }

    /// Flat text form used for cache entries. Decimals are written with
    /// their own `Display`, which round-trips exactly through `parse`.
    pub fn to_fields(&self) -> FieldMap {
        let mut fields = FieldMap::new();
        let mut put = |name: &str, value: String| {
            fields.insert(name.to_string(), value);
        };

        match self {
            Self::Product(p) => {
                put(CODE[0], p.code.clone());
                put(JURISDICTION[0], p.jurisdiction.clone());
                put(EXCEPTION[0], p.exception.to_string());
                put(DESCRIPTION[0], p.description.clone());
                put(NATIONAL[0], p.national.to_string());
                put(IMPORTED[0], p.imported.to_string());
                put(STATE[0], p.state.to_string());
            }
            Self::Service(s) => {
                put(CODE[0], s.code.clone());
                put(JURISDICTION[0], s.jurisdiction.clone());
                put(DESCRIPTION[0], s.description.clone());
                if let Some(kind) = &s.kind {
                    put(KIND[0], kind.clone());
                }
                put(NATIONAL[0], s.national.to_string());
                put(IMPORTED[0], s.imported.to_string());
                put(STATE[0], s.state.to_string());
                put(MUNICIPAL[0], s.municipal.to_string());
            }
        }
        fields
    }

    /// Decodes a record of the given kind from flat text fields.
    ///
    /// Field names are matched case-insensitively and the remote service's
    /// Portuguese names are accepted alongside the canonical ones. The
    /// decoded record is validated before it is returned.
    ///
    /// # Errors
    /// [`RateError::Transport`] on a missing or malformed field, or an
    /// out-of-range rate.
    pub fn from_fields(
        kind: RateKind,
        fields: &FieldMap,
    ) -> Result<Self, RateError> {
        let reader = FieldReader::new(fields);
        let text = |names: &[&str]| reader.optional(names).unwrap_or_default().to_string();

        let record = match kind {
            RateKind::Product => Self::Product(ProductRate {
                code: reader.required(CODE)?.to_string(),
                jurisdiction: text(JURISDICTION),
                exception: parse_exception(reader.optional(EXCEPTION))?,
                description: text(DESCRIPTION),
                national: reader.decimal(NATIONAL)?,
                imported: reader.decimal(IMPORTED)?,
                state: reader.decimal(STATE)?,
            }),
            RateKind::Service => Self::Service(ServiceRate {
                code: reader.required(CODE)?.to_string(),
                jurisdiction: text(JURISDICTION),
                description: text(DESCRIPTION),
                kind: reader
                    .optional(KIND)
                    .filter(|k| !k.trim().is_empty())
                    .map(str::to_string),
                national: reader.decimal(NATIONAL)?,
                imported: reader.decimal(IMPORTED)?,
                state: reader.decimal(STATE)?,
                municipal: reader.decimal(MUNICIPAL)?,
            }),
        };

        record.validate()?;
        Ok(record)
    }

    /// Unwraps a product record.
    ///
    /// # Errors
    /// [`RateError::Transport`] if the record is a service.
    pub fn into_product(self) -> Result<ProductRate, RateError> {
        match self {
            Self::Product(p) => Ok(p),
            Self::Service(s) => Err(RateError::Transport(format!(
                "expected a product record, got service {}",
                s.code
            ))),
        }
    }

    /// Unwraps a service record.
    ///
    /// # Errors
    /// [`RateError::Transport`] if the record is a product.
    pub fn into_service(self) -> Result<ServiceRate, RateError> {
        match self {
            Self::Service(s) => Ok(s),
            Self::Product(p) => Err(RateError::Transport(format!(
                "expected a service record, got product {}",
                p.code
            ))),
        }
    }
}

fn parse_exception(text: Option<&str>) -> Result<u32, RateError> {
    match text.map(str::trim) {
        None | Some("") => Ok(0),
        Some(s) => s
            .parse::<u32>()
            .map_err(|e| RateError::Transport(format!("field 'exception': invalid value '{s}': {e}"))),
    }
}
