//! Flat text representation of a rate record.
//!
//! Remote payloads and cache entries are both reduced to a [`FieldMap`]
//! before being decoded, so a record fetched from the source and the same
//! record read back from the cache go through one decoder and compare equal.

use std::collections::BTreeMap;
use std::str::FromStr;

use rust_decimal::Decimal;
use serde_json::Value;

use crate::provider::RateError;

/// Field name to text value.
pub type FieldMap = BTreeMap<String, String>;

/// Flattens a JSON object payload into a [`FieldMap`].
///
/// Field names are lowercased. Numbers keep the digits they arrived with
/// (`serde_json` is built with `arbitrary_precision`), so `4.20` becomes
/// `"4.20"` and never passes through an `f64` on its way to a `Decimal`.
/// `null` fields are dropped.
///
/// # Errors
/// [`RateError::Transport`] when the payload is not an object or a field
/// holds a nested array or object.
pub fn fields_from_json(payload: &Value) -> Result<FieldMap, RateError> {
    let object = payload.as_object().ok_or_else(|| {
        RateError::Transport(format!("expected a JSON object payload, got {payload}"))
    })?;

    let mut fields = FieldMap::new();
    for (name, value) in object {
        let text = match value {
            Value::Null => continue,
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            Value::Array(_) | Value::Object(_) => {
                return Err(RateError::Transport(format!(
                    "field '{name}' is not a scalar value"
                )));
            }
        };
        fields.insert(name.to_lowercase(), text);
    }
    Ok(fields)
}

/// Parse decimal text, accepting scientific notation as a fallback.
pub(crate) fn parse_decimal(
    name: &str,
    text: &str,
) -> Result<Decimal, RateError> {
    let trimmed = text.trim();
    Decimal::from_str(trimmed)
        .or_else(|_| Decimal::from_scientific(trimmed))
        .map_err(|e| {
            RateError::Transport(format!("field '{name}': invalid decimal '{text}': {e}"))
        })
}

/// Case-insensitive, alias-aware view over a [`FieldMap`].
pub(crate) struct FieldReader<'a> {
    fields: BTreeMap<String, &'a str>,
}

impl<'a> FieldReader<'a> {
    pub(crate) fn new(fields: &'a FieldMap) -> Self {
        Self {
            fields: fields
                .iter()
                .map(|(name, value)| (name.to_lowercase(), value.as_str()))
                .collect(),
        }
    }

    /// First present value among `names`.
    pub(crate) fn optional(
        &self,
        names: &[&str],
    ) -> Option<&'a str> {
        names.iter().find_map(|name| self.fields.get(*name).copied())
    }

    pub(crate) fn required(
        &self,
        names: &[&str],
    ) -> Result<&'a str, RateError> {
        self.optional(names)
            .ok_or_else(|| RateError::Transport(format!("missing field '{}'", names[0])))
    }

    pub(crate) fn decimal(
        &self,
        names: &[&str],
    ) -> Result<Decimal, RateError> {
        parse_decimal(names[0], self.required(names)?)
    }
}
