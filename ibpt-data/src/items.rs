use std::io::Read;

use ibpt_core::models::{LineItem, RateKind};
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

/// Errors that can occur when loading line items.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineItemLoaderError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Line {line}: unknown kind '{kind}' (expected product or service)")]
    InvalidKind { line: u64, kind: String },

    #[error("Line {line}: empty code")]
    EmptyCode { line: u64 },
}

impl From<csv::Error> for LineItemLoaderError {
    fn from(err: csv::Error) -> Self {
        LineItemLoaderError::CsvParse(err.to_string())
    }
}

/// A single row of a line-item CSV file.
///
/// - `kind`: `product` or `service`
/// - `code`: NCM/SH code for products, NBS/LC116 code for services
/// - `exception`: product exception code (empty for none; ignored for services)
/// - `subtotal`: quantity times unit price
#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct LineItemRecord {
    pub kind: String,
    pub code: String,
    #[serde(default)]
    pub exception: Option<u32>,
    #[serde(deserialize_with = "deserialize_decimal")]
    pub subtotal: Decimal,
}

fn deserialize_decimal<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let s = String::deserialize(deserializer)?;
    s.trim().parse::<Decimal>().map_err(serde::de::Error::custom)
}

/// Loader for the items of a document from CSV.
pub struct LineItemLoader;

impl LineItemLoader {
    /// Parse line items from a CSV reader with a
    /// `kind,code,exception,subtotal` header.
    pub fn parse<R: Read>(reader: R) -> Result<Vec<LineItem>, LineItemLoaderError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers = csv_reader.headers()?.clone();
        let mut items = Vec::new();

        for result in csv_reader.records() {
            let row = result?;
            let line = row.position().map_or(0, |p| p.line());
            let record: LineItemRecord = row.deserialize(Some(&headers))?;
            items.push(Self::to_item(record, line)?);
        }

        Ok(items)
    }

    fn to_item(
        record: LineItemRecord,
        line: u64,
    ) -> Result<LineItem, LineItemLoaderError> {
        if record.code.is_empty() {
            return Err(LineItemLoaderError::EmptyCode { line });
        }
        match RateKind::parse(&record.kind) {
            Some(RateKind::Product) => Ok(LineItem::product(
                record.code,
                record.exception.unwrap_or(0),
                record.subtotal,
            )),
            Some(RateKind::Service) => Ok(LineItem::service(record.code, record.subtotal)),
            None => Err(LineItemLoaderError::InvalidKind {
                line,
                kind: record.kind,
            }),
        }
    }
}
