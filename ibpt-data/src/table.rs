use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::io::Read;
use std::str::FromStr;

use async_trait::async_trait;
use ibpt_core::models::{ProductRate, RateKey, RateRecord, ServiceRate};
use ibpt_core::provider::{RateError, RateSource};
use rust_decimal::Decimal;
use thiserror::Error;

/// Errors that can occur when loading an IBPTax table.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum RateTableError {
    #[error("CSV parse error: {0}")]
    CsvParse(String),

    #[error("Missing column '{0}' in table header")]
    MissingColumn(&'static str),

    #[error("Line {line}: unknown item type '{tipo}' (expected 0, 1 or 2)")]
    UnknownType { line: u64, tipo: String },

    #[error("Line {line}: {message}")]
    InvalidRow { line: u64, message: String },
}

impl From<csv::Error> for RateTableError {
    fn from(err: csv::Error) -> Self {
        RateTableError::CsvParse(err.to_string())
    }
}

const CODE: &str = "codigo";
const EXCEPTION: &str = "ex";
const TYPE: &str = "tipo";
const DESCRIPTION: &str = "descricao";
const NATIONAL: &str = "nacionalfederal";
const IMPORTED: &str = "importadosfederal";
const STATE: &str = "estadual";
const MUNICIPAL: &str = "municipal";

/// Column positions resolved from the header row.
struct Columns {
    code: usize,
    exception: usize,
    tipo: usize,
    description: usize,
    national: usize,
    imported: usize,
    state: usize,
    municipal: usize,
}

impl Columns {
    fn from_header(header: &csv::ByteRecord) -> Result<Self, RateTableError> {
        let names: Vec<String> = header
            .iter()
            .map(|name| decode_text(name).trim().to_lowercase())
            .collect();
        let find = |column: &'static str| {
            names
                .iter()
                .position(|name| name == column)
                .ok_or(RateTableError::MissingColumn(column))
        };

        Ok(Self {
            code: find(CODE)?,
            exception: find(EXCEPTION)?,
            tipo: find(TYPE)?,
            description: find(DESCRIPTION)?,
            national: find(NATIONAL)?,
            imported: find(IMPORTED)?,
            state: find(STATE)?,
            municipal: find(MUNICIPAL)?,
        })
    }
}

/// Published tables are Latin-1; UTF-8 input is accepted as well.
fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| char::from(b)).collect(),
    }
}

/// Offline [`RateSource`] built from the semicolon-separated IBPTax table
/// published for one state.
///
/// Row `tipo` selects the record kind: `0` is a product (NCM/SH), `1` an
/// NBS service and `2` an LC 116 service.
#[derive(Debug, Clone, Default)]
pub struct RateTable {
    jurisdiction: String,
    records: HashMap<RateKey, RateRecord>,
}

impl RateTable {
    /// Parse a table. `jurisdiction` is stamped on every record, since the
    /// file itself does not carry it.
    pub fn parse<R: Read>(
        reader: R,
        jurisdiction: &str,
    ) -> Result<Self, RateTableError> {
        let mut csv_reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .flexible(true)
            .from_reader(reader);
        let columns = Columns::from_header(csv_reader.byte_headers()?)?;

        let mut records = HashMap::new();
        for result in csv_reader.byte_records() {
            let row = result?;
            let line = row.position().map_or(0, |p| p.line());
            let field = |index: usize| {
                row.get(index)
                    .map(|bytes| decode_text(bytes).trim().to_string())
                    .unwrap_or_default()
            };
            let rate = |index: usize, name: &str| parse_rate(&field(index), name, line);

            let code = field(columns.code);
            if code.is_empty() {
                return Err(RateTableError::InvalidRow {
                    line,
                    message: "empty codigo".to_string(),
                });
            }

            let record = match field(columns.tipo).as_str() {
                "0" => RateRecord::Product(ProductRate {
                    exception: parse_exception(&field(columns.exception), line)?,
                    code,
                    jurisdiction: jurisdiction.to_string(),
                    description: field(columns.description),
                    national: rate(columns.national, NATIONAL)?,
                    imported: rate(columns.imported, IMPORTED)?,
                    state: rate(columns.state, STATE)?,
                }),
                tipo @ ("1" | "2") => RateRecord::Service(ServiceRate {
                    code,
                    jurisdiction: jurisdiction.to_string(),
                    description: field(columns.description),
                    kind: Some(if tipo == "1" { "NBS" } else { "LC116" }.to_string()),
                    national: rate(columns.national, NATIONAL)?,
                    imported: rate(columns.imported, IMPORTED)?,
                    state: rate(columns.state, STATE)?,
                    municipal: rate(columns.municipal, MUNICIPAL)?,
                }),
                other => {
                    return Err(RateTableError::UnknownType {
                        line,
                        tipo: other.to_string(),
                    });
                }
            };

            record
                .validate()
                .map_err(|e| RateTableError::InvalidRow {
                    line,
                    message: e.to_string(),
                })?;
            match records.entry(record.key()) {
                Entry::Occupied(entry) => {
                    return Err(RateTableError::InvalidRow {
                        line,
                        message: format!("duplicate rate for {}", entry.key()),
                    });
                }
                Entry::Vacant(entry) => {
                    entry.insert(record);
                }
            }
        }

        Ok(Self {
            jurisdiction: jurisdiction.to_string(),
            records,
        })
    }

    pub fn jurisdiction(&self) -> &str {
        &self.jurisdiction
    }

    pub fn get(
        &self,
        key: &RateKey,
    ) -> Option<&RateRecord> {
        self.records.get(key)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

fn parse_exception(
    text: &str,
    line: u64,
) -> Result<u32, RateTableError> {
    if text.is_empty() {
        return Ok(0);
    }
    text.parse::<u32>().map_err(|e| RateTableError::InvalidRow {
        line,
        message: format!("invalid ex '{text}': {e}"),
    })
}

/// Rates may use either `.` or `,` as the decimal separator.
fn parse_rate(
    text: &str,
    column: &str,
    line: u64,
) -> Result<Decimal, RateTableError> {
    if text.is_empty() {
        return Ok(Decimal::ZERO);
    }
    Decimal::from_str(&text.replace(',', ".")).map_err(|e| RateTableError::InvalidRow {
        line,
        message: format!("invalid {column} '{text}': {e}"),
    })
}

#[async_trait]
impl RateSource for RateTable {
    async fn fetch(
        &self,
        key: &RateKey,
    ) -> Result<RateRecord, RateError> {
        self.records
            .get(key)
            .cloned()
            .ok_or_else(|| RateError::NotFound(key.clone()))
    }
}

#[cfg(test)]
mod tests {
    use ibpt_core::models::RateKind;
    use pretty_assertions::assert_eq;
    use rust_decimal_macros::dec;

    use super::*;

    const HEADER: &str = "codigo;ex;tipo;descricao;nacionalfederal;importadosfederal;estadual;municipal;vigenciainicio;vigenciafim;chave;versao;fonte\n";

    fn table(rows: &str) -> Result<RateTable, RateTableError> {
        RateTable::parse(format!("{HEADER}{rows}").as_bytes(), "SP")
    }

    #[test]
    fn test_parse_product_row() {
        let table = table("12340101;;0;Parafusos de aço;4.20;4.80;18.00;0.00;01/01/2025;30/06/2025;A1B2C3;25.1.A;IBPT\n")
            .expect("valid table");

        let record = table.get(&RateKey::product("12340101", 0)).expect("present");

        assert_eq!(
            record,
            &RateRecord::Product(ProductRate {
                code: "12340101".to_string(),
                jurisdiction: "SP".to_string(),
                exception: 0,
                description: "Parafusos de aço".to_string(),
                national: dec!(4.20),
                imported: dec!(4.80),
                state: dec!(18.00),
            })
        );
    }

    #[test]
    fn test_parse_service_types() {
        let table = table(
            "010101;;1;Serviço NBS;13.45;14.05;0;4.33\n\
             0107;;2;Serviço LC116;13.45;14.05;0;3.55\n",
        )
        .expect("valid table");

        let nbs = table.get(&RateKey::service("010101")).expect("nbs");
        let lc116 = table.get(&RateKey::service("0107")).expect("lc116");

        assert_eq!(nbs.kind(), RateKind::Service);
        assert_eq!(nbs.municipal_rate(), dec!(4.33));
        let RateRecord::Service(lc116) = lc116 else {
            panic!("expected a service record, got {lc116:?}");
        };
        assert_eq!(lc116.kind.as_deref(), Some("LC116"));
        assert_eq!(lc116.municipal, dec!(3.55));
    }

    #[test]
    fn test_exception_rows_are_separate_keys() {
        let table = table(
            "12340101;;0;Sem exceção;4.20;4.80;18;0\n\
             12340101;01;0;Exceção 01;1.00;2.00;7;0\n",
        )
        .expect("valid table");

        assert_eq!(table.len(), 2);
        assert_eq!(
            table.get(&RateKey::product("12340101", 1)).map(RateRecord::national_rate),
            Some(dec!(1.00))
        );
    }

    #[test]
    fn test_duplicate_row_is_rejected() {
        let result = table(
            "12340101;;0;Parafusos;4.20;4.80;18;0\n\
             12340202;;0;Porcas;4.20;5.41;0;0\n\
             12340101;0;0;Parafusos (revisado);5.00;4.80;18;0\n",
        );

        assert!(matches!(
            result,
            Err(RateTableError::InvalidRow { line: 4, message })
                if message.contains("duplicate") && message.contains("12340101")
        ));
    }

    #[test]
    fn test_comma_decimal_separator() {
        let table = table("12340202;;0;Porcas;4,2;5,41;0;0\n").expect("valid table");

        assert_eq!(
            table.get(&RateKey::product("12340202", 0)).map(RateRecord::imported_rate),
            Some(dec!(5.41))
        );
    }

    #[test]
    fn test_latin1_description_is_decoded() {
        let mut bytes = HEADER.as_bytes().to_vec();
        bytes.extend_from_slice(b"12340303;;0;Arruela de a\xe7o;4.2;6.18;12;0\n");

        let table = RateTable::parse(bytes.as_slice(), "SP").expect("valid table");

        let Some(RateRecord::Product(product)) = table.get(&RateKey::product("12340303", 0)) else {
            panic!("expected product 12340303");
        };
        assert_eq!(product.description, "Arruela de aço");
    }

    #[test]
    fn test_missing_column() {
        let result = RateTable::parse("codigo;ex;tipo\n1;;0\n".as_bytes(), "SP");

        assert_eq!(result.err(), Some(RateTableError::MissingColumn(DESCRIPTION)));
    }

    #[test]
    fn test_unknown_type() {
        let result = table("999;;7;???;1;1;1;1\n");

        assert_eq!(
            result.err(),
            Some(RateTableError::UnknownType {
                line: 2,
                tipo: "7".to_string()
            })
        );
    }

    #[test]
    fn test_out_of_range_rate_is_rejected() {
        let result = table("12340101;;0;Parafusos;104.2;4.8;18;0\n");

        assert!(matches!(
            result,
            Err(RateTableError::InvalidRow { line: 2, message }) if message.contains("national")
        ));
    }

    #[test]
    fn test_bad_rate_is_rejected() {
        let result = table("12340101;;0;Parafusos;abc;4.8;18;0\n");

        assert!(matches!(
            result,
            Err(RateTableError::InvalidRow { message, .. }) if message.contains(NATIONAL)
        ));
    }

    #[tokio::test]
    async fn test_fetch_known_and_unknown_keys() {
        let table = table("12340101;;0;Parafusos;4.2;4.8;18;0\n").expect("valid table");

        let found = table.fetch(&RateKey::product("12340101", 0)).await;
        let missing = table.fetch(&RateKey::product("12340101", 3)).await;

        assert_eq!(found.map(|r| r.state_rate()), Ok(dec!(18)));
        assert_eq!(
            missing,
            Err(RateError::NotFound(RateKey::product("12340101", 3)))
        );
    }
}
