//! CSV import of historical portfolio observations.
//!
//! Expected header: `cod,asset,type,part,theoricalQty,data_referencia`.
//! Exports from spreadsheet tools often use `;` as the delimiter and pt-BR
//! number formatting, so both are accepted. `code` and `theoreticalQty` are
//! accepted as header aliases.

use std::fs;
use std::path::Path;

use chrono::NaiveDate;

use super::ingest::parse_decimal;
use super::provider::DataError;
use super::schema::{COL_ASSET, COL_CODE, COL_DATE, COL_PART, COL_QTY, COL_TYPE};
use crate::domain::Observation;

/// Read observations from a CSV file on disk.
pub fn read_observations_csv(path: &Path) -> Result<Vec<Observation>, DataError> {
    let content = fs::read_to_string(path)
        .map_err(|e| DataError::Csv(format!("failed to read {}: {e}", path.display())))?;
    parse_observations_csv(&content)
}

/// Parse observations from CSV text.
pub fn parse_observations_csv(content: &str) -> Result<Vec<Observation>, DataError> {
    let content = content.trim_start_matches('\u{feff}');
    let delimiter = detect_delimiter(content);

    let mut rdr = csv::ReaderBuilder::new()
        .delimiter(delimiter)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(content.as_bytes());

    let headers = rdr
        .headers()
        .map_err(|e| DataError::Csv(format!("bad header: {e}")))?
        .clone();

    let find = |names: &[&str]| headers.iter().position(|h| names.contains(&h));
    let code_idx = find(&[COL_CODE, "code"])
        .ok_or_else(|| DataError::Csv(format!("missing column '{COL_CODE}'")))?;
    let date_idx = find(&[COL_DATE, "date"])
        .ok_or_else(|| DataError::Csv(format!("missing column '{COL_DATE}'")))?;
    let asset_idx = find(&[COL_ASSET]);
    let type_idx = find(&[COL_TYPE]);
    let part_idx = find(&[COL_PART]);
    let qty_idx = find(&[COL_QTY, "theoreticalQty"]);

    let mut rows = Vec::new();
    for (line, record) in rdr.records().enumerate() {
        let record =
            record.map_err(|e| DataError::Csv(format!("record {}: {e}", line + 1)))?;
        let field = |idx: Option<usize>| idx.and_then(|i| record.get(i)).unwrap_or("");

        let raw_date = field(Some(date_idx));
        let reference_date = parse_date(raw_date).ok_or_else(|| {
            DataError::Csv(format!("record {}: bad date '{raw_date}'", line + 1))
        })?;

        rows.push(Observation {
            entity_code: field(Some(code_idx)).to_string(),
            asset_name: field(asset_idx).to_string(),
            asset_type: field(type_idx).to_string(),
            reference_date,
            theoretical_quantity: parse_decimal(field(qty_idx)),
            part_weight: parse_decimal(field(part_idx)),
        });
    }

    Ok(rows)
}

/// Semicolon when the header line has more `;` than `,`.
fn detect_delimiter(content: &str) -> u8 {
    let header = content.lines().next().unwrap_or("");
    if header.matches(';').count() > header.matches(',').count() {
        b';'
    } else {
        b','
    }
}

/// ISO dates, or day-first `dd/mm/yyyy`.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(raw, "%d/%m/%Y"))
        .ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_delimited() {
        let csv = "cod,asset,type,part,theoricalQty,data_referencia\n\
                   PETR4,PETROBRAS,PN N2,4.2,4500000000,2024-07-01\n";
        let rows = parse_observations_csv(csv).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].entity_code, "PETR4");
        assert_eq!(rows[0].asset_type, "PN N2");
        assert_eq!(rows[0].part_weight, Some(4.2));
        assert_eq!(rows[0].theoretical_quantity, Some(4.5e9));
        assert_eq!(rows[0].reference_date, NaiveDate::from_ymd_opt(2024, 7, 1).unwrap());
    }

    #[test]
    fn parses_semicolon_pt_br() {
        let csv = "cod;asset;type;part;theoricalQty;data_referencia\n\
                   VALE3;VALE;ON NM;11,532;4.196.924.316;02/07/2024\n";
        let rows = parse_observations_csv(csv).unwrap();
        assert_eq!(rows[0].part_weight, Some(11.532));
        assert_eq!(rows[0].theoretical_quantity, Some(4_196_924_316.0));
        assert_eq!(rows[0].reference_date, NaiveDate::from_ymd_opt(2024, 7, 2).unwrap());
    }

    #[test]
    fn missing_optional_columns_are_null() {
        let csv = "cod,data_referencia\nABEV3,2024-07-01\n";
        let rows = parse_observations_csv(csv).unwrap();
        assert_eq!(rows[0].asset_name, "");
        assert_eq!(rows[0].theoretical_quantity, None);
    }

    #[test]
    fn missing_code_column_is_error() {
        let err = parse_observations_csv("asset,data_referencia\nX,2024-07-01\n").unwrap_err();
        assert!(matches!(err, DataError::Csv(_)));
    }

    #[test]
    fn bad_date_is_error() {
        let err = parse_observations_csv("cod,data_referencia\nX,July 1\n").unwrap_err();
        assert!(err.to_string().contains("bad date"));
    }
}
