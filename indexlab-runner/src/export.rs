//! CSV export of projections and fitted values.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};

use crate::predictor::{FittedValue, Projection};

/// Columns: cod, asset, reference_date, projected_date, last_value, prediction
pub fn projections_csv(projections: &[Projection]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "cod",
        "asset",
        "reference_date",
        "projected_date",
        "last_value",
        "prediction",
    ])?;
    for p in projections {
        wtr.write_record([
            &p.entity_code,
            &p.asset_name,
            &p.reference_date.to_string(),
            &p.projected_date.to_string(),
            &format!("{:.6}", p.last_value),
            &format!("{:.6}", p.prediction),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

/// Columns: data_referencia, cod, asset, actual, prediction
pub fn fitted_csv(values: &[FittedValue]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record(["data_referencia", "cod", "asset", "actual", "prediction"])?;
    for v in values {
        wtr.write_record([
            &v.reference_date.to_string(),
            &v.entity_code,
            &v.asset_name,
            &v.actual.map(|a| format!("{a:.6}")).unwrap_or_default(),
            &format!("{:.6}", v.prediction),
        ])?;
    }
    let data = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(data).context("CSV output is not valid UTF-8")
}

pub fn write_file(path: &Path, contents: &str) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(path, contents).with_context(|| format!("failed to write {}", path.display()))
}
