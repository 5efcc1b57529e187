//! Ingest pipeline: normalize raw observations before they reach the warehouse.
//!
//! - trims codes and labels
//! - drops rows without an entity code
//! - deduplicates on (entity, date), keeping the last occurrence
//! - sorts by (date, entity)

use std::collections::HashMap;

use chrono::NaiveDate;

use super::provider::DataError;
use crate::domain::Observation;

/// Output of the ingest step.
#[derive(Debug, Clone)]
pub struct IngestResult {
    pub observations: Vec<Observation>,
    pub duplicates_removed: usize,
    pub dropped: usize,
    pub warnings: Vec<String>,
}

/// Normalize a batch of observations.
///
/// An empty batch (before or after cleaning) is a `NoData` error.
pub fn ingest(raw: Vec<Observation>) -> Result<IngestResult, DataError> {
    if raw.is_empty() {
        return Err(DataError::NoData("ingest received zero rows".into()));
    }

    let mut warnings = Vec::new();
    let mut dropped = 0;
    let mut duplicates_removed = 0;
    let mut slots: HashMap<(String, NaiveDate), usize> = HashMap::new();
    let mut kept: Vec<Observation> = Vec::with_capacity(raw.len());

    for mut obs in raw {
        obs.entity_code = obs.entity_code.trim().to_string();
        obs.asset_name = obs.asset_name.trim().to_string();
        obs.asset_type = obs.asset_type.trim().to_string();

        if obs.entity_code.is_empty() {
            dropped += 1;
            continue;
        }

        let key = (obs.entity_code.clone(), obs.reference_date);
        match slots.get(&key) {
            Some(&slot) => {
                kept[slot] = obs;
                duplicates_removed += 1;
            }
            None => {
                slots.insert(key, kept.len());
                kept.push(obs);
            }
        }
    }

    if dropped > 0 {
        warnings.push(format!("dropped {dropped} row(s) without an entity code"));
    }
    if duplicates_removed > 0 {
        warnings.push(format!(
            "removed {duplicates_removed} duplicate (entity, date) row(s)"
        ));
    }

    if kept.is_empty() {
        return Err(DataError::NoData(
            "no rows with an entity code after ingest".into(),
        ));
    }

    kept.sort_by(|a, b| {
        a.reference_date
            .cmp(&b.reference_date)
            .then_with(|| a.entity_code.cmp(&b.entity_code))
    });

    Ok(IngestResult {
        observations: kept,
        duplicates_removed,
        dropped,
        warnings,
    })
}

/// Parse a number as the exchange formats it in pt-BR text.
///
/// `.` is always a thousands separator and `,` the decimal mark, so
/// `"123.456"` is 123456. Returns `None` for anything unparseable.
pub fn parse_pt_br(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }
    s.replace('.', "")
        .replace(',', ".")
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
}

/// Parse a number of unknown locale, as found in hand-made CSV files.
///
/// Accepts plain decimals (`1234.5`), pt-BR decimals (`1.234,5`) and
/// pt-BR integers with thousands dots (`476.976.044`). A single dot with
/// no comma reads as a decimal point. Returns `None` for anything
/// unparseable, mirroring a coercing numeric conversion.
pub fn parse_decimal(raw: &str) -> Option<f64> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    let normalized = if s.contains(',') {
        s.replace('.', "").replace(',', ".")
    } else if s.matches('.').count() > 1 {
        s.replace('.', "")
    } else {
        s.to_string()
    };

    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}
