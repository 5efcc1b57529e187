//! One-step-ahead projection and in-sample fitted values.

use std::collections::{BTreeMap, HashSet};

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use indexlab_core::artifact::{ArtifactError, ModelArtifact};
use indexlab_core::domain::Observation;
use indexlab_core::features::{build_features, project_next_row, FeatureError, FeatureRow};

#[derive(Debug, Error)]
pub enum PredictError {
    #[error("no rows supplied")]
    EmptyInput,

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("no entity has a known {0} value to project from")]
    NothingToProject(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

impl PredictError {
    /// True when the caller's input, not the server, is at fault.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            PredictError::EmptyInput
                | PredictError::InvalidInput(_)
                | PredictError::NothingToProject(_)
        )
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PredictOptions {
    pub skip_weekends: bool,
}

/// Projected next value for one entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    #[serde(rename = "cod")]
    pub entity_code: String,
    #[serde(rename = "asset")]
    pub asset_name: String,
    pub reference_date: NaiveDate,
    pub last_value: f64,
    pub projected_date: NaiveDate,
    pub prediction: f64,
}

/// Model output for a historical row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedValue {
    #[serde(rename = "cod")]
    pub entity_code: String,
    #[serde(rename = "asset")]
    pub asset_name: String,
    pub reference_date: NaiveDate,
    pub actual: Option<f64>,
    pub prediction: f64,
}

/// Next calendar date; Friday and Saturday roll to Monday with `skip_weekends`.
pub fn next_date(date: NaiveDate, skip_weekends: bool) -> NaiveDate {
    let next = date + Duration::days(1);
    if !skip_weekends {
        return next;
    }
    match next.weekday() {
        Weekday::Sat => next + Duration::days(2),
        Weekday::Sun => next + Duration::days(1),
        _ => next,
    }
}

fn check_rows(observations: &[Observation]) -> Result<(), PredictError> {
    if observations.is_empty() {
        return Err(PredictError::EmptyInput);
    }
    let mut seen = HashSet::with_capacity(observations.len());
    for (i, obs) in observations.iter().enumerate() {
        if obs.entity_code.trim().is_empty() {
            return Err(PredictError::InvalidInput(format!("row {i} has an empty 'cod'")));
        }
        if !seen.insert((obs.entity_code.as_str(), obs.reference_date)) {
            return Err(PredictError::InvalidInput(format!(
                "duplicate row for {} on {}",
                obs.entity_code, obs.reference_date
            )));
        }
    }
    Ok(())
}

/// Project each entity one step past its most recent observation.
///
/// Entities with no known target value are skipped.
pub fn project_next(
    artifact: &ModelArtifact,
    observations: &[Observation],
    options: PredictOptions,
) -> Result<Vec<Projection>, PredictError> {
    check_rows(observations)?;
    let target = artifact.target();

    let mut by_entity: BTreeMap<&str, Vec<&Observation>> = BTreeMap::new();
    for obs in observations {
        by_entity.entry(obs.entity_code.as_str()).or_default().push(obs);
    }

    let mut rows: Vec<FeatureRow> = Vec::with_capacity(by_entity.len());
    let mut last_dates = Vec::with_capacity(by_entity.len());
    for (code, mut history) in by_entity {
        history.sort_by_key(|o| o.reference_date);
        let known: Vec<f64> = history.iter().filter_map(|o| o.target(target)).collect();
        let Some(latest) = history.last() else {
            continue;
        };

        let projected = next_date(latest.reference_date, options.skip_weekends);
        match project_next_row(code, &latest.asset_name, &known, projected, &artifact.vocabulary) {
            Some(row) => {
                if !artifact.vocabulary.contains(code) {
                    warn!(entity = code, "entity not seen in training, using unknown code");
                }
                rows.push(row);
                last_dates.push(latest.reference_date);
            }
            None => warn!(entity = code, %target, "no known value, skipping entity"),
        }
    }

    if rows.is_empty() {
        return Err(PredictError::NothingToProject(target.to_string()));
    }

    let predictions = artifact.predict(&rows)?;
    info!(entities = rows.len(), "projected next step");

    Ok(rows
        .into_iter()
        .zip(last_dates)
        .zip(predictions)
        .map(|((row, reference_date), prediction)| Projection {
            last_value: row.lag_1.unwrap_or(f64::NAN),
            entity_code: row.entity_code,
            asset_name: row.asset_name,
            reference_date,
            projected_date: row.reference_date,
            prediction,
        })
        .collect())
}

/// Score every historical row with the stored feature recipe.
///
/// Ordered by (date, entity).
pub fn fitted_history(
    artifact: &ModelArtifact,
    observations: &[Observation],
) -> Result<Vec<FittedValue>, PredictError> {
    check_rows(observations)?;

    let mut set = build_features(observations, &artifact.features, Some(&artifact.vocabulary))?;
    set.sort_by_date();
    let predictions = artifact.predict(&set.rows)?;

    Ok(set
        .rows
        .into_iter()
        .zip(predictions)
        .map(|(row, prediction)| FittedValue {
            entity_code: row.entity_code,
            asset_name: row.asset_name,
            reference_date: row.reference_date,
            actual: row.target,
            prediction,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn next_date_calendar() {
        // 2024-01-05 is a Friday.
        assert_eq!(next_date(d(2024, 1, 5), false), d(2024, 1, 6));
        assert_eq!(next_date(d(2024, 1, 5), true), d(2024, 1, 8));
        assert_eq!(next_date(d(2024, 1, 6), true), d(2024, 1, 8));
        assert_eq!(next_date(d(2024, 1, 3), true), d(2024, 1, 4));
        assert_eq!(next_date(d(2024, 12, 31), false), d(2025, 1, 1));
    }

    #[test]
    fn duplicate_and_blank_rows_rejected() {
        let obs = |code: &str| Observation {
            entity_code: code.into(),
            asset_name: String::new(),
            asset_type: String::new(),
            reference_date: d(2024, 1, 2),
            theoretical_quantity: Some(1.0),
            part_weight: None,
        };
        assert!(matches!(check_rows(&[]), Err(PredictError::EmptyInput)));
        assert!(matches!(check_rows(&[obs(" ")]), Err(PredictError::InvalidInput(_))));
        assert!(matches!(
            check_rows(&[obs("A"), obs("A")]),
            Err(PredictError::InvalidInput(_))
        ));
        assert!(check_rows(&[obs("A"), obs("B")]).is_ok());
    }
}
