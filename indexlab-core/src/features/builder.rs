//! Grouped lag / rolling-mean feature construction.
//!
//! Per entity, over rows sorted by date:
//! - `lag_1`, `lag_2`: target shifted by one and two rows
//! - `rolling_mean_3`: mean of the (up to) three previous targets, nulls skipped
//! - gaps forward-filled from earlier rows of the same entity
//! - remaining gaps (series start) resolved by the [`FallbackPolicy`]
//!
//! Windows never cross entity boundaries.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

use super::vocabulary::EntityVocabulary;
use super::{Feature, FeatureError};
use crate::domain::{sort_by_entity_date, Observation, TargetColumn};

const ROLLING_WINDOW: usize = 3;

/// What to do with lag features that are still missing after forward-fill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Fill with the row's own target value and flag the row as imputed.
    #[default]
    CurrentValue,
    /// Exclude the row.
    Drop,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FeatureConfig {
    pub target: TargetColumn,
    pub fallback: FallbackPolicy,
}

/// One observation with its derived features.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureRow {
    pub entity_code: String,
    pub asset_name: String,
    pub reference_date: NaiveDate,
    pub target: Option<f64>,
    pub lag_1: Option<f64>,
    pub lag_2: Option<f64>,
    pub rolling_mean_3: Option<f64>,
    pub day_of_week: u32,
    pub month: u32,
    pub entity_id: i64,
    /// The row's own target was used to fill a missing lag.
    pub imputed: bool,
}

impl FeatureRow {
    /// Numeric value of one feature; missing values are NaN.
    pub fn value(&self, feature: Feature) -> f64 {
        match feature {
            Feature::Lag1 => self.lag_1.unwrap_or(f64::NAN),
            Feature::Lag2 => self.lag_2.unwrap_or(f64::NAN),
            Feature::RollingMean3 => self.rolling_mean_3.unwrap_or(f64::NAN),
            Feature::DayOfWeek => self.day_of_week as f64,
            Feature::Month => self.month as f64,
            Feature::EntityCode => self.entity_id as f64,
        }
    }

    /// Feature vector in the given column order.
    pub fn vector(&self, features: &[Feature]) -> Vec<f64> {
        features.iter().map(|&f| self.value(f)).collect()
    }
}

/// Output of [`build_features`].
#[derive(Debug, Clone)]
pub struct FeatureSet {
    /// Rows ordered by (entity, date).
    pub rows: Vec<FeatureRow>,
    pub vocabulary: EntityVocabulary,
    /// Rows excluded by [`FallbackPolicy::Drop`].
    pub dropped: usize,
}

impl FeatureSet {
    /// Reorder rows by (date, entity), the order temporal splits use.
    pub fn sort_by_date(&mut self) {
        self.rows.sort_by(|a, b| {
            a.reference_date
                .cmp(&b.reference_date)
                .then_with(|| a.entity_code.cmp(&b.entity_code))
        });
    }

    /// Rows that carry a target and can be trained on.
    pub fn trainable(&self) -> impl Iterator<Item = &FeatureRow> {
        self.rows.iter().filter(|r| r.target.is_some())
    }
}

/// Compute features for every observation.
///
/// When `vocabulary` is `None` one is built from the input; pass the stored
/// vocabulary at inference time so codes match training.
pub fn build_features(
    observations: &[Observation],
    config: &FeatureConfig,
    vocabulary: Option<&EntityVocabulary>,
) -> Result<FeatureSet, FeatureError> {
    if observations.is_empty() {
        return Err(FeatureError::EmptyInput);
    }

    let vocabulary = vocabulary
        .cloned()
        .unwrap_or_else(|| EntityVocabulary::from_observations(observations));

    let mut sorted = observations.to_vec();
    sort_by_entity_date(&mut sorted);

    let mut rows = Vec::with_capacity(sorted.len());
    let mut dropped = 0;

    for group in sorted.chunk_by(|a, b| a.entity_code == b.entity_code) {
        let entity_id = vocabulary.code_of(&group[0].entity_code);
        let targets: Vec<Option<f64>> = group.iter().map(|o| o.target(config.target)).collect();

        let mut carried_lag_1 = None;
        let mut carried_lag_2 = None;
        let mut carried_rolling = None;

        for (i, obs) in group.iter().enumerate() {
            let lag_1 = shifted(&targets, i, 1).or(carried_lag_1);
            let lag_2 = shifted(&targets, i, 2).or(carried_lag_2);
            let rolling_mean_3 = prior_mean(&targets, i).or(carried_rolling);
            carried_lag_1 = lag_1;
            carried_lag_2 = lag_2;
            carried_rolling = rolling_mean_3;

            let needs_fallback = lag_1.is_none() || lag_2.is_none() || rolling_mean_3.is_none();
            if needs_fallback && config.fallback == FallbackPolicy::Drop {
                dropped += 1;
                continue;
            }

            let current = targets[i];
            rows.push(FeatureRow {
                entity_code: obs.entity_code.clone(),
                asset_name: obs.asset_name.clone(),
                reference_date: obs.reference_date,
                target: current,
                lag_1: lag_1.or(current),
                lag_2: lag_2.or(current),
                rolling_mean_3: rolling_mean_3.or(current),
                day_of_week: obs.reference_date.weekday().num_days_from_monday(),
                month: obs.reference_date.month(),
                entity_id,
                imputed: needs_fallback,
            });
        }
    }

    Ok(FeatureSet {
        rows,
        vocabulary,
        dropped,
    })
}

/// Feature row for the step after `known`, an entity's non-null targets in
/// date order. `None` when nothing is known.
///
/// lag_1 is the last value, lag_2 the one before (lag_1 if there is only
/// one), rolling_mean_3 the mean of the last three. Lags here count known
/// values, not dates, so after an interior null lag_2 can differ from the
/// positional lag [`build_features`] computes for the same history.
pub fn project_next_row(
    entity_code: &str,
    asset_name: &str,
    known: &[f64],
    projected_date: NaiveDate,
    vocabulary: &EntityVocabulary,
) -> Option<FeatureRow> {
    let last = *known.last()?;
    let lag_2 = known.len().checked_sub(2).map(|i| known[i]).unwrap_or(last);
    let window = &known[known.len().saturating_sub(ROLLING_WINDOW)..];
    let rolling = window.iter().sum::<f64>() / window.len() as f64;

    Some(FeatureRow {
        entity_code: entity_code.to_string(),
        asset_name: asset_name.to_string(),
        reference_date: projected_date,
        target: None,
        lag_1: Some(last),
        lag_2: Some(lag_2),
        rolling_mean_3: Some(rolling),
        day_of_week: projected_date.weekday().num_days_from_monday(),
        month: projected_date.month(),
        entity_id: vocabulary.code_of(entity_code),
        imputed: known.len() < 2,
    })
}

fn shifted(targets: &[Option<f64>], i: usize, by: usize) -> Option<f64> {
    i.checked_sub(by).and_then(|j| targets[j])
}

/// Mean of the non-null targets in the window ending just before `i`.
fn prior_mean(targets: &[Option<f64>], i: usize) -> Option<f64> {
    let window = &targets[i.saturating_sub(ROLLING_WINDOW)..i];
    let (sum, count) = window
        .iter()
        .flatten()
        .fold((0.0, 0usize), |(s, c), v| (s + v, c + 1));
    (count > 0).then(|| sum / count as f64)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obs(code: &str, day: u32, qty: Option<f64>) -> Observation {
        Observation {
            entity_code: code.into(),
            asset_name: String::new(),
            asset_type: String::new(),
            reference_date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            theoretical_quantity: qty,
            part_weight: qty.map(|q| q / 100.0),
        }
    }

    fn series(code: &str, values: &[f64]) -> Vec<Observation> {
        values
            .iter()
            .enumerate()
            .map(|(i, &v)| obs(code, i as u32 + 1, Some(v)))
            .collect()
    }

    #[test]
    fn lags_and_rolling_mean() {
        let set = build_features(&series("A", &[10.0, 20.0, 30.0, 40.0, 50.0]), &FeatureConfig::default(), None)
            .unwrap();
        let r = &set.rows;

        assert_eq!(r[2].lag_1, Some(20.0));
        assert_eq!(r[2].lag_2, Some(10.0));
        assert_eq!(r[2].rolling_mean_3, Some(15.0));
        assert_eq!(r[4].rolling_mean_3, Some(30.0));
        assert!(!r[4].imputed);
    }

    #[test]
    fn series_start_uses_current_value() {
        let set = build_features(&series("A", &[10.0, 20.0, 30.0]), &FeatureConfig::default(), None)
            .unwrap();
        let r = &set.rows;

        assert_eq!(r[0].lag_1, Some(10.0));
        assert_eq!(r[0].lag_2, Some(10.0));
        assert_eq!(r[0].rolling_mean_3, Some(10.0));
        assert!(r[0].imputed);

        assert_eq!(r[1].lag_1, Some(10.0));
        assert_eq!(r[1].lag_2, Some(20.0));
        assert!(r[1].imputed);
    }

    #[test]
    fn drop_policy_excludes_imputed_rows() {
        let config = FeatureConfig {
            fallback: FallbackPolicy::Drop,
            ..FeatureConfig::default()
        };
        let set = build_features(&series("A", &[1.0, 2.0, 3.0, 4.0]), &config, None).unwrap();
        assert_eq!(set.dropped, 2);
        assert_eq!(set.rows.len(), 2);
        assert!(set.rows.iter().all(|r| !r.imputed));
    }

    #[test]
    fn gaps_forward_fill_within_entity() {
        let rows = vec![
            obs("A", 1, Some(1.0)),
            obs("A", 2, Some(2.0)),
            obs("A", 3, None),
            obs("A", 4, Some(4.0)),
        ];
        let set = build_features(&rows, &FeatureConfig::default(), None).unwrap();
        let r = &set.rows;

        // lag_1 at day 4 would be day 3's null; carried from day 3's lag_1.
        assert_eq!(r[3].lag_1, Some(2.0));
        assert_eq!(r[3].lag_2, Some(2.0));
        assert_eq!(r[3].rolling_mean_3, Some(1.5));
        assert_eq!(r[2].target, None);
    }

    #[test]
    fn entities_do_not_leak_into_each_other() {
        let mut rows = series("A", &[100.0, 200.0, 300.0]);
        rows.extend(series("B", &[1.0, 2.0]));
        let set = build_features(&rows, &FeatureConfig::default(), None).unwrap();

        let b_first = set.rows.iter().find(|r| r.entity_code == "B").unwrap();
        assert_eq!(b_first.lag_1, Some(1.0));
        assert_eq!(b_first.rolling_mean_3, Some(1.0));
        assert_eq!(b_first.entity_id, 1);
    }

    #[test]
    fn calendar_features() {
        // 2024-01-05 is a Friday.
        let set = build_features(&[obs("A", 5, Some(1.0))], &FeatureConfig::default(), None).unwrap();
        assert_eq!(set.rows[0].day_of_week, 4);
        assert_eq!(set.rows[0].month, 1);
    }

    #[test]
    fn part_weight_target() {
        let config = FeatureConfig {
            target: TargetColumn::PartWeight,
            ..FeatureConfig::default()
        };
        let set = build_features(&series("A", &[100.0, 200.0]), &config, None).unwrap();
        assert_eq!(set.rows[1].target, Some(2.0));
        assert_eq!(set.rows[1].lag_1, Some(1.0));
    }

    #[test]
    fn stored_vocabulary_marks_unknown_entities() {
        let vocab = EntityVocabulary::from_codes(["A".to_string()]);
        let set = build_features(&series("Z", &[1.0]), &FeatureConfig::default(), Some(&vocab)).unwrap();
        assert_eq!(set.rows[0].entity_id, -1);
    }

    #[test]
    fn empty_input_is_error() {
        assert!(matches!(
            build_features(&[], &FeatureConfig::default(), None),
            Err(FeatureError::EmptyInput)
        ));
    }

    #[test]
    fn projection_uses_last_values() {
        let vocab = EntityVocabulary::from_codes(["A".to_string()]);
        let date = NaiveDate::from_ymd_opt(2024, 2, 5).unwrap();

        let row = project_next_row("A", "", &[1.0, 2.0, 3.0, 4.0], date, &vocab).unwrap();
        assert_eq!(row.lag_1, Some(4.0));
        assert_eq!(row.lag_2, Some(3.0));
        assert_eq!(row.rolling_mean_3, Some(3.0));
        assert_eq!(row.day_of_week, 0);
        assert_eq!(row.month, 2);

        let single = project_next_row("A", "", &[7.0], date, &vocab).unwrap();
        assert_eq!(single.lag_2, Some(7.0));
        assert!(single.imputed);

        assert!(project_next_row("A", "", &[], date, &vocab).is_none());
    }

    #[test]
    fn projection_lags_skip_interior_nulls() {
        let vocab = EntityVocabulary::from_codes(["A".to_string()]);
        let date = NaiveDate::from_ymd_opt(2024, 1, 4).unwrap();
        let history = [obs("A", 1, Some(5.0)), obs("A", 2, None), obs("A", 3, Some(9.0))];
        let known: Vec<f64> = history.iter().filter_map(|o| o.theoretical_quantity).collect();

        let row = project_next_row("A", "", &known, date, &vocab).unwrap();
        assert_eq!(row.lag_1, Some(9.0));
        assert_eq!(row.lag_2, Some(5.0));
        assert_eq!(row.rolling_mean_3, Some(7.0));
        assert!(!row.imputed);
    }

    #[test]
    fn vector_follows_requested_order() {
        let set = build_features(&series("A", &[1.0, 2.0, 3.0]), &FeatureConfig::default(), None)
            .unwrap();
        let v = set.rows[2].vector(&[Feature::Month, Feature::Lag1]);
        assert_eq!(v, vec![1.0, 2.0]);
    }
}
