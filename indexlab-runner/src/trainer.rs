//! Temporal k-fold training and model selection.
//!
//! One booster per fold, each early-stopped against its own validation
//! block. The fold model with the lowest validation RMSE becomes the
//! artifact; ties go to the earlier fold and a non-finite RMSE never wins.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use indexlab_core::artifact::{ArtifactError, ModelArtifact, TrainingMetadata};
use indexlab_core::domain::{DatasetHash, Observation};
use indexlab_core::features::{build_features, Feature, FeatureConfig, FeatureError, FeatureRow};
use indexlab_core::model::{mae, rmse, BoosterParams, GradientBooster, Matrix, ModelError};

use crate::splitter::{create_folds, DateIndex, FoldSpec, SplitError};

#[derive(Debug, Error)]
pub enum TrainError {
    #[error("no data: {0}")]
    NoData(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Split(#[from] SplitError),

    #[error("model error on fold {fold}: {source}")]
    Model {
        fold: usize,
        #[source]
        source: ModelError,
    },

    #[error("no fold produced a finite validation RMSE")]
    NoUsableFold,

    #[error(transparent)]
    Artifact(#[from] ArtifactError),
}

/// Outcome of one fold.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FoldReport {
    pub fold: FoldSpec,
    pub train_rows: usize,
    pub validation_rows: usize,
    pub train_first_date: NaiveDate,
    pub train_last_date: NaiveDate,
    pub validation_first_date: NaiveDate,
    pub validation_last_date: NaiveDate,
    pub rmse: f64,
    pub mae: f64,
    pub best_iteration: Option<usize>,
    pub n_trees: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub folds: Vec<FoldReport>,
    pub selected_fold: usize,
    pub validation_rmse: f64,
    pub validation_mae: f64,
    pub dataset_hash: String,
    pub n_rows: usize,
    pub n_dates: usize,
    pub n_entities: usize,
    pub imputed_rows: usize,
    /// Split share per feature in the selected model, canonical order.
    pub feature_importances: Vec<(String, f64)>,
}

#[derive(Debug, Clone)]
pub struct TrainOutcome {
    pub artifact: ModelArtifact,
    pub report: TrainingReport,
}

/// Index of the minimum finite value; the first one on ties.
pub fn select_best(scores: &[f64]) -> Option<usize> {
    scores
        .iter()
        .enumerate()
        .filter(|(_, s)| s.is_finite())
        .fold(None, |best: Option<(usize, f64)>, (i, &s)| match best {
            Some((_, b)) if b <= s => best,
            _ => Some((i, s)),
        })
        .map(|(i, _)| i)
}

/// Build features, train one model per temporal fold and keep the best.
pub fn train(
    observations: &[Observation],
    features_config: &FeatureConfig,
    n_folds: usize,
    params: &BoosterParams,
) -> Result<TrainOutcome, TrainError> {
    if observations.is_empty() {
        return Err(TrainError::NoData("no observations to train on".into()));
    }

    let mut set = build_features(observations, features_config, None)?;
    set.sort_by_date();
    let rows: Vec<FeatureRow> = set.trainable().cloned().collect();
    if rows.is_empty() {
        return Err(TrainError::NoData(format!(
            "no rows with a {} value",
            features_config.target
        )));
    }

    let features = Feature::ALL.to_vec();
    let dates = DateIndex::new(rows.iter().map(|r| r.reference_date));
    let row_date: Vec<usize> = rows
        .iter()
        .map(|r| dates.index_of(r.reference_date).unwrap_or(usize::MAX))
        .collect();
    let folds = create_folds(dates.len(), n_folds)?;

    let x = Matrix::from_rows(
        &rows.iter().map(|r| r.vector(&features)).collect::<Vec<_>>(),
        features.len(),
    )
    .map_err(|source| TrainError::Model { fold: 0, source })?;
    let y: Vec<f64> = rows.iter().map(|r| r.target.unwrap_or(f64::NAN)).collect();

    info!(
        rows = rows.len(),
        dates = dates.len(),
        entities = set.vocabulary.len(),
        folds = folds.len(),
        target = %features_config.target,
        "starting temporal cross-validation"
    );

    let mut reports = Vec::with_capacity(folds.len());
    let mut models = Vec::with_capacity(folds.len());

    for fold in &folds {
        let train_idx: Vec<usize> = (0..rows.len()).filter(|&i| fold.is_train(row_date[i])).collect();
        let val_idx: Vec<usize> =
            (0..rows.len()).filter(|&i| fold.is_validation(row_date[i])).collect();

        let (tx, ty) = (x.select_rows(&train_idx), pick(&y, &train_idx));
        let (vx, vy) = (x.select_rows(&val_idx), pick(&y, &val_idx));

        let (model, fit) = GradientBooster::fit(params, &tx, &ty, Some((&vx, &vy)))
            .map_err(|source| TrainError::Model {
                fold: fold.fold_index,
                source,
            })?;
        let preds = model.predict(&vx);
        let fold_rmse = rmse(&preds, &vy);
        let fold_mae = mae(&preds, &vy);

        info!(
            fold = fold.fold_index,
            train_rows = train_idx.len(),
            validation_rows = val_idx.len(),
            rmse = fold_rmse,
            mae = fold_mae,
            trees = model.n_trees(),
            "fold trained"
        );

        let date_at = |i: usize| dates.date(i).unwrap_or_default();
        reports.push(FoldReport {
            fold: *fold,
            train_rows: train_idx.len(),
            validation_rows: val_idx.len(),
            train_first_date: date_at(fold.train_start),
            train_last_date: date_at(fold.train_end - 1),
            validation_first_date: date_at(fold.validation_start),
            validation_last_date: date_at(fold.validation_end - 1),
            rmse: fold_rmse,
            mae: fold_mae,
            best_iteration: fit.best_iteration,
            n_trees: model.n_trees(),
        });
        models.push(model);
    }

    let scores: Vec<f64> = reports.iter().map(|r| r.rmse).collect();
    let selected = select_best(&scores).ok_or(TrainError::NoUsableFold)?;
    let chosen = &reports[selected];
    info!(
        fold = selected,
        rmse = chosen.rmse,
        mae = chosen.mae,
        "selected fold model"
    );

    let model = models.swap_remove(selected);
    let feature_importances = features
        .iter()
        .map(|f| f.name().to_string())
        .zip(model.feature_importances())
        .collect();

    let dataset_hash = DatasetHash::of(observations).0;
    let report = TrainingReport {
        selected_fold: selected,
        validation_rmse: chosen.rmse,
        validation_mae: chosen.mae,
        dataset_hash: dataset_hash.clone(),
        n_rows: rows.len(),
        n_dates: dates.len(),
        n_entities: set.vocabulary.len(),
        imputed_rows: rows.iter().filter(|r| r.imputed).count(),
        feature_importances,
        folds: reports,
    };

    let metadata = TrainingMetadata {
        trained_at: chrono::Local::now().naive_local(),
        dataset_hash,
        n_rows: report.n_rows,
        n_dates: report.n_dates,
        n_folds: report.folds.len(),
        selected_fold: selected,
        validation_rmse: report.validation_rmse,
        validation_mae: report.validation_mae,
        best_iteration: report.folds[selected].best_iteration,
        params: params.clone(),
    };
    let artifact = ModelArtifact::new(model, &features, set.vocabulary, *features_config, metadata)?;

    Ok(TrainOutcome { artifact, report })
}

fn pick(values: &[f64], idx: &[usize]) -> Vec<f64> {
    idx.iter().map(|&i| values[i]).collect()
}
