//! End-to-end training run: warehouse → folds → artifact → ledger.

use std::path::PathBuf;

use anyhow::{Context, Result};
use tracing::info;

use indexlab_core::artifact::ModelArtifact;
use indexlab_core::data::Warehouse;
use indexlab_core::domain::ArtifactId;

use crate::config::PipelineConfig;
use crate::data_loader::{load_observations, LoadedData};
use crate::ledger::{LedgerEntry, TrainingLedger};
use crate::trainer::{train, TrainingReport};

#[derive(Debug)]
pub struct TrainRun {
    pub report: TrainingReport,
    pub artifact_id: ArtifactId,
    pub artifact_path: PathBuf,
}

/// Train on the configured warehouse, save the artifact and record the run.
pub fn run_training(config: &PipelineConfig) -> Result<TrainRun> {
    let warehouse = Warehouse::new(&config.warehouse.dir);
    let loaded = load_observations(&warehouse, config.training.row_limit)
        .context("failed to load training data")?;
    info!(
        rows = loaded.observations.len(),
        dates = loaded.n_dates,
        entities = loaded.n_entities,
        from = %loaded.first_date,
        to = %loaded.last_date,
        "loaded warehouse"
    );

    let outcome = train(
        &loaded.observations,
        &config.features,
        config.training.n_folds,
        &config.training.booster,
    )
    .context("training failed")?;

    let artifact_path = config.artifact.path.clone();
    let artifact_id = outcome
        .artifact
        .save(&artifact_path)
        .context("failed to save model artifact")?;

    let ledger = TrainingLedger::new(&config.training.ledger_path);
    let entry = LedgerEntry::from_report(
        &outcome.report,
        outcome.artifact.metadata.trained_at,
        &artifact_id.0,
        &artifact_path,
        outcome.artifact.target(),
    );
    ledger
        .append(&entry)
        .with_context(|| format!("failed to append to {}", ledger.path().display()))?;

    Ok(TrainRun {
        report: outcome.report,
        artifact_id,
        artifact_path,
    })
}

/// Load the whole warehouse for scoring.
///
/// `[training] row_limit` only bounds training; projections always start
/// from each entity's latest observation.
pub fn load_for_prediction(config: &PipelineConfig) -> Result<LoadedData> {
    let warehouse = Warehouse::new(&config.warehouse.dir);
    load_observations(&warehouse, None).context("failed to load warehouse")
}

/// Load the configured artifact.
pub fn load_artifact(config: &PipelineConfig) -> Result<ModelArtifact> {
    ModelArtifact::load(&config.artifact.path).with_context(|| {
        format!(
            "failed to load model artifact from {} (run `indexlab train` first)",
            config.artifact.path.display()
        )
    })
}
