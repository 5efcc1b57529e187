//! Shared server state.
//!
//! The artifact is loaded once at startup and never mutated; a server
//! started without one answers prediction routes with 503.

use std::sync::Arc;
use std::time::Instant;

use indexlab_core::artifact::{ArtifactError, ModelArtifact};
use indexlab_core::data::{PortfolioProvider, Warehouse};
use indexlab_runner::predictor::PredictOptions;

use crate::error::{AppError, AppResult};

#[derive(Clone)]
pub struct AppState {
    pub artifact: Option<Arc<ModelArtifact>>,
    pub artifact_id: Option<String>,
    pub warehouse: Arc<Warehouse>,
    pub provider: Arc<dyn PortfolioProvider>,
    /// Index collected by `POST /collect`, e.g. `IBOV`.
    pub index: String,
    pub predict: PredictOptions,
    started: Instant,
}

impl AppState {
    pub fn new(
        warehouse: Warehouse,
        provider: Arc<dyn PortfolioProvider>,
        index: impl Into<String>,
        predict: PredictOptions,
    ) -> Self {
        Self {
            artifact: None,
            artifact_id: None,
            warehouse: Arc::new(warehouse),
            provider,
            index: index.into(),
            predict,
            started: Instant::now(),
        }
    }

    /// Attach a validated artifact.
    pub fn with_artifact(mut self, artifact: ModelArtifact) -> Result<Self, ArtifactError> {
        artifact.validate()?;
        self.artifact_id = Some(artifact.id()?.0);
        self.artifact = Some(Arc::new(artifact));
        Ok(self)
    }

    pub fn model(&self) -> AppResult<Arc<ModelArtifact>> {
        self.artifact.clone().ok_or(AppError::ModelNotLoaded)
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started.elapsed().as_secs()
    }
}
