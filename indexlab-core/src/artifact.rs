//! Model artifact: the fitted ensemble bundled with everything inference
//! needs to rebuild training's input exactly.
//!
//! The feature-name list is stored in training order and is the only source
//! of column order at inference time. Artifacts carry a `format_version`;
//! newer versions are rejected on load.

use std::fs;
use std::path::Path;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::info;

use crate::domain::{ArtifactId, TargetColumn};
use crate::features::{resolve_features, EntityVocabulary, Feature, FeatureConfig, FeatureError, FeatureRow};
use crate::model::{BoosterParams, GradientBooster, Matrix};

pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("artifact I/O error at {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("artifact serialization error: {0}")]
    Serialization(String),

    #[error("unsupported artifact format version {found} (max supported: {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },

    #[error("invalid artifact: {0}")]
    Invalid(String),

    #[error(transparent)]
    Feature(#[from] FeatureError),
}

/// How the stored model was selected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingMetadata {
    pub trained_at: NaiveDateTime,
    pub dataset_hash: String,
    pub n_rows: usize,
    pub n_dates: usize,
    pub n_folds: usize,
    /// Zero-based index of the winning fold.
    pub selected_fold: usize,
    pub validation_rmse: f64,
    pub validation_mae: f64,
    pub best_iteration: Option<usize>,
    pub params: BoosterParams,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub model: GradientBooster,
    pub feature_names: Vec<String>,
    pub vocabulary: EntityVocabulary,
    pub features: FeatureConfig,
    pub metadata: TrainingMetadata,
}

impl ModelArtifact {
    pub fn new(
        model: GradientBooster,
        features: &[Feature],
        vocabulary: EntityVocabulary,
        config: FeatureConfig,
        metadata: TrainingMetadata,
    ) -> Result<Self, ArtifactError> {
        let artifact = Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            model,
            feature_names: features.iter().map(|f| f.name().to_string()).collect(),
            vocabulary,
            features: config,
            metadata,
        };
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn target(&self) -> TargetColumn {
        self.features.target
    }

    /// Stored feature list, in training order.
    pub fn resolved_features(&self) -> Result<Vec<Feature>, ArtifactError> {
        Ok(resolve_features(&self.feature_names)?)
    }

    /// Format version and feature count agree with the stored model.
    pub fn validate(&self) -> Result<(), ArtifactError> {
        if self.format_version > ARTIFACT_FORMAT_VERSION {
            return Err(ArtifactError::UnsupportedVersion {
                found: self.format_version,
                supported: ARTIFACT_FORMAT_VERSION,
            });
        }
        let features = self.resolved_features()?;
        if features.len() != self.model.n_features {
            return Err(ArtifactError::Invalid(format!(
                "model expects {} features but {} names are stored",
                self.model.n_features,
                features.len()
            )));
        }
        Ok(())
    }

    /// Feature matrix for `rows`, columns in the stored order.
    pub fn matrix_for(&self, rows: &[FeatureRow]) -> Result<Matrix, ArtifactError> {
        let features = self.resolved_features()?;
        let vectors: Vec<Vec<f64>> = rows.iter().map(|r| r.vector(&features)).collect();
        Matrix::from_rows(&vectors, features.len())
            .map_err(|e| ArtifactError::Invalid(e.to_string()))
    }

    pub fn predict(&self, rows: &[FeatureRow]) -> Result<Vec<f64>, ArtifactError> {
        Ok(self.model.predict(&self.matrix_for(rows)?))
    }

    pub fn to_json(&self) -> Result<String, ArtifactError> {
        serde_json::to_string_pretty(self).map_err(|e| ArtifactError::Serialization(e.to_string()))
    }

    pub fn from_json(json: &str) -> Result<Self, ArtifactError> {
        let artifact: Self =
            serde_json::from_str(json).map_err(|e| ArtifactError::Serialization(e.to_string()))?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Content id of the serialized artifact.
    pub fn id(&self) -> Result<ArtifactId, ArtifactError> {
        Ok(ArtifactId::from_bytes(self.to_json()?.as_bytes()))
    }

    /// Write atomically (tmp + rename), creating parent directories.
    pub fn save(&self, path: &Path) -> Result<ArtifactId, ArtifactError> {
        let io_err = |reason: String| ArtifactError::Io {
            path: path.display().to_string(),
            reason,
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| io_err(e.to_string()))?;
        }

        let json = self.to_json()?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, &json).map_err(|e| io_err(e.to_string()))?;
        fs::rename(&tmp, path).map_err(|e| {
            let _ = fs::remove_file(&tmp);
            io_err(format!("atomic rename failed: {e}"))
        })?;

        let id = ArtifactId::from_bytes(json.as_bytes());
        info!(path = %path.display(), id = id.short(), "saved model artifact");
        Ok(id)
    }

    pub fn load(path: &Path) -> Result<Self, ArtifactError> {
        let json = fs::read_to_string(path).map_err(|e| ArtifactError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&json)
    }
}
