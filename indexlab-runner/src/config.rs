//! Pipeline configuration loaded from TOML.
//!
//! Every field has a default, so an empty file (or no file) is valid.
//! A handful of deployment settings can be overridden from the environment.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use indexlab_core::data::B3Config;
use indexlab_core::features::FeatureConfig;
use indexlab_core::model::BoosterParams;

pub const ENV_WAREHOUSE: &str = "INDEXLAB_WAREHOUSE";
pub const ENV_B3_URL: &str = "INDEXLAB_B3_URL";
pub const ENV_INDEX: &str = "INDEXLAB_INDEX";
pub const ENV_ARTIFACT: &str = "INDEXLAB_ARTIFACT";
pub const ENV_HOST: &str = "INDEXLAB_HOST";
pub const ENV_PORT: &str = "INDEXLAB_PORT";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {reason}")]
    Io { path: String, reason: String },

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub warehouse: WarehouseConfig,
    pub collector: B3Config,
    pub features: FeatureConfig,
    pub training: TrainingConfig,
    pub artifact: ArtifactConfig,
    pub predict: PredictConfig,
    pub server: ServerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WarehouseConfig {
    pub dir: PathBuf,
}

impl Default for WarehouseConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("data/warehouse"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingConfig {
    pub n_folds: usize,
    /// Optional cap on rows read from the warehouse (oldest first).
    pub row_limit: Option<usize>,
    pub ledger_path: PathBuf,
    pub booster: BoosterParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            n_folds: 5,
            row_limit: None,
            ledger_path: PathBuf::from("data/training_ledger.jsonl"),
            booster: BoosterParams::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub path: PathBuf,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("models/model.json"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PredictConfig {
    /// Project Friday observations to the following Monday.
    pub skip_weekends: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".into(),
            port: 8080,
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl PipelineConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, otherwise defaults; then apply env overrides.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let config = match path {
            Some(p) => Self::from_file(p)?,
            None => Self::default(),
        };
        let config = config.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_env_overrides(self) -> Result<Self, ConfigError> {
        self.with_overrides(|key| std::env::var(key).ok())
    }

    /// Apply overrides from an arbitrary key lookup.
    pub fn with_overrides(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(v) = lookup(ENV_WAREHOUSE) {
            self.warehouse.dir = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_B3_URL) {
            self.collector.base_url = v;
        }
        if let Some(v) = lookup(ENV_INDEX) {
            self.collector.index = v;
        }
        if let Some(v) = lookup(ENV_ARTIFACT) {
            self.artifact.path = PathBuf::from(v);
        }
        if let Some(v) = lookup(ENV_HOST) {
            self.server.host = v;
        }
        if let Some(v) = lookup(ENV_PORT) {
            self.server.port = v
                .parse()
                .map_err(|_| ConfigError::Invalid(format!("{ENV_PORT}='{v}' is not a port")))?;
        }
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.training.n_folds == 0 {
            return Err(ConfigError::Invalid("training.n_folds must be >= 1".into()));
        }
        if self.collector.index.trim().is_empty() {
            return Err(ConfigError::Invalid("collector.index must not be empty".into()));
        }
        if self.collector.page_size == 0 {
            return Err(ConfigError::Invalid("collector.page_size must be >= 1".into()));
        }
        self.training
            .booster
            .validate()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexlab_core::domain::TargetColumn;
    use indexlab_core::features::FallbackPolicy;
    use std::collections::HashMap;

    #[test]
    fn empty_toml_is_all_defaults() {
        let config = PipelineConfig::from_toml("").unwrap();
        assert_eq!(config, PipelineConfig::default());
        assert_eq!(config.training.n_folds, 5);
        assert_eq!(config.training.booster.n_rounds, 300);
        assert_eq!(config.collector.index, "IBOV");
        assert_eq!(config.server.bind_addr(), "0.0.0.0:8080");
    }

    #[test]
    fn sections_parse() {
        let toml = r#"
            [warehouse]
            dir = "/tmp/wh"

            [features]
            target = "part_weight"
            fallback = "drop"

            [training]
            n_folds = 3

            [training.booster]
            learning_rate = 0.1
            early_stopping_rounds = 10

            [predict]
            skip_weekends = true

            [server]
            port = 9000
        "#;
        let config = PipelineConfig::from_toml(toml).unwrap();
        assert_eq!(config.warehouse.dir, PathBuf::from("/tmp/wh"));
        assert_eq!(config.features.target, TargetColumn::PartWeight);
        assert_eq!(config.features.fallback, FallbackPolicy::Drop);
        assert_eq!(config.training.n_folds, 3);
        assert_eq!(config.training.booster.learning_rate, 0.1);
        assert_eq!(config.training.booster.max_depth, 6);
        assert_eq!(config.training.booster.early_stopping_rounds, Some(10));
        assert!(config.predict.skip_weekends);
        assert_eq!(config.server.port, 9000);
        assert_eq!(config.server.host, "0.0.0.0");
    }

    #[test]
    fn invalid_values_rejected() {
        assert!(matches!(
            PipelineConfig::from_toml("[training]\nn_folds = 0"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[training.booster]\nsubsample = 1.5"),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            PipelineConfig::from_toml("[training\n"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn overrides_apply() {
        let vars: HashMap<&str, &str> = [
            (ENV_WAREHOUSE, "/srv/wh"),
            (ENV_INDEX, "IBXX"),
            (ENV_PORT, "8181"),
        ]
        .into_iter()
        .collect();
        let config = PipelineConfig::default()
            .with_overrides(|k| vars.get(k).map(|v| v.to_string()))
            .unwrap();
        assert_eq!(config.warehouse.dir, PathBuf::from("/srv/wh"));
        assert_eq!(config.collector.index, "IBXX");
        assert_eq!(config.server.port, 8181);
        assert_eq!(config.artifact.path, PathBuf::from("models/model.json"));
    }

    #[test]
    fn bad_port_override_rejected() {
        let err = PipelineConfig::default()
            .with_overrides(|k| (k == ENV_PORT).then(|| "eighty".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn missing_file_is_io_error() {
        let err = PipelineConfig::from_file(Path::new("/nonexistent/indexlab.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}
