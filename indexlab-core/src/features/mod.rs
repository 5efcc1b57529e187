//! Feature engineering over per-entity time series.
//!
//! Every lag and rolling feature at row t depends only on rows before t of
//! the same entity. Calendar features and the entity code depend on row t's
//! own key, never its value.

pub mod builder;
pub mod vocabulary;

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use builder::{
    build_features, project_next_row, FallbackPolicy, FeatureConfig, FeatureRow, FeatureSet,
};
pub use vocabulary::{EntityVocabulary, UNKNOWN_ENTITY_CODE};

/// A model input column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Feature {
    Lag1,
    Lag2,
    RollingMean3,
    DayOfWeek,
    Month,
    EntityCode,
}

impl Feature {
    /// Canonical training order.
    pub const ALL: [Feature; 6] = [
        Feature::Lag1,
        Feature::Lag2,
        Feature::RollingMean3,
        Feature::DayOfWeek,
        Feature::Month,
        Feature::EntityCode,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Lag1 => "lag_1",
            Feature::Lag2 => "lag_2",
            Feature::RollingMean3 => "rolling_mean_3",
            Feature::DayOfWeek => "day_of_week",
            Feature::Month => "month",
            Feature::EntityCode => "entity_code",
        }
    }

    /// Canonical names, in training order.
    pub fn canonical_names() -> Vec<String> {
        Self::ALL.iter().map(|f| f.name().to_string()).collect()
    }
}

impl fmt::Display for Feature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Feature {
    type Err = FeatureError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Feature::ALL
            .iter()
            .copied()
            .find(|f| f.name() == s)
            .ok_or_else(|| FeatureError::UnknownFeature(s.to_string()))
    }
}

/// Resolve a stored feature-name list, preserving its order.
pub fn resolve_features(names: &[String]) -> Result<Vec<Feature>, FeatureError> {
    if names.is_empty() {
        return Err(FeatureError::EmptyFeatureList);
    }
    names.iter().map(|n| n.parse()).collect()
}

#[derive(Debug, Error)]
pub enum FeatureError {
    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("feature list is empty")]
    EmptyFeatureList,

    #[error("no observations to build features from")]
    EmptyInput,
}
