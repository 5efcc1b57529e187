use serde::{Deserialize, Serialize};
use std::fmt;

use super::observation::Observation;

/// Content hash of a set of observations (BLAKE3 over canonical row order).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DatasetHash(pub String);

impl DatasetHash {
    /// Hash observations in (date, entity) order so the result does not
    /// depend on how the caller happened to order the rows.
    pub fn of(observations: &[Observation]) -> Self {
        let mut refs: Vec<&Observation> = observations.iter().collect();
        refs.sort_by(|a, b| {
            a.reference_date
                .cmp(&b.reference_date)
                .then_with(|| a.entity_code.cmp(&b.entity_code))
        });

        let mut hasher = blake3::Hasher::new();
        for obs in refs {
            hasher.update(obs.entity_code.as_bytes());
            hasher.update(obs.reference_date.to_string().as_bytes());
            hasher.update(&obs.theoretical_quantity.unwrap_or(f64::NAN).to_le_bytes());
            hasher.update(&obs.part_weight.unwrap_or(f64::NAN).to_le_bytes());
        }
        Self(hasher.finalize().to_hex().to_string())
    }
}

impl fmt::Display for DatasetHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Model artifact identifier: BLAKE3 of the serialized artifact body.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactId(pub String);

impl ArtifactId {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// First 12 hex chars, for log lines and CLI output.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
