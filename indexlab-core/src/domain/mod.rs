//! Domain types: index composition observations and content-hash identifiers.

pub mod ids;
pub mod observation;

pub use ids::{ArtifactId, DatasetHash};
pub use observation::{sort_by_entity_date, Observation, TargetColumn};
