//! Stable categorical codes for entity identifiers.

use serde::{Deserialize, Serialize};

use crate::domain::Observation;

/// Code assigned to entities that were not seen at training time.
pub const UNKNOWN_ENTITY_CODE: i64 = -1;

/// Sorted, distinct entity codes. An entity's category code is its position.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Vec<String>", into = "Vec<String>")]
pub struct EntityVocabulary {
    codes: Vec<String>,
}

impl From<Vec<String>> for EntityVocabulary {
    fn from(codes: Vec<String>) -> Self {
        Self::from_codes(codes)
    }
}

impl From<EntityVocabulary> for Vec<String> {
    fn from(vocab: EntityVocabulary) -> Self {
        vocab.codes
    }
}

impl EntityVocabulary {
    pub fn from_observations(observations: &[Observation]) -> Self {
        Self::from_codes(observations.iter().map(|o| o.entity_code.clone()))
    }

    pub fn from_codes(codes: impl IntoIterator<Item = String>) -> Self {
        let mut codes: Vec<String> = codes.into_iter().collect();
        codes.sort();
        codes.dedup();
        Self { codes }
    }

    pub fn code_of(&self, entity: &str) -> i64 {
        self.codes
            .binary_search_by(|c| c.as_str().cmp(entity))
            .map(|i| i as i64)
            .unwrap_or(UNKNOWN_ENTITY_CODE)
    }

    pub fn contains(&self, entity: &str) -> bool {
        self.code_of(entity) != UNKNOWN_ENTITY_CODE
    }

    pub fn len(&self) -> usize {
        self.codes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.codes.is_empty()
    }

    pub fn codes(&self) -> &[String] {
        &self.codes
    }
}
