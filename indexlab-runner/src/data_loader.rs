//! Observation loading for training and prediction.
//!
//! Reads the warehouse, and fails with an explicit no-data error rather than
//! training or predicting on nothing.

use std::collections::BTreeSet;

use chrono::NaiveDate;
use thiserror::Error;

use indexlab_core::data::{DataError, Warehouse};
use indexlab_core::domain::{DatasetHash, Observation};

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("no data: {0}")]
    NoData(String),

    #[error("data error: {0}")]
    Data(DataError),
}

impl From<DataError> for LoadError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::NoData(msg) => LoadError::NoData(msg),
            other => LoadError::Data(other),
        }
    }
}

/// Observations plus provenance.
#[derive(Debug, Clone)]
pub struct LoadedData {
    /// Ordered by (date, entity).
    pub observations: Vec<Observation>,
    pub dataset_hash: DatasetHash,
    pub first_date: NaiveDate,
    pub last_date: NaiveDate,
    pub n_dates: usize,
    pub n_entities: usize,
}

pub fn load_observations(
    warehouse: &Warehouse,
    limit: Option<usize>,
) -> Result<LoadedData, LoadError> {
    let observations = warehouse.load(limit)?;
    summarize(observations)
}

/// Wrap already-loaded observations (e.g. from a request body).
pub fn summarize(observations: Vec<Observation>) -> Result<LoadedData, LoadError> {
    let dates: BTreeSet<NaiveDate> = observations.iter().map(|o| o.reference_date).collect();
    let (Some(&first_date), Some(&last_date)) = (dates.first(), dates.last()) else {
        return Err(LoadError::NoData("no observations".into()));
    };
    let entities: BTreeSet<&str> = observations.iter().map(|o| o.entity_code.as_str()).collect();
    let n_entities = entities.len();

    Ok(LoadedData {
        dataset_hash: DatasetHash::of(&observations),
        first_date,
        last_date,
        n_dates: dates.len(),
        n_entities,
        observations,
    })
}
