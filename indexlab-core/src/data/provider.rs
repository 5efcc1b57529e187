//! Portfolio provider trait and structured error types.
//!
//! The PortfolioProvider trait abstracts over where a day's index composition
//! comes from (the exchange endpoint, a CSV export) so the collector can be
//! exercised against a fake in tests.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Observation;

/// Structured error types for data operations.
///
/// Displayable in both CLI and HTTP contexts.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("upstream returned HTTP {status}: {context}")]
    UpstreamStatus { status: u16, context: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("no data: {0}")]
    NoData(String),

    #[error("warehouse error: {0}")]
    Warehouse(String),

    #[error("validation error: {0}")]
    Validation(String),

    #[error("parquet I/O error: {0}")]
    Parquet(String),

    #[error("csv error: {0}")]
    Csv(String),

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// True for the explicit "nothing to work with" condition.
    pub fn is_no_data(&self) -> bool {
        matches!(self, DataError::NoData(_))
    }
}

/// Where a batch of observations came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataSource {
    B3Portfolio,
    CsvImport,
}

impl DataSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::B3Portfolio => "b3_portfolio",
            DataSource::CsvImport => "csv_import",
        }
    }
}

/// Result of a successful portfolio fetch for one index.
#[derive(Debug, Clone)]
pub struct FetchResult {
    pub index: String,
    pub reference_date: NaiveDate,
    pub observations: Vec<Observation>,
    pub source: DataSource,
}

/// Trait for sources of daily index composition.
///
/// Providers only fetch; ingest and warehouse writes happen above this trait.
pub trait PortfolioProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the current composition of `index`, all pages.
    fn fetch_portfolio(&self, index: &str) -> Result<FetchResult, DataError>;
}
