//! Collection orchestrator: fetch → ingest → warehouse.

use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use super::csv_io::read_observations_csv;
use super::ingest;
use super::provider::{DataError, DataSource, PortfolioProvider};
use super::warehouse::Warehouse;

/// Summary of one collection or import run.
#[derive(Debug, Clone, Serialize)]
pub struct CollectSummary {
    pub source: DataSource,
    pub rows: usize,
    pub dates: Vec<NaiveDate>,
    pub duplicates_removed: usize,
    pub dropped: usize,
}

/// Fetch today's composition of `index` and append it to the warehouse.
pub fn collect_portfolio(
    provider: &dyn PortfolioProvider,
    warehouse: &Warehouse,
    index: &str,
) -> Result<CollectSummary, DataError> {
    let fetched = provider.fetch_portfolio(index)?;
    info!(
        provider = provider.name(),
        index,
        reference_date = %fetched.reference_date,
        "collected portfolio"
    );
    store(fetched.observations, fetched.source, warehouse)
}

/// Import a historical CSV export into the warehouse.
pub fn import_csv(path: &Path, warehouse: &Warehouse) -> Result<CollectSummary, DataError> {
    let rows = read_observations_csv(path)?;
    info!(path = %path.display(), rows = rows.len(), "read observations csv");
    store(rows, DataSource::CsvImport, warehouse)
}

fn store(
    raw: Vec<crate::domain::Observation>,
    source: DataSource,
    warehouse: &Warehouse,
) -> Result<CollectSummary, DataError> {
    let ingested = ingest::ingest(raw)?;
    for w in &ingested.warnings {
        warn!(source = source.as_str(), "{w}");
    }

    let metas = warehouse.append(&ingested.observations, source)?;

    Ok(CollectSummary {
        source,
        rows: ingested.observations.len(),
        dates: metas.iter().map(|m| m.reference_date).collect(),
        duplicates_removed: ingested.duplicates_removed,
        dropped: ingested.dropped,
    })
}
