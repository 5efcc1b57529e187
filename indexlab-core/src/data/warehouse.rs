//! Parquet warehouse with Hive-style date partitioning.
//!
//! Layout: `{warehouse_dir}/date={YYYY-MM-DD}/portfolio.parquet`
//!
//! - Atomic writes (write to .tmp, rename into place)
//! - One partition per reference date; rewriting a date replaces its snapshot,
//!   which keeps (entity, date) unique across the table
//! - Schema validation on load
//! - Quarantine for corrupt files ({filename}.quarantined)
//! - Metadata sidecar per partition (row count, hash, source)

use chrono::NaiveDate;
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::provider::{DataError, DataSource};
use super::schema::{WarehouseSchema, COL_ASSET, COL_CODE, COL_DATE, COL_PART, COL_QTY, COL_TYPE};
use crate::domain::{DatasetHash, Observation};

const PARTITION_FILE: &str = "portfolio.parquet";
const META_FILE: &str = "meta.json";

/// Metadata sidecar for one date partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionMeta {
    pub reference_date: NaiveDate,
    pub row_count: usize,
    pub data_hash: String,
    pub source: DataSource,
    pub ingested_at: chrono::NaiveDateTime,
}

/// The Parquet warehouse.
#[derive(Debug, Clone)]
pub struct Warehouse {
    root: PathBuf,
}

impl Warehouse {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory of the warehouse.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory for a date: `{root}/date={YYYY-MM-DD}/`
    fn partition_dir(&self, date: NaiveDate) -> PathBuf {
        self.root.join(format!("date={date}"))
    }

    fn partition_path(&self, date: NaiveDate) -> PathBuf {
        self.partition_dir(date).join(PARTITION_FILE)
    }

    fn meta_path(&self, date: NaiveDate) -> PathBuf {
        self.partition_dir(date).join(META_FILE)
    }

    /// Append observations, one partition per reference date.
    ///
    /// A date already present is replaced by the new snapshot.
    pub fn append(
        &self,
        observations: &[Observation],
        source: DataSource,
    ) -> Result<Vec<PartitionMeta>, DataError> {
        if observations.is_empty() {
            return Err(DataError::NoData("nothing to write to the warehouse".into()));
        }

        let mut by_date: BTreeMap<NaiveDate, Vec<&Observation>> = BTreeMap::new();
        for obs in observations {
            by_date.entry(obs.reference_date).or_default().push(obs);
        }

        by_date
            .into_iter()
            .map(|(date, rows)| self.write_partition(date, &rows, source))
            .collect()
    }

    /// Write (or replace) the partition for `date`.
    fn write_partition(
        &self,
        date: NaiveDate,
        rows: &[&Observation],
        source: DataSource,
    ) -> Result<PartitionMeta, DataError> {
        let dir = self.partition_dir(date);
        fs::create_dir_all(&dir)
            .map_err(|e| DataError::Warehouse(format!("failed to create dir: {e}")))?;

        let df = observations_to_dataframe(rows)?;
        let path = self.partition_path(date);
        let tmp_path = path.with_extension("parquet.tmp");

        write_parquet(&df, &tmp_path)?;
        fs::rename(&tmp_path, &path).map_err(|e| {
            let _ = fs::remove_file(&tmp_path);
            DataError::Warehouse(format!("atomic rename failed: {e}"))
        })?;

        let owned: Vec<Observation> = rows.iter().map(|o| (*o).clone()).collect();
        let meta = PartitionMeta {
            reference_date: date,
            row_count: rows.len(),
            data_hash: DatasetHash::of(&owned).0,
            source,
            ingested_at: chrono::Local::now().naive_local(),
        };
        let meta_json = serde_json::to_string_pretty(&meta)
            .map_err(|e| DataError::Warehouse(format!("meta serialization: {e}")))?;
        fs::write(self.meta_path(date), meta_json)
            .map_err(|e| DataError::Warehouse(format!("meta write: {e}")))?;

        info!(%date, rows = rows.len(), source = source.as_str(), "wrote warehouse partition");
        Ok(meta)
    }

    /// Reference dates present in the warehouse, ascending.
    pub fn dates(&self) -> Result<Vec<NaiveDate>, DataError> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.root)
            .map_err(|e| DataError::Warehouse(format!("read dir: {e}")))?;

        let mut dates = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| DataError::Warehouse(format!("dir entry: {e}")))?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(raw) = name.strip_prefix("date=") {
                if let Ok(date) = NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                    dates.push(date);
                }
            }
        }
        dates.sort();
        Ok(dates)
    }

    /// Load every observation, ordered by date ascending (then entity).
    ///
    /// `limit` keeps only the first `limit` rows of that order.
    /// An empty warehouse is a `NoData` error.
    pub fn load(&self, limit: Option<usize>) -> Result<Vec<Observation>, DataError> {
        let mut all = Vec::new();

        for date in self.dates()? {
            let path = self.partition_path(date);
            if !path.exists() {
                continue;
            }
            match load_and_validate_parquet(&path) {
                Ok(rows) => all.extend(rows),
                Err(e) => {
                    let quarantine = path.with_extension("parquet.quarantined");
                    warn!(path = %path.display(), error = %e, "quarantining corrupt warehouse partition");
                    let _ = fs::rename(&path, &quarantine);
                }
            }
        }

        if all.is_empty() {
            return Err(DataError::NoData(format!(
                "warehouse at {} has no observations",
                self.root.display()
            )));
        }

        all.sort_by(|a, b| {
            a.reference_date
                .cmp(&b.reference_date)
                .then_with(|| a.entity_code.cmp(&b.entity_code))
        });
        if let Some(limit) = limit {
            all.truncate(limit);
        }
        Ok(all)
    }

    /// Metadata for one partition, if present and readable.
    pub fn get_meta(&self, date: NaiveDate) -> Option<PartitionMeta> {
        let content = fs::read_to_string(self.meta_path(date)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Per-partition status for reporting.
    pub fn status(&self) -> Result<Vec<PartitionStatus>, DataError> {
        Ok(self
            .dates()?
            .into_iter()
            .map(|date| {
                let meta = self.get_meta(date);
                PartitionStatus {
                    reference_date: date,
                    row_count: meta.as_ref().map(|m| m.row_count),
                    source: meta.as_ref().map(|m| m.source),
                    size_bytes: dir_size(&self.partition_dir(date)),
                }
            })
            .collect())
    }
}

/// Status of a single partition.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionStatus {
    pub reference_date: NaiveDate,
    pub row_count: Option<usize>,
    pub source: Option<DataSource>,
    pub size_bytes: u64,
}

fn dir_size(path: &Path) -> u64 {
    fs::read_dir(path)
        .map(|entries| {
            entries
                .flatten()
                .filter_map(|e| e.metadata().ok())
                .map(|m| m.len())
                .sum()
        })
        .unwrap_or(0)
}

// ── Parquet I/O helpers ─────────────────────────────────────────────

fn epoch() -> NaiveDate {
    NaiveDate::from_ymd_opt(1970, 1, 1).unwrap_or_default()
}

/// Convert observations to a Polars DataFrame with the warehouse schema.
fn observations_to_dataframe(rows: &[&Observation]) -> Result<DataFrame, DataError> {
    let codes: Vec<&str> = rows.iter().map(|o| o.entity_code.as_str()).collect();
    let assets: Vec<&str> = rows.iter().map(|o| o.asset_name.as_str()).collect();
    let types: Vec<&str> = rows.iter().map(|o| o.asset_type.as_str()).collect();
    let parts: Vec<Option<f64>> = rows.iter().map(|o| o.part_weight).collect();
    let qtys: Vec<Option<f64>> = rows.iter().map(|o| o.theoretical_quantity).collect();
    let dates: Vec<i32> = rows
        .iter()
        .map(|o| (o.reference_date - epoch()).num_days() as i32)
        .collect();

    DataFrame::new(vec![
        Column::new(COL_CODE.into(), codes),
        Column::new(COL_ASSET.into(), assets),
        Column::new(COL_TYPE.into(), types),
        Column::new(COL_PART.into(), parts),
        Column::new(COL_QTY.into(), qtys),
        Column::new(COL_DATE.into(), dates)
            .cast(&DataType::Date)
            .map_err(|e| DataError::Parquet(format!("date cast: {e}")))?,
    ])
    .map_err(|e| DataError::Parquet(format!("dataframe creation: {e}")))
}

fn write_parquet(df: &DataFrame, path: &Path) -> Result<(), DataError> {
    let file =
        fs::File::create(path).map_err(|e| DataError::Parquet(format!("create file: {e}")))?;
    ParquetWriter::new(file)
        .finish(&mut df.clone())
        .map_err(|e| DataError::Parquet(format!("write parquet: {e}")))?;
    Ok(())
}

/// Load a partition file and validate it against the warehouse schema.
fn load_and_validate_parquet(path: &Path) -> Result<Vec<Observation>, DataError> {
    let file = fs::File::open(path).map_err(|e| DataError::Parquet(format!("open: {e}")))?;
    let df = ParquetReader::new(file)
        .finish()
        .map_err(|e| DataError::Parquet(format!("read: {e}")))?;

    if df.height() == 0 {
        return Err(DataError::Validation("empty parquet partition".into()));
    }
    WarehouseSchema::validate(&df).map_err(|e| DataError::Validation(e.to_string()))?;

    dataframe_to_observations(&df)
}

fn dataframe_to_observations(df: &DataFrame) -> Result<Vec<Observation>, DataError> {
    let col = |name: &str| {
        df.column(name)
            .map_err(|e| DataError::Parquet(format!("column read: {e}")))
    };
    let type_err = |name: &str, e: PolarsError| DataError::Parquet(format!("{name} column type: {e}"));

    let codes = col(COL_CODE)?.str().map_err(|e| type_err(COL_CODE, e))?;
    let assets = col(COL_ASSET)?.str().map_err(|e| type_err(COL_ASSET, e))?;
    let types = col(COL_TYPE)?.str().map_err(|e| type_err(COL_TYPE, e))?;
    let parts = col(COL_PART)?.f64().map_err(|e| type_err(COL_PART, e))?;
    let qtys = col(COL_QTY)?.f64().map_err(|e| type_err(COL_QTY, e))?;
    let dates = col(COL_DATE)?.date().map_err(|e| type_err(COL_DATE, e))?;

    let n = df.height();
    let mut rows = Vec::with_capacity(n);
    for i in 0..n {
        let code = codes
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null {COL_CODE} at row {i}")))?;
        let days = dates
            .get(i)
            .ok_or_else(|| DataError::Parquet(format!("null {COL_DATE} at row {i}")))?;

        rows.push(Observation {
            entity_code: code.to_string(),
            asset_name: assets.get(i).unwrap_or_default().to_string(),
            asset_type: types.get(i).unwrap_or_default().to_string(),
            reference_date: epoch() + chrono::Duration::days(days as i64),
            theoretical_quantity: qtys.get(i),
            part_weight: parts.get(i),
        });
    }

    Ok(rows)
}
