//! Training ledger: JSONL append-only history of training runs.
//!
//! One JSON object per line, so a partial write only loses its own line.

use std::fs::{self, OpenOptions};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use tracing::warn;

use indexlab_core::domain::TargetColumn;

use crate::trainer::TrainingReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerEntry {
    pub trained_at: NaiveDateTime,
    pub artifact_id: String,
    pub artifact_path: PathBuf,
    pub target: TargetColumn,
    pub dataset_hash: String,
    pub n_rows: usize,
    pub n_dates: usize,
    pub selected_fold: usize,
    pub validation_rmse: f64,
    pub validation_mae: f64,
    pub fold_rmse: Vec<f64>,
}

impl LedgerEntry {
    pub fn from_report(
        report: &TrainingReport,
        trained_at: NaiveDateTime,
        artifact_id: &str,
        artifact_path: &Path,
        target: TargetColumn,
    ) -> Self {
        Self {
            trained_at,
            artifact_id: artifact_id.to_string(),
            artifact_path: artifact_path.to_path_buf(),
            target,
            dataset_hash: report.dataset_hash.clone(),
            n_rows: report.n_rows,
            n_dates: report.n_dates,
            selected_fold: report.selected_fold,
            validation_rmse: report.validation_rmse,
            validation_mae: report.validation_mae,
            fold_rmse: report.folds.iter().map(|f| f.rmse).collect(),
        }
    }
}

pub struct TrainingLedger {
    path: PathBuf,
}

impl TrainingLedger {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn append(&self, entry: &LedgerEntry) -> io::Result<()> {
        let json = serde_json::to_string(entry)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        writeln!(file, "{json}")?;
        file.flush()
    }

    /// All entries, oldest first. Malformed lines are skipped.
    pub fn read_all(&self) -> io::Result<Vec<LedgerEntry>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }

        let reader = io::BufReader::new(fs::File::open(&self.path)?);
        let mut entries = Vec::new();
        for (n, line) in reader.lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<LedgerEntry>(&line) {
                Ok(entry) => entries.push(entry),
                Err(e) => warn!(line = n + 1, error = %e, "skipping malformed ledger line"),
            }
        }
        Ok(entries)
    }

    pub fn latest(&self) -> io::Result<Option<LedgerEntry>> {
        Ok(self.read_all()?.pop())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn entry(rmse: f64) -> LedgerEntry {
        LedgerEntry {
            trained_at: chrono::NaiveDate::from_ymd_opt(2024, 5, 1)
                .unwrap()
                .and_hms_opt(12, 0, 0)
                .unwrap(),
            artifact_id: "abc123".into(),
            artifact_path: PathBuf::from("models/model.json"),
            target: TargetColumn::TheoreticalQuantity,
            dataset_hash: "deadbeef".into(),
            n_rows: 100,
            n_dates: 20,
            selected_fold: 2,
            validation_rmse: rmse,
            validation_mae: rmse / 2.0,
            fold_rmse: vec![rmse + 1.0, rmse + 0.5, rmse],
        }
    }

    #[test]
    fn append_and_read_back() {
        let dir = TempDir::new().unwrap();
        let ledger = TrainingLedger::new(dir.path().join("nested").join("ledger.jsonl"));

        ledger.append(&entry(3.0)).unwrap();
        ledger.append(&entry(2.0)).unwrap();

        let all = ledger.read_all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0], entry(3.0));
        assert_eq!(ledger.latest().unwrap().unwrap().validation_rmse, 2.0);
    }

    #[test]
    fn malformed_lines_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ledger.jsonl");
        let ledger = TrainingLedger::new(&path);
        ledger.append(&entry(1.0)).unwrap();
        fs::write(&path, format!("{}\n{{broken\n\n", fs::read_to_string(&path).unwrap().trim()))
            .unwrap();

        assert_eq!(ledger.read_all().unwrap().len(), 1);
    }

    #[test]
    fn missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let ledger = TrainingLedger::new(dir.path().join("none.jsonl"));
        assert!(ledger.read_all().unwrap().is_empty());
        assert!(ledger.latest().unwrap().is_none());
    }
}
