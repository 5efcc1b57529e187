//! Expanding-window temporal splits over distinct reference dates.
//!
//! With `n` dates and `k` folds the validation block size is
//! `b = n / (k + 1)`. Fold `j` validates on dates
//! `[n - (k - j)·b, n - (k - j - 1)·b)` and trains on every earlier date:
//!
//! - Fold 0: train = [0 .. n - k·b],       validate = next b dates
//! - Fold 1: train = [0 .. n - (k-1)·b],   validate = next b dates
//! - ...
//! - Fold k-1 validates on the last b dates.
//!
//! Splitting on dates keeps every entity's row for a date on the same side.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SplitError {
    #[error("fold count must be >= 1")]
    ZeroFolds,

    #[error("insufficient data: {n_dates} distinct dates, need at least {required} for {n_folds} folds")]
    InsufficientData {
        n_dates: usize,
        n_folds: usize,
        required: usize,
    },
}

/// Date-index ranges of one fold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FoldSpec {
    pub fold_index: usize,
    /// Train start date index (inclusive). Always 0.
    pub train_start: usize,
    /// Train end date index (exclusive).
    pub train_end: usize,
    /// Validation start date index (inclusive), equal to `train_end`.
    pub validation_start: usize,
    /// Validation end date index (exclusive).
    pub validation_end: usize,
}

impl FoldSpec {
    pub fn is_train(&self, date_index: usize) -> bool {
        (self.train_start..self.train_end).contains(&date_index)
    }

    pub fn is_validation(&self, date_index: usize) -> bool {
        (self.validation_start..self.validation_end).contains(&date_index)
    }
}

pub fn create_folds(n_dates: usize, n_folds: usize) -> Result<Vec<FoldSpec>, SplitError> {
    if n_folds == 0 {
        return Err(SplitError::ZeroFolds);
    }
    let required = n_folds + 1;
    if n_dates < required {
        return Err(SplitError::InsufficientData {
            n_dates,
            n_folds,
            required,
        });
    }

    let block = n_dates / required;
    Ok((0..n_folds)
        .map(|j| {
            let validation_start = n_dates - (n_folds - j) * block;
            FoldSpec {
                fold_index: j,
                train_start: 0,
                train_end: validation_start,
                validation_start,
                validation_end: validation_start + block,
            }
        })
        .collect())
}

/// Sorted distinct dates and a lookup from date to its index.
#[derive(Debug, Clone)]
pub struct DateIndex {
    dates: Vec<NaiveDate>,
}

impl DateIndex {
    pub fn new(dates: impl IntoIterator<Item = NaiveDate>) -> Self {
        let mut dates: Vec<NaiveDate> = dates.into_iter().collect();
        dates.sort();
        dates.dedup();
        Self { dates }
    }

    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn index_of(&self, date: NaiveDate) -> Option<usize> {
        self.dates.binary_search(&date).ok()
    }

    pub fn date(&self, index: usize) -> Option<NaiveDate> {
        self.dates.get(index).copied()
    }
}
