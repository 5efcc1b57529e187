use serde::{Deserialize, Serialize};

use super::ModelError;

/// Dense row-major feature matrix. Missing values are NaN.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Matrix {
    data: Vec<f64>,
    n_rows: usize,
    n_cols: usize,
}

impl Matrix {
    pub fn new(data: Vec<f64>, n_rows: usize, n_cols: usize) -> Result<Self, ModelError> {
        if data.len() != n_rows * n_cols {
            return Err(ModelError::ShapeMismatch {
                expected: format!("{n_rows}x{n_cols} = {} values", n_rows * n_cols),
                actual: format!("{} values", data.len()),
            });
        }
        Ok(Self {
            data,
            n_rows,
            n_cols,
        })
    }

    /// Build from equal-length rows.
    pub fn from_rows(rows: &[Vec<f64>], n_cols: usize) -> Result<Self, ModelError> {
        let mut data = Vec::with_capacity(rows.len() * n_cols);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_cols {
                return Err(ModelError::ShapeMismatch {
                    expected: format!("{n_cols} columns"),
                    actual: format!("{} columns at row {i}", row.len()),
                });
            }
            data.extend_from_slice(row);
        }
        Self::new(data, rows.len(), n_cols)
    }

    /// Subset of rows, in the given order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        let mut data = Vec::with_capacity(indices.len() * self.n_cols);
        for &i in indices {
            data.extend_from_slice(self.row(i));
        }
        Self {
            data,
            n_rows: indices.len(),
            n_cols: self.n_cols,
        }
    }

    #[inline]
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.n_cols..(i + 1) * self.n_cols]
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[row * self.n_cols + col]
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    pub fn is_empty(&self) -> bool {
        self.n_rows == 0
    }
}
