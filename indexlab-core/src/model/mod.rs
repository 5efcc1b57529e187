//! Second-order gradient-boosted regression trees.
//!
//! Squared-error objective (gradient `pred - y`, hessian 1), shrinkage,
//! row and column subsampling, L2-regularized leaf weights and early
//! stopping on an evaluation set.

pub mod booster;
pub mod matrix;
pub mod metrics;
pub mod tree;

use thiserror::Error;

pub use booster::{BoosterParams, FitReport, GradientBooster};
pub use matrix::Matrix;
pub use metrics::{mae, rmse};
pub use tree::RegressionTree;

#[derive(Debug, Error)]
pub enum ModelError {
    #[error("training set is empty")]
    EmptyTrainingSet,

    #[error("shape mismatch: expected {expected}, got {actual}")]
    ShapeMismatch { expected: String, actual: String },

    #[error("target contains a non-finite value at row {0}")]
    NonFiniteTarget(usize),

    #[error("invalid booster parameter: {0}")]
    InvalidParams(String),
}
