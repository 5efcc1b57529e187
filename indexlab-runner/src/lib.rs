//! IndexLab Runner: configuration, temporal cross-validation, prediction.
//!
//! - TOML pipeline configuration with environment overrides
//! - Warehouse loading with explicit no-data errors
//! - Expanding-window date splits and per-fold boosted models
//! - One-step-ahead projection and in-sample fitted values
//! - JSONL training ledger and CSV export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod ledger;
pub mod pipeline;
pub mod predictor;
pub mod splitter;
pub mod trainer;
