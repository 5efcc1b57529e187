//! IndexLab Core: domain types, data layer, features, boosted trees, artifacts.
//!
//! - Observations of daily index composition and their content hashes
//! - Portfolio providers (B3 endpoint), ingest, Parquet warehouse, CSV import
//! - Leakage-free per-entity lag / rolling features
//! - Second-order gradient-boosted regression trees
//! - Model artifacts that pin the training feature order

pub mod artifact;
pub mod data;
pub mod domain;
pub mod features;
pub mod model;
