//! Data layer: portfolio providers, ingest, Parquet warehouse, CSV import.

pub mod b3;
pub mod collect;
pub mod csv_io;
pub mod ingest;
pub mod provider;
pub mod schema;
pub mod warehouse;

pub use b3::{B3Config, B3Provider};
pub use collect::{collect_portfolio, import_csv, CollectSummary};
pub use provider::{DataError, DataSource, FetchResult, PortfolioProvider};
pub use warehouse::{PartitionMeta, PartitionStatus, Warehouse};
