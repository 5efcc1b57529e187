//! Route handlers.
//!
//! - [`health`]: liveness and loaded-model details
//! - [`collect`]: upstream collection trigger
//! - [`predict`]: projections and fitted history

pub mod collect;
pub mod health;
pub mod predict;

use crate::error::{AppError, AppResult};

/// Run synchronous work (Parquet reads, upstream HTTP) off the async runtime.
pub(crate) async fn blocking<T, F>(work: F) -> AppResult<T>
where
    F: FnOnce() -> AppResult<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(work)
        .await
        .map_err(|e| AppError::Internal(format!("worker task failed: {e}")))?
}
