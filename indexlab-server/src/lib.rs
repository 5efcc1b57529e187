//! IndexLab Server: axum HTTP surface over the warehouse and the trained model.
//!
//! - [`app`]: router and middleware
//! - [`state`]: shared state (artifact, warehouse, upstream provider)
//! - [`error`]: `AppError` with HTTP status mapping
//! - [`routes`]: health, collection and prediction handlers
//!
//! Warehouse reads and upstream fetches are synchronous; handlers run them
//! on tokio's blocking pool.

pub mod app;
pub mod error;
pub mod routes;
pub mod state;

pub use app::create_app;
pub use error::{AppError, AppResult};
pub use state::AppState;

use tracing::{info, warn};

/// Bind `addr` and serve until Ctrl-C.
pub async fn serve(state: AppState, addr: &str) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(addr = %listener.local_addr()?, model_loaded = state.artifact.is_some(), "listening");

    axum::serve(listener, create_app(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to install Ctrl-C handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}
