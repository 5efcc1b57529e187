//! Router construction.
//!
//! Routes:
//! - `GET /health` - liveness plus the loaded artifact
//! - `POST /collect` - fetch today's composition and append it to the warehouse
//! - `POST /predict` - project the next value for the supplied rows
//! - `POST /predict/latest` - project from the warehouse contents
//! - `GET /predict/history` - fitted values for every warehouse row

use axum::http::Uri;
use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::error::AppError;
use crate::routes::{collect, health, predict};
use crate::state::AppState;

/// Create the application with all routes.
pub fn create_app(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/collect", post(collect::collect))
        .route("/predict", post(predict::predict))
        .route("/predict/latest", post(predict::predict_latest))
        .route("/predict/history", get(predict::history))
        .fallback(not_found)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn not_found(uri: Uri) -> AppError {
    AppError::NotFound(format!("no route for {}", uri.path()))
}
