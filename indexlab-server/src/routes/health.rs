//! `GET /health`

use axum::extract::State;
use axum::Json;
use serde::Serialize;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub model_loaded: bool,
    pub artifact_id: Option<String>,
    pub target: Option<String>,
    /// Feature columns in the order the model consumes them.
    pub features: Vec<String>,
    pub trained_at: Option<String>,
    pub uptime_secs: u64,
}

/// Always 200 while the process is up; reports whether a model is loaded.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    let artifact = state.artifact.as_deref();
    Json(HealthResponse {
        status: "ok",
        model_loaded: artifact.is_some(),
        artifact_id: state.artifact_id.clone(),
        target: artifact.map(|a| a.target().to_string()),
        features: artifact.map(|a| a.feature_names.clone()).unwrap_or_default(),
        trained_at: artifact.map(|a| a.metadata.trained_at.to_string()),
        uptime_secs: state.uptime_secs(),
    })
}
