//! Prediction routes.
//!
//! `POST /predict` scores caller-supplied rows. `POST /predict/latest` and
//! `GET /predict/history` read the warehouse instead.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

use indexlab_core::domain::Observation;
use indexlab_runner::data_loader::load_observations;
use indexlab_runner::predictor::{fitted_history, project_next, FittedValue, Projection};

use super::blocking;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct PredictRequest {
    pub rows: Vec<Observation>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub artifact_id: Option<String>,
    pub target: String,
    pub predictions: Vec<Projection>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HistoryResponse {
    pub artifact_id: Option<String>,
    pub target: String,
    pub rows: Vec<FittedValue>,
}

/// One projection per entity in the request body.
pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<PredictRequest>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(request) = payload?;
    let artifact = state.model()?;
    let predictions = project_next(&artifact, &request.rows, state.predict)?;

    Ok(Json(PredictResponse {
        artifact_id: state.artifact_id.clone(),
        target: artifact.target().to_string(),
        predictions,
    }))
}

/// One projection per entity, from everything in the warehouse.
pub async fn predict_latest(State(state): State<AppState>) -> AppResult<Json<PredictResponse>> {
    let artifact = state.model()?;
    let options = state.predict;
    let warehouse = state.warehouse.clone();
    let model = artifact.clone();

    let predictions = blocking(move || {
        let loaded = load_observations(&warehouse, None)?;
        Ok(project_next(&model, &loaded.observations, options)?)
    })
    .await?;

    Ok(Json(PredictResponse {
        artifact_id: state.artifact_id.clone(),
        target: artifact.target().to_string(),
        predictions,
    }))
}

/// In-sample fitted values for every warehouse row, ordered by date.
pub async fn history(State(state): State<AppState>) -> AppResult<Json<HistoryResponse>> {
    let artifact = state.model()?;
    let warehouse = state.warehouse.clone();
    let model = artifact.clone();

    let rows = blocking(move || {
        let loaded = load_observations(&warehouse, None)?;
        Ok(fitted_history(&model, &loaded.observations)?)
    })
    .await?;

    Ok(Json(HistoryResponse {
        artifact_id: state.artifact_id.clone(),
        target: artifact.target().to_string(),
        rows,
    }))
}
