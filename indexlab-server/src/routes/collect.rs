//! `POST /collect`: fetch today's composition and append it to the warehouse.

use axum::extract::State;
use axum::Json;
use serde::Serialize;
use tracing::info;

use indexlab_core::data::{collect_portfolio, CollectSummary};

use super::blocking;
use crate::error::AppResult;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CollectResponse {
    pub status: &'static str,
    pub detail: CollectSummary,
}

pub async fn collect(State(state): State<AppState>) -> AppResult<Json<CollectResponse>> {
    let index = state.index.clone();
    let summary = blocking(move || {
        Ok(collect_portfolio(
            state.provider.as_ref(),
            &state.warehouse,
            &state.index,
        )?)
    })
    .await?;

    info!(%index, rows = summary.rows, "collect request completed");
    Ok(Json(CollectResponse {
        status: "ok",
        detail: summary,
    }))
}
