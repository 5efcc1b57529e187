//! Handler errors and their HTTP status codes.

use axum::extract::rejection::JsonRejection;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use indexlab_core::data::DataError;
use indexlab_runner::data_loader::LoadError;
use indexlab_runner::predictor::PredictError;

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// 400
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// 404
    #[error("Not found: {0}")]
    NotFound(String),

    /// 502, the exchange endpoint failed or changed shape.
    #[error("Upstream error: {0}")]
    Upstream(String),

    /// 500
    #[error("Internal error: {0}")]
    Internal(String),

    /// 503
    #[error("Model not loaded")]
    ModelNotLoaded,
}

impl AppError {
    pub fn status(&self) -> StatusCode {
        match self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Upstream(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::ModelNotLoaded => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Upstream(msg)
            | AppError::Internal(msg) => msg,
            AppError::ModelNotLoaded => "no model artifact loaded; train one first".into(),
        };

        let body = axum::Json(json!({
            "error": message,
            "status": status.as_u16()
        }));

        (status, body).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}

impl From<DataError> for AppError {
    fn from(e: DataError) -> Self {
        match e {
            DataError::NoData(_) | DataError::Validation(_) | DataError::Csv(_) => {
                AppError::BadRequest(e.to_string())
            }
            DataError::NetworkUnreachable(_)
            | DataError::UpstreamStatus { .. }
            | DataError::ResponseFormatChanged(_) => AppError::Upstream(e.to_string()),
            DataError::Warehouse(_) | DataError::Parquet(_) | DataError::Other(_) => {
                AppError::Internal(e.to_string())
            }
        }
    }
}

impl From<LoadError> for AppError {
    fn from(e: LoadError) -> Self {
        match e {
            LoadError::NoData(_) => AppError::BadRequest(e.to_string()),
            LoadError::Data(inner) => inner.into(),
        }
    }
}

impl From<PredictError> for AppError {
    fn from(e: PredictError) -> Self {
        if e.is_client_error() {
            AppError::BadRequest(e.to_string())
        } else {
            AppError::Internal(e.to_string())
        }
    }
}

/// Result type alias for handlers.
pub type AppResult<T> = Result<T, AppError>;
