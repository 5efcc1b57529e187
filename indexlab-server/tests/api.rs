//! Router tests driven with `tower::ServiceExt::oneshot`.

use std::sync::Arc;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tempfile::TempDir;
use tower::ServiceExt;

use indexlab_core::artifact::ModelArtifact;
use indexlab_core::data::{DataError, DataSource, FetchResult, PortfolioProvider, Warehouse};
use indexlab_core::domain::Observation;
use indexlab_core::features::FeatureConfig;
use indexlab_core::model::BoosterParams;
use indexlab_runner::predictor::PredictOptions;
use indexlab_runner::trainer::train;
use indexlab_server::{create_app, AppState};

// ── Fixtures ─────────────────────────────────────────────────────────

enum Upstream {
    Rows(Vec<Observation>),
    Unreachable,
}

struct FakeProvider(Upstream);

impl PortfolioProvider for FakeProvider {
    fn name(&self) -> &str {
        "fake"
    }

    fn fetch_portfolio(&self, index: &str) -> Result<FetchResult, DataError> {
        match &self.0 {
            Upstream::Rows(rows) => Ok(FetchResult {
                index: index.to_string(),
                reference_date: rows[0].reference_date,
                observations: rows.clone(),
                source: DataSource::B3Portfolio,
            }),
            Upstream::Unreachable => Err(DataError::NetworkUnreachable("connection refused".into())),
        }
    }
}

fn base_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap()
}

fn panel(days: usize) -> Vec<Observation> {
    let mut rows = Vec::new();
    for (e, code) in ["BBAS3", "PETR4", "VALE3"].iter().enumerate() {
        for d in 0..days {
            let qty = 2.0e6 * (e + 1) as f64 + 1.5e4 * d as f64;
            rows.push(Observation {
                entity_code: code.to_string(),
                asset_name: format!("{code} SA"),
                asset_type: "ON".into(),
                reference_date: base_date() + Duration::days(d as i64),
                theoretical_quantity: Some(qty),
                part_weight: Some(qty / 1.0e8),
            });
        }
    }
    rows
}

fn artifact() -> ModelArtifact {
    let params = BoosterParams {
        n_rounds: 30,
        learning_rate: 0.3,
        early_stopping_rounds: Some(5),
        ..BoosterParams::default()
    };
    train(&panel(20), &FeatureConfig::default(), 3, &params)
        .unwrap()
        .artifact
}

struct Harness {
    _dir: TempDir,
    app: Router,
}

fn harness(upstream: Upstream, with_model: bool, stored: &[Observation]) -> Harness {
    let dir = TempDir::new().unwrap();
    let warehouse = Warehouse::new(dir.path().join("warehouse"));
    if !stored.is_empty() {
        warehouse.append(stored, DataSource::CsvImport).unwrap();
    }
    let provider: Arc<dyn PortfolioProvider> = Arc::new(FakeProvider(upstream));
    let mut state = AppState::new(warehouse, provider, "IBOV", PredictOptions::default());
    if with_model {
        state = state.with_artifact(artifact()).unwrap();
    }
    Harness {
        _dir: dir,
        app: create_app(state),
    }
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn post_empty(uri: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// ── Health ───────────────────────────────────────────────────────────

#[tokio::test]
async fn health_reports_loaded_model() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let (status, body) = send(h.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["target"], "theoretical_quantity");
    assert_eq!(body["features"][0], "lag_1");
    assert!(body["artifact_id"].is_string());
}

#[tokio::test]
async fn health_without_model() {
    let h = harness(Upstream::Unreachable, false, &[]);
    let (status, body) = send(h.app, get("/health")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);
    assert!(body["artifact_id"].is_null());
}

// ── Predict ──────────────────────────────────────────────────────────

#[tokio::test]
async fn predict_returns_one_projection_per_entity() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let rows = panel(5);
    let (status, body) = send(h.app, post_json("/predict", &json!({ "rows": rows }))).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 3);
    for p in predictions {
        assert_eq!(p["reference_date"], "2024-03-05");
        assert_eq!(p["projected_date"], "2024-03-06");
        assert!(p["prediction"].is_f64());
    }
    assert_eq!(predictions[0]["cod"], "BBAS3");
}

#[tokio::test]
async fn predict_accepts_sparse_rows() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let body = json!({
        "rows": [
            { "cod": "PETR4", "data_referencia": "2024-03-20", "theoricalQty": 2.1e6 },
            { "cod": "PETR4", "data_referencia": "2024-03-21", "theoricalQty": 2.2e6 }
        ]
    });
    let (status, body) = send(h.app, post_json("/predict", &body)).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["predictions"][0]["last_value"], 2.2e6);
}

#[tokio::test]
async fn malformed_body_is_bad_request() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let (status, body) = send(h.app, post_json("/predict", &json!({ "rows": [{ "cod": 5 }] }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["status"], 400);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn empty_rows_is_bad_request() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let (status, _) = send(h.app, post_json("/predict", &json!({ "rows": [] }))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn duplicate_rows_are_bad_request() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let row = json!({ "cod": "VALE3", "data_referencia": "2024-03-20", "theoricalQty": 1.0 });
    let (status, body) = send(h.app, post_json("/predict", &json!({ "rows": [row.clone(), row] }))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("duplicate"));
}

#[tokio::test]
async fn predict_without_model_is_unavailable() {
    let h = harness(Upstream::Unreachable, false, &[]);
    let (status, body) = send(h.app, post_json("/predict", &json!({ "rows": panel(2) }))).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], 503);
}

#[tokio::test]
async fn latest_uses_warehouse_contents() {
    let h = harness(Upstream::Unreachable, true, &panel(8));
    let (status, body) = send(h.app, post_empty("/predict/latest")).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let predictions = body["predictions"].as_array().unwrap();
    assert_eq!(predictions.len(), 3);
    assert_eq!(predictions[0]["reference_date"], "2024-03-08");
}

#[tokio::test]
async fn latest_on_empty_warehouse_is_no_data() {
    let h = harness(Upstream::Unreachable, true, &[]);
    let (status, body) = send(h.app, post_empty("/predict/latest")).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("no data"));
}

#[tokio::test]
async fn history_scores_every_row() {
    let h = harness(Upstream::Unreachable, true, &panel(6));
    let (status, body) = send(h.app, get("/predict/history")).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    let rows = body["rows"].as_array().unwrap();
    assert_eq!(rows.len(), 18);
    assert_eq!(rows[0]["reference_date"], "2024-03-01");
    assert_eq!(rows[17]["reference_date"], "2024-03-06");
}

// ── Collect ──────────────────────────────────────────────────────────

#[tokio::test]
async fn collect_appends_to_warehouse() {
    let today: Vec<Observation> = panel(1);
    let h = harness(Upstream::Rows(today), false, &[]);
    let (status, body) = send(h.app, post_empty("/collect")).await;

    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["status"], "ok");
    assert_eq!(body["detail"]["rows"], 3);
    assert_eq!(body["detail"]["dates"][0], "2024-03-01");
}

#[tokio::test]
async fn collect_upstream_failure_is_bad_gateway() {
    let h = harness(Upstream::Unreachable, false, &[]);
    let (status, body) = send(h.app, post_empty("/collect")).await;

    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["status"], 502);
}

#[tokio::test]
async fn unknown_route_is_not_found() {
    let h = harness(Upstream::Unreachable, false, &[]);
    let (status, body) = send(h.app, get("/nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["status"], 404);
    assert!(body["error"].as_str().unwrap().contains("/nope"));
}
