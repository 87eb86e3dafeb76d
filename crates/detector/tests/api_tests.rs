//! Integration tests for the detector API endpoints

use account_detector::api::{create_router, AppState};
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use detector_lib::{
    forest::ForestParams,
    health::{Component, HealthRegistry},
    CsvDatasetStore, DetectorService, FileArtifactStore, StructuredLogger, TrainingConfig,
};
use serde_json::{json, Value};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;
use tower::ServiceExt;

fn test_account() -> Value {
    json!({
        "username_length": 12,
        "num_posts": 45,
        "num_followers": 234,
        "num_following": 156,
        "account_age_days": 120,
        "has_profile_picture": 1,
        "has_bio": 1,
        "engagement_ratio": 0.192,
        "is_verified": 0
    })
}

async fn setup_test_app(trained: bool) -> (Router, Arc<AppState>, TempDir) {
    let dir = TempDir::new().unwrap();
    let artifact_path = dir.path().join("model.json");
    setup_in(dir, artifact_path, trained).await
}

async fn setup_in(
    dir: TempDir,
    artifact_path: PathBuf,
    trained: bool,
) -> (Router, Arc<AppState>, TempDir) {
    let config = TrainingConfig {
        dataset_size: 1_200,
        forest: ForestParams {
            n_estimators: 10,
            ..ForestParams::default()
        },
        ..TrainingConfig::default()
    };
    let service = Arc::new(DetectorService::new(
        config,
        Arc::new(CsvDatasetStore::new(dir.path())),
        Arc::new(FileArtifactStore::new(artifact_path)),
        StructuredLogger::new("api-test"),
    ));
    if trained {
        service.train().unwrap();
    }

    let health_registry =
        HealthRegistry::with_components(&[Component::Classifier, Component::Trainer]);

    let state = Arc::new(AppState::new(service, health_registry));
    state.sync_health().await;
    (create_router(state.clone()), state, dir)
}

async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let value = serde_json::from_slice(&body).unwrap_or(Value::Null);
    (status, value)
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

#[tokio::test]
async fn test_home_lists_endpoints() {
    let (app, _state, _dir) = setup_test_app(false).await;
    let (status, body) = send(app, get("/")).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Fake Account Detector API");
    assert!(body["endpoints"]["/predict"].is_string());
}

#[tokio::test]
async fn test_predict_without_model_returns_503() {
    let (app, _state, _dir) = setup_test_app(false).await;
    let (status, body) = send(app, post_json("/predict", &test_account())).await;

    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["kind"], "artifact_unavailable");
    assert_eq!(body["error"], "Model not loaded. Please train the model first.");
}

#[tokio::test]
async fn test_model_info_without_model_returns_404() {
    let (app, _state, _dir) = setup_test_app(false).await;
    let (status, body) = send(app, get("/model-info")).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["kind"], "artifact_unavailable");
}

#[tokio::test]
async fn test_predict_sample_account() {
    let (app, _state, _dir) = setup_test_app(true).await;
    let (status, body) = send(app, post_json("/predict", &test_account())).await;

    assert_eq!(status, StatusCode::OK);
    let real = body["confidence"]["real_account"].as_f64().unwrap();
    let fake = body["confidence"]["fake_account"].as_f64().unwrap();
    assert!((real + fake - 1.0).abs() < 1e-9);
    assert_eq!(body["probability_fake"].as_f64().unwrap(), fake);
    assert_eq!(body["is_fake"].as_bool().unwrap(), body["prediction"] == 1);
    assert_eq!(body["input_data"], test_account());
}

#[tokio::test]
async fn test_predict_validation_errors_return_400() {
    let (app, _state, _dir) = setup_test_app(true).await;

    let mut missing = test_account();
    missing.as_object_mut().unwrap().remove("has_bio");
    let (status, body) = send(app.clone(), post_json("/predict", &missing)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Missing required field: has_bio");
    assert_eq!(body["kind"], "validation_error");

    let mut negative = test_account();
    negative["num_followers"] = json!(-1);
    let (status, body) = send(app, post_json("/predict", &negative)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "num_followers must be a non-negative number");
}

#[tokio::test]
async fn test_predict_empty_or_invalid_body_returns_400() {
    let (app, _state, _dir) = setup_test_app(true).await;

    for raw in ["", "{}", "not json", "[1, 2]"] {
        let request = Request::builder()
            .method("POST")
            .uri("/predict")
            .header("content-type", "application/json")
            .body(Body::from(raw))
            .unwrap();
        let (status, body) = send(app.clone(), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "body {:?}", raw);
        assert_eq!(body["error"], "No JSON data provided");
    }
}

#[tokio::test]
async fn test_train_then_model_info() {
    let (app, state, _dir) = setup_test_app(false).await;

    let (status, body) = send(app.clone(), post_json("/train", &json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Model retrained successfully");
    assert!(body["accuracy"].as_f64().unwrap() > 0.5);
    assert!(body["timestamp"].is_string());

    let (status, info) = send(app.clone(), get("/model-info")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(info["model_type"], "RandomForestClassifier");
    assert_eq!(info["features"].as_array().unwrap().len(), 9);
    assert_eq!(info["feature_importance"].as_array().unwrap().len(), 9);

    assert!(state.health_registry.readiness().await.ready);
}

#[tokio::test]
async fn test_health_reports_model_state() {
    let (app, _state, _dir) = setup_test_app(false).await;
    let (status, body) = send(app.clone(), get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["model_loaded"], false);
    assert_eq!(body["scaler_loaded"], false);
    assert_eq!(body["state"], "unloaded");
    assert_eq!(body["status"], "degraded");

    let (app, _state, _dir) = setup_test_app(true).await;
    let (_, body) = send(app, get("/health")).await;
    assert_eq!(body["model_loaded"], true);
    assert_eq!(body["state"], "ready");
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_failed_first_training_marks_store_unhealthy() {
    let dir = TempDir::new().unwrap();
    // A directory where the artifact file should go makes the final rename fail
    let artifact_path = dir.path().join("model.json");
    std::fs::create_dir(&artifact_path).unwrap();
    let (app, _state, _dir) = setup_in(dir, artifact_path, false).await;

    let (status, body) = send(app.clone(), post_json("/train", &json!({}))).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["kind"], "storage_failure");

    let (status, body) = send(app.clone(), get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["components"]["artifact_store"]["status"], "unhealthy");

    let (_, body) = send(app, get("/health")).await;
    assert_eq!(body["status"], "unhealthy");
    assert_eq!(body["model_loaded"], false);
}

#[tokio::test]
async fn test_readyz_follows_model_availability() {
    let (app, _state, _dir) = setup_test_app(false).await;
    let (status, body) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["ready"], false);

    let (app, _state, _dir) = setup_test_app(true).await;
    let (status, _) = send(app, get("/readyz")).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_healthz_returns_503_when_unhealthy() {
    let (app, state, _dir) = setup_test_app(true).await;
    state
        .health_registry
        .set_unhealthy(Component::Classifier, "corrupt model")
        .await;

    let (status, body) = send(app, get("/healthz")).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_returns_prometheus_format() {
    let (app, _state, _dir) = setup_test_app(true).await;
    let _ = send(app.clone(), post_json("/predict", &test_account())).await;

    let response = app.oneshot(get("/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").unwrap();
    assert!(content_type.to_str().unwrap().contains("text/plain"));

    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let text = String::from_utf8(body.to_vec()).unwrap();
    assert!(text.contains("fake_account_detector_prediction_latency_seconds_bucket"));
    assert!(text.contains("fake_account_detector_predictions_total"));
    assert!(text.contains("fake_account_detector_model_version_info"));
}

#[tokio::test]
async fn test_cors_headers_present() {
    let (app, _state, _dir) = setup_test_app(false).await;
    let request = Request::builder()
        .uri("/health")
        .header("origin", "http://localhost:3000")
        .body(Body::empty())
        .unwrap();
    let response = app.oneshot(request).await.unwrap();
    assert!(response
        .headers()
        .contains_key("access-control-allow-origin"));
}
