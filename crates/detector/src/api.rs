//! HTTP API for predictions, training, model info, health and metrics

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use detector_lib::{
    health::{Component, HealthRegistry},
    DetectorError, DetectorService, ErrorKind, PredictionResult,
};
use prometheus::{Encoder, TextEncoder};
use serde::Serialize;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info};

const API_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Shared application state
pub struct AppState {
    pub service: Arc<DetectorService>,
    pub health_registry: HealthRegistry,
}

impl AppState {
    pub fn new(service: Arc<DetectorService>, health_registry: HealthRegistry) -> Self {
        Self {
            service,
            health_registry,
        }
    }

    /// Mirror the served model into the health registry
    pub async fn sync_health(&self) {
        let served = self.service.health();
        self.health_registry.record_serving(served.model_version).await;
    }
}

/// Error body: `{"error": reason, "kind": kind}`
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
    kind: ErrorKind,
}

impl ApiError {
    /// Map a detector error; `unavailable` is the status for a missing model
    fn from_detector(err: &DetectorError, unavailable: StatusCode) -> Self {
        let status = match err.kind() {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            ErrorKind::ArtifactUnavailable => unavailable,
            ErrorKind::TrainingFailure | ErrorKind::StorageFailure => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        Self {
            status,
            message: err.to_string(),
            kind: err.kind(),
        }
    }

    fn no_json() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: "No JSON data provided".to_string(),
            kind: ErrorKind::ValidationError,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(json!({
            "error": self.message,
            "kind": self.kind,
        }));
        (self.status, body).into_response()
    }
}

#[derive(Debug, Serialize)]
struct Confidence {
    real_account: f64,
    fake_account: f64,
}

#[derive(Debug, Serialize)]
struct PredictResponse {
    prediction: u8,
    is_fake: bool,
    confidence: Confidence,
    probability_fake: f64,
    probability_real: f64,
    model_version: String,
    input_data: Value,
}

impl PredictResponse {
    fn new(result: PredictionResult, input_data: Value) -> Self {
        Self {
            prediction: result.prediction.into(),
            is_fake: result.is_fake,
            confidence: Confidence {
                real_account: result.probability_real,
                fake_account: result.probability_fake,
            },
            probability_fake: result.probability_fake,
            probability_real: result.probability_real,
            model_version: result.model_version,
            input_data,
        }
    }
}

async fn home() -> impl IntoResponse {
    let endpoints: BTreeMap<&str, &str> = [
        ("/predict", "POST - Predict if an account is fake"),
        ("/train", "POST - Retrain the model"),
        ("/model-info", "GET - Get model information"),
        ("/health", "GET - Model and scaler status"),
        ("/healthz", "GET - Liveness probe"),
        ("/readyz", "GET - Readiness probe"),
        ("/metrics", "GET - Prometheus metrics"),
    ]
    .into_iter()
    .collect();

    Json(json!({
        "message": "Fake Account Detector API",
        "version": API_VERSION,
        "endpoints": endpoints,
    }))
}

async fn predict(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<PredictResponse>, ApiError> {
    let data: Value = serde_json::from_slice(&body).map_err(|_| ApiError::no_json())?;
    match &data {
        Value::Object(map) if !map.is_empty() => {}
        _ => return Err(ApiError::no_json()),
    }

    let result = state
        .service
        .predict(&data)
        .map_err(|e| ApiError::from_detector(&e, StatusCode::SERVICE_UNAVAILABLE))?;
    Ok(Json(PredictResponse::new(result, data)))
}

async fn train(State(state): State<Arc<AppState>>) -> Result<Json<Value>, ApiError> {
    info!("Starting model retraining");
    let service = Arc::clone(&state.service);
    let outcome = tokio::task::spawn_blocking(move || service.train())
        .await
        .map_err(|e| {
            error!(error = %e, "Training task panicked");
            ApiError::from_detector(
                &DetectorError::training(e.to_string()),
                StatusCode::INTERNAL_SERVER_ERROR,
            )
        })?;

    match outcome {
        Ok(report) => {
            state.health_registry.set_healthy(Component::Trainer).await;
            state
                .health_registry
                .set_healthy(Component::ArtifactStore)
                .await;
            state.sync_health().await;
            Ok(Json(json!({
                "message": "Model retrained successfully",
                "accuracy": report.accuracy,
                "timestamp": report.trained_at.to_rfc3339(),
                "version": report.version,
            })))
        }
        Err(e) => {
            let component = match e.kind() {
                ErrorKind::StorageFailure => Component::ArtifactStore,
                _ => Component::Trainer,
            };
            // A previous model still serves after a failed retrain
            if state.service.health().model_loaded {
                state
                    .health_registry
                    .set_degraded(component, e.to_string())
                    .await;
            } else {
                state
                    .health_registry
                    .set_unhealthy(component, e.to_string())
                    .await;
            }
            state.sync_health().await;
            Err(ApiError::from_detector(&e, StatusCode::INTERNAL_SERVER_ERROR))
        }
    }
}

async fn model_info(State(state): State<Arc<AppState>>) -> Result<impl IntoResponse, ApiError> {
    let info = state
        .service
        .model_info()
        .map_err(|e| ApiError::from_detector(&e, StatusCode::NOT_FOUND))?;
    Ok(Json(info))
}

async fn health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let served = state.service.health();
    let overall = state.health_registry.health().await.status;
    Json(json!({
        "status": overall,
        "model_loaded": served.model_loaded,
        "scaler_loaded": served.scaler_loaded,
        "state": served.state,
        "model_version": served.model_version,
    }))
}

/// Liveness: 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;
    let status_code = if health.status.is_operational() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(health))
}

/// Readiness: 200 once a model is being served
async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;
    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status_code, Json(readiness))
}

async fn metrics() -> Response {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    if let Err(e) = encoder.encode(&metric_families, &mut buffer) {
        error!(error = %e, "Failed to encode metrics");
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    (
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    )
        .into_response()
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(home))
        .route("/predict", post(predict))
        .route("/train", post(train))
        .route("/model-info", get(model_info))
        .route("/health", get(health))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}

/// Start the API server, returning when `shutdown` resolves
pub async fn serve(
    port: u16,
    state: Arc<AppState>,
    shutdown: impl std::future::Future<Output = ()> + Send + 'static,
) -> anyhow::Result<()> {
    let app = create_router(state);

    let addr = format!("0.0.0.0:{}", port);
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
