//! Prediction service
//!
//! Owns the artifact handle and serializes training runs. Predictions never
//! wait on training: they snapshot the current artifact and score against it.

use crate::artifact::{ArtifactHandle, ArtifactStore, ServingState, TrainedArtifact};
use crate::dataset::DatasetStore;
use crate::error::{DetectorError, Result};
use crate::forest::{ClassificationReport, FeatureImportance, ForestParams};
use crate::models::PredictionResult;
use crate::observability::{DetectorMetrics, StructuredLogger};
use crate::schema;
use crate::training::{TrainingConfig, TrainingOrchestrator, TrainingReport};
use crate::validator;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;
use tracing::{info, warn};

pub const MODEL_TYPE: &str = "RandomForestClassifier";

/// Description of the served model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelInfo {
    pub model_type: String,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub n_estimators: usize,
    pub max_depth: usize,
    pub features: Vec<String>,
    /// Ranked from most to least important
    pub feature_importance: Vec<FeatureImportance>,
    pub hyperparameters: ForestParams,
    pub evaluation: ClassificationReport,
    pub training_samples: usize,
    pub evaluation_samples: usize,
}

impl ModelInfo {
    fn from_artifact(artifact: &TrainedArtifact) -> Self {
        let params = artifact.hyperparameters().clone();
        Self {
            model_type: MODEL_TYPE.to_string(),
            version: artifact.version().to_string(),
            trained_at: artifact.trained_at(),
            n_estimators: params.n_estimators,
            max_depth: params.max_depth,
            features: schema::feature_names().into_iter().map(String::from).collect(),
            feature_importance: artifact.feature_importance(),
            hyperparameters: params,
            evaluation: artifact.evaluation().clone(),
            training_samples: artifact.training_samples(),
            evaluation_samples: artifact.evaluation_samples(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceHealth {
    pub model_loaded: bool,
    pub scaler_loaded: bool,
    pub state: ServingState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model_version: Option<String>,
}

/// Where the served artifact came from at startup
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartupSource {
    Loaded,
    Trained,
}

pub struct DetectorService {
    handle: ArtifactHandle,
    trainer: TrainingOrchestrator,
    artifacts: Arc<dyn ArtifactStore>,
    training_lock: Mutex<()>,
    metrics: DetectorMetrics,
    logger: StructuredLogger,
}

impl DetectorService {
    pub fn new(
        config: TrainingConfig,
        datasets: Arc<dyn DatasetStore>,
        artifacts: Arc<dyn ArtifactStore>,
        logger: StructuredLogger,
    ) -> Self {
        let trainer =
            TrainingOrchestrator::new(config, datasets, Arc::clone(&artifacts), logger.clone());
        Self {
            handle: ArtifactHandle::new(),
            trainer,
            artifacts,
            training_lock: Mutex::new(()),
            metrics: DetectorMetrics::new(),
            logger,
        }
    }

    /// Serve the persisted artifact, if there is one
    pub fn load(&self) -> Result<Option<Arc<TrainedArtifact>>> {
        let _guard = self
            .training_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.handle.begin_update();
        match self.artifacts.load() {
            Ok(Some(artifact)) => {
                let artifact = self.handle.publish(artifact);
                self.metrics
                    .set_model(artifact.version(), artifact.evaluation().accuracy);
                self.logger
                    .log_model_loaded(artifact.version(), &self.artifacts.location());
                Ok(Some(artifact))
            }
            Ok(None) => {
                self.handle.abort_update();
                Ok(None)
            }
            Err(e) => {
                self.handle.abort_update();
                Err(e)
            }
        }
    }

    /// Startup path: load the persisted artifact, train one if that fails
    pub fn load_or_train(&self) -> Result<StartupSource> {
        match self.load() {
            Ok(Some(_)) => return Ok(StartupSource::Loaded),
            Ok(None) => info!("No trained model found, training a new one"),
            Err(e) => warn!(error = %e, "Failed to load persisted model, training a new one"),
        }
        self.train()?;
        Ok(StartupSource::Trained)
    }

    /// Run a full training cycle and publish the result. Blocking; concurrent
    /// callers run one after another.
    pub fn train(&self) -> Result<TrainingReport> {
        let _guard = self
            .training_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        self.metrics.inc_training_runs();
        let state = self.handle.begin_update();
        info!(state = state.as_str(), "Training run starting");

        match self.trainer.train() {
            Ok(outcome) => {
                self.metrics.observe_training_duration(outcome.report.duration_secs);
                let artifact = self.handle.publish(outcome.artifact);
                self.metrics
                    .set_model(artifact.version(), outcome.report.accuracy);
                self.logger.log_model_loaded(artifact.version(), "training");
                Ok(outcome.report)
            }
            Err(e) => {
                self.metrics.inc_training_failures();
                let state = self.handle.abort_update();
                let kept = self.handle.current();
                self.logger
                    .log_training_failed(&e.to_string(), kept.as_ref().map(|a| a.version()));
                warn!(state = state.as_str(), "Training run abandoned");
                Err(e)
            }
        }
    }

    /// Validate `raw` and score it against the current artifact
    pub fn predict(&self, raw: &Value) -> Result<PredictionResult> {
        let started = Instant::now();

        let input = match validator::validate_value(raw) {
            Ok(input) => input,
            Err(e) => {
                self.metrics.inc_validation_failures();
                if let DetectorError::Validation { field, reason } = &e {
                    self.logger.log_validation_failure(field, reason);
                }
                return Err(e);
            }
        };

        let Some(artifact) = self.handle.current() else {
            self.metrics.inc_prediction_errors();
            return Err(DetectorError::ArtifactUnavailable);
        };

        let result = artifact.predict(&input);
        let elapsed = started.elapsed().as_secs_f64();
        self.metrics.observe_prediction_latency(elapsed);
        self.metrics
            .inc_predictions(if result.is_fake { "fake" } else { "real" });
        self.logger.log_prediction(&result, elapsed * 1000.0);
        Ok(result)
    }

    pub fn model_info(&self) -> Result<ModelInfo> {
        self.handle
            .current()
            .map(|artifact| ModelInfo::from_artifact(&artifact))
            .ok_or(DetectorError::ArtifactUnavailable)
    }

    pub fn health(&self) -> ServiceHealth {
        let current = self.handle.current();
        ServiceHealth {
            model_loaded: current.is_some(),
            scaler_loaded: current.is_some(),
            state: self.handle.state(),
            model_version: current.map(|a| a.version().to_string()),
        }
    }

    pub fn state(&self) -> ServingState {
        self.handle.state()
    }

    pub fn current_artifact(&self) -> Option<Arc<TrainedArtifact>> {
        self.handle.current()
    }
}
