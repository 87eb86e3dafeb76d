//! Trained artifacts and the handle that serves them
//!
//! A `TrainedArtifact` pairs a fitted scaler with the forest trained on data
//! that scaler produced. The two are never swapped independently: readers
//! clone an `Arc` to one artifact and use both halves from it.

mod store;

pub use store::{compute_checksum, ArtifactStore, FileArtifactStore, ARTIFACT_FORMAT_VERSION};

use crate::forest::{ClassificationReport, FeatureImportance, ForestParams, RandomForest};
use crate::models::{FeatureVector, PredictionResult};
use crate::scaler::ScalerParameters;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, PoisonError, RwLock};

/// Distinguishes artifacts trained within the same second
static TRAINING_RUN: AtomicU64 = AtomicU64::new(0);

/// Scaler and classifier fitted together in one training run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainedArtifact {
    version: String,
    trained_at: DateTime<Utc>,
    scaler: ScalerParameters,
    classifier: RandomForest,
    evaluation: ClassificationReport,
    training_samples: usize,
    evaluation_samples: usize,
}

impl TrainedArtifact {
    pub(crate) fn new(
        scaler: ScalerParameters,
        classifier: RandomForest,
        evaluation: ClassificationReport,
        evaluation_samples: usize,
    ) -> Self {
        let trained_at = Utc::now();
        let run = TRAINING_RUN.fetch_add(1, Ordering::Relaxed) + 1;
        Self {
            version: format!("{}-{}", trained_at.format("%Y%m%d%H%M%S"), run),
            trained_at,
            training_samples: scaler.n_samples(),
            scaler,
            classifier,
            evaluation,
            evaluation_samples,
        }
    }

    /// Scale with this artifact's scaler, classify with this artifact's forest
    pub fn predict(&self, input: &FeatureVector) -> PredictionResult {
        let scaled = self.scaler.transform_one(&input.to_row());
        let probabilities = self.classifier.predict_proba(&scaled);
        PredictionResult::new(*input, probabilities, &self.version)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    pub fn scaler(&self) -> &ScalerParameters {
        &self.scaler
    }

    pub fn classifier(&self) -> &RandomForest {
        &self.classifier
    }

    pub fn evaluation(&self) -> &ClassificationReport {
        &self.evaluation
    }

    pub fn hyperparameters(&self) -> &ForestParams {
        self.classifier.params()
    }

    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        self.classifier.feature_importance()
    }

    pub fn training_samples(&self) -> usize {
        self.training_samples
    }

    pub fn evaluation_samples(&self) -> usize {
        self.evaluation_samples
    }
}

/// Lifecycle of the served artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServingState {
    Unloaded,
    Loading,
    Ready,
    Retraining,
}

impl ServingState {
    pub fn as_str(&self) -> &'static str {
        match self {
            ServingState::Unloaded => "unloaded",
            ServingState::Loading => "loading",
            ServingState::Ready => "ready",
            ServingState::Retraining => "retraining",
        }
    }
}

#[derive(Debug)]
struct Slot {
    artifact: Option<Arc<TrainedArtifact>>,
    state: ServingState,
}

/// Holds the artifact currently being served.
///
/// Readers take the lock only long enough to clone the `Arc`. Publishing a
/// new artifact is a single pointer swap under the write lock.
#[derive(Debug)]
pub struct ArtifactHandle {
    slot: RwLock<Slot>,
}

impl Default for ArtifactHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl ArtifactHandle {
    pub fn new() -> Self {
        Self {
            slot: RwLock::new(Slot {
                artifact: None,
                state: ServingState::Unloaded,
            }),
        }
    }

    /// Snapshot of the served artifact, if any
    pub fn current(&self) -> Option<Arc<TrainedArtifact>> {
        let slot = self.slot.read().unwrap_or_else(PoisonError::into_inner);
        slot.artifact.clone()
    }

    pub fn state(&self) -> ServingState {
        self.slot.read().unwrap_or_else(PoisonError::into_inner).state
    }

    /// Enter `Loading` (nothing served yet) or `Retraining` (keep serving)
    pub fn begin_update(&self) -> ServingState {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.state = if slot.artifact.is_some() {
            ServingState::Retraining
        } else {
            ServingState::Loading
        };
        slot.state
    }

    /// Swap in a new artifact and mark the handle ready
    pub fn publish(&self, artifact: TrainedArtifact) -> Arc<TrainedArtifact> {
        let artifact = Arc::new(artifact);
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.artifact = Some(Arc::clone(&artifact));
        slot.state = ServingState::Ready;
        artifact
    }

    /// Abandon an update; the previous artifact, if any, stays authoritative
    pub fn abort_update(&self) -> ServingState {
        let mut slot = self.slot.write().unwrap_or_else(PoisonError::into_inner);
        slot.state = if slot.artifact.is_some() {
            ServingState::Ready
        } else {
            ServingState::Unloaded
        };
        slot.state
    }
}
