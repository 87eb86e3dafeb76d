//! Observability for the detector
//!
//! Provides:
//! - Prometheus metrics (prediction and training latency, counters, model version)
//! - Structured JSON logging with tracing

use crate::forest::{ClassificationReport, FeatureImportance};
use crate::models::PredictionResult;
use prometheus::{
    register_gauge, register_gauge_vec, register_histogram, register_int_counter,
    register_int_counter_vec, Gauge, GaugeVec, Histogram, IntCounter, IntCounterVec,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for single predictions (seconds)
const PREDICTION_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25,
];

/// Histogram buckets for full training runs (seconds)
const TRAINING_BUCKETS: &[f64] = &[0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0];

static GLOBAL_METRICS: OnceLock<DetectorMetricsInner> = OnceLock::new();

struct DetectorMetricsInner {
    prediction_latency_seconds: Histogram,
    training_duration_seconds: Histogram,
    predictions_total: IntCounterVec,
    validation_failures: IntCounter,
    prediction_errors: IntCounter,
    training_runs: IntCounter,
    training_failures: IntCounter,
    model_version_info: GaugeVec,
    model_accuracy: Gauge,
}

impl DetectorMetricsInner {
    fn new() -> Self {
        Self {
            prediction_latency_seconds: register_histogram!(
                "fake_account_detector_prediction_latency_seconds",
                "Time spent validating, scaling and classifying one account",
                PREDICTION_BUCKETS.to_vec()
            )
            .expect("Failed to register prediction_latency_seconds"),

            training_duration_seconds: register_histogram!(
                "fake_account_detector_training_duration_seconds",
                "Wall time of a full training run",
                TRAINING_BUCKETS.to_vec()
            )
            .expect("Failed to register training_duration_seconds"),

            predictions_total: register_int_counter_vec!(
                "fake_account_detector_predictions_total",
                "Predictions served, by predicted label",
                &["label"]
            )
            .expect("Failed to register predictions_total"),

            validation_failures: register_int_counter!(
                "fake_account_detector_validation_failures_total",
                "Prediction requests rejected by input validation"
            )
            .expect("Failed to register validation_failures"),

            prediction_errors: register_int_counter!(
                "fake_account_detector_prediction_errors_total",
                "Prediction requests that failed for reasons other than validation"
            )
            .expect("Failed to register prediction_errors"),

            training_runs: register_int_counter!(
                "fake_account_detector_training_runs_total",
                "Training runs started"
            )
            .expect("Failed to register training_runs"),

            training_failures: register_int_counter!(
                "fake_account_detector_training_failures_total",
                "Training runs that failed"
            )
            .expect("Failed to register training_failures"),

            model_version_info: register_gauge_vec!(
                "fake_account_detector_model_version_info",
                "Information about the model currently being served",
                &["version"]
            )
            .expect("Failed to register model_version_info"),

            model_accuracy: register_gauge!(
                "fake_account_detector_model_accuracy",
                "Held-out accuracy of the model currently being served"
            )
            .expect("Failed to register model_accuracy"),
        }
    }
}

/// Handle to the process-wide detector metrics.
///
/// Clones share the same underlying Prometheus collectors.
#[derive(Clone)]
pub struct DetectorMetrics {
    _private: (),
}

impl Default for DetectorMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl DetectorMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &DetectorMetricsInner {
        GLOBAL_METRICS.get_or_init(DetectorMetricsInner::new)
    }

    pub fn observe_prediction_latency(&self, duration_secs: f64) {
        self.inner().prediction_latency_seconds.observe(duration_secs);
    }

    pub fn observe_training_duration(&self, duration_secs: f64) {
        self.inner().training_duration_seconds.observe(duration_secs);
    }

    pub fn inc_predictions(&self, label: &str) {
        self.inner()
            .predictions_total
            .with_label_values(&[label])
            .inc();
    }

    pub fn inc_validation_failures(&self) {
        self.inner().validation_failures.inc();
    }

    pub fn inc_prediction_errors(&self) {
        self.inner().prediction_errors.inc();
    }

    pub fn inc_training_runs(&self) {
        self.inner().training_runs.inc();
    }

    pub fn inc_training_failures(&self) {
        self.inner().training_failures.inc();
    }

    /// Point the version gauge at the model now being served
    pub fn set_model(&self, version: &str, accuracy: f64) {
        self.inner().model_version_info.reset();
        self.inner()
            .model_version_info
            .with_label_values(&[version])
            .set(1.0);
        self.inner().model_accuracy.set(accuracy);
    }
}

/// Structured logger for detector events
///
/// Every record carries an `event` field so log pipelines can filter on it.
#[derive(Clone)]
pub struct StructuredLogger {
    instance: String,
}

impl StructuredLogger {
    pub fn new(instance: impl Into<String>) -> Self {
        Self {
            instance: instance.into(),
        }
    }

    pub fn log_prediction(&self, result: &PredictionResult, latency_ms: f64) {
        info!(
            event = "prediction_made",
            instance = %self.instance,
            is_fake = result.is_fake,
            probability_fake = result.probability_fake,
            probability_real = result.probability_real,
            model_version = %result.model_version,
            latency_ms = latency_ms,
            "Account scored"
        );
    }

    pub fn log_validation_failure(&self, field: &str, reason: &str) {
        info!(
            event = "validation_failed",
            instance = %self.instance,
            field = %field,
            reason = %reason,
            "Rejected prediction input"
        );
    }

    pub fn log_training_started(&self, dataset_size: usize, seed: u64) {
        info!(
            event = "training_started",
            instance = %self.instance,
            dataset_size = dataset_size,
            seed = seed,
            "Training run started"
        );
    }

    pub fn log_training_completed(
        &self,
        version: &str,
        report: &ClassificationReport,
        duration_secs: f64,
    ) {
        info!(
            event = "training_completed",
            instance = %self.instance,
            model_version = %version,
            accuracy = report.accuracy,
            fake_precision = report.fake.precision,
            fake_recall = report.fake.recall,
            duration_secs = duration_secs,
            "Training run completed"
        );
    }

    pub fn log_training_failed(&self, reason: &str, kept_version: Option<&str>) {
        warn!(
            event = "training_failed",
            instance = %self.instance,
            reason = %reason,
            kept_version = kept_version.unwrap_or("none"),
            "Training run failed, keeping previous model"
        );
    }

    pub fn log_feature_importance(&self, version: &str, ranked: &[FeatureImportance]) {
        for (rank, entry) in ranked.iter().enumerate() {
            info!(
                event = "feature_importance",
                instance = %self.instance,
                model_version = %version,
                rank = rank + 1,
                feature = %entry.feature,
                importance = entry.importance,
                "Feature importance"
            );
        }
    }

    pub fn log_model_loaded(&self, version: &str, source: &str) {
        info!(
            event = "model_loaded",
            instance = %self.instance,
            model_version = %version,
            source = %source,
            "Model is now being served"
        );
    }

    pub fn log_startup(&self, version: &str, address: &str) {
        info!(
            event = "service_started",
            instance = %self.instance,
            service_version = %version,
            address = %address,
            "Fake account detector started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            instance = %self.instance,
            reason = %reason,
            "Fake account detector shutting down"
        );
    }
}
