//! Training orchestration
//!
//! One run: obtain a dataset (persisted copy or freshly generated), split it
//! stratified by label, fit the scaler on the training split only, fit the
//! forest on the scaled training split, evaluate on the held-out split and
//! persist the resulting artifact.

use crate::artifact::{ArtifactStore, TrainedArtifact};
use crate::dataset::{DatasetGenerator, DatasetStore, GeneratorConfig};
use crate::error::{DetectorError, Result};
use crate::forest::{evaluate, ClassificationReport, FeatureImportance, ForestParams, RandomForest};
use crate::models::{Dataset, DatasetRecord, FeatureRow, Label};
use crate::observability::StructuredLogger;
use crate::scaler::ScalerParameters;
use chrono::{DateTime, Utc};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

pub const DEFAULT_DATASET_NAME: &str = "fake_accounts_dataset.csv";
pub const DEFAULT_DATASET_SIZE: usize = 10_000;
pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_TEST_FRACTION: f64 = 0.2;

#[derive(Debug, Clone)]
pub struct TrainingConfig {
    /// Name the dataset is saved and looked up under
    pub dataset_name: String,
    /// Records to generate when no persisted dataset exists
    pub dataset_size: usize,
    /// Seeds generation and the train/evaluation split
    pub seed: u64,
    pub test_fraction: f64,
    pub generator: GeneratorConfig,
    pub forest: ForestParams,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            dataset_name: DEFAULT_DATASET_NAME.to_string(),
            dataset_size: DEFAULT_DATASET_SIZE,
            seed: DEFAULT_SEED,
            test_fraction: DEFAULT_TEST_FRACTION,
            generator: GeneratorConfig::default(),
            forest: ForestParams::default(),
        }
    }
}

/// Where the training data came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DatasetSource {
    Persisted,
    Generated,
}

/// Summary of a completed run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrainingReport {
    pub accuracy: f64,
    pub version: String,
    pub trained_at: DateTime<Utc>,
    pub dataset_source: DatasetSource,
    pub dataset_records: usize,
    pub training_samples: usize,
    pub evaluation_samples: usize,
    pub evaluation: ClassificationReport,
    pub feature_importance: Vec<FeatureImportance>,
    pub duration_secs: f64,
}

/// A finished run: the artifact to serve and its report
#[derive(Debug, Clone)]
pub struct TrainingOutcome {
    pub artifact: TrainedArtifact,
    pub report: TrainingReport,
}

/// Label-stratified train/evaluation partition
#[derive(Debug, Clone)]
pub struct Split {
    pub train: Vec<DatasetRecord>,
    pub test: Vec<DatasetRecord>,
}

impl Split {
    fn columns(records: &[DatasetRecord]) -> (Vec<FeatureRow>, Vec<Label>) {
        records
            .iter()
            .map(|r| (r.features.to_row(), r.label))
            .unzip()
    }
}

/// Shuffle each class separately and hold out `test_fraction` of it.
///
/// Every class must have at least two records so both sides get one.
pub fn stratified_split(dataset: &Dataset, test_fraction: f64, rng: &mut StdRng) -> Result<Split> {
    if dataset.is_empty() {
        return Err(DetectorError::training("dataset is empty"));
    }
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(DetectorError::training(format!(
            "test fraction {} outside (0, 1)",
            test_fraction
        )));
    }

    let mut train = Vec::with_capacity(dataset.len());
    let mut test = Vec::new();
    for label in [Label::Real, Label::Fake] {
        let mut class: Vec<DatasetRecord> = dataset
            .records()
            .iter()
            .filter(|r| r.label == label)
            .copied()
            .collect();
        if class.len() < 2 {
            return Err(DetectorError::training(format!(
                "cannot stratify: {} {:?} record(s)",
                class.len(),
                label
            )));
        }

        class.shuffle(rng);
        let n_test = ((class.len() as f64 * test_fraction).round() as usize).clamp(1, class.len() - 1);
        let class_train = class.split_off(n_test);
        test.extend(class);
        train.extend(class_train);
    }

    train.shuffle(rng);
    test.shuffle(rng);
    Ok(Split { train, test })
}

/// Runs the full training pipeline against its stores
pub struct TrainingOrchestrator {
    config: TrainingConfig,
    datasets: Arc<dyn DatasetStore>,
    artifacts: Arc<dyn ArtifactStore>,
    logger: StructuredLogger,
}

impl TrainingOrchestrator {
    pub fn new(
        config: TrainingConfig,
        datasets: Arc<dyn DatasetStore>,
        artifacts: Arc<dyn ArtifactStore>,
        logger: StructuredLogger,
    ) -> Self {
        Self {
            config,
            datasets,
            artifacts,
            logger,
        }
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Train, evaluate and persist a new artifact. Blocking.
    pub fn train(&self) -> Result<TrainingOutcome> {
        let started = Instant::now();
        let (dataset, source) = self.obtain_dataset()?;
        self.logger.log_training_started(dataset.len(), self.config.seed);

        let mut rng = StdRng::seed_from_u64(self.config.seed);
        let split = stratified_split(&dataset, self.config.test_fraction, &mut rng)?;
        let (x_train, y_train) = Split::columns(&split.train);
        let (x_test, y_test) = Split::columns(&split.test);

        let scaler = ScalerParameters::fit(&x_train)?;
        for (feature, mean, std) in scaler.describe() {
            debug!(feature, mean, std, "Scaler parameters");
        }
        let x_train = scaler.transform(&x_train);
        let x_test = scaler.transform(&x_test);

        let forest = RandomForest::fit(self.config.forest.clone(), &x_train, &y_train)?;
        let evaluation = evaluate(&y_test, &forest.predict_batch(&x_test));
        info!(
            accuracy = evaluation.accuracy,
            train = x_train.len(),
            test = x_test.len(),
            "Evaluation on held-out split\n{}",
            evaluation
        );

        let artifact = TrainedArtifact::new(scaler, forest, evaluation.clone(), x_test.len());
        self.artifacts.save(&artifact)?;

        let feature_importance = artifact.feature_importance();
        self.logger
            .log_feature_importance(artifact.version(), &feature_importance);

        let duration_secs = started.elapsed().as_secs_f64();
        self.logger
            .log_training_completed(artifact.version(), &evaluation, duration_secs);

        let report = TrainingReport {
            accuracy: evaluation.accuracy,
            version: artifact.version().to_string(),
            trained_at: artifact.trained_at(),
            dataset_source: source,
            dataset_records: dataset.len(),
            training_samples: artifact.training_samples(),
            evaluation_samples: artifact.evaluation_samples(),
            evaluation,
            feature_importance,
            duration_secs,
        };
        Ok(TrainingOutcome { artifact, report })
    }

    /// Persisted dataset if readable, otherwise a freshly generated one
    fn obtain_dataset(&self) -> Result<(Dataset, DatasetSource)> {
        let name = &self.config.dataset_name;
        match self.datasets.load(name) {
            Ok(Some(dataset)) if !dataset.is_empty() => {
                return Ok((dataset, DatasetSource::Persisted));
            }
            Ok(Some(_)) => warn!(dataset = %name, "Persisted dataset is empty, regenerating"),
            Ok(None) => info!(dataset = %name, "No persisted dataset, generating"),
            Err(e) => warn!(dataset = %name, error = %e, "Failed to load dataset, regenerating"),
        }

        let generator = DatasetGenerator::new(self.config.generator)?;
        let dataset = generator.generate_seeded(self.config.dataset_size, self.config.seed)?;
        if let Err(e) = self.datasets.save(&dataset, name) {
            warn!(dataset = %name, error = %e, "Failed to persist generated dataset");
        }
        Ok((dataset, DatasetSource::Generated))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::artifact::FileArtifactStore;
    use crate::dataset::CsvDatasetStore;
    use crate::error::ErrorKind;
    use crate::models::FeatureVector;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Training config small enough for unit tests
    pub(crate) fn quick_config() -> TrainingConfig {
        TrainingConfig {
            dataset_size: 1_500,
            forest: ForestParams {
                n_estimators: 20,
                ..ForestParams::default()
            },
            ..TrainingConfig::default()
        }
    }

    /// In-memory dataset store
    #[derive(Default)]
    struct MemoryDatasets {
        saved: Mutex<Option<Dataset>>,
        fail_load: bool,
    }

    impl DatasetStore for MemoryDatasets {
        fn save(&self, dataset: &Dataset, _name: &str) -> Result<()> {
            *self.saved.lock().unwrap() = Some(dataset.clone());
            Ok(())
        }

        fn load(&self, _name: &str) -> Result<Option<Dataset>> {
            if self.fail_load {
                return Err(DetectorError::storage("unreadable"));
            }
            Ok(self.saved.lock().unwrap().clone())
        }
    }

    fn record(label: Label) -> DatasetRecord {
        DatasetRecord {
            features: FeatureVector::from_row([10.0; 9]),
            label,
        }
    }

    fn orchestrator(dir: &TempDir, datasets: Arc<dyn DatasetStore>) -> TrainingOrchestrator {
        TrainingOrchestrator::new(
            quick_config(),
            datasets,
            Arc::new(FileArtifactStore::new(dir.path().join("model.json"))),
            StructuredLogger::new("test"),
        )
    }

    #[test]
    fn test_stratified_split_keeps_class_ratio() {
        let dataset = DatasetGenerator::new(GeneratorConfig::default())
            .unwrap()
            .generate_seeded(2_000, 42)
            .unwrap();
        let mut rng = StdRng::seed_from_u64(42);
        let split = stratified_split(&dataset, 0.2, &mut rng).unwrap();

        assert_eq!(split.train.len() + split.test.len(), dataset.len());
        let test_fake = split.test.iter().filter(|r| r.label.is_fake()).count();
        let expected = (dataset.fake_count() as f64 * 0.2).round() as usize;
        assert_eq!(test_fake, expected);
    }

    #[test]
    fn test_stratified_split_is_deterministic() {
        let dataset = DatasetGenerator::new(GeneratorConfig::default())
            .unwrap()
            .generate_seeded(300, 1)
            .unwrap();
        let a = stratified_split(&dataset, 0.2, &mut StdRng::seed_from_u64(9)).unwrap();
        let b = stratified_split(&dataset, 0.2, &mut StdRng::seed_from_u64(9)).unwrap();
        assert_eq!(a.test, b.test);
    }

    #[test]
    fn test_single_class_cannot_be_split() {
        let dataset = Dataset::new(vec![record(Label::Real); 10]);
        let err = stratified_split(&dataset, 0.2, &mut StdRng::seed_from_u64(0)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TrainingFailure);

        let err = stratified_split(&Dataset::default(), 0.2, &mut StdRng::seed_from_u64(0))
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TrainingFailure);
    }

    #[test]
    fn test_tiny_class_still_lands_on_both_sides() {
        let mut records = vec![record(Label::Real); 20];
        records.extend([record(Label::Fake), record(Label::Fake)]);
        let split =
            stratified_split(&Dataset::new(records), 0.2, &mut StdRng::seed_from_u64(0)).unwrap();
        assert_eq!(split.test.iter().filter(|r| r.label.is_fake()).count(), 1);
        assert_eq!(split.train.iter().filter(|r| r.label.is_fake()).count(), 1);
    }

    #[test]
    fn test_train_generates_persists_and_evaluates() {
        let dir = TempDir::new().unwrap();
        let datasets = Arc::new(CsvDatasetStore::new(dir.path()));
        let trainer = orchestrator(&dir, datasets.clone());

        let outcome = trainer.train().unwrap();
        let report = &outcome.report;
        assert_eq!(report.dataset_source, DatasetSource::Generated);
        assert_eq!(report.dataset_records, 1_500);
        assert_eq!(report.training_samples + report.evaluation_samples, 1_500);
        assert!(report.accuracy > 0.8, "accuracy {}", report.accuracy);
        assert_eq!(report.feature_importance.len(), 9);

        assert!(datasets.path_for(DEFAULT_DATASET_NAME).exists());
        assert!(dir.path().join("model.json").exists());

        // Second run reuses the persisted dataset
        let again = trainer.train().unwrap();
        assert_eq!(again.report.dataset_source, DatasetSource::Persisted);
        assert_eq!(again.report.accuracy, report.accuracy);
    }

    #[test]
    fn test_unreadable_dataset_falls_back_to_generation() {
        let dir = TempDir::new().unwrap();
        let datasets = Arc::new(MemoryDatasets {
            fail_load: true,
            ..MemoryDatasets::default()
        });
        let outcome = orchestrator(&dir, datasets).train().unwrap();
        assert_eq!(outcome.report.dataset_source, DatasetSource::Generated);
    }

    #[test]
    fn test_single_class_dataset_fails_training() {
        let dir = TempDir::new().unwrap();
        let datasets = Arc::new(MemoryDatasets::default());
        datasets
            .save(&Dataset::new(vec![record(Label::Fake); 50]), "x")
            .unwrap();

        let err = orchestrator(&dir, datasets).train().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TrainingFailure);
        assert!(!dir.path().join("model.json").exists());
    }
}
