//! Service configuration

use anyhow::{Context, Result};
use detector_lib::forest::ForestParams;
use detector_lib::training::{TrainingConfig, DEFAULT_DATASET_NAME, DEFAULT_DATASET_SIZE, DEFAULT_SEED};
use serde::Deserialize;
use std::path::PathBuf;

/// Detector configuration, read from `DETECTOR_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct DetectorConfig {
    /// Name attached to structured log records
    #[serde(default = "default_instance_name")]
    pub instance_name: String,

    /// HTTP port for the API, health and metrics
    #[serde(default = "default_api_port")]
    pub api_port: u16,

    /// Directory holding the dataset and the model artifact
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    #[serde(default = "default_dataset_name")]
    pub dataset_name: String,

    #[serde(default = "default_artifact_file")]
    pub artifact_file: String,

    /// Records generated when no dataset is persisted
    #[serde(default = "default_dataset_size")]
    pub dataset_size: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,

    /// Trees in the forest
    #[serde(default = "default_n_estimators")]
    pub n_estimators: usize,
}

fn default_instance_name() -> String {
    std::env::var("HOSTNAME").unwrap_or_else(|_| "fake-account-detector".to_string())
}

fn default_api_port() -> u16 {
    5000
}

fn default_data_dir() -> PathBuf {
    PathBuf::from("./data")
}

fn default_dataset_name() -> String {
    DEFAULT_DATASET_NAME.to_string()
}

fn default_artifact_file() -> String {
    "fake_account_model.json".to_string()
}

fn default_dataset_size() -> usize {
    DEFAULT_DATASET_SIZE
}

fn default_seed() -> u64 {
    DEFAULT_SEED
}

fn default_n_estimators() -> usize {
    ForestParams::default().n_estimators
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            instance_name: default_instance_name(),
            api_port: default_api_port(),
            data_dir: default_data_dir(),
            dataset_name: default_dataset_name(),
            artifact_file: default_artifact_file(),
            dataset_size: default_dataset_size(),
            seed: default_seed(),
            n_estimators: default_n_estimators(),
        }
    }
}

impl DetectorConfig {
    /// Load configuration from the environment
    pub fn load() -> Result<Self> {
        let config = config::Config::builder()
            .add_source(config::Environment::with_prefix("DETECTOR").try_parsing(true))
            .build()
            .context("Failed to read DETECTOR_* environment")?;

        config
            .try_deserialize()
            .context("Invalid detector configuration")
    }

    pub fn artifact_path(&self) -> PathBuf {
        self.data_dir.join(&self.artifact_file)
    }

    pub fn training_config(&self) -> TrainingConfig {
        TrainingConfig {
            dataset_name: self.dataset_name.clone(),
            dataset_size: self.dataset_size,
            seed: self.seed,
            forest: ForestParams {
                n_estimators: self.n_estimators,
                seed: self.seed,
                ..ForestParams::default()
            },
            ..TrainingConfig::default()
        }
    }
}
