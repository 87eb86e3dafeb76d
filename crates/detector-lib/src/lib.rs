//! Core library for the fake account detector
//!
//! This crate provides:
//! - The feature schema and input validation
//! - Synthetic dataset generation and CSV persistence
//! - Feature scaling and a random forest classifier
//! - Training orchestration and versioned, persisted artifacts
//! - The prediction service, health checks and observability

pub mod artifact;
pub mod dataset;
pub mod error;
pub mod forest;
pub mod health;
pub mod models;
pub mod observability;
pub mod scaler;
pub mod schema;
pub mod service;
pub mod training;
pub mod validator;

pub use artifact::{
    ArtifactHandle, ArtifactStore, FileArtifactStore, ServingState, TrainedArtifact,
};
pub use dataset::{CsvDatasetStore, DatasetGenerator, DatasetStore, GeneratorConfig};
pub use error::{DetectorError, ErrorKind, Result};
pub use health::{
    Component, ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{DetectorMetrics, StructuredLogger};
pub use service::{DetectorService, ModelInfo, ServiceHealth, StartupSource};
pub use training::{TrainingConfig, TrainingReport};
