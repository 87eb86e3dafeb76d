//! Synthetic training data
//!
//! Generation of class-conditional account data and its CSV persistence.

mod generator;
mod store;

pub use generator::{
    DatasetGenerator, GeneratorConfig, OverlapConfig, DEFAULT_ENGAGEMENT_NOISE_STD,
    DEFAULT_FAKE_RATE,
};
pub use store::{read_csv, write_csv, CsvDatasetStore, DatasetStore};
