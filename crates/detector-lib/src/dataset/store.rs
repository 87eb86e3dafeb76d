//! Dataset persistence as a CSV table
//!
//! Columns are the schema features in canonical order followed by the label.
//! Integer-valued features are written without a fractional part so the
//! file reads back to exactly the same values.

use crate::error::{DetectorError, Result};
use crate::models::{Dataset, DatasetRecord, FeatureRow, FeatureVector, Label};
use crate::schema::{self, FEATURES, NUM_FEATURES};
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::PathBuf;
use tracing::{debug, info};

/// Persist and restore named datasets
pub trait DatasetStore: Send + Sync {
    /// Save a dataset under `name`, replacing any previous copy
    fn save(&self, dataset: &Dataset, name: &str) -> Result<()>;

    /// Load a dataset by name, `None` if nothing was saved under it
    fn load(&self, name: &str) -> Result<Option<Dataset>>;
}

/// Stores datasets as CSV files inside a directory
#[derive(Debug, Clone)]
pub struct CsvDatasetStore {
    dir: PathBuf,
}

impl CsvDatasetStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }
}

impl DatasetStore for CsvDatasetStore {
    fn save(&self, dataset: &Dataset, name: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(name);

        // Write to temp file first, then rename into place
        let temp_path = path.with_extension("tmp");
        let mut file = File::create(&temp_path)?;
        write_csv(dataset, &mut file)?;
        file.sync_all()?;
        fs::rename(&temp_path, &path)?;

        info!(
            path = %path.display(),
            records = dataset.len(),
            fake = dataset.fake_count(),
            real = dataset.real_count(),
            "Dataset saved"
        );
        Ok(())
    }

    fn load(&self, name: &str) -> Result<Option<Dataset>> {
        let path = self.path_for(name);
        if !path.exists() {
            debug!(path = %path.display(), "No persisted dataset");
            return Ok(None);
        }

        let file = File::open(&path)?;
        let dataset = read_csv(file)?;
        info!(path = %path.display(), records = dataset.len(), "Loaded existing dataset");
        Ok(Some(dataset))
    }
}

/// Write a dataset as CSV with a header row
pub fn write_csv<W: Write>(dataset: &Dataset, writer: W) -> Result<()> {
    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(schema::dataset_header())?;

    for record in dataset.records() {
        let mut fields: Vec<String> = record
            .features
            .to_row()
            .iter()
            .zip(FEATURES.iter())
            .map(|(value, spec)| format_value(*value, spec.name))
            .collect();
        fields.push(u8::from(record.label).to_string());
        csv_writer.write_record(&fields)?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Read a dataset from CSV; the header must match the schema exactly
pub fn read_csv<R: Read>(reader: R) -> Result<Dataset> {
    let mut csv_reader = csv::ReaderBuilder::new().has_headers(true).from_reader(reader);

    let header: Vec<String> = csv_reader.headers()?.iter().map(str::to_string).collect();
    let expected = schema::dataset_header();
    if header != expected {
        return Err(DetectorError::storage(format!(
            "unexpected dataset columns: {}",
            header.join(",")
        )));
    }

    let mut dataset = Dataset::default();
    for (line, result) in csv_reader.records().enumerate() {
        let row = result?;
        let mut values: FeatureRow = [0.0; NUM_FEATURES];
        for (i, value) in values.iter_mut().enumerate() {
            *value = parse_field(row.get(i), expected[i], line)?;
        }
        let label = match parse_field(row.get(NUM_FEATURES), schema::LABEL_COLUMN, line)? {
            v if v == 0.0 => Label::Real,
            v if v == 1.0 => Label::Fake,
            _ => {
                return Err(DetectorError::storage(format!(
                    "row {}: label must be 0 or 1",
                    line + 1
                )))
            }
        };

        dataset.push(DatasetRecord {
            features: FeatureVector::from_row(values),
            label,
        });
    }

    Ok(dataset)
}

/// Integer columns drop the fractional part; the engagement ratio keeps it
fn format_value(value: f64, name: &str) -> String {
    if name != "engagement_ratio" && value.fract() == 0.0 {
        format!("{}", value as i64)
    } else {
        format!("{}", value)
    }
}

fn parse_field(raw: Option<&str>, column: &str, line: usize) -> Result<f64> {
    let raw = raw.ok_or_else(|| {
        DetectorError::storage(format!("row {}: missing column {}", line + 1, column))
    })?;
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| {
            DetectorError::storage(format!(
                "row {}: column {} is not a number: {:?}",
                line + 1,
                column,
                raw
            ))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::{DatasetGenerator, GeneratorConfig};
    use tempfile::TempDir;

    fn small_dataset() -> Dataset {
        DatasetGenerator::new(GeneratorConfig::default())
            .unwrap()
            .generate_seeded(250, 42)
            .unwrap()
    }

    fn to_bytes(dataset: &Dataset) -> Vec<u8> {
        let mut buf = Vec::new();
        write_csv(dataset, &mut buf).unwrap();
        buf
    }

    #[test]
    fn test_header_row() {
        let bytes = to_bytes(&small_dataset());
        let text = String::from_utf8(bytes).unwrap();
        let first_line = text.lines().next().unwrap();
        assert_eq!(
            first_line,
            "username_length,num_posts,num_followers,num_following,account_age_days,\
             has_profile_picture,has_bio,engagement_ratio,is_verified,is_fake"
        );
    }

    #[test]
    fn test_integer_columns_written_without_fraction() {
        let text = String::from_utf8(to_bytes(&small_dataset())).unwrap();
        let row: Vec<&str> = text.lines().nth(1).unwrap().split(',').collect();
        assert!(!row[0].contains('.'), "username_length was {}", row[0]);
        assert!(row[9] == "0" || row[9] == "1");
    }

    #[test]
    fn test_same_seed_byte_identical_csv() {
        assert_eq!(to_bytes(&small_dataset()), to_bytes(&small_dataset()));
    }

    #[test]
    fn test_save_and_load_reproduces_dataset() {
        let temp_dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(temp_dir.path());
        let dataset = small_dataset();

        store.save(&dataset, "accounts.csv").unwrap();
        assert!(store.path_for("accounts.csv").exists());

        let loaded = store.load("accounts.csv").unwrap().unwrap();
        assert_eq!(loaded, dataset);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let temp_dir = TempDir::new().unwrap();
        let store = CsvDatasetStore::new(temp_dir.path());
        assert!(store.load("nothing.csv").unwrap().is_none());
    }

    #[test]
    fn test_wrong_header_is_storage_failure() {
        let data = "a,b,c\n1,2,3\n";
        let err = read_csv(data.as_bytes()).unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::StorageFailure);
    }

    #[test]
    fn test_bad_label_rejected() {
        let data = "username_length,num_posts,num_followers,num_following,account_age_days,\
                    has_profile_picture,has_bio,engagement_ratio,is_verified,is_fake\n\
                    10,5,100,200,30,1,0,0.05,0,3\n";
        assert!(read_csv(data.as_bytes()).is_err());
    }
}
