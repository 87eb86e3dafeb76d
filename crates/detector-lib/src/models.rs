//! Core data models for the fake account detector

use crate::schema::NUM_FEATURES;
use serde::{Deserialize, Serialize};

/// Feature values laid out in canonical schema order
pub type FeatureRow = [f64; NUM_FEATURES];

/// Binary account label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
pub enum Label {
    Real = 0,
    Fake = 1,
}

impl Label {
    /// Class index used by the forest (0 = real, 1 = fake)
    pub fn index(&self) -> usize {
        *self as usize
    }

    pub fn is_fake(&self) -> bool {
        matches!(self, Label::Fake)
    }
}

impl From<Label> for u8 {
    fn from(label: Label) -> Self {
        label as u8
    }
}

impl TryFrom<u8> for Label {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Label::Real),
            1 => Ok(Label::Fake),
            other => Err(format!("label must be 0 or 1, got {}", other)),
        }
    }
}

/// Behavioral features of one account
///
/// Boolean features are stored as 0.0/1.0 so the vector can be fed straight
/// into the scaler.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub username_length: f64,
    pub num_posts: f64,
    pub num_followers: f64,
    pub num_following: f64,
    pub account_age_days: f64,
    pub has_profile_picture: f64,
    pub has_bio: f64,
    pub engagement_ratio: f64,
    pub is_verified: f64,
}

impl FeatureVector {
    /// Values in canonical schema order
    pub fn to_row(&self) -> FeatureRow {
        [
            self.username_length,
            self.num_posts,
            self.num_followers,
            self.num_following,
            self.account_age_days,
            self.has_profile_picture,
            self.has_bio,
            self.engagement_ratio,
            self.is_verified,
        ]
    }

    /// Build from values in canonical schema order
    pub fn from_row(row: FeatureRow) -> Self {
        Self {
            username_length: row[0],
            num_posts: row[1],
            num_followers: row[2],
            num_following: row[3],
            account_age_days: row[4],
            has_profile_picture: row[5],
            has_bio: row[6],
            engagement_ratio: row[7],
            is_verified: row[8],
        }
    }
}

/// One labeled training example
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DatasetRecord {
    pub features: FeatureVector,
    pub label: Label,
}

/// Ordered collection of labeled records
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    records: Vec<DatasetRecord>,
}

impl Dataset {
    pub fn new(records: Vec<DatasetRecord>) -> Self {
        Self { records }
    }

    pub fn records(&self) -> &[DatasetRecord] {
        &self.records
    }

    pub(crate) fn records_mut(&mut self) -> &mut [DatasetRecord] {
        &mut self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn push(&mut self, record: DatasetRecord) {
        self.records.push(record);
    }

    pub fn fake_count(&self) -> usize {
        self.records.iter().filter(|r| r.label.is_fake()).count()
    }

    pub fn real_count(&self) -> usize {
        self.len() - self.fake_count()
    }

    /// Fraction of records labeled fake (0.0 for an empty dataset)
    pub fn fake_fraction(&self) -> f64 {
        if self.records.is_empty() {
            return 0.0;
        }
        self.fake_count() as f64 / self.len() as f64
    }

    pub fn rows(&self) -> Vec<FeatureRow> {
        self.records.iter().map(|r| r.features.to_row()).collect()
    }

    pub fn labels(&self) -> Vec<Label> {
        self.records.iter().map(|r| r.label).collect()
    }
}

/// Class probability pair; the two values always sum to 1
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Probabilities {
    pub real: f64,
    pub fake: f64,
}

impl Probabilities {
    /// Build from the fake-class probability
    pub fn from_fake(fake: f64) -> Self {
        let fake = fake.clamp(0.0, 1.0);
        Self {
            real: 1.0 - fake,
            fake,
        }
    }

    /// Label with the highest probability. Ties resolve to real.
    pub fn label(&self) -> Label {
        if self.fake > self.real {
            Label::Fake
        } else {
            Label::Real
        }
    }
}

/// Outcome of scoring one account
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub prediction: Label,
    pub is_fake: bool,
    pub probability_real: f64,
    pub probability_fake: f64,
    pub input: FeatureVector,
    pub model_version: String,
}

impl PredictionResult {
    pub fn new(input: FeatureVector, probabilities: Probabilities, model_version: &str) -> Self {
        let prediction = probabilities.label();
        Self {
            prediction,
            is_fake: prediction.is_fake(),
            probability_real: probabilities.real,
            probability_fake: probabilities.fake,
            input,
            model_version: model_version.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_vector() -> FeatureVector {
        FeatureVector::from_row([12.0, 45.0, 234.0, 156.0, 120.0, 1.0, 1.0, 0.192, 0.0])
    }

    #[test]
    fn test_row_round_trip_preserves_order() {
        let vector = sample_vector();
        assert_eq!(vector.username_length, 12.0);
        assert_eq!(vector.engagement_ratio, 0.192);
        assert_eq!(FeatureVector::from_row(vector.to_row()), vector);
    }

    #[test]
    fn test_label_serializes_as_integer() {
        assert_eq!(serde_json::to_string(&Label::Fake).unwrap(), "1");
        assert_eq!(serde_json::from_str::<Label>("0").unwrap(), Label::Real);
        assert!(serde_json::from_str::<Label>("2").is_err());
    }

    #[test]
    fn test_probabilities_sum_to_one() {
        let p = Probabilities::from_fake(0.37);
        assert!((p.real + p.fake - 1.0).abs() < 1e-12);
        assert_eq!(p.label(), Label::Real);
        assert_eq!(Probabilities::from_fake(0.5).label(), Label::Real);
        assert_eq!(Probabilities::from_fake(0.51).label(), Label::Fake);
    }

    #[test]
    fn test_prediction_result_flags_agree() {
        let result = PredictionResult::new(sample_vector(), Probabilities::from_fake(0.8), "v1");
        assert_eq!(result.prediction, Label::Fake);
        assert!(result.is_fake);
    }

    #[test]
    fn test_dataset_counts() {
        let mut dataset = Dataset::default();
        assert_eq!(dataset.fake_fraction(), 0.0);
        dataset.push(DatasetRecord { features: sample_vector(), label: Label::Fake });
        dataset.push(DatasetRecord { features: sample_vector(), label: Label::Real });
        dataset.push(DatasetRecord { features: sample_vector(), label: Label::Real });
        assert_eq!(dataset.fake_count(), 1);
        assert_eq!(dataset.real_count(), 2);
        assert!((dataset.fake_fraction() - 1.0 / 3.0).abs() < 1e-12);
    }
}
