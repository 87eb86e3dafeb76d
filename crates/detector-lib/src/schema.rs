//! Feature schema
//!
//! Declares the canonical feature order and the constraint attached to each
//! feature. The dataset generator, CSV store, scaler, forest and validator all
//! index features through this table.

use serde::Serialize;

/// Number of input features
pub const NUM_FEATURES: usize = 9;

/// Name of the label column in the persisted dataset table
pub const LABEL_COLUMN: &str = "is_fake";

/// Constraint descriptor for a single feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FeatureKind {
    /// Strictly greater than zero
    PositiveNumber,
    /// Zero or greater
    NonNegativeNumber,
    /// One of 0, 1, true, false
    Boolean,
}

impl FeatureKind {
    /// Human-readable constraint used in validation messages
    pub fn describe(&self) -> &'static str {
        match self {
            FeatureKind::PositiveNumber => "a positive number",
            FeatureKind::NonNegativeNumber => "a non-negative number",
            FeatureKind::Boolean => "0 or 1",
        }
    }

    /// Validation pass this kind belongs to. Lower passes are checked first.
    pub(crate) fn check_order(&self) -> u8 {
        match self {
            FeatureKind::PositiveNumber => 0,
            FeatureKind::NonNegativeNumber => 1,
            FeatureKind::Boolean => 2,
        }
    }
}

/// Name and constraint of one feature
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeatureSpec {
    pub name: &'static str,
    pub kind: FeatureKind,
}

/// All features in canonical order
pub const FEATURES: [FeatureSpec; NUM_FEATURES] = [
    FeatureSpec { name: "username_length", kind: FeatureKind::PositiveNumber },
    FeatureSpec { name: "num_posts", kind: FeatureKind::NonNegativeNumber },
    FeatureSpec { name: "num_followers", kind: FeatureKind::NonNegativeNumber },
    FeatureSpec { name: "num_following", kind: FeatureKind::NonNegativeNumber },
    FeatureSpec { name: "account_age_days", kind: FeatureKind::PositiveNumber },
    FeatureSpec { name: "has_profile_picture", kind: FeatureKind::Boolean },
    FeatureSpec { name: "has_bio", kind: FeatureKind::Boolean },
    FeatureSpec { name: "engagement_ratio", kind: FeatureKind::NonNegativeNumber },
    FeatureSpec { name: "is_verified", kind: FeatureKind::Boolean },
];

/// Feature names in canonical order
pub fn feature_names() -> Vec<&'static str> {
    FEATURES.iter().map(|f| f.name).collect()
}

/// Position of a feature in the canonical order
pub fn index_of(name: &str) -> Option<usize> {
    FEATURES.iter().position(|f| f.name == name)
}

/// Column header of the persisted dataset table
pub fn dataset_header() -> Vec<&'static str> {
    let mut header = feature_names();
    header.push(LABEL_COLUMN);
    header
}
