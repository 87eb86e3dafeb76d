//! Random forest classifier
//!
//! Bootstrap-aggregated CART trees with balanced class weights. Probabilities
//! are the mean of the per-tree leaf distributions.

mod metrics;
mod tree;

pub use metrics::{evaluate, ClassMetrics, ClassificationReport, ConfusionMatrix};

use crate::error::{DetectorError, Result};
use crate::models::{FeatureRow, Label, Probabilities};
use crate::schema::{FEATURES, NUM_FEATURES};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::debug;
use tree::{DecisionTree, TreeParams, NUM_CLASSES};

/// How many features each split considers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MaxFeatures {
    /// `floor(sqrt(n_features))`
    Sqrt,
    All,
    Count(usize),
}

impl MaxFeatures {
    pub fn resolve(&self, n_features: usize) -> usize {
        let n = match self {
            MaxFeatures::Sqrt => (n_features as f64).sqrt() as usize,
            MaxFeatures::All => n_features,
            MaxFeatures::Count(n) => *n,
        };
        n.clamp(1, n_features)
    }
}

/// Per-class sample weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeight {
    /// `n_samples / (n_classes * n_class_samples)`
    Balanced,
    Uniform,
}

/// Forest hyperparameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForestParams {
    pub n_estimators: usize,
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: MaxFeatures,
    pub class_weight: ClassWeight,
    pub bootstrap: bool,
    pub seed: u64,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self {
            n_estimators: 100,
            max_depth: 10,
            min_samples_split: 5,
            min_samples_leaf: 2,
            max_features: MaxFeatures::Sqrt,
            class_weight: ClassWeight::Balanced,
            bootstrap: true,
            seed: 42,
        }
    }
}

/// Importance of one feature, as reported to callers
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureImportance {
    pub feature: String,
    pub importance: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    params: ForestParams,
    trees: Vec<DecisionTree>,
    /// Mean of the normalized per-tree importances
    importances: FeatureRow,
}

impl RandomForest {
    /// Fit on scaled rows `x` with labels `y`
    pub fn fit(params: ForestParams, x: &[FeatureRow], y: &[Label]) -> Result<Self> {
        if x.is_empty() {
            return Err(DetectorError::training("cannot fit classifier on empty input"));
        }
        if x.len() != y.len() {
            return Err(DetectorError::training(format!(
                "feature rows ({}) and labels ({}) differ in length",
                x.len(),
                y.len()
            )));
        }
        if params.n_estimators == 0 {
            return Err(DetectorError::training("n_estimators must be at least 1"));
        }

        let classes: Vec<usize> = y.iter().map(Label::index).collect();
        let mut class_counts = [0usize; NUM_CLASSES];
        for &c in &classes {
            class_counts[c] += 1;
        }
        if class_counts.iter().any(|&c| c == 0) {
            return Err(DetectorError::training(
                "training labels contain a single class",
            ));
        }

        let sample_weight = sample_weights(&classes, &class_counts, params.class_weight);
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_split: params.min_samples_split,
            min_samples_leaf: params.min_samples_leaf,
            max_features: params.max_features.resolve(NUM_FEATURES),
        };

        let n = x.len();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let mut trees = Vec::with_capacity(params.n_estimators);
        for _ in 0..params.n_estimators {
            let mut tree_rng = StdRng::seed_from_u64(rng.gen());
            let indices: Vec<usize> = if params.bootstrap {
                (0..n).map(|_| tree_rng.gen_range(0..n)).collect()
            } else {
                (0..n).collect()
            };
            trees.push(DecisionTree::fit(
                x,
                &classes,
                &sample_weight,
                indices,
                tree_params,
                &mut tree_rng,
            ));
        }

        let mut importances = [0.0; NUM_FEATURES];
        for tree in &trees {
            for (total, value) in importances.iter_mut().zip(tree.importances()) {
                *total += value;
            }
        }
        importances
            .iter_mut()
            .for_each(|v| *v /= trees.len() as f64);

        debug!(
            trees = trees.len(),
            mean_nodes = trees.iter().map(DecisionTree::node_count).sum::<usize>() / trees.len(),
            max_depth = trees.iter().map(DecisionTree::depth).max().unwrap_or(0),
            "Random forest fitted"
        );

        Ok(Self {
            params,
            trees,
            importances,
        })
    }

    /// Averaged class probabilities for one scaled row
    pub fn predict_proba(&self, row: &FeatureRow) -> Probabilities {
        let mut fake = 0.0;
        for tree in &self.trees {
            fake += tree.predict_distribution(row)[Label::Fake.index()];
        }
        Probabilities::from_fake(fake / self.trees.len() as f64)
    }

    pub fn predict(&self, row: &FeatureRow) -> Label {
        self.predict_proba(row).label()
    }

    pub fn predict_batch(&self, rows: &[FeatureRow]) -> Vec<Label> {
        rows.iter().map(|row| self.predict(row)).collect()
    }

    /// Feature importances ranked from most to least important
    pub fn feature_importance(&self) -> Vec<FeatureImportance> {
        let mut ranked: Vec<FeatureImportance> = FEATURES
            .iter()
            .zip(self.importances)
            .map(|(spec, importance)| FeatureImportance {
                feature: spec.name.to_string(),
                importance,
            })
            .collect();
        ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
        ranked
    }

    pub fn params(&self) -> &ForestParams {
        &self.params
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    /// Reject forests that cannot score a row, such as a deserialized
    /// forest with no trees or a tree with a dangling node reference
    pub fn check_structure(&self) -> Result<()> {
        if self.trees.is_empty() {
            return Err(DetectorError::storage("forest has no trees"));
        }
        for (i, tree) in self.trees.iter().enumerate() {
            tree.check_structure()
                .map_err(|reason| DetectorError::storage(format!("tree {}: {}", i, reason)))?;
        }
        Ok(())
    }
}

fn sample_weights(
    classes: &[usize],
    class_counts: &[usize; NUM_CLASSES],
    mode: ClassWeight,
) -> Vec<f64> {
    match mode {
        ClassWeight::Uniform => vec![1.0; classes.len()],
        ClassWeight::Balanced => {
            let n = classes.len() as f64;
            let per_class: Vec<f64> = class_counts
                .iter()
                .map(|&count| n / (NUM_CLASSES as f64 * count as f64))
                .collect();
            classes.iter().map(|&c| per_class[c]).collect()
        }
    }
}
