//! CART decision tree with weighted Gini impurity
//!
//! Nodes live in a flat arena; node 0 is the root. Leaves keep the weighted
//! class distribution of the training samples that reached them so the forest
//! can average probabilities instead of votes.

use crate::models::FeatureRow;
use crate::schema::NUM_FEATURES;
use rand::seq::index;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Number of classes (real, fake)
pub(crate) const NUM_CLASSES: usize = 2;

/// Feature values closer than this are treated as equal when placing thresholds
const FEATURE_EPSILON: f64 = 1e-7;

type ClassWeights = [f64; NUM_CLASSES];

/// Growth limits for a single tree
#[derive(Debug, Clone, Copy)]
pub(crate) struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub min_samples_leaf: usize,
    pub max_features: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) enum TreeNode {
    Split {
        feature: usize,
        threshold: f64,
        left: usize,
        right: usize,
    },
    Leaf {
        /// Class probabilities at this leaf, summing to 1
        distribution: ClassWeights,
    },
}

/// A fitted classification tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub(crate) struct DecisionTree {
    nodes: Vec<TreeNode>,
    /// Normalized impurity decrease per feature
    importances: FeatureRow,
}

/// Training inputs shared by every node of one tree
struct TrainingView<'a> {
    x: &'a [FeatureRow],
    y: &'a [usize],
    sample_weight: &'a [f64],
}

struct SplitCandidate {
    feature: usize,
    threshold: f64,
    /// Weighted child impurity, lower is better
    child_impurity: f64,
    left_weights: ClassWeights,
    right_weights: ClassWeights,
}

impl DecisionTree {
    /// Grow a tree on the rows listed in `indices` (duplicates allowed)
    pub fn fit<R: Rng + ?Sized>(
        x: &[FeatureRow],
        y: &[usize],
        sample_weight: &[f64],
        mut indices: Vec<usize>,
        params: TreeParams,
        rng: &mut R,
    ) -> Self {
        let view = TrainingView { x, y, sample_weight };
        let mut builder = TreeBuilder {
            view,
            params,
            nodes: Vec::new(),
            importances: [0.0; NUM_FEATURES],
        };
        builder.grow(&mut indices, 0, rng);

        let total: f64 = builder.importances.iter().sum();
        if total > 0.0 {
            builder.importances.iter_mut().for_each(|v| *v /= total);
        }

        Self {
            nodes: builder.nodes,
            importances: builder.importances,
        }
    }

    /// Class distribution of the leaf `row` falls into
    pub fn predict_distribution(&self, row: &FeatureRow) -> ClassWeights {
        let mut node_id = 0;
        loop {
            match &self.nodes[node_id] {
                TreeNode::Leaf { distribution } => return *distribution,
                TreeNode::Split {
                    feature,
                    threshold,
                    left,
                    right,
                } => {
                    node_id = if row[*feature] <= *threshold { *left } else { *right };
                }
            }
        }
    }

    /// Check that every path from the root ends in a leaf. Children always
    /// have higher ids than their parent, which also rules out cycles.
    pub fn check_structure(&self) -> Result<(), String> {
        if self.nodes.is_empty() {
            return Err("tree has no nodes".to_string());
        }
        for (id, node) in self.nodes.iter().enumerate() {
            if let TreeNode::Split {
                feature,
                left,
                right,
                ..
            } = node
            {
                if *feature >= NUM_FEATURES {
                    return Err(format!("node {} splits on unknown feature {}", id, feature));
                }
                for child in [*left, *right] {
                    if child <= id || child >= self.nodes.len() {
                        return Err(format!("node {} points at invalid child {}", id, child));
                    }
                }
            }
        }
        Ok(())
    }

    pub fn importances(&self) -> &FeatureRow {
        &self.importances
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Longest root-to-leaf path, counted in splits
    pub fn depth(&self) -> usize {
        fn depth_of(nodes: &[TreeNode], id: usize) -> usize {
            match &nodes[id] {
                TreeNode::Leaf { .. } => 0,
                TreeNode::Split { left, right, .. } => {
                    1 + depth_of(nodes, *left).max(depth_of(nodes, *right))
                }
            }
        }
        if self.nodes.is_empty() {
            0
        } else {
            depth_of(&self.nodes, 0)
        }
    }
}

struct TreeBuilder<'a> {
    view: TrainingView<'a>,
    params: TreeParams,
    nodes: Vec<TreeNode>,
    importances: FeatureRow,
}

impl<'a> TreeBuilder<'a> {
    /// Grow the subtree for `indices` and return its node id
    fn grow<R: Rng + ?Sized>(&mut self, indices: &mut [usize], depth: usize, rng: &mut R) -> usize {
        let weights = self.class_weights(indices);
        let impurity = gini(&weights);
        let n_samples = indices.len();

        let must_stop = depth >= self.params.max_depth
            || n_samples < self.params.min_samples_split
            || n_samples < 2 * self.params.min_samples_leaf
            || impurity <= f64::EPSILON;
        if must_stop {
            return self.push_leaf(&weights);
        }

        let Some(split) = self.best_split(indices, &weights, rng) else {
            return self.push_leaf(&weights);
        };

        let node_weight: f64 = weights.iter().sum();
        let left_weight: f64 = split.left_weights.iter().sum();
        let right_weight: f64 = split.right_weights.iter().sum();
        self.importances[split.feature] += node_weight * impurity
            - left_weight * gini(&split.left_weights)
            - right_weight * gini(&split.right_weights);

        let mid = partition(indices, |i| self.view.x[i][split.feature] <= split.threshold);

        // Reserve the slot so the parent keeps a lower id than its children
        let node_id = self.nodes.len();
        self.nodes.push(TreeNode::Leaf {
            distribution: normalize(&weights),
        });

        let (left_indices, right_indices) = indices.split_at_mut(mid);
        let left = self.grow(left_indices, depth + 1, rng);
        let right = self.grow(right_indices, depth + 1, rng);

        self.nodes[node_id] = TreeNode::Split {
            feature: split.feature,
            threshold: split.threshold,
            left,
            right,
        };
        node_id
    }

    fn push_leaf(&mut self, weights: &ClassWeights) -> usize {
        self.nodes.push(TreeNode::Leaf {
            distribution: normalize(weights),
        });
        self.nodes.len() - 1
    }

    fn class_weights(&self, indices: &[usize]) -> ClassWeights {
        let mut weights = [0.0; NUM_CLASSES];
        for &i in indices {
            weights[self.view.y[i]] += self.view.sample_weight[i];
        }
        weights
    }

    /// Best threshold over a random subset of `max_features` features
    fn best_split<R: Rng + ?Sized>(
        &self,
        indices: &[usize],
        node_weights: &ClassWeights,
        rng: &mut R,
    ) -> Option<SplitCandidate> {
        let n_candidates = self.params.max_features.clamp(1, NUM_FEATURES);
        let mut features = index::sample(rng, NUM_FEATURES, n_candidates).into_vec();
        features.sort_unstable();

        let mut best: Option<SplitCandidate> = None;
        let mut sorted = indices.to_vec();
        for feature in features {
            sorted.sort_by(|&a, &b| self.view.x[a][feature].total_cmp(&self.view.x[b][feature]));
            if let Some(candidate) = self.best_threshold(&sorted, feature, node_weights) {
                let better = best
                    .as_ref()
                    .map_or(true, |b| candidate.child_impurity < b.child_impurity);
                if better {
                    best = Some(candidate);
                }
            }
        }
        best
    }

    /// Sweep the sorted samples left to right, scoring every boundary between
    /// distinct values that leaves at least `min_samples_leaf` on each side
    fn best_threshold(
        &self,
        sorted: &[usize],
        feature: usize,
        node_weights: &ClassWeights,
    ) -> Option<SplitCandidate> {
        let n = sorted.len();
        let min_leaf = self.params.min_samples_leaf.max(1);
        let total_weight: f64 = node_weights.iter().sum();

        let mut left = [0.0; NUM_CLASSES];
        let mut best: Option<SplitCandidate> = None;

        for pos in 0..n - 1 {
            let i = sorted[pos];
            left[self.view.y[i]] += self.view.sample_weight[i];

            let n_left = pos + 1;
            if n_left < min_leaf || n - n_left < min_leaf {
                continue;
            }

            let current = self.view.x[i][feature];
            let next = self.view.x[sorted[pos + 1]][feature];
            if next <= current + FEATURE_EPSILON {
                continue;
            }

            let right = [node_weights[0] - left[0], node_weights[1] - left[1]];
            let left_weight: f64 = left.iter().sum();
            let right_weight = total_weight - left_weight;
            let child_impurity =
                (left_weight * gini(&left) + right_weight * gini(&right)) / total_weight;

            if best
                .as_ref()
                .map_or(true, |b| child_impurity < b.child_impurity)
            {
                let mut threshold = current + (next - current) / 2.0;
                if threshold >= next {
                    threshold = current;
                }
                best = Some(SplitCandidate {
                    feature,
                    threshold,
                    child_impurity,
                    left_weights: left,
                    right_weights: right,
                });
            }
        }
        best
    }
}

/// Gini impurity of a weighted class distribution
fn gini(weights: &ClassWeights) -> f64 {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return 0.0;
    }
    1.0 - weights.iter().map(|w| (w / total).powi(2)).sum::<f64>()
}

fn normalize(weights: &ClassWeights) -> ClassWeights {
    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return [1.0 / NUM_CLASSES as f64; NUM_CLASSES];
    }
    [weights[0] / total, weights[1] / total]
}

/// Reorder `indices` so matching entries come first; returns how many matched
fn partition<F: Fn(usize) -> bool>(indices: &mut [usize], goes_left: F) -> usize {
    let mut mid = 0;
    for pos in 0..indices.len() {
        if goes_left(indices[pos]) {
            indices.swap(mid, pos);
            mid += 1;
        }
    }
    mid
}
