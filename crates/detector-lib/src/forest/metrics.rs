//! Held-out evaluation of a fitted classifier

use crate::models::Label;
use serde::{Deserialize, Serialize};
use std::fmt;

/// 2x2 confusion matrix, rows are true labels and columns predictions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    pub true_real: usize,
    pub false_fake: usize,
    pub false_real: usize,
    pub true_fake: usize,
}

impl ConfusionMatrix {
    fn record(&mut self, truth: Label, predicted: Label) {
        match (truth, predicted) {
            (Label::Real, Label::Real) => self.true_real += 1,
            (Label::Real, Label::Fake) => self.false_fake += 1,
            (Label::Fake, Label::Real) => self.false_real += 1,
            (Label::Fake, Label::Fake) => self.true_fake += 1,
        }
    }

    pub fn as_rows(&self) -> [[usize; 2]; 2] {
        [
            [self.true_real, self.false_fake],
            [self.false_real, self.true_fake],
        ]
    }

    pub fn total(&self) -> usize {
        self.true_real + self.false_fake + self.false_real + self.true_fake
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

impl ClassMetrics {
    fn from_counts(true_positive: usize, false_positive: usize, false_negative: usize) -> Self {
        let precision = ratio(true_positive, true_positive + false_positive);
        let recall = ratio(true_positive, true_positive + false_negative);
        let f1 = if precision + recall > 0.0 {
            2.0 * precision * recall / (precision + recall)
        } else {
            0.0
        };
        Self {
            precision,
            recall,
            f1,
            support: true_positive + false_negative,
        }
    }
}

/// Accuracy plus per-class precision, recall, F1 and support
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassificationReport {
    pub accuracy: f64,
    pub real: ClassMetrics,
    pub fake: ClassMetrics,
    pub confusion_matrix: ConfusionMatrix,
}

/// Compare true and predicted labels pairwise
pub fn evaluate(y_true: &[Label], y_pred: &[Label]) -> ClassificationReport {
    let mut matrix = ConfusionMatrix::default();
    for (&truth, &predicted) in y_true.iter().zip(y_pred) {
        matrix.record(truth, predicted);
    }

    ClassificationReport {
        accuracy: ratio(matrix.true_real + matrix.true_fake, matrix.total()),
        real: ClassMetrics::from_counts(matrix.true_real, matrix.false_real, matrix.false_fake),
        fake: ClassMetrics::from_counts(matrix.true_fake, matrix.false_fake, matrix.false_real),
        confusion_matrix: matrix,
    }
}

fn ratio(numerator: usize, denominator: usize) -> f64 {
    if denominator == 0 {
        0.0
    } else {
        numerator as f64 / denominator as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for (name, m) in [("Real", &self.real), ("Fake", &self.fake)] {
            writeln!(
                f,
                "{:>14} {:>10.2} {:>10.2} {:>10.2} {:>10}",
                name, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.2} {:>10}",
            "accuracy",
            "",
            "",
            self.accuracy,
            self.confusion_matrix.total()
        )?;
        let rows = self.confusion_matrix.as_rows();
        writeln!(f, "confusion matrix:")?;
        writeln!(f, "  [{:>6} {:>6}]", rows[0][0], rows[0][1])?;
        write!(f, "  [{:>6} {:>6}]", rows[1][0], rows[1][1])
    }
}
