//! Feature standardization
//!
//! Parameters are fit once on the training split and never change afterwards.
//! Every transform, at training and inference time, reuses them.

use crate::error::{DetectorError, Result};
use crate::models::FeatureRow;
use crate::schema::{FEATURES, NUM_FEATURES};
use serde::{Deserialize, Serialize};

/// Standard deviations below this are treated as zero variance
const MIN_STD: f64 = 1e-12;

/// Per-feature mean and population standard deviation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScalerParameters {
    means: FeatureRow,
    stds: FeatureRow,
    n_samples: usize,
}

impl ScalerParameters {
    /// Compute mean and standard deviation of each feature over `rows`
    pub fn fit(rows: &[FeatureRow]) -> Result<Self> {
        if rows.is_empty() {
            return Err(DetectorError::training("cannot fit scaler on an empty split"));
        }

        let n = rows.len() as f64;
        let mut means = [0.0; NUM_FEATURES];
        for row in rows {
            for (mean, value) in means.iter_mut().zip(row) {
                *mean += value;
            }
        }
        means.iter_mut().for_each(|m| *m /= n);

        let mut stds = [0.0; NUM_FEATURES];
        for row in rows {
            for ((var, value), mean) in stds.iter_mut().zip(row).zip(&means) {
                *var += (value - mean).powi(2);
            }
        }
        stds.iter_mut().for_each(|s| *s = (*s / n).sqrt());

        Ok(Self {
            means,
            stds,
            n_samples: rows.len(),
        })
    }

    pub fn means(&self) -> &FeatureRow {
        &self.means
    }

    pub fn stds(&self) -> &FeatureRow {
        &self.stds
    }

    /// Number of rows the parameters were fit on
    pub fn n_samples(&self) -> usize {
        self.n_samples
    }

    /// `(x - mean) / std`; zero-variance features map to 0
    pub fn transform_one(&self, row: &FeatureRow) -> FeatureRow {
        let mut scaled = [0.0; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            scaled[i] = if self.stds[i] < MIN_STD {
                0.0
            } else {
                (row[i] - self.means[i]) / self.stds[i]
            };
        }
        scaled
    }

    pub fn transform(&self, rows: &[FeatureRow]) -> Vec<FeatureRow> {
        rows.iter().map(|row| self.transform_one(row)).collect()
    }

    /// `z * std + mean`; zero-variance features map back to their mean
    pub fn inverse_transform_one(&self, scaled: &FeatureRow) -> FeatureRow {
        let mut row = [0.0; NUM_FEATURES];
        for i in 0..NUM_FEATURES {
            row[i] = scaled[i] * self.stds[i] + self.means[i];
        }
        row
    }

    /// (feature, mean, std) triples in canonical order
    pub fn describe(&self) -> Vec<(&'static str, f64, f64)> {
        FEATURES
            .iter()
            .enumerate()
            .map(|(i, spec)| (spec.name, self.means[i], self.stds[i]))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rows() -> Vec<FeatureRow> {
        vec![
            [12.0, 45.0, 234.0, 156.0, 120.0, 1.0, 1.0, 0.192, 0.0],
            [5.0, 2.0, 10.0, 4000.0, 3.0, 0.0, 0.0, 0.2, 0.0],
            [18.0, 1500.0, 30000.0, 500.0, 2000.0, 1.0, 1.0, 0.05, 0.0],
            [25.0, 7.0, 5000.0, 3000.0, 20.0, 0.0, 1.0, 0.0014, 0.0],
        ]
    }

    #[test]
    fn test_describe_pairs_names_with_parameters() {
        let scaler = ScalerParameters::fit(&rows()).unwrap();
        let described = scaler.describe();
        assert_eq!(described.len(), NUM_FEATURES);
        assert_eq!(described[0].0, "username_length");
        assert_eq!(described[0].1, 15.0);
        assert_eq!(described[8], ("is_verified", 0.0, 0.0));
    }

    #[test]
    fn test_fit_rejects_empty() {
        assert!(ScalerParameters::fit(&[]).is_err());
    }

    #[test]
    fn test_scaled_columns_have_zero_mean_unit_std() {
        let data = rows();
        let scaler = ScalerParameters::fit(&data).unwrap();
        let scaled = scaler.transform(&data);

        for col in 0..8 {
            let mean: f64 = scaled.iter().map(|r| r[col]).sum::<f64>() / scaled.len() as f64;
            let var: f64 =
                scaled.iter().map(|r| (r[col] - mean).powi(2)).sum::<f64>() / scaled.len() as f64;
            assert!(mean.abs() < 1e-9, "column {} mean {}", col, mean);
            assert!((var - 1.0).abs() < 1e-9, "column {} var {}", col, var);
        }
    }

    #[test]
    fn test_zero_variance_feature_scales_to_zero() {
        let data = rows();
        let scaler = ScalerParameters::fit(&data).unwrap();
        assert_eq!(scaler.stds()[8], 0.0);
        let scaled = scaler.transform_one(&[1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0, 1.0]);
        assert_eq!(scaled[8], 0.0);
        assert!(scaled.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_inverse_transform_round_trip() {
        let data = rows();
        let scaler = ScalerParameters::fit(&data).unwrap();
        for row in &data {
            let restored = scaler.inverse_transform_one(&scaler.transform_one(row));
            for (a, b) in restored.iter().zip(row) {
                assert!((a - b).abs() < 1e-9, "{} != {}", a, b);
            }
        }
    }

    #[test]
    fn test_parameters_come_from_fit_rows_only() {
        let data = rows();
        let scaler = ScalerParameters::fit(&data[..2]).unwrap();
        assert_eq!(scaler.n_samples(), 2);
        assert_eq!(scaler.means()[0], 8.5);
        assert_eq!(scaler.stds()[0], 3.5);
    }
}
