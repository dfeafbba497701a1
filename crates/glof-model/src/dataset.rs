//! Labelled design matrices and the held-out split.

use ndarray::{Array1, Array2, ArrayView1, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use glof_core::error::{GlofError, Result};
use glof_core::models::{LakeRecord, FEATURE_COLUMNS};
use glof_core::table::FeatureMatrix;

/// Complete, labelled feature matrix
#[derive(Debug, Clone, PartialEq)]
pub struct Dataset {
    pub columns: Vec<String>,
    pub x: Array2<f64>,
    pub y: Vec<bool>,
}

impl Dataset {
    /// Build from labelled records whose features are all present.
    ///
    /// Fails with `PendingReview` while any record lacks a label and with a
    /// `Training` error when a feature is still missing.
    pub fn from_records(records: &[LakeRecord]) -> Result<Self> {
        let pending = records.iter().filter(|r| r.needs_review || r.glof.is_none()).count();
        if pending > 0 {
            return Err(GlofError::PendingReview { count: pending });
        }

        let matrix = FeatureMatrix::from_records(records);
        let missing = matrix.missing_count();
        let rows = matrix.dense_rows().ok_or_else(|| GlofError::Training {
            reason: format!("{} feature value(s) are missing; run imputation first", missing),
        })?;

        let n_cols = FEATURE_COLUMNS.len();
        let flat: Vec<f64> = rows.into_iter().flatten().collect();
        let x = Array2::from_shape_vec((records.len(), n_cols), flat)
            .map_err(|e| GlofError::Training { reason: e.to_string() })?;

        Ok(Self {
            columns: matrix.columns,
            x,
            y: records.iter().map(|r| r.glof == Some(1)).collect(),
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn positives(&self) -> usize {
        self.y.iter().filter(|v| **v).count()
    }

    pub fn row(&self, i: usize) -> ArrayView1<f64> {
        self.x.row(i)
    }

    /// Labels as 0.0 / 1.0
    pub fn targets(&self) -> Vec<f64> {
        self.y.iter().map(|&v| if v { 1.0 } else { 0.0 }).collect()
    }

    pub fn subset(&self, rows: &[usize]) -> Self {
        Self {
            columns: self.columns.clone(),
            x: self.x.select(Axis(0), rows),
            y: rows.iter().map(|&i| self.y[i]).collect(),
        }
    }

    /// Split into (train, test) keeping the class ratio in both parts
    pub fn stratified_split(&self, test_fraction: f64, seed: u64) -> Result<(Self, Self)> {
        if !(test_fraction > 0.0 && test_fraction < 1.0) {
            return Err(GlofError::ConfigInvalid {
                key: "test_fraction".to_string(),
                reason: format!("must be strictly between 0 and 1, got {}", test_fraction),
            });
        }

        let mut rng = StdRng::seed_from_u64(seed);
        let mut train = Vec::new();
        let mut test = Vec::new();

        for class in [false, true] {
            let mut members: Vec<usize> = (0..self.len()).filter(|&i| self.y[i] == class).collect();
            members.shuffle(&mut rng);

            let mut n_test = (members.len() as f64 * test_fraction).round() as usize;
            if members.len() >= 2 {
                n_test = n_test.clamp(1, members.len() - 1);
            }
            test.extend_from_slice(&members[..n_test]);
            train.extend_from_slice(&members[n_test..]);
        }

        train.sort_unstable();
        test.sort_unstable();
        Ok((self.subset(&train), self.subset(&test)))
    }
}

/// Per-column z-score parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Standardizer {
    pub means: Vec<f64>,
    pub stds: Vec<f64>,
}

impl Standardizer {
    pub fn fit(x: &Array2<f64>) -> Self {
        let means = x.mean_axis(Axis(0)).unwrap_or_else(|| Array1::zeros(x.ncols()));
        let stds = x.std_axis(Axis(0), 0.0);
        Self { means: means.to_vec(), stds: stds.to_vec() }
    }

    /// Standardise one row; constant columns map to zero
    pub fn transform(&self, row: ArrayView1<f64>) -> Vec<f64> {
        row.iter()
            .zip(self.means.iter().zip(&self.stds))
            .map(|(v, (mean, std))| if *std > 0.0 { (v - mean) / std } else { 0.0 })
            .collect()
    }

    pub fn transform_all(&self, x: &Array2<f64>) -> Array2<f64> {
        let mut out = x.clone();
        for mut row in out.rows_mut() {
            let scaled = self.transform(row.view());
            row.iter_mut().zip(scaled).for_each(|(slot, v)| *slot = v);
        }
        out
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::Dataset;
    use ndarray::Array2;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    /// Two noisy Gaussian-ish clusters separated along the first two features
    pub fn separable(n: usize, seed: u64) -> Dataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let p = 4;
        let mut x = Array2::zeros((n, p));
        let mut y = Vec::with_capacity(n);
        for i in 0..n {
            let positive = i % 3 == 0;
            let shift = if positive { 2.0 } else { -2.0 };
            x[[i, 0]] = shift + rng.gen_range(-1.0..1.0);
            x[[i, 1]] = shift * 10.0 + rng.gen_range(-10.0..10.0);
            x[[i, 2]] = rng.gen_range(-1.0..1.0);
            x[[i, 3]] = 1.0;
            y.push(positive);
        }
        Dataset { columns: (0..p).map(|j| format!("f{}", j)).collect(), x, y }
    }
}
