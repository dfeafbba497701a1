//! Chained-equations imputation of missing feature values.
//!
//! Each partition is imputed on its own: nothing observed in one partition
//! can influence the values filled into another.

use ndarray::{Array1, Array2, Axis};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use glof_core::error::{GlofError, Result};
use glof_core::table::FeatureMatrix;

use crate::linalg::RidgeRegression;

/// Iterative conditional-model imputer
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MiceImputer {
    pub iterations: usize,
    pub seed: u64,
    /// Ridge penalty of the per-column regressions
    pub ridge: f64,
}

impl Default for MiceImputer {
    fn default() -> Self {
        Self { iterations: 10, seed: 42, ridge: 1e-3 }
    }
}

/// What an imputation run filled
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ImputationSummary {
    pub rows: usize,
    pub filled_cells: usize,
    pub iterations: usize,
    pub columns_imputed: Vec<String>,
}

/// Observed state of one column
struct ColumnPlan {
    index: usize,
    missing_rows: Vec<usize>,
    observed_rows: Vec<usize>,
    min: f64,
    max: f64,
}

impl MiceImputer {
    pub fn new(iterations: usize, seed: u64) -> Self {
        Self { iterations, seed, ..Self::default() }
    }

    /// Complete a feature matrix. Observed cells are copied through untouched.
    pub fn impute(&self, matrix: &FeatureMatrix) -> Result<(FeatureMatrix, ImputationSummary)> {
        let n_rows = matrix.n_rows();
        let n_cols = matrix.n_cols();
        let missing = matrix.missing_count();

        if missing == 0 {
            let summary = ImputationSummary {
                rows: n_rows,
                filled_cells: 0,
                iterations: 0,
                columns_imputed: Vec::new(),
            };
            return Ok((matrix.clone(), summary));
        }

        let mut plans = Vec::new();
        for (j, name) in matrix.columns.iter().enumerate() {
            let (observed_rows, missing_rows): (Vec<usize>, Vec<usize>) =
                (0..n_rows).partition(|&i| matrix.values[i][j].is_some());
            if missing_rows.is_empty() {
                continue;
            }
            if observed_rows.is_empty() {
                return Err(GlofError::Imputation {
                    reason: format!("column '{}' has no observed values", name),
                });
            }
            let observed = observed_rows.iter().filter_map(|&i| matrix.values[i][j]);
            let (min, max) = observed.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
            plans.push(ColumnPlan { index: j, missing_rows, observed_rows, min, max });
        }
        plans.sort_by_key(|plan| plan.missing_rows.len());

        let mut x = initial_fill(matrix)?;
        let mut rng = StdRng::seed_from_u64(self.seed);

        for iteration in 0..self.iterations {
            for plan in &plans {
                let predictors: Vec<usize> = (0..n_cols).filter(|&k| k != plan.index).collect();
                let design = x.select(Axis(1), &predictors);
                let train_x = design.select(Axis(0), &plan.observed_rows);
                let train_y: Array1<f64> =
                    plan.observed_rows.iter().map(|&i| x[[i, plan.index]]).collect();

                let fit = RidgeRegression::fit(train_x.view(), train_y.view(), self.ridge)
                    .ok_or_else(|| GlofError::Imputation {
                        reason: format!(
                            "regression for column '{}' is singular",
                            matrix.columns[plan.index]
                        ),
                    })?;

                for &i in &plan.missing_rows {
                    let draw = fit.predict(design.row(i)) + fit.residual_std * standard_normal(&mut rng);
                    let value = draw.clamp(plan.min, plan.max);
                    if !value.is_finite() {
                        return Err(GlofError::Imputation {
                            reason: format!(
                                "non-finite value drawn for column '{}'",
                                matrix.columns[plan.index]
                            ),
                        });
                    }
                    x[[i, plan.index]] = value;
                }
            }
            debug!(iteration = iteration + 1, columns = plans.len(), "Imputation round complete");
        }

        let values = matrix
            .values
            .iter()
            .enumerate()
            .map(|(i, row)| {
                row.iter().enumerate().map(|(j, v)| Some(v.unwrap_or(x[[i, j]]))).collect()
            })
            .collect();

        let completed = FeatureMatrix { keys: matrix.keys.clone(), columns: matrix.columns.clone(), values };
        let summary = ImputationSummary {
            rows: n_rows,
            filled_cells: missing,
            iterations: self.iterations,
            columns_imputed: plans.iter().map(|p| matrix.columns[p.index].clone()).collect(),
        };
        info!(rows = n_rows, filled = missing, "Imputed partition");
        Ok((completed, summary))
    }

    /// Impute the positive and negative partitions independently.
    ///
    /// The negative partition uses `seed + 1` so the two draws never share a
    /// random stream.
    pub fn impute_partitions(
        &self,
        positive: &FeatureMatrix,
        negative: &FeatureMatrix,
    ) -> Result<PartitionImputation> {
        let (positive, positive_summary) = self.impute(positive)?;
        let negative_imputer = Self { seed: self.seed.wrapping_add(1), ..*self };
        let (negative, negative_summary) = negative_imputer.impute(negative)?;
        Ok(PartitionImputation { positive, negative, positive_summary, negative_summary })
    }
}

/// Completed positive and negative partitions
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionImputation {
    pub positive: FeatureMatrix,
    pub negative: FeatureMatrix,
    pub positive_summary: ImputationSummary,
    pub negative_summary: ImputationSummary,
}

/// Dense matrix with missing cells set to the observed column mean
fn initial_fill(matrix: &FeatureMatrix) -> Result<Array2<f64>> {
    let n_cols = matrix.n_cols();
    let mut sums = vec![0.0; n_cols];
    let mut counts = vec![0usize; n_cols];
    for row in &matrix.values {
        for (j, value) in row.iter().enumerate() {
            if let Some(v) = value {
                sums[j] += v;
                counts[j] += 1;
            }
        }
    }

    let mut x = Array2::zeros((matrix.n_rows(), n_cols));
    for (i, row) in matrix.values.iter().enumerate() {
        if row.len() != n_cols {
            return Err(GlofError::Imputation {
                reason: format!("row {} has {} values, expected {}", i, row.len(), n_cols),
            });
        }
        for (j, value) in row.iter().enumerate() {
            x[[i, j]] = match value {
                Some(v) => *v,
                None if counts[j] > 0 => sums[j] / counts[j] as f64,
                None => 0.0,
            };
        }
    }
    Ok(x)
}

/// Box-Muller draw from N(0, 1)
fn standard_normal<R: Rng>(rng: &mut R) -> f64 {
    let u1: f64 = 1.0 - rng.gen::<f64>();
    let u2: f64 = rng.gen::<f64>();
    (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos()
}

#[cfg(test)]
mod tests {
    use super::*;
    use glof_core::models::RecordKey;

    fn key(i: usize) -> RecordKey {
        RecordKey { lake_id: format!("lake-{}", i), latitude: 28.0, longitude: 86.0, year: 2015 }
    }

    fn matrix(values: Vec<Vec<Option<f64>>>) -> FeatureMatrix {
        FeatureMatrix {
            keys: (0..values.len()).map(key).collect(),
            columns: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            values,
        }
    }

    #[test]
    fn test_complete_table_is_unchanged() {
        let input = matrix(vec![
            vec![Some(1.0), Some(2.0), Some(3.0)],
            vec![Some(4.0), Some(5.0), Some(6.0)],
        ]);
        let (output, summary) = MiceImputer::default().impute(&input).unwrap();
        assert_eq!(output, input);
        assert_eq!(summary.filled_cells, 0);
    }

    #[test]
    fn test_fills_within_observed_range() {
        let input = matrix(vec![
            vec![Some(1.0), Some(10.0), Some(0.0)],
            vec![Some(2.0), None, Some(1.0)],
            vec![Some(3.0), Some(30.0), None],
            vec![Some(4.0), Some(40.0), Some(1.0)],
            vec![None, Some(50.0), Some(0.0)],
        ]);

        let (output, summary) = MiceImputer::new(5, 7).impute(&input).unwrap();

        assert_eq!(output.missing_count(), 0);
        assert_eq!(summary.filled_cells, 3);
        let b = output.values[1][1].unwrap();
        assert!((10.0..=50.0).contains(&b));
        let c = output.values[2][2].unwrap();
        assert!((0.0..=1.0).contains(&c));
        assert_eq!(output.values[0], input.values[0]);
    }

    #[test]
    fn test_same_seed_same_draw() {
        let input = matrix(vec![
            vec![Some(1.0), Some(2.0), None],
            vec![Some(2.0), None, Some(7.0)],
            vec![Some(3.0), Some(6.0), Some(9.0)],
            vec![Some(5.0), Some(8.0), Some(4.0)],
        ]);
        let imputer = MiceImputer::new(3, 11);
        assert_eq!(imputer.impute(&input).unwrap().0, imputer.impute(&input).unwrap().0);
    }

    #[test]
    fn test_column_without_observations_fails() {
        let input = matrix(vec![vec![Some(1.0), None, Some(1.0)], vec![Some(2.0), None, Some(3.0)]]);
        assert!(matches!(
            MiceImputer::default().impute(&input),
            Err(GlofError::Imputation { .. })
        ));
    }
}
