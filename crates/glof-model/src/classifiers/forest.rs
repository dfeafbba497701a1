use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use super::tree::{RegressionTree, TreeParams};
use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForestParams {
    pub n_trees: usize,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
}

impl Default for ForestParams {
    fn default() -> Self {
        Self { n_trees: 100, max_depth: 8, min_samples_leaf: 1 }
    }
}

/// Bagged CART trees with √p candidate features per split
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RandomForest {
    pub trees: Vec<RegressionTree>,
}

impl RandomForest {
    pub fn fit(data: &Dataset, params: ForestParams, seed: u64) -> Self {
        let n = data.len();
        let p = data.n_features();
        if n == 0 {
            return Self { trees: Vec::new() };
        }
        let grad: Vec<f64> = data.targets().iter().map(|y| -y).collect();
        let hess = vec![1.0; n];
        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            max_features: Some(((p as f64).sqrt().round() as usize).max(1)),
            lambda: 0.0,
        };

        let trees = (0..params.n_trees)
            .into_par_iter()
            .map(|t| {
                let mut rng = StdRng::seed_from_u64(seed.wrapping_add(t as u64));
                let rows: Vec<usize> = (0..n).map(|_| rng.gen_range(0..n)).collect();
                RegressionTree::fit(&data.x, &grad, &hess, &rows, tree_params, &mut rng)
            })
            .collect();

        Self { trees }
    }

    /// Mean leaf probability across trees
    pub fn predict_proba(&self, row: ArrayView1<f64>) -> f64 {
        if self.trees.is_empty() {
            return 0.5;
        }
        let sum: f64 = self.trees.iter().map(|t| t.predict(row)).sum();
        (sum / self.trees.len() as f64).clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_support::separable;
    use crate::metrics::roc_auc;

    #[test]
    fn test_forest_separates_clusters() {
        let data = separable(60, 3);
        let forest = RandomForest::fit(&data, ForestParams { n_trees: 25, ..Default::default() }, 9);

        let scores: Vec<f64> = (0..data.len()).map(|i| forest.predict_proba(data.row(i))).collect();
        assert!(roc_auc(&scores, &data.y).unwrap() > 0.95);
        assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
    }

    #[test]
    fn test_forest_is_reproducible() {
        let data = separable(30, 3);
        let params = ForestParams { n_trees: 5, ..Default::default() };
        assert_eq!(RandomForest::fit(&data, params, 1), RandomForest::fit(&data, params, 1));
    }
}
