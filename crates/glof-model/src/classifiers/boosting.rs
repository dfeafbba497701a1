use ndarray::ArrayView1;
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use super::sigmoid;
use super::tree::{RegressionTree, TreeParams};
use crate::dataset::Dataset;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoostingParams {
    pub n_rounds: usize,
    pub learning_rate: f64,
    pub max_depth: usize,
    pub min_samples_leaf: usize,
    pub lambda: f64,
}

impl Default for BoostingParams {
    fn default() -> Self {
        Self { n_rounds: 100, learning_rate: 0.1, max_depth: 3, min_samples_leaf: 1, lambda: 1.0 }
    }
}

/// Log-loss gradient boosting over shallow Newton trees
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GradientBoosting {
    /// Prior log-odds
    pub base_score: f64,
    pub learning_rate: f64,
    pub trees: Vec<RegressionTree>,
}

impl GradientBoosting {
    pub fn fit(data: &Dataset, params: BoostingParams, seed: u64) -> Self {
        let n = data.len();
        let y = data.targets();
        let prior = (data.positives() as f64 / n.max(1) as f64).clamp(1e-6, 1.0 - 1e-6);
        let base_score = (prior / (1.0 - prior)).ln();

        let tree_params = TreeParams {
            max_depth: params.max_depth,
            min_samples_leaf: params.min_samples_leaf,
            max_features: None,
            lambda: params.lambda,
        };
        let rows: Vec<usize> = (0..n).collect();
        let mut rng = StdRng::seed_from_u64(seed);
        let mut raw = vec![base_score; n];
        let mut trees = Vec::with_capacity(params.n_rounds);

        for _ in 0..params.n_rounds {
            let mut grad = Vec::with_capacity(n);
            let mut hess = Vec::with_capacity(n);
            for (f, target) in raw.iter().zip(&y) {
                let p = sigmoid(*f);
                grad.push(p - target);
                hess.push((p * (1.0 - p)).max(1e-16));
            }

            let tree = RegressionTree::fit(&data.x, &grad, &hess, &rows, tree_params, &mut rng);
            for (i, f) in raw.iter_mut().enumerate() {
                *f += params.learning_rate * tree.predict(data.row(i));
            }
            trees.push(tree);
        }

        Self { base_score, learning_rate: params.learning_rate, trees }
    }

    pub fn decision(&self, row: ArrayView1<f64>) -> f64 {
        self.base_score + self.learning_rate * self.trees.iter().map(|t| t.predict(row)).sum::<f64>()
    }

    pub fn predict_proba(&self, row: ArrayView1<f64>) -> f64 {
        sigmoid(self.decision(row))
    }
}
