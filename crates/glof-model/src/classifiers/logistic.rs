use ndarray::{Array1, ArrayView1};
use serde::{Deserialize, Serialize};

use super::sigmoid;
use crate::dataset::{Dataset, Standardizer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LogisticParams {
    pub learning_rate: f64,
    pub epochs: usize,
    pub l2: f64,
}

impl Default for LogisticParams {
    fn default() -> Self {
        Self { learning_rate: 0.1, epochs: 2000, l2: 1e-3 }
    }
}

/// L2-penalised logistic regression on standardised inputs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticRegression {
    pub scaler: Standardizer,
    pub weights: Vec<f64>,
    pub bias: f64,
}

impl LogisticRegression {
    /// Full-batch gradient descent on the mean log-loss
    pub fn fit(data: &Dataset, params: LogisticParams) -> Self {
        let scaler = Standardizer::fit(&data.x);
        let z = scaler.transform_all(&data.x);
        let y = Array1::from(data.targets());
        let n = data.len().max(1) as f64;

        let mut weights = Array1::<f64>::zeros(data.n_features());
        let mut bias = 0.0;

        for _ in 0..params.epochs {
            let residual = (z.dot(&weights) + bias).mapv(sigmoid) - &y;
            let grad_w = z.t().dot(&residual) / n + &weights * params.l2;
            let grad_b = residual.sum() / n;
            weights = weights - grad_w * params.learning_rate;
            bias -= params.learning_rate * grad_b;
        }

        Self { scaler, weights: weights.to_vec(), bias }
    }

    pub fn decision(&self, row: ArrayView1<f64>) -> f64 {
        let z = self.scaler.transform(row);
        self.bias + z.iter().zip(&self.weights).map(|(v, w)| v * w).sum::<f64>()
    }

    pub fn predict_proba(&self, row: ArrayView1<f64>) -> f64 {
        sigmoid(self.decision(row))
    }
}
