//! Linear support-vector classifier with Platt-scaled probabilities.

use ndarray::{Array1, ArrayView1};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use crate::dataset::{Dataset, Standardizer};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SvmParams {
    pub lambda: f64,
    pub iterations: usize,
}

impl Default for SvmParams {
    fn default() -> Self {
        Self { lambda: 1e-2, iterations: 20_000 }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearSvm {
    pub scaler: Standardizer,
    pub weights: Vec<f64>,
    pub bias: f64,
    pub platt_a: f64,
    pub platt_b: f64,
}

impl LinearSvm {
    /// Pegasos stochastic sub-gradient descent on the hinge loss.
    ///
    /// The bias is learned as the weight of a constant input. The returned
    /// weights average the iterates of the second half of the run.
    pub fn fit(data: &Dataset, params: SvmParams, seed: u64) -> Self {
        let scaler = Standardizer::fit(&data.x);
        let z = scaler.transform_all(&data.x);
        let n = data.len();
        let p = data.n_features();
        let labels: Vec<f64> = data.y.iter().map(|&v| if v { 1.0 } else { -1.0 }).collect();

        let mut rng = StdRng::seed_from_u64(seed);
        let mut w = Array1::<f64>::zeros(p + 1);
        let mut averaged = Array1::<f64>::zeros(p + 1);
        let mut averaged_count = 0usize;
        let lambda = params.lambda.max(1e-9);

        if n > 0 {
            for t in 1..=params.iterations {
                let i = rng.gen_range(0..n);
                let eta = 1.0 / (lambda * t as f64);
                let margin = labels[i] * (z.row(i).dot(&w.slice(ndarray::s![..p])) + w[p]);

                w *= 1.0 - eta * lambda;
                if margin < 1.0 {
                    for j in 0..p {
                        w[j] += eta * labels[i] * z[[i, j]];
                    }
                    w[p] += eta * labels[i];
                }

                if t > params.iterations / 2 {
                    averaged += &w;
                    averaged_count += 1;
                }
            }
        }
        if averaged_count > 0 {
            averaged /= averaged_count as f64;
        }

        let mut model = Self {
            scaler,
            weights: averaged.slice(ndarray::s![..p]).to_vec(),
            bias: averaged[p],
            platt_a: -1.0,
            platt_b: 0.0,
        };
        let decisions: Vec<f64> = (0..n).map(|i| model.decision(data.row(i))).collect();
        let (a, b) = platt_scaling(&decisions, &data.y);
        model.platt_a = a;
        model.platt_b = b;
        model
    }

    pub fn decision(&self, row: ArrayView1<f64>) -> f64 {
        let z = self.scaler.transform(row);
        self.bias + z.iter().zip(&self.weights).map(|(v, w)| v * w).sum::<f64>()
    }

    /// `P(y = 1 | f) = 1 / (1 + exp(A f + B))`
    pub fn predict_proba(&self, row: ArrayView1<f64>) -> f64 {
        1.0 / (1.0 + (self.platt_a * self.decision(row) + self.platt_b).exp())
    }
}

/// ln(1 + e^z) without overflow
fn softplus(z: f64) -> f64 {
    z.max(0.0) + (-z.abs()).exp().ln_1p()
}

/// Fit the sigmoid parameters (A, B) by damped Newton steps on the
/// regularised targets of Platt (1999).
pub fn platt_scaling(decisions: &[f64], labels: &[bool]) -> (f64, f64) {
    let n_pos = labels.iter().filter(|l| **l).count() as f64;
    let n_neg = labels.len() as f64 - n_pos;
    let hi = (n_pos + 1.0) / (n_pos + 2.0);
    let lo = 1.0 / (n_neg + 2.0);
    let targets: Vec<f64> = labels.iter().map(|&l| if l { hi } else { lo }).collect();

    let loss = |a: f64, b: f64| -> f64 {
        decisions
            .iter()
            .zip(&targets)
            .map(|(f, t)| {
                let z = a * f + b;
                t * softplus(z) + (1.0 - t) * softplus(-z)
            })
            .sum()
    };

    let mut a = 0.0;
    let mut b = ((n_neg + 1.0) / (n_pos + 1.0)).ln();
    let mut current = loss(a, b);

    for _ in 0..100 {
        let (mut g_a, mut g_b) = (0.0, 0.0);
        let (mut h_aa, mut h_ab, mut h_bb) = (1e-12, 0.0, 1e-12);
        for (f, t) in decisions.iter().zip(&targets) {
            let p = 1.0 / (1.0 + (a * f + b).exp());
            let d = t - p;
            let w = p * (1.0 - p);
            g_a += d * f;
            g_b += d;
            h_aa += w * f * f;
            h_ab += w * f;
            h_bb += w;
        }
        if g_a.abs() < 1e-6 && g_b.abs() < 1e-6 {
            break;
        }

        let det = h_aa * h_bb - h_ab * h_ab;
        if det.abs() < 1e-18 {
            break;
        }
        let step_a = -(h_bb * g_a - h_ab * g_b) / det;
        let step_b = -(-h_ab * g_a + h_aa * g_b) / det;

        let mut scale = 1.0;
        let mut improved = false;
        while scale >= 1e-10 {
            let (na, nb) = (a + scale * step_a, b + scale * step_b);
            let candidate = loss(na, nb);
            if candidate < current + 1e-4 * scale * (g_a * step_a + g_b * step_b) {
                a = na;
                b = nb;
                current = candidate;
                improved = true;
                break;
            }
            scale /= 2.0;
        }
        if !improved {
            break;
        }
    }
    (a, b)
}
