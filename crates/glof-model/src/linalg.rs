//! Small dense linear algebra: Cholesky solves and ridge regression.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};

/// Solve `a x = b` for symmetric positive-definite `a`.
///
/// Returns `None` when `a` is not positive definite.
pub fn cholesky_solve(a: &Array2<f64>, b: &Array1<f64>) -> Option<Array1<f64>> {
    let n = a.nrows();
    if a.ncols() != n || b.len() != n {
        return None;
    }

    let mut l = Array2::<f64>::zeros((n, n));
    for i in 0..n {
        for j in 0..=i {
            let sum: f64 = (0..j).map(|k| l[[i, k]] * l[[j, k]]).sum();
            if i == j {
                let diag = a[[i, i]] - sum;
                if !(diag > 0.0) || !diag.is_finite() {
                    return None;
                }
                l[[i, j]] = diag.sqrt();
            } else {
                l[[i, j]] = (a[[i, j]] - sum) / l[[j, j]];
            }
        }
    }

    // Forward substitution: L z = b
    let mut z = Array1::<f64>::zeros(n);
    for i in 0..n {
        let sum: f64 = (0..i).map(|k| l[[i, k]] * z[k]).sum();
        z[i] = (b[i] - sum) / l[[i, i]];
    }
    // Back substitution: Lᵀ x = z
    let mut x = Array1::<f64>::zeros(n);
    for i in (0..n).rev() {
        let sum: f64 = (i + 1..n).map(|k| l[[k, i]] * x[k]).sum();
        x[i] = (z[i] - sum) / l[[i, i]];
    }
    Some(x)
}

/// Ridge regression on standardised predictors with an unpenalised intercept
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeRegression {
    pub intercept: f64,
    /// Coefficients on the original predictor scale
    pub coefficients: Array1<f64>,
    /// Standard deviation of the training residuals
    pub residual_std: f64,
}

impl RidgeRegression {
    /// Fit `y ~ x`. Constant predictors get a zero coefficient.
    pub fn fit(x: ArrayView2<f64>, y: ArrayView1<f64>, lambda: f64) -> Option<Self> {
        let (n, p) = x.dim();
        if n == 0 || y.len() != n {
            return None;
        }

        let means = x.mean_axis(Axis(0))?;
        let stds = x.std_axis(Axis(0), 0.0);
        let y_mean = y.mean()?;

        let mut z = Array2::<f64>::zeros((n, p));
        for ((i, j), value) in z.indexed_iter_mut() {
            if stds[j] > 0.0 {
                *value = (x[[i, j]] - means[j]) / stds[j];
            }
        }
        let yc = y.mapv(|v| v - y_mean);

        let mut gram = z.t().dot(&z);
        for j in 0..p {
            gram[[j, j]] += lambda.max(1e-9);
        }
        let rhs = z.t().dot(&yc);
        let beta_std = if p == 0 { Array1::zeros(0) } else { cholesky_solve(&gram, &rhs)? };

        let coefficients = Array1::from_shape_fn(p, |j| {
            if stds[j] > 0.0 {
                beta_std[j] / stds[j]
            } else {
                0.0
            }
        });
        let intercept = y_mean - coefficients.dot(&means);

        let residuals = &y - &(x.dot(&coefficients) + intercept);
        let dof = (n as f64 - 1.0).max(1.0);
        let residual_std = (residuals.mapv(|r| r * r).sum() / dof).sqrt();

        Some(Self { intercept, coefficients, residual_std })
    }

    pub fn predict(&self, row: ArrayView1<f64>) -> f64 {
        self.intercept + self.coefficients.dot(&row)
    }
}
