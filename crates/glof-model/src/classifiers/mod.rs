//! Binary classifiers compared by the trainer.
//!
//! Every model outputs `P(GLOF = 1)` for a feature row and serialises its
//! fitted parameters as part of the model artifact.

pub mod boosting;
pub mod forest;
pub mod logistic;
pub mod svm;
pub mod tree;

use ndarray::{Array2, ArrayView1};
use serde::{Deserialize, Serialize};

use glof_core::error::{GlofError, Result};
use glof_core::models::ModelKind;

use crate::dataset::Dataset;

pub use boosting::{BoostingParams, GradientBoosting};
pub use forest::{ForestParams, RandomForest};
pub use logistic::{LogisticParams, LogisticRegression};
pub use svm::{LinearSvm, SvmParams};

pub(crate) fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// A fitted classifier of any supported family
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "params", rename_all = "snake_case")]
pub enum FittedModel {
    LogisticRegression(LogisticRegression),
    RandomForest(RandomForest),
    GradientBoosting(GradientBoosting),
    SupportVector(LinearSvm),
}

impl FittedModel {
    /// Fit one model family with its default hyper-parameters
    pub fn fit(kind: ModelKind, data: &Dataset, seed: u64) -> Result<Self> {
        if data.is_empty() {
            return Err(GlofError::Training { reason: format!("no rows to fit {}", kind) });
        }

        let model = match kind {
            ModelKind::LogisticRegression => {
                FittedModel::LogisticRegression(LogisticRegression::fit(data, LogisticParams::default()))
            }
            ModelKind::RandomForest => {
                FittedModel::RandomForest(RandomForest::fit(data, ForestParams::default(), seed))
            }
            ModelKind::GradientBoosting => {
                FittedModel::GradientBoosting(GradientBoosting::fit(data, BoostingParams::default(), seed))
            }
            ModelKind::SupportVector => {
                FittedModel::SupportVector(LinearSvm::fit(data, SvmParams::default(), seed))
            }
        };

        // Non-convergence shows up as non-finite probabilities
        if (0..data.len()).any(|i| !model.predict_proba(data.row(i)).is_finite()) {
            return Err(GlofError::Training {
                reason: format!("{} produced non-finite probabilities", kind),
            });
        }
        Ok(model)
    }

    pub fn kind(&self) -> ModelKind {
        match self {
            FittedModel::LogisticRegression(_) => ModelKind::LogisticRegression,
            FittedModel::RandomForest(_) => ModelKind::RandomForest,
            FittedModel::GradientBoosting(_) => ModelKind::GradientBoosting,
            FittedModel::SupportVector(_) => ModelKind::SupportVector,
        }
    }

    pub fn predict_proba(&self, row: ArrayView1<f64>) -> f64 {
        match self {
            FittedModel::LogisticRegression(m) => m.predict_proba(row),
            FittedModel::RandomForest(m) => m.predict_proba(row),
            FittedModel::GradientBoosting(m) => m.predict_proba(row),
            FittedModel::SupportVector(m) => m.predict_proba(row),
        }
    }

    pub fn predict_all(&self, x: &Array2<f64>) -> Vec<f64> {
        x.rows().into_iter().map(|row| self.predict_proba(row)).collect()
    }

    /// Check that the model reads exactly `n_features` inputs
    pub fn check_features(&self, n_features: usize) -> Result<()> {
        let expected = match self {
            FittedModel::LogisticRegression(m) => Some(m.weights.len()),
            FittedModel::SupportVector(m) => Some(m.weights.len()),
            FittedModel::RandomForest(m) => {
                return check_trees(m.trees.iter().filter_map(|t| t.max_feature()), n_features)
            }
            FittedModel::GradientBoosting(m) => {
                return check_trees(m.trees.iter().filter_map(|t| t.max_feature()), n_features)
            }
        };
        match expected {
            Some(len) if len != n_features => Err(GlofError::ModelArtifact {
                reason: format!("model has {} weights for {} feature columns", len, n_features),
            }),
            _ => Ok(()),
        }
    }
}

fn check_trees(mut used: impl Iterator<Item = usize>, n_features: usize) -> Result<()> {
    match used.find(|&f| f >= n_features) {
        Some(f) => Err(GlofError::ModelArtifact {
            reason: format!("tree splits on feature {} but only {} columns exist", f, n_features),
        }),
        None => Ok(()),
    }
}
