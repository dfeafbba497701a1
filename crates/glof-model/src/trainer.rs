//! Fit every classifier family on one split and keep the best.

use chrono::Utc;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::info;

use glof_core::error::{GlofError, Result};
use glof_core::models::{ModelKind, SelectionMetric};

use crate::artifact::ModelArtifact;
use crate::classifiers::FittedModel;
use crate::dataset::Dataset;
use crate::metrics::Evaluation;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerOptions {
    pub test_fraction: f64,
    pub seed: u64,
    pub selection_metric: SelectionMetric,
}

impl Default for TrainerOptions {
    fn default() -> Self {
        Self { test_fraction: 0.25, seed: 42, selection_metric: SelectionMetric::RocAuc }
    }
}

/// Held-out scores of one classifier
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelScore {
    pub kind: ModelKind,
    #[serde(flatten)]
    pub evaluation: Evaluation,
}

/// Split, fit all four families, evaluate on the held-out part and select.
///
/// Ties on the selection metric go to the family listed first in
/// [`ModelKind::ALL`]. The selected model is not refitted on the test rows.
pub fn train_and_select(data: &Dataset, options: &TrainerOptions) -> Result<ModelArtifact> {
    let (train, test) = data.stratified_split(options.test_fraction, options.seed)?;
    for (name, part) in [("training", &train), ("test", &test)] {
        let positives = part.positives();
        if positives == 0 || positives == part.len() {
            return Err(GlofError::Training {
                reason: format!(
                    "{} split has a single class ({} of {} rows positive)",
                    name,
                    positives,
                    part.len()
                ),
            });
        }
    }
    info!(train = train.len(), test = test.len(), "Split dataset");

    let fitted: Vec<(FittedModel, Evaluation)> = ModelKind::ALL
        .par_iter()
        .map(|&kind| {
            let model = FittedModel::fit(kind, &train, options.seed)?;
            let scores = model.predict_all(&test.x);
            let evaluation = Evaluation::compute(&scores, &test.y).ok_or_else(|| GlofError::Training {
                reason: format!("could not evaluate {}", kind),
            })?;
            Ok::<_, GlofError>((model, evaluation))
        })
        .collect::<Result<_>>()?;

    let scores: Vec<ModelScore> = fitted
        .iter()
        .map(|(model, evaluation)| ModelScore { kind: model.kind(), evaluation: *evaluation })
        .collect();
    for score in &scores {
        info!(
            model = %score.kind,
            roc_auc = score.evaluation.roc_auc,
            f1 = score.evaluation.f1,
            "Held-out evaluation"
        );
    }

    let metric = options.selection_metric;
    let mut best: Option<(usize, f64)> = None;
    for (i, (_, evaluation)) in fitted.iter().enumerate() {
        let value = evaluation.metric(metric);
        if best.map_or(true, |(_, top)| value > top) {
            best = Some((i, value));
        }
    }
    let (best_index, best_value) = best.ok_or_else(|| GlofError::Training {
        reason: "no model was fitted".to_string(),
    })?;

    let model = fitted
        .into_iter()
        .nth(best_index)
        .map(|(model, _)| model)
        .ok_or_else(|| GlofError::Training { reason: "selected model is missing".to_string() })?;
    info!(model = %model.kind(), metric = %metric, value = best_value, "Selected model");

    Ok(ModelArtifact {
        kind: model.kind(),
        selection_metric: metric,
        feature_columns: data.columns.clone(),
        model,
        scores,
        train_rows: train.len(),
        test_rows: test.len(),
        seed: options.seed,
        trained_at: Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::test_support::separable;

    #[test]
    fn test_selects_best_by_metric() {
        let data = separable(60, 12);
        let artifact = train_and_select(&data, &TrainerOptions::default()).unwrap();

        assert_eq!(artifact.scores.len(), ModelKind::ALL.len());
        let best = artifact
            .scores
            .iter()
            .map(|s| s.evaluation.roc_auc)
            .fold(f64::NEG_INFINITY, f64::max);
        assert_eq!(artifact.selected_score().unwrap().evaluation.roc_auc, best);
        let first_best = artifact.scores.iter().find(|s| s.evaluation.roc_auc == best).unwrap();
        assert_eq!(artifact.kind, first_best.kind);
        assert_eq!(artifact.train_rows + artifact.test_rows, 60);
    }

    #[test]
    fn test_single_class_fails() {
        let mut data = separable(20, 1);
        data.y = vec![false; 20];
        assert!(matches!(
            train_and_select(&data, &TrainerOptions::default()),
            Err(GlofError::Training { .. })
        ));
    }
}
