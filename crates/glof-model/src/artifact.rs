//! The persisted, selected classifier.

use chrono::{DateTime, Utc};
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use glof_core::error::{GlofError, Result};
use glof_core::models::{ModelKind, SelectionMetric, FEATURE_COLUMNS};

use crate::classifiers::FittedModel;
use crate::trainer::ModelScore;

/// Everything needed to score lakes without retraining
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub kind: ModelKind,
    pub selection_metric: SelectionMetric,
    /// Input order of the model
    pub feature_columns: Vec<String>,
    pub model: FittedModel,
    /// Held-out scores of every compared model
    pub scores: Vec<ModelScore>,
    pub train_rows: usize,
    pub test_rows: usize,
    pub seed: u64,
    pub trained_at: DateTime<Utc>,
}

impl ModelArtifact {
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&content).map_err(|e| GlofError::ModelArtifact {
            reason: format!("{}: {}", path.display(), e),
        })?;
        artifact.validate()?;
        Ok(artifact)
    }

    /// Check internal consistency and that every column is a known feature
    pub fn validate(&self) -> Result<()> {
        if self.model.kind() != self.kind {
            return Err(GlofError::ModelArtifact {
                reason: format!("artifact declares {} but holds {}", self.kind, self.model.kind()),
            });
        }
        if self.feature_columns.is_empty() {
            return Err(GlofError::ModelArtifact { reason: "no feature columns".to_string() });
        }
        if let Some(unknown) = self.feature_columns.iter().find(|c| !FEATURE_COLUMNS.contains(&c.as_str())) {
            return Err(GlofError::ModelArtifact {
                reason: format!("unknown feature column '{}'", unknown),
            });
        }
        self.model.check_features(self.feature_columns.len())
    }

    /// Score of the selected model on the held-out split
    pub fn selected_score(&self) -> Option<&ModelScore> {
        self.scores.iter().find(|s| s.kind == self.kind)
    }

    /// Risk for a row laid out in `feature_columns` order
    pub fn predict(&self, row: ArrayView1<f64>) -> Result<f64> {
        if row.len() != self.feature_columns.len() {
            return Err(GlofError::ModelArtifact {
                reason: format!("expected {} features, got {}", self.feature_columns.len(), row.len()),
            });
        }
        Ok(self.model.predict_proba(row))
    }
}
