use glof_model::impute::ImputationSummary;
use glof_model::trainer::ModelScore;
use serde::Serialize;
use std::collections::BTreeMap;

/// Output for extract command
#[derive(Debug, Serialize)]
pub struct ExtractOutput {
    pub lakes: usize,
    pub records: usize,
    pub dropped: Vec<DroppedInfo>,
    pub scenes_excluded: usize,
    pub features_path: String,
    pub lakes_path: String,
}

#[derive(Debug, Serialize)]
pub struct DroppedInfo {
    pub lake_id: String,
    pub year: i32,
    pub reason: String,
}

/// Output for label command
#[derive(Debug, Serialize)]
pub struct LabelOutput {
    pub positives: usize,
    pub negatives: usize,
    pub unmatched: usize,
    pub adjudicated: usize,
    pub pending_review: usize,
    pub labelled_path: String,
    pub review_path: Option<String>,
    pub partitions_written: bool,
}

/// Output for impute command
#[derive(Debug, Serialize)]
pub struct ImputeOutput {
    pub positive: ImputationSummary,
    pub negative: ImputationSummary,
    pub imputed_path: String,
}

/// Output for train command
#[derive(Debug, Serialize)]
pub struct TrainOutput {
    pub selected: String,
    pub selection_metric: String,
    pub train_rows: usize,
    pub test_rows: usize,
    pub scores: Vec<ModelScore>,
    pub model_path: String,
}

/// Output for score command
#[derive(Debug, Serialize)]
pub struct ScoreOutput {
    pub scored: usize,
    pub skipped: usize,
    pub csv_path: String,
    pub geojson_path: String,
}

/// Output for run command
#[derive(Debug, Serialize)]
pub struct RunOutput {
    pub extract: ExtractOutput,
    pub label: LabelOutput,
    pub impute: ImputeOutput,
    pub train: TrainOutput,
    pub score: Option<ScoreOutput>,
}

/// Output for config command
#[derive(Debug, Serialize)]
pub struct ConfigOutput {
    pub config_file: Option<String>,
    pub values: BTreeMap<String, ConfigEntry>,
}

#[derive(Debug, Serialize)]
pub struct ConfigEntry {
    pub value: String,
    pub source: String,
}
