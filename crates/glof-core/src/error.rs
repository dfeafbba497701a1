//! Error types for the GLOF pipeline

use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum GlofError {
    // Imagery errors
    #[error("Scene {scene} is missing required band '{band}'")]
    MissingBand { scene: String, band: String },

    #[error("Band shape mismatch in scene {scene}: {reason}")]
    ShapeMismatch { scene: String, reason: String },

    #[error("Grid mismatch: {reason}")]
    GridMismatch { reason: String },

    #[error("No usable acquisitions for lake {lake_id} in reference year {year}")]
    NoUsableAcquisitions { lake_id: String, year: i32 },

    #[error("Failed to read raster {path}: {reason}")]
    Raster { path: PathBuf, reason: String },

    // Vector errors
    #[error("Invalid geometry for {feature_id}: {reason}")]
    InvalidGeometry { feature_id: String, reason: String },

    #[error("Invalid inventory {path}: {reason}")]
    Inventory { path: PathBuf, reason: String },

    // Table errors
    #[error("Invalid record for lake {lake_id} ({year}): {reason}")]
    InvalidRecord {
        lake_id: String,
        year: i32,
        reason: String,
    },

    #[error("{count} record(s) need manual review before imputation or training")]
    PendingReview { count: usize },

    // Modelling errors
    #[error("Imputation failed: {reason}")]
    Imputation { reason: String },

    #[error("Training failed: {reason}")]
    Training { reason: String },

    #[error("Invalid model artifact: {reason}")]
    ModelArtifact { reason: String },

    // Configuration errors
    #[error("Missing required configuration: {key}")]
    ConfigMissing { key: String },

    #[error("Invalid configuration value for {key}: {reason}")]
    ConfigInvalid { key: String, reason: String },

    // IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(String),
}

pub type Result<T> = std::result::Result<T, GlofError>;

impl From<serde_json::Error> for GlofError {
    fn from(err: serde_json::Error) -> Self {
        GlofError::Serialization(err.to_string())
    }
}
