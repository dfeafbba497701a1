//! GLOF Model - Imputation, classifiers, model selection and risk scoring
//!
//! This crate consumes the labelled feature table: it completes missing
//! values per label partition, compares several classifiers on a held-out
//! split, persists the selected model and scores lakes with it.

pub mod artifact;
pub mod classifiers;
pub mod dataset;
pub mod impute;
pub mod linalg;
pub mod metrics;
pub mod scoring;
pub mod trainer;

pub use artifact::ModelArtifact;
pub use classifiers::FittedModel;
pub use dataset::Dataset;
pub use impute::MiceImputer;
pub use trainer::{train_and_select, TrainerOptions};
