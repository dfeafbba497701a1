//! GLOF Core - Domain models, configuration, and tabular I/O
//!
//! This crate contains the data model shared by every pipeline stage: raster
//! scenes and water masks, lake and glacier polygons, the per-lake feature
//! record, and the layered configuration that parameterises a run.

pub mod config;
pub mod error;
pub mod models;
pub mod table;

pub use error::{GlofError, Result};
