//! Risk scores for lakes: the tuple stream handed to map rendering.

use ndarray::Array1;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::Path;
use tracing::warn;

use glof_core::error::Result;
use glof_core::models::LakeRecord;
use glof_core::table;

use crate::artifact::ModelArtifact;

/// Identity, location and predicted outburst probability of one lake-year
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RiskScore {
    pub lake_id: String,
    #[serde(rename = "Latitude")]
    pub latitude: f64,
    #[serde(rename = "Longitude")]
    pub longitude: f64,
    #[serde(rename = "Year_final")]
    pub year: i32,
    pub risk_score: f64,
}

/// Scored rows plus the number skipped for missing features
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringReport {
    pub scores: Vec<RiskScore>,
    pub skipped: usize,
}

/// Score every record with complete features; incomplete rows are skipped
pub fn score_records(artifact: &ModelArtifact, records: &[LakeRecord]) -> Result<ScoringReport> {
    artifact.validate()?;

    let mut scores = Vec::with_capacity(records.len());
    let mut skipped = 0;
    for record in records {
        let row: Option<Array1<f64>> =
            artifact.feature_columns.iter().map(|c| record.feature(c)).collect();
        let Some(row) = row else {
            warn!(lake_id = %record.lake_id, year = record.year, "Skipping record with missing features");
            skipped += 1;
            continue;
        };

        scores.push(RiskScore {
            lake_id: record.lake_id.clone(),
            latitude: record.latitude,
            longitude: record.longitude,
            year: record.year,
            risk_score: artifact.predict(row.view())?,
        });
    }

    Ok(ScoringReport { scores, skipped })
}

pub fn write_scores_csv<P: AsRef<Path>>(path: P, scores: &[RiskScore]) -> Result<()> {
    table::write_csv(path, scores)
}

/// Write scores as a GeoJSON collection of points
pub fn write_scores_geojson<P: AsRef<Path>>(path: P, scores: &[RiskScore]) -> Result<()> {
    let features = scores
        .iter()
        .map(|score| {
            let mut properties = Map::new();
            properties.insert("lake_id".to_string(), JsonValue::from(score.lake_id.clone()));
            properties.insert("Year_final".to_string(), JsonValue::from(score.year));
            properties.insert("risk_score".to_string(), JsonValue::from(score.risk_score));

            geojson::Feature {
                geometry: Some(geojson::Geometry::new(geojson::Value::Point(vec![
                    score.longitude,
                    score.latitude,
                ]))),
                properties: Some(properties),
                id: None,
                bbox: None,
                foreign_members: None,
            }
        })
        .collect();

    let collection = geojson::FeatureCollection { features, bbox: None, foreign_members: None };
    fs::write(path, geojson::GeoJson::from(collection).to_string())?;
    Ok(())
}
