//! Extraction pipeline: scenes to feature records, one lake at a time.
//!
//! Lakes are independent and run in parallel. Within a lake, reference
//! years run in order so each year's polygon can break vectorizer ties for
//! the next.

use geo::Point;
use rayon::prelude::*;
use serde_json::{Map, Value as JsonValue};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use glof_core::error::{GlofError, Result};
use glof_core::models::{
    CatalogueEntry, CompositeWindow, LakePolygon, LakeRecord, LakeStatus, LakeType, RasterScene,
    WaterMask,
};

use crate::composite::composite;
use crate::features::{apply_expansion_rates, extract_features, FeatureContext};
use crate::imagery::{preprocess, PreprocessOptions};
use crate::manifest::SceneSource;
use crate::vectorize::vectorize;

/// Source of raster scenes for a lake
pub trait SceneProvider: Sync {
    /// Scenes of `lake_id` acquired in any of the window's years.
    ///
    /// A scene that cannot be read is returned as an error and excluded
    /// from the composite by the caller.
    fn scenes(&self, lake_id: &str, window: &CompositeWindow) -> Vec<Result<RasterScene>>;
}

/// Scenes already held in memory
#[derive(Debug, Default)]
pub struct InMemoryScenes {
    scenes: Vec<RasterScene>,
}

impl InMemoryScenes {
    pub fn new(scenes: Vec<RasterScene>) -> Self {
        Self { scenes }
    }
}

impl SceneProvider for InMemoryScenes {
    fn scenes(&self, lake_id: &str, window: &CompositeWindow) -> Vec<Result<RasterScene>> {
        self.scenes
            .iter()
            .filter(|s| s.lake_id == lake_id && window.contains(s.year()))
            .map(|s| Ok(s.clone()))
            .collect()
    }
}

/// Scenes read from disk as listed in a manifest
#[derive(Debug)]
pub struct ManifestScenes<'a> {
    sources: &'a [SceneSource],
}

impl<'a> ManifestScenes<'a> {
    pub fn new(sources: &'a [SceneSource]) -> Self {
        Self { sources }
    }
}

impl SceneProvider for ManifestScenes<'_> {
    fn scenes(&self, lake_id: &str, window: &CompositeWindow) -> Vec<Result<RasterScene>> {
        self.sources
            .iter()
            .filter(|s| s.lake_id == lake_id && window.contains(s.year()))
            .map(SceneSource::load)
            .collect()
    }
}

/// One (lake, reference year) to extract
#[derive(Debug, Clone, PartialEq)]
pub struct ExtractionJob {
    pub lake_id: String,
    pub lake_type: LakeType,
    /// Inventory centroid, the first tie-break anchor for the vectorizer
    pub inventory_centroid: Point<f64>,
    pub reference_year: i32,
    pub status: LakeStatus,
}

impl ExtractionJob {
    pub fn window(&self) -> CompositeWindow {
        CompositeWindow::for_status(self.status, self.reference_year)
    }
}

/// Plan one job per lake and reference year.
///
/// Each catalogued event year is added as a pre-GLOF reference year for its
/// lake. Jobs come out sorted by (lake_id, year).
pub fn plan_jobs(catalogue: &[CatalogueEntry], reference_years: &[i32]) -> Vec<ExtractionJob> {
    let mut lakes: BTreeMap<&str, (&CatalogueEntry, Vec<i32>)> = BTreeMap::new();
    for entry in catalogue {
        let (_, events) = lakes.entry(entry.lake_id.as_str()).or_insert((entry, Vec::new()));
        events.extend(entry.event_year);
    }

    let mut jobs = Vec::new();
    for (lake_id, (entry, events)) in lakes {
        let mut years: Vec<i32> = reference_years.iter().copied().chain(events.iter().copied()).collect();
        years.sort_unstable();
        years.dedup();

        for year in years {
            let status = LakeStatus::for_reference(&events, year);
            jobs.push(ExtractionJob {
                lake_id: lake_id.to_string(),
                lake_type: entry.simplified_type(),
                inventory_centroid: Point::new(entry.longitude, entry.latitude),
                reference_year: year,
                status,
            });
        }
    }
    jobs
}

/// A lake-year that produced no record
#[derive(Debug, Clone, PartialEq)]
pub struct DroppedRecord {
    pub lake_id: String,
    pub year: i32,
    pub reason: String,
}

/// Result of one job
#[derive(Debug, Clone)]
pub enum JobOutcome {
    Extracted { record: Box<LakeRecord>, polygon: Box<LakePolygon> },
    Dropped(DroppedRecord),
}

/// Everything an extraction run produced
#[derive(Debug, Default)]
pub struct ExtractionReport {
    /// Sorted by (lake_id, year), expansion rates filled, labels unset
    pub records: Vec<LakeRecord>,
    pub polygons: Vec<LakePolygon>,
    pub dropped: Vec<DroppedRecord>,
    pub scenes_excluded: usize,
}

/// Scenes of one window turned into masks; unusable scenes are counted and skipped
fn masks_for(
    job: &ExtractionJob,
    window: &CompositeWindow,
    provider: &dyn SceneProvider,
    options: &PreprocessOptions,
) -> (Vec<WaterMask>, usize) {
    let mut masks = Vec::new();
    let mut excluded = 0;
    for scene in provider.scenes(&job.lake_id, window) {
        match scene.and_then(|scene| preprocess(&scene, options)) {
            Ok(mask) => masks.push(mask),
            Err(e) => {
                tracing::warn!(
                    lake_id = %job.lake_id,
                    year = job.reference_year,
                    error = %e,
                    "Scene excluded from composite"
                );
                excluded += 1;
            }
        }
    }
    (masks, excluded)
}

/// Run one job. Recoverable per-lake-year problems become `Dropped`.
pub fn run_job(
    job: &ExtractionJob,
    previous_centroid: Option<Point<f64>>,
    provider: &dyn SceneProvider,
    ctx: &FeatureContext,
    options: &PreprocessOptions,
) -> Result<(JobOutcome, usize)> {
    let window = job.window();
    let (masks, excluded) = masks_for(job, &window, provider, options);
    let dropped = |reason: String| {
        tracing::warn!(lake_id = %job.lake_id, year = job.reference_year, %reason, "Dropping record");
        JobOutcome::Dropped(DroppedRecord {
            lake_id: job.lake_id.clone(),
            year: job.reference_year,
            reason,
        })
    };

    let composite = match composite(&job.lake_id, &masks, &window) {
        Ok(composite) => composite,
        Err(e @ GlofError::NoUsableAcquisitions { .. }) => {
            return Ok((dropped(e.to_string()), excluded))
        }
        Err(e) => return Err(e),
    };

    let Some(polygon) = vectorize(&composite, previous_centroid)? else {
        return Ok((dropped("composite contains no water".to_string()), excluded));
    };

    let record = extract_features(&polygon, job.lake_type, ctx);
    Ok((
        JobOutcome::Extracted { record: Box::new(record), polygon: Box::new(polygon) },
        excluded,
    ))
}

/// Run every job and assemble the feature table.
///
/// `on_lake_done` is called once per lake as it completes, from any thread.
pub fn run_extraction(
    jobs: &[ExtractionJob],
    provider: &dyn SceneProvider,
    ctx: &FeatureContext,
    options: &PreprocessOptions,
    on_lake_done: &(dyn Fn(&str) + Sync),
) -> Result<ExtractionReport> {
    let mut by_lake: BTreeMap<&str, Vec<&ExtractionJob>> = BTreeMap::new();
    for job in jobs {
        by_lake.entry(job.lake_id.as_str()).or_default().push(job);
    }

    let per_lake: Vec<(Vec<JobOutcome>, usize)> = by_lake
        .into_par_iter()
        .map(|(lake_id, mut lake_jobs)| {
            lake_jobs.sort_by_key(|job| job.reference_year);
            let mut previous = lake_jobs.first().map(|job| job.inventory_centroid);
            let mut outcomes = Vec::with_capacity(lake_jobs.len());
            let mut excluded = 0;

            for job in lake_jobs {
                let (outcome, skipped) = run_job(job, previous, provider, ctx, options)?;
                if let JobOutcome::Extracted { polygon, .. } = &outcome {
                    previous = Some(polygon.centroid);
                }
                excluded += skipped;
                outcomes.push(outcome);
            }

            on_lake_done(lake_id);
            Ok::<_, GlofError>((outcomes, excluded))
        })
        .collect::<Result<_>>()?;

    let mut report = ExtractionReport::default();
    for (outcomes, excluded) in per_lake {
        report.scenes_excluded += excluded;
        for outcome in outcomes {
            match outcome {
                JobOutcome::Extracted { record, polygon } => {
                    report.records.push(*record);
                    report.polygons.push(*polygon);
                }
                JobOutcome::Dropped(dropped) => report.dropped.push(dropped),
            }
        }
    }

    report.records.sort_by(|a, b| a.lake_id.cmp(&b.lake_id).then(a.year.cmp(&b.year)));
    apply_expansion_rates(&mut report.records);

    tracing::info!(
        records = report.records.len(),
        dropped = report.dropped.len(),
        scenes_excluded = report.scenes_excluded,
        "Extraction finished"
    );
    Ok(report)
}

/// Write lake outlines as a GeoJSON feature collection
pub fn write_lakes_geojson<P: AsRef<Path>>(path: P, polygons: &[LakePolygon]) -> Result<()> {
    let features = polygons
        .iter()
        .map(|lake| {
            let mut properties = Map::new();
            properties.insert("lake_id".to_string(), JsonValue::from(lake.lake_id.clone()));
            properties.insert("Year_final".to_string(), JsonValue::from(lake.reference_year));
            properties.insert("Lake_area_ha".to_string(), JsonValue::from(lake.area_ha));
            geojson::Feature {
                geometry: Some(geojson::Geometry::new(geojson::Value::from(&lake.geometry))),
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::glaciers::GlacierIndex;
    use chrono::NaiveDate;
    use glof_core::models::{Band, GridSpec};
    use ndarray::Array2;

    fn entry(id: &str, event_year: Option<i32>) -> CatalogueEntry {
        CatalogueEntry {
            lake_id: id.to_string(),
            latitude: 28.0,
            longitude: 86.0,
            event_year,
            lake_type: Some("M".to_string()),
        }
    }

    #[test]
    fn test_plan_adds_event_year_as_pre_glof() {
        let catalogue = vec![entry("b", None), entry("a", Some(2012))];
        let jobs = plan_jobs(&catalogue, &[2010, 2015]);

        let summary: Vec<(&str, i32, LakeStatus)> =
            jobs.iter().map(|j| (j.lake_id.as_str(), j.reference_year, j.status)).collect();
        assert_eq!(
            summary,
            vec![
                ("a", 2010, LakeStatus::NonGlof),
                ("a", 2012, LakeStatus::PreGlof),
                ("a", 2015, LakeStatus::NonGlof),
                ("b", 2010, LakeStatus::NonGlof),
                ("b", 2015, LakeStatus::NonGlof),
            ]
        );
        assert_eq!(jobs[1].window().years, [2009, 2010, 2011]);
        assert_eq!(jobs[0].lake_type, LakeType::MoraineDammed);
    }

    #[test]
    fn test_lake_without_scenes_is_dropped() {
        let catalogue = vec![entry("a", None)];
        let jobs = plan_jobs(&catalogue, &[2015]);
        let glaciers = GlacierIndex::new(Vec::new());
        let ctx = FeatureContext::new(&glaciers, None, 10_000.0);

        let report = run_extraction(
            &jobs,
            &InMemoryScenes::default(),
            &ctx,
            &PreprocessOptions::default(),
            &|_| {},
        )
        .unwrap();

        assert!(report.records.is_empty());
        assert_eq!(report.dropped.len(), 1);
        assert!(report.dropped[0].reason.contains("No usable acquisitions"));
    }

    #[test]
    fn test_scene_missing_band_is_excluded_not_fatal() {
        let grid = GridSpec::new(86.0, 28.0, 0.001, 0.001, 30.0);
        let date = NaiveDate::from_ymd_opt(2015, 9, 30).unwrap();
        let broken = RasterScene::new("broken", "a", date, grid)
            .with_band(Band::Green, Array2::zeros((2, 2)));
        let clear = 21824.0;
        let good = RasterScene::new("good", "a", date, grid)
            .with_band(Band::Green, Array2::from_elem((2, 2), 20000.0))
            .with_band(Band::Nir, Array2::from_elem((2, 2), 9000.0))
            .with_band(Band::Qa, Array2::from_elem((2, 2), clear));

        let jobs = plan_jobs(&[entry("a", None)], &[2015]);
        let glaciers = GlacierIndex::new(Vec::new());
        let ctx = FeatureContext::new(&glaciers, None, 10_000.0);

        let report = run_extraction(
            &jobs,
            &InMemoryScenes::new(vec![broken, good]),
            &ctx,
            &PreprocessOptions::default(),
            &|_| {},
        )
        .unwrap();

        assert_eq!(report.scenes_excluded, 1);
        assert_eq!(report.records.len(), 1);
        assert!((report.records[0].area_ha - 0.36).abs() < 1e-12);
    }

    #[test]
    fn test_write_lakes_geojson() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("lakes.geojson");
        let square = geo::Rect::new(geo::coord! { x: 86.0, y: 28.0 }, geo::coord! { x: 86.01, y: 28.01 })
            .to_polygon();
        let lake = LakePolygon::new("a", 2015, square, 50.0, Point::new(86.005, 28.005)).unwrap();

        write_lakes_geojson(&path, &[lake]).unwrap();

        let parsed: geojson::GeoJson = std::fs::read_to_string(&path).unwrap().parse().unwrap();
        let geojson::GeoJson::FeatureCollection(fc) = parsed else {
            panic!("expected a feature collection");
        };
        assert_eq!(fc.features.len(), 1);
        assert_eq!(fc.features[0].property("lake_id"), Some(&JsonValue::from("a")));
    }
}
