//! Extraction manifest: where the inputs of an extraction run live.
//!
//! Raster files carry no georeferencing of their own here; every scene and
//! the DEM declare their grid in the manifest.

use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use glof_core::error::{GlofError, Result};
use glof_core::models::{Band, GridSpec, RasterScene};

use crate::dem::Dem;
use crate::raster_io;

/// Elevation model input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DemSource {
    pub path: PathBuf,
    pub grid: GridSpec,
    #[serde(default)]
    pub nodata: Option<f64>,
}

impl DemSource {
    pub fn load(&self) -> Result<Dem> {
        Dem::load(&self.path, self.grid, self.nodata)
    }
}

/// One acquisition: band files plus the grid they share
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneSource {
    pub id: String,
    pub lake_id: String,
    pub acquired: NaiveDate,
    pub grid: GridSpec,
    pub bands: HashMap<Band, PathBuf>,
}

impl SceneSource {
    pub fn year(&self) -> i32 {
        self.acquired.year()
    }

    /// Read every listed band.
    ///
    /// Bands absent from the manifest are absent from the scene; the
    /// preprocessor reports them as missing.
    pub fn load(&self) -> Result<RasterScene> {
        let mut scene = RasterScene::new(&self.id, &self.lake_id, self.acquired, self.grid);
        for band in Band::REQUIRED {
            if let Some(path) = self.bands.get(&band) {
                scene = scene.with_band(band, raster_io::read_band(path)?);
            }
        }
        Ok(scene)
    }
}

/// Inputs of an extraction run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionManifest {
    /// Lake inventory / event catalogue CSV
    pub lake_inventory: PathBuf,
    /// Glacier outlines as GeoJSON
    pub glacier_inventory: PathBuf,
    #[serde(default)]
    pub dem: Option<DemSource>,
    /// Reference years to extract for every lake
    pub reference_years: Vec<i32>,
    #[serde(default)]
    pub scenes: Vec<SceneSource>,
}

impl ExtractionManifest {
    /// Load a manifest, resolving relative paths against its directory
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path)?;
        let mut manifest: ExtractionManifest = serde_json::from_str(&content)?;

        let base = path.parent().unwrap_or_else(|| Path::new("."));
        manifest.resolve_paths(base);
        manifest.validate()?;
        Ok(manifest)
    }

    /// Write the manifest as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }

    fn resolve_paths(&mut self, base: &Path) {
        let resolve = |p: &mut PathBuf| {
            if p.is_relative() {
                *p = base.join(&*p);
            }
        };
        resolve(&mut self.lake_inventory);
        resolve(&mut self.glacier_inventory);
        if let Some(dem) = self.dem.as_mut() {
            resolve(&mut dem.path);
        }
        for scene in &mut self.scenes {
            scene.bands.values_mut().for_each(resolve);
        }
    }

    /// Check grids and that at least one reference year is requested
    pub fn validate(&self) -> Result<()> {
        if self.reference_years.is_empty() {
            return Err(GlofError::ConfigMissing { key: "reference_years".to_string() });
        }
        if let Some(dem) = &self.dem {
            dem.grid.validate()?;
        }
        for scene in &self.scenes {
            scene.grid.validate().map_err(|e| GlofError::GridMismatch {
                reason: format!("scene {}: {}", scene.id, e),
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const MANIFEST: &str = r#"{
        "lake_inventory": "inventory.csv",
        "glacier_inventory": "/data/glaciers.geojson",
        "dem": {
            "path": "dem.tif",
            "grid": {"origin_lon": 86.0, "origin_lat": 28.0, "pixel_width_deg": 0.01, "pixel_height_deg": 0.01, "ground_resolution_m": 1000.0},
            "nodata": -9999.0
        },
        "reference_years": [2010, 2015],
        "scenes": [{
            "id": "LC08_140041_20150930",
            "lake_id": "lake-1",
            "acquired": "2015-09-30",
            "grid": {"origin_lon": 86.0, "origin_lat": 28.0, "pixel_width_deg": 0.0003, "pixel_height_deg": 0.0003, "ground_resolution_m": 30.0},
            "bands": {"green": "scenes/green.tif", "nir": "scenes/nir.tif"}
        }]
    }"#;

    #[test]
    fn test_load_resolves_relative_paths() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(&path, MANIFEST).unwrap();

        let manifest = ExtractionManifest::load(&path).unwrap();

        assert_eq!(manifest.lake_inventory, dir.path().join("inventory.csv"));
        assert_eq!(manifest.glacier_inventory, PathBuf::from("/data/glaciers.geojson"));
        assert_eq!(manifest.dem.as_ref().unwrap().path, dir.path().join("dem.tif"));
        assert_eq!(manifest.reference_years, vec![2010, 2015]);

        let scene = &manifest.scenes[0];
        assert_eq!(scene.year(), 2015);
        assert_eq!(scene.bands[&Band::Green], dir.path().join("scenes/green.tif"));
        assert!(!scene.bands.contains_key(&Band::Qa));
    }

    #[test]
    fn test_requires_reference_years() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("manifest.json");
        std::fs::write(
            &path,
            r#"{"lake_inventory": "a.csv", "glacier_inventory": "g.geojson", "reference_years": []}"#,
        )
        .unwrap();

        assert!(matches!(
            ExtractionManifest::load(&path),
            Err(GlofError::ConfigMissing { .. })
        ));
    }
}
