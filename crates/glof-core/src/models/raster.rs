//! Raster-side models: scenes, pixel grids, water masks and composites.

use chrono::{Datelike, NaiveDate};
use geo::{coord, Polygon, Rect};
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use super::lake::CompositeWindow;
use crate::error::{GlofError, Result};

/// North-up pixel grid in geographic coordinates.
///
/// The origin is the north-west corner of the top-left pixel. Pixel sizes are
/// given in degrees for georeferencing and the nominal ground resolution in
/// metres is used for area computations.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GridSpec {
    pub origin_lon: f64,
    pub origin_lat: f64,
    pub pixel_width_deg: f64,
    pub pixel_height_deg: f64,
    pub ground_resolution_m: f64,
}

impl GridSpec {
    pub fn new(
        origin_lon: f64,
        origin_lat: f64,
        pixel_width_deg: f64,
        pixel_height_deg: f64,
        ground_resolution_m: f64,
    ) -> Self {
        Self {
            origin_lon,
            origin_lat,
            pixel_width_deg,
            pixel_height_deg,
            ground_resolution_m,
        }
    }

    /// Check that all sizes are finite and strictly positive
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("pixel_width_deg", self.pixel_width_deg),
            ("pixel_height_deg", self.pixel_height_deg),
            ("ground_resolution_m", self.ground_resolution_m),
        ];
        for (name, value) in sizes {
            if !value.is_finite() || value <= 0.0 {
                return Err(GlofError::GridMismatch {
                    reason: format!("{} must be positive, got {}", name, value),
                });
            }
        }
        if !self.origin_lon.is_finite() || !self.origin_lat.is_finite() {
            return Err(GlofError::GridMismatch {
                reason: "grid origin must be finite".to_string(),
            });
        }
        Ok(())
    }

    /// Geographic centre of a pixel as `[lon, lat]`
    pub fn pixel_center(&self, row: usize, col: usize) -> [f64; 2] {
        [
            self.origin_lon + (col as f64 + 0.5) * self.pixel_width_deg,
            self.origin_lat - (row as f64 + 0.5) * self.pixel_height_deg,
        ]
    }

    /// Locate the pixel containing a geographic position, if it lies on a grid of `shape`
    pub fn locate(&self, lon: f64, lat: f64, shape: (usize, usize)) -> Option<(usize, usize)> {
        let col = ((lon - self.origin_lon) / self.pixel_width_deg).floor();
        let row = ((self.origin_lat - lat) / self.pixel_height_deg).floor();
        if !col.is_finite() || !row.is_finite() || col < 0.0 || row < 0.0 {
            return None;
        }
        let (row, col) = (row as usize, col as usize);
        (row < shape.0 && col < shape.1).then_some((row, col))
    }

    /// Footprint of the horizontal pixel run `[col_start, col_end)` on one row.
    ///
    /// Edges are computed from the origin so neighbouring footprints share
    /// bit-identical coordinates.
    pub fn run_footprint(&self, row: usize, col_start: usize, col_end: usize) -> Polygon<f64> {
        let west = self.origin_lon + col_start as f64 * self.pixel_width_deg;
        let east = self.origin_lon + col_end as f64 * self.pixel_width_deg;
        let north = self.origin_lat - row as f64 * self.pixel_height_deg;
        let south = self.origin_lat - (row + 1) as f64 * self.pixel_height_deg;
        Rect::new(coord! { x: west, y: south }, coord! { x: east, y: north }).to_polygon()
    }

    /// Ground area of one pixel in hectares
    pub fn pixel_area_ha(&self) -> f64 {
        self.ground_resolution_m * self.ground_resolution_m / 10_000.0
    }

    /// Whether two grids share origin and pixel size
    pub fn same_as(&self, other: &GridSpec) -> bool {
        const EPS: f64 = 1e-9;
        (self.origin_lon - other.origin_lon).abs() < EPS
            && (self.origin_lat - other.origin_lat).abs() < EPS
            && (self.pixel_width_deg - other.pixel_width_deg).abs() < EPS
            && (self.pixel_height_deg - other.pixel_height_deg).abs() < EPS
    }
}

/// Spectral and quality bands consumed by the preprocessor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Band {
    Green,
    Nir,
    Qa,
}

impl Band {
    /// Bands every scene must carry
    pub const REQUIRED: [Band; 3] = [Band::Green, Band::Nir, Band::Qa];

    pub fn name(&self) -> &'static str {
        match self {
            Band::Green => "green",
            Band::Nir => "nir",
            Band::Qa => "qa",
        }
    }
}

/// One satellite acquisition for one lake-year.
///
/// Bands hold raw digital numbers. A scene is assembled once with
/// [`RasterScene::with_band`] and is read-only afterwards.
#[derive(Debug, Clone)]
pub struct RasterScene {
    pub id: String,
    pub lake_id: String,
    pub acquired: NaiveDate,
    pub grid: GridSpec,
    bands: HashMap<Band, Array2<f64>>,
}

impl RasterScene {
    pub fn new(
        id: impl Into<String>,
        lake_id: impl Into<String>,
        acquired: NaiveDate,
        grid: GridSpec,
    ) -> Self {
        Self {
            id: id.into(),
            lake_id: lake_id.into(),
            acquired,
            grid,
            bands: HashMap::new(),
        }
    }

    /// Attach a band of raw digital numbers
    pub fn with_band(mut self, band: Band, data: Array2<f64>) -> Self {
        self.bands.insert(band, data);
        self
    }

    /// Get a band, failing with `MissingBand` if the scene lacks it
    pub fn band(&self, band: Band) -> Result<&Array2<f64>> {
        self.bands.get(&band).ok_or_else(|| GlofError::MissingBand {
            scene: self.id.clone(),
            band: band.name().to_string(),
        })
    }

    pub fn has_band(&self, band: Band) -> bool {
        self.bands.contains_key(&band)
    }

    pub fn year(&self) -> i32 {
        self.acquired.year()
    }
}

/// State of one pixel in a water mask or composite
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MaskCell {
    /// Excluded from every aggregation (cloud, shadow, snow, fill, undefined NDWI)
    #[default]
    Masked,
    Dry,
    Water,
}

impl MaskCell {
    /// Numeric value used by the median rule; masked pixels have none
    pub fn value(&self) -> Option<f64> {
        match self {
            MaskCell::Masked => None,
            MaskCell::Dry => Some(0.0),
            MaskCell::Water => Some(1.0),
        }
    }

    pub fn is_water(&self) -> bool {
        matches!(self, MaskCell::Water)
    }
}

fn count_cells(cells: &Array2<MaskCell>, kind: MaskCell) -> usize {
    cells.iter().filter(|c| **c == kind).count()
}

/// Per-scene water classification
#[derive(Debug, Clone)]
pub struct WaterMask {
    pub scene_id: String,
    pub lake_id: String,
    pub year: i32,
    pub grid: GridSpec,
    pub cells: Array2<MaskCell>,
}

impl WaterMask {
    pub fn water_count(&self) -> usize {
        count_cells(&self.cells, MaskCell::Water)
    }

    pub fn masked_count(&self) -> usize {
        count_cells(&self.cells, MaskCell::Masked)
    }

    /// True when no pixel was classified as water
    pub fn is_empty(&self) -> bool {
        self.water_count() == 0
    }
}

/// Median aggregate of the water masks inside one composite window
#[derive(Debug, Clone)]
pub struct TemporalComposite {
    pub lake_id: String,
    pub reference_year: i32,
    pub window: CompositeWindow,
    pub grid: GridSpec,
    pub cells: Array2<MaskCell>,
    /// Window years with at least one acquisition, never more than three
    pub source_count: usize,
}

impl TemporalComposite {
    pub fn water_count(&self) -> usize {
        count_cells(&self.cells, MaskCell::Water)
    }

    pub fn masked_count(&self) -> usize {
        count_cells(&self.cells, MaskCell::Masked)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid() -> GridSpec {
        GridSpec::new(86.0, 28.0, 0.001, 0.001, 30.0)
    }

    #[test]
    fn test_pixel_center_and_locate() {
        let grid = grid();
        let [lon, lat] = grid.pixel_center(2, 3);
        assert!((lon - 86.0035).abs() < 1e-12);
        assert!((lat - 27.9975).abs() < 1e-12);
        assert_eq!(grid.locate(lon, lat, (10, 10)), Some((2, 3)));
        assert_eq!(grid.locate(85.9, 27.99, (10, 10)), None);
        assert_eq!(grid.locate(lon, lat, (2, 10)), None);
    }

    #[test]
    fn test_pixel_area() {
        assert!((grid().pixel_area_ha() - 0.09).abs() < 1e-12);
    }

    #[test]
    fn test_missing_band() {
        let scene = RasterScene::new(
            "LC08_001",
            "lake-1",
            NaiveDate::from_ymd_opt(2015, 10, 1).unwrap(),
            grid(),
        )
        .with_band(Band::Green, Array2::zeros((2, 2)));

        assert!(scene.band(Band::Green).is_ok());
        match scene.band(Band::Nir) {
            Err(GlofError::MissingBand { scene, band }) => {
                assert_eq!(scene, "LC08_001");
                assert_eq!(band, "nir");
            }
            other => panic!("Expected MissingBand, got {:?}", other),
        }
        assert_eq!(scene.year(), 2015);
    }

    #[test]
    fn test_invalid_grid() {
        let mut bad = grid();
        bad.ground_resolution_m = 0.0;
        assert!(bad.validate().is_err());
        assert!(grid().validate().is_ok());
    }
}
