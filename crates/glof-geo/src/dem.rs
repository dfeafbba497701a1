//! Digital elevation model sampling.

use geo::Point;
use ndarray::Array2;
use std::path::Path;

use glof_core::error::{GlofError, Result};
use glof_core::models::GridSpec;

use crate::raster_io;

/// Elevation raster on a geographic grid
#[derive(Debug, Clone)]
pub struct Dem {
    pub grid: GridSpec,
    values: Array2<f64>,
    nodata: Option<f64>,
}

impl Dem {
    pub fn new(grid: GridSpec, values: Array2<f64>, nodata: Option<f64>) -> Result<Self> {
        grid.validate()?;
        if values.is_empty() {
            return Err(GlofError::GridMismatch { reason: "DEM has no cells".to_string() });
        }
        Ok(Self { grid, values, nodata })
    }

    /// Load a single-band DEM TIFF
    pub fn load<P: AsRef<Path>>(path: P, grid: GridSpec, nodata: Option<f64>) -> Result<Self> {
        let values = raster_io::read_band(path.as_ref())?;
        tracing::debug!(path = %path.as_ref().display(), shape = ?values.dim(), "Loaded DEM");
        Self::new(grid, values, nodata)
    }

    pub fn shape(&self) -> (usize, usize) {
        self.values.dim()
    }

    /// Elevation in metres at a (lon, lat) point.
    ///
    /// `None` outside the raster, on nodata cells and on non-finite values.
    pub fn sample(&self, point: Point<f64>) -> Option<f64> {
        let index = self.grid.locate(point.x(), point.y(), self.values.dim())?;
        let value = self.values[index];
        let is_nodata = self.nodata.is_some_and(|nodata| value == nodata);
        (value.is_finite() && !is_nodata).then_some(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn dem() -> Dem {
        Dem::new(
            GridSpec::new(86.0, 28.0, 0.01, 0.01, 1000.0),
            array![[5000.0, 5100.0], [f64::NAN, -9999.0]],
            Some(-9999.0),
        )
        .unwrap()
    }

    #[test]
    fn test_sample() {
        let dem = dem();
        assert_eq!(dem.sample(Point::new(86.005, 27.995)), Some(5000.0));
        assert_eq!(dem.sample(Point::new(86.015, 27.995)), Some(5100.0));
        assert_eq!(dem.sample(Point::new(86.005, 27.985)), None);
        assert_eq!(dem.sample(Point::new(86.015, 27.985)), None);
        assert_eq!(dem.sample(Point::new(87.0, 27.995)), None);
    }

    #[test]
    fn test_empty_dem_rejected() {
        let result = Dem::new(GridSpec::new(86.0, 28.0, 0.01, 0.01, 1000.0), Array2::zeros((0, 0)), None);
        assert!(result.is_err());
    }
}
