//! Composite-to-polygon conversion.

use geo::{unary_union, Area, Point, Polygon};
use ndarray::Array2;
use std::collections::VecDeque;

use glof_core::error::{GlofError, Result};
use glof_core::models::{GridSpec, LakePolygon, TemporalComposite};

use crate::spatial::haversine_m;

/// One 4-connected group of water cells, in raster scan order of discovery
#[derive(Debug, Clone)]
pub struct WaterRegion {
    pub cells: Vec<(usize, usize)>,
}

impl WaterRegion {
    pub fn pixel_count(&self) -> usize {
        self.cells.len()
    }

    pub fn area_ha(&self, grid: &GridSpec) -> f64 {
        self.cells.len() as f64 * grid.pixel_area_ha()
    }

    /// Mean of the pixel centres; equal-area pixels make this the area-weighted centroid
    pub fn centroid(&self, grid: &GridSpec) -> Point<f64> {
        let n = self.cells.len().max(1) as f64;
        let (sum_lon, sum_lat) = self.cells.iter().fold((0.0, 0.0), |(lon, lat), &(row, col)| {
            let [x, y] = grid.pixel_center(row, col);
            (lon + x, lat + y)
        });
        Point::new(sum_lon / n, sum_lat / n)
    }

    /// Union of the region's pixel footprints.
    ///
    /// Each row's contiguous runs become one rectangle before the union.
    pub fn outline(&self, grid: &GridSpec) -> Option<Polygon<f64>> {
        let mut cells = self.cells.clone();
        cells.sort_unstable();

        let mut runs: Vec<Polygon<f64>> = Vec::new();
        let mut iter = cells.into_iter().peekable();
        while let Some((row, start)) = iter.next() {
            let mut end = start + 1;
            while iter.peek() == Some(&(row, end)) {
                iter.next();
                end += 1;
            }
            runs.push(grid.run_footprint(row, start, end));
        }

        unary_union(runs.iter())
            .into_iter()
            .max_by(|a, b| a.unsigned_area().total_cmp(&b.unsigned_area()))
    }
}

/// Label 4-connected water regions
pub fn water_regions(water: &Array2<bool>) -> Vec<WaterRegion> {
    let (rows, cols) = water.dim();
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut regions = Vec::new();

    for row in 0..rows {
        for col in 0..cols {
            if !water[[row, col]] || visited[[row, col]] {
                continue;
            }
            visited[[row, col]] = true;
            let mut queue = VecDeque::from([(row, col)]);
            let mut cells = Vec::new();

            while let Some((r, c)) = queue.pop_front() {
                cells.push((r, c));
                let neighbours = [
                    (r.wrapping_sub(1), c),
                    (r + 1, c),
                    (r, c.wrapping_sub(1)),
                    (r, c + 1),
                ];
                for (nr, nc) in neighbours {
                    if nr < rows && nc < cols && water[[nr, nc]] && !visited[[nr, nc]] {
                        visited[[nr, nc]] = true;
                        queue.push_back((nr, nc));
                    }
                }
            }
            regions.push(WaterRegion { cells });
        }
    }
    regions
}

/// Pick the lake candidate: largest area, ties by proximity to `previous`, then scan order
pub fn select_region<'a>(
    regions: &'a [WaterRegion],
    grid: &GridSpec,
    previous: Option<Point<f64>>,
) -> Option<&'a WaterRegion> {
    let largest = regions.iter().map(WaterRegion::pixel_count).max()?;
    let mut tied = regions.iter().filter(|r| r.pixel_count() == largest);

    match previous {
        None => tied.next(),
        Some(anchor) => tied.fold(None, |best: Option<(&'a WaterRegion, f64)>, region| {
            let distance = haversine_m(region.centroid(grid), anchor);
            match best {
                Some((_, best_distance)) if best_distance <= distance => best,
                _ => Some((region, distance)),
            }
        })
        .map(|(region, _)| region),
    }
}

/// Convert a composite into its lake polygon.
///
/// Returns `Ok(None)` when the composite holds no water.
pub fn vectorize(
    composite: &TemporalComposite,
    previous_centroid: Option<Point<f64>>,
) -> Result<Option<LakePolygon>> {
    let water = composite.cells.mapv(|cell| cell.is_water());
    let regions = water_regions(&water);
    let grid = &composite.grid;

    let Some(region) = select_region(&regions, grid, previous_centroid) else {
        return Ok(None);
    };

    let outline = region.outline(grid).ok_or_else(|| GlofError::InvalidGeometry {
        feature_id: composite.lake_id.clone(),
        reason: "water region produced an empty outline".to_string(),
    })?;

    tracing::debug!(
        lake_id = %composite.lake_id,
        year = composite.reference_year,
        regions = regions.len(),
        pixels = region.pixel_count(),
        "Vectorized composite"
    );

    LakePolygon::new(
        composite.lake_id.clone(),
        composite.reference_year,
        outline,
        region.area_ha(grid),
        region.centroid(grid),
    )
    .map(Some)
}

#[cfg(test)]
mod tests {
    use super::*;
    use glof_core::models::{CompositeWindow, LakeStatus, MaskCell};
    use ndarray::array;

    fn grid() -> GridSpec {
        GridSpec::new(86.0, 28.0, 0.001, 0.001, 30.0)
    }

    fn composite_of(water: Array2<bool>) -> TemporalComposite {
        TemporalComposite {
            lake_id: "lake-1".to_string(),
            reference_year: 2015,
            window: CompositeWindow::for_status(LakeStatus::NonGlof, 2015),
            grid: grid(),
            cells: water.mapv(|w| if w { MaskCell::Water } else { MaskCell::Dry }),
            source_count: 3,
        }
    }

    #[test]
    fn test_regions_are_four_connected() {
        let water = array![
            [true, false, true],
            [false, true, true],
            [false, false, false],
        ];
        let regions = water_regions(&water);
        // Diagonal contact does not join regions
        assert_eq!(regions.len(), 2);
        assert_eq!(regions[0].cells, vec![(0, 0)]);
        assert_eq!(regions[1].pixel_count(), 3);
    }

    #[test]
    fn test_largest_region_wins() {
        let water = array![
            [true, false, true, true],
            [false, false, true, true],
        ];
        let lake = vectorize(&composite_of(water), None).unwrap().unwrap();

        assert!((lake.area_ha - 4.0 * 0.09).abs() < 1e-12);
        assert!((lake.centroid.x() - 86.003).abs() < 1e-9);
        assert!((lake.centroid.y() - 27.999).abs() < 1e-9);
        // Outline is the 2x2 block
        assert!((lake.geometry.unsigned_area() - 4.0e-6).abs() < 1e-12);
    }

    #[test]
    fn test_tie_broken_by_previous_centroid() {
        let water = array![[true, false, false, false, true]];
        let near_east = Point::new(86.0045, 27.9995);

        let lake = vectorize(&composite_of(water.clone()), Some(near_east)).unwrap().unwrap();
        assert!((lake.centroid.x() - 86.0045).abs() < 1e-9);

        let lake = vectorize(&composite_of(water), None).unwrap().unwrap();
        assert!((lake.centroid.x() - 86.0005).abs() < 1e-9);
    }

    #[test]
    fn test_empty_composite_has_no_polygon() {
        let water = Array2::from_elem((3, 3), false);
        assert!(vectorize(&composite_of(water), None).unwrap().is_none());
    }

    #[test]
    fn test_outline_of_l_shape_is_single_polygon() {
        let water = array![
            [true, false],
            [true, true],
        ];
        let regions = water_regions(&water);
        let outline = regions[0].outline(&grid()).unwrap();
        assert!((outline.unsigned_area() - 3.0e-6).abs() < 1e-12);
        assert!(outline.interiors().is_empty());
    }
}
