//! Lake-centric feature extraction.
//!
//! Glacier joins, DEM sampling and expansion rates are pure functions over
//! one lake polygon and the shared read-only reference layers.

use geo::{BoundingRect, Contains, Intersects, Point};
use std::collections::HashMap;

use glof_core::models::{LakePolygon, LakeRecord, LakeType};

use crate::dem::Dem;
use crate::glaciers::GlacierIndex;
use crate::spatial::{boundary_distance_m, haversine_m, LocalFrame};

/// Lookback windows, in years, for the expansion-rate features
pub const EXPANSION_LOOKBACKS: [u32; 2] = [5, 10];

/// Read-only reference layers shared by every lake
#[derive(Debug, Clone, Copy)]
pub struct FeatureContext<'a> {
    pub glaciers: &'a GlacierIndex,
    pub dem: Option<&'a Dem>,
    pub search_radius_m: f64,
}

/// Result of joining one lake against the glacier inventory
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GlacierJoin {
    pub touch_count: u32,
    pub is_supraglacial: bool,
    /// Index of the nearest glacier in the inventory
    pub nearest: Option<usize>,
    pub nearest_distance_m: Option<f64>,
    pub nearest_elevation_m: Option<f64>,
    pub slope: Option<f64>,
}

impl<'a> FeatureContext<'a> {
    pub fn new(glaciers: &'a GlacierIndex, dem: Option<&'a Dem>, search_radius_m: f64) -> Self {
        Self { glaciers, dem, search_radius_m }
    }

    /// DEM elevation at a point
    pub fn elevation_at(&self, point: Point<f64>) -> Option<f64> {
        self.dem.and_then(|dem| dem.sample(point))
    }

    /// Glacier elevation: DEM at its centroid, else the inventory attribute
    pub fn glacier_elevation(&self, index: usize) -> Option<f64> {
        self.glaciers
            .centroid(index)
            .and_then(|centroid| self.elevation_at(centroid))
            .or(self.glaciers.get(index).elevation_m)
    }

    /// Nearest glacier by boundary distance, ties broken by centroid distance
    fn nearest_glacier(&self, lake: &LakePolygon) -> Option<(usize, f64)> {
        let envelope = lake.geometry.bounding_rect()?;

        let rank = |candidates: &mut dyn Iterator<Item = usize>| {
            candidates
                .filter_map(|index| {
                    let distance = boundary_distance_m(&lake.geometry, &self.glaciers.get(index).geometry)?;
                    let centroid_distance = self
                        .glaciers
                        .centroid(index)
                        .map(|c| haversine_m(c, lake.centroid))
                        .unwrap_or(f64::INFINITY);
                    Some((index, distance, centroid_distance))
                })
                .min_by(|a, b| a.1.total_cmp(&b.1).then(a.2.total_cmp(&b.2)))
        };

        let nearby = self.glaciers.candidates_near(envelope, self.search_radius_m);
        let best = match rank(&mut nearby.into_iter()) {
            Some(found) if found.1 <= self.search_radius_m => Some(found),
            _ => rank(&mut (0..self.glaciers.len())),
        };
        best.map(|(index, distance, _)| (index, distance))
    }

    /// Join a lake against the glacier inventory
    pub fn join_glaciers(&self, lake: &LakePolygon, lake_elevation: Option<f64>) -> GlacierJoin {
        let Some(envelope) = lake.geometry.bounding_rect() else {
            return GlacierJoin::default();
        };

        let touching: Vec<usize> = self
            .glaciers
            .candidates_in(envelope)
            .into_iter()
            .filter(|&index| lake.geometry.intersects(&self.glaciers.get(index).geometry))
            .collect();

        let centroid_box = geo::Rect::new(lake.centroid.0, lake.centroid.0);
        let is_supraglacial = self
            .glaciers
            .candidates_in(centroid_box)
            .into_iter()
            .any(|index| self.glaciers.get(index).geometry.contains(&lake.centroid));

        let (nearest, nearest_distance_m) = match self.nearest_glacier(lake) {
            Some((index, distance)) => (Some(index), Some(distance)),
            None => (None, None),
        };
        let nearest_elevation_m = nearest.and_then(|index| self.glacier_elevation(index));

        let frame = LocalFrame::new(lake.centroid);
        let slope_glacier = touching
            .iter()
            .filter_map(|&index| {
                let centroid = self.glaciers.centroid(index)?;
                Some((index, frame.planar_distance(lake.centroid, centroid)))
            })
            .min_by(|a, b| a.1.total_cmp(&b.1));
        let slope = slope_glacier.and_then(|(index, run_m)| {
            let rise_m = self.glacier_elevation(index)? - lake_elevation?;
            (run_m > 0.0).then(|| rise_m / run_m)
        });

        GlacierJoin {
            touch_count: touching.len() as u32,
            is_supraglacial,
            nearest,
            nearest_distance_m,
            nearest_elevation_m,
            slope,
        }
    }
}

/// Build the feature record of one lake-year.
///
/// Expansion rates and the label are filled later, once every year of the
/// lake is known and the catalogue has been joined.
pub fn extract_features(lake: &LakePolygon, lake_type: LakeType, ctx: &FeatureContext) -> LakeRecord {
    let elevation = ctx.elevation_at(lake.centroid);
    let join = ctx.join_glaciers(lake, elevation);

    let mut record = LakeRecord::new(
        lake.lake_id.clone(),
        lake.centroid.y(),
        lake.centroid.x(),
        lake.reference_year,
        lake.area_ha,
        lake_type,
    );
    record.elevation_m = elevation;
    record.set_glacier_touch_count(join.touch_count);
    record.nearest_glacier_dist_m = join.nearest_distance_m;
    record.glacier_elev_m = join.nearest_elevation_m;
    record.slope_glac_to_lake = join.slope;
    record.is_supraglacial = u8::from(join.is_supraglacial);

    tracing::debug!(
        lake_id = %record.lake_id,
        year = record.year,
        touch_count = join.touch_count,
        nearest_m = ?join.nearest_distance_m,
        "Extracted lake features"
    );
    record
}

/// Percentage change in area per year: `((a1 - a0) / a0) / years * 100`.
///
/// Undefined for a non-positive starting area, non-finite input or a zero window.
pub fn compute_expansion_rate(area_t0: f64, area_t1: f64, years: u32) -> Option<f64> {
    if years == 0 || !area_t0.is_finite() || !area_t1.is_finite() || area_t0 <= 0.0 {
        return None;
    }
    Some(((area_t1 - area_t0) / area_t0) / years as f64 * 100.0)
}

/// Fill the 5- and 10-year expansion rates from each lake's own earlier records.
///
/// A rate stays missing when no record exists exactly at the lookback year.
pub fn apply_expansion_rates(records: &mut [LakeRecord]) {
    let areas: HashMap<(String, i32), f64> =
        records.iter().map(|r| ((r.lake_id.clone(), r.year), r.area_ha)).collect();

    for record in records.iter_mut() {
        for lookback in EXPANSION_LOOKBACKS {
            let key = (record.lake_id.clone(), record.year - lookback as i32);
            let rate = areas
                .get(&key)
                .and_then(|&earlier| compute_expansion_rate(earlier, record.area_ha, lookback));
            match lookback {
                5 => record.expansion_rate_5y = rate,
                10 => record.expansion_rate_10y = rate,
                _ => {}
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::{coord, MultiPolygon, Polygon, Rect};
    use glof_core::models::{GlacierPolygon, GridSpec};
    use ndarray::Array2;
    use proptest::prelude::*;

    fn square(west: f64, south: f64, size: f64) -> Polygon<f64> {
        Rect::new(coord! { x: west, y: south }, coord! { x: west + size, y: south + size })
            .to_polygon()
    }

    fn lake(west: f64, south: f64, size: f64) -> LakePolygon {
        let centroid = Point::new(west + size / 2.0, south + size / 2.0);
        LakePolygon::new("lake-1", 2015, square(west, south, size), 50.0, centroid).unwrap()
    }

    fn glacier(id: &str, outline: Polygon<f64>, elevation: Option<f64>) -> GlacierPolygon {
        GlacierPolygon {
            id: id.to_string(),
            geometry: MultiPolygon::new(vec![outline]),
            area_ha: 100.0,
            elevation_m: elevation,
        }
    }

    fn flat_dem(elevation: f64) -> Dem {
        Dem::new(
            GridSpec::new(85.0, 29.0, 0.01, 0.01, 1000.0),
            Array2::from_elem((200, 300), elevation),
            None,
        )
        .unwrap()
    }

    #[test]
    fn test_expansion_rate_examples() {
        assert!((compute_expansion_rate(100.0, 120.0, 5).unwrap() - 4.0).abs() < 1e-12);
        assert!((compute_expansion_rate(50.0, 55.0, 5).unwrap() - 2.0).abs() < 1e-12);
        assert!(compute_expansion_rate(80.0, 60.0, 10).unwrap() < 0.0);
    }

    #[test]
    fn test_expansion_rate_undefined() {
        assert_eq!(compute_expansion_rate(0.0, 120.0, 5), None);
        assert_eq!(compute_expansion_rate(-1.0, 120.0, 5), None);
        assert_eq!(compute_expansion_rate(100.0, 120.0, 0), None);
        assert_eq!(compute_expansion_rate(f64::NAN, 120.0, 5), None);
    }

    #[test]
    fn test_apply_expansion_rates_exact_year_only() {
        let mut records = vec![
            LakeRecord::new("a", 28.0, 86.0, 2005, 40.0, LakeType::Other),
            LakeRecord::new("a", 28.0, 86.0, 2010, 50.0, LakeType::Other),
            LakeRecord::new("a", 28.0, 86.0, 2015, 55.0, LakeType::Other),
            LakeRecord::new("b", 28.0, 86.0, 2011, 10.0, LakeType::Other),
            LakeRecord::new("b", 28.0, 86.0, 2015, 12.0, LakeType::Other),
        ];

        apply_expansion_rates(&mut records);

        assert!((records[2].expansion_rate_5y.unwrap() - 2.0).abs() < 1e-12);
        assert!((records[2].expansion_rate_10y.unwrap() - 3.75).abs() < 1e-12);
        assert!((records[1].expansion_rate_5y.unwrap() - 5.0).abs() < 1e-12);
        assert_eq!(records[1].expansion_rate_10y, None);
        assert_eq!(records[0].expansion_rate_5y, None);
        // Lake b has a 4-year gap, never extrapolated
        assert_eq!(records[4].expansion_rate_5y, None);
    }

    #[test]
    fn test_touching_glacier_sets_contact_and_slope() {
        let index = GlacierIndex::new(vec![
            glacier("touching", square(86.01, 28.0, 0.01), Some(5600.0)),
            glacier("far", square(86.5, 28.5, 0.01), Some(6000.0)),
        ]);
        let dem = Dem::new(
            GridSpec::new(85.0, 29.0, 0.01, 0.01, 1000.0),
            Array2::from_shape_fn((200, 300), |(_, col)| if col >= 101 { 5600.0 } else { 5000.0 }),
            None,
        )
        .unwrap();
        let ctx = FeatureContext::new(&index, Some(&dem), 10_000.0);
        let lake = lake(86.0, 28.0, 0.01);

        let record = extract_features(&lake, LakeType::MoraineDammed, &ctx);

        assert_eq!(record.glacier_touch_count, 1);
        assert_eq!(record.glacier_contact, 1);
        assert_eq!(record.nearest_glacier_dist_m, Some(0.0));
        assert_eq!(record.elevation_m, Some(5000.0));
        assert_eq!(record.glacier_elev_m, Some(5600.0));
        assert_eq!(record.is_supraglacial, 0);

        let run = LocalFrame::new(lake.centroid).planar_distance(lake.centroid, Point::new(86.015, 28.005));
        let slope = record.slope_glac_to_lake.unwrap();
        assert!((slope - 600.0 / run).abs() < 1e-9);
        assert_eq!(record.lake_type_moraine_dammed, 1);
        record.validate().unwrap();
    }

    #[test]
    fn test_no_touch_means_no_slope() {
        let index = GlacierIndex::new(vec![glacier("g", square(86.02, 28.0, 0.01), Some(5600.0))]);
        let dem = flat_dem(5000.0);
        let ctx = FeatureContext::new(&index, Some(&dem), 10_000.0);

        let record = extract_features(&lake(86.0, 28.0, 0.01), LakeType::Other, &ctx);

        assert_eq!(record.glacier_touch_count, 0);
        assert_eq!(record.glacier_contact, 0);
        assert_eq!(record.slope_glac_to_lake, None);
        let distance = record.nearest_glacier_dist_m.unwrap();
        assert!(distance > 900.0 && distance < 1000.0, "{}", distance);
        // DEM value at the glacier centroid wins over the inventory attribute
        assert_eq!(record.glacier_elev_m, Some(5000.0));
    }

    #[test]
    fn test_nearest_glacier_beyond_radius_uses_full_scan() {
        let index = GlacierIndex::new(vec![glacier("g", square(87.0, 28.0, 0.01), Some(5400.0))]);
        let ctx = FeatureContext::new(&index, None, 1_000.0);

        let record = extract_features(&lake(86.0, 28.0, 0.01), LakeType::Other, &ctx);

        assert!(record.nearest_glacier_dist_m.unwrap() > 90_000.0);
        assert_eq!(record.glacier_elev_m, Some(5400.0));
        assert_eq!(record.elevation_m, None);
    }

    #[test]
    fn test_supraglacial_lake() {
        let index = GlacierIndex::new(vec![glacier("host", square(85.9, 27.9, 0.3), None)]);
        let ctx = FeatureContext::new(&index, None, 10_000.0);

        let record = extract_features(&lake(86.0, 28.0, 0.01), LakeType::IceContact, &ctx);

        assert_eq!(record.is_supraglacial, 1);
        assert_eq!(record.glacier_touch_count, 1);
        assert_eq!(record.slope_glac_to_lake, None);
    }

    #[test]
    fn test_empty_inventory() {
        let index = GlacierIndex::new(Vec::new());
        let ctx = FeatureContext::new(&index, None, 10_000.0);

        let record = extract_features(&lake(86.0, 28.0, 0.01), LakeType::Other, &ctx);

        assert_eq!(record.glacier_touch_count, 0);
        assert_eq!(record.nearest_glacier_dist_m, None);
        assert_eq!(record.glacier_elev_m, None);
    }

    proptest! {
        #[test]
        fn prop_contact_matches_touch_count(offsets in proptest::collection::vec((0.0f64..0.05, 0.0f64..0.05), 0..6)) {
            let glaciers = offsets
                .iter()
                .enumerate()
                .map(|(i, (dx, dy))| glacier(&format!("g{}", i), square(85.98 + dx, 27.98 + dy, 0.01), None))
                .collect();
            let index = GlacierIndex::new(glaciers);
            let ctx = FeatureContext::new(&index, None, 10_000.0);

            let record = extract_features(&lake(86.0, 28.0, 0.01), LakeType::Other, &ctx);

            prop_assert_eq!(record.glacier_contact == 1, record.glacier_touch_count > 0);
            prop_assert_eq!(record.lake_type_ice_contact + record.lake_type_moraine_dammed + record.lake_type_other, 1);
            if record.glacier_touch_count > 0 {
                prop_assert_eq!(record.nearest_glacier_dist_m, Some(0.0));
            }
        }
    }
}
