//! Glacier inventory loading and spatial indexing.

use geo::{BoundingRect, Centroid, GeodesicArea, MultiPolygon, Point, Rect};
use rstar::{RTree, RTreeObject, AABB};
use serde_json::{Map, Value as JsonValue};
use std::fs;
use std::path::Path;

use glof_core::error::{GlofError, Result};
use glof_core::models::GlacierPolygon;

use crate::spatial::{metres_to_lat_degrees, metres_to_lon_degrees};

const ID_KEYS: [&str; 4] = ["glac_id", "id", "RGIId", "rgi_id"];
const ELEVATION_KEYS: [&str; 4] = ["elevation_m", "elev_m", "zmed", "Zmed"];

/// Envelope entry pointing back into the glacier list
#[derive(Debug, Clone, PartialEq)]
struct IndexedGlacier {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for IndexedGlacier {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

fn rect_to_aabb(rect: Rect<f64>) -> AABB<[f64; 2]> {
    AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y])
}

/// Read-only glacier inventory with an R-tree over glacier envelopes
#[derive(Debug)]
pub struct GlacierIndex {
    glaciers: Vec<GlacierPolygon>,
    centroids: Vec<Option<Point<f64>>>,
    tree: RTree<IndexedGlacier>,
}

impl GlacierIndex {
    pub fn new(glaciers: Vec<GlacierPolygon>) -> Self {
        let entries: Vec<IndexedGlacier> = glaciers
            .iter()
            .enumerate()
            .filter_map(|(index, glacier)| {
                let rect = glacier.geometry.bounding_rect()?;
                Some(IndexedGlacier { index, envelope: rect_to_aabb(rect) })
            })
            .collect();
        let centroids = glaciers.iter().map(|g| g.geometry.centroid()).collect();

        Self { glaciers, centroids, tree: RTree::bulk_load(entries) }
    }

    pub fn len(&self) -> usize {
        self.glaciers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.glaciers.is_empty()
    }

    pub fn get(&self, index: usize) -> &GlacierPolygon {
        &self.glaciers[index]
    }

    pub fn centroid(&self, index: usize) -> Option<Point<f64>> {
        self.centroids[index]
    }

    pub fn glaciers(&self) -> &[GlacierPolygon] {
        &self.glaciers
    }

    /// Glaciers whose envelope intersects `rect`
    pub fn candidates_in(&self, rect: Rect<f64>) -> Vec<usize> {
        let mut found: Vec<usize> = self
            .tree
            .locate_in_envelope_intersecting(&rect_to_aabb(rect))
            .map(|entry| entry.index)
            .collect();
        found.sort_unstable();
        found
    }

    /// Glaciers whose envelope comes within `radius_m` of `rect`
    pub fn candidates_near(&self, rect: Rect<f64>, radius_m: f64) -> Vec<usize> {
        let dlat = metres_to_lat_degrees(radius_m);
        let max_abs_lat = rect.min().y.abs().max(rect.max().y.abs());
        let dlon = metres_to_lon_degrees(radius_m, max_abs_lat);
        let expanded = Rect::new(
            geo::coord! { x: rect.min().x - dlon, y: rect.min().y - dlat },
            geo::coord! { x: rect.max().x + dlon, y: rect.max().y + dlat },
        );
        self.candidates_in(expanded)
    }
}

fn property_string(properties: &Map<String, JsonValue>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|key| match properties.get(*key)? {
        JsonValue::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

fn property_f64(properties: &Map<String, JsonValue>, keys: &[&str]) -> Option<f64> {
    keys.iter().find_map(|key| match properties.get(*key)? {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::String(s) => s.trim().parse().ok(),
        _ => None,
    })
    .filter(|v: &f64| v.is_finite())
}

/// Read a glacier inventory from a GeoJSON feature collection.
///
/// Accepts Polygon and MultiPolygon features in WGS84. Recognised properties:
/// an identifier (`glac_id`, `id`, `RGIId`), `area_ha` or `area_km2`, and an
/// elevation (`elevation_m`, `elev_m`, `zmed`). Area falls back to the
/// geodesic area of the outline.
pub fn read_glacier_inventory<P: AsRef<Path>>(path: P) -> Result<Vec<GlacierPolygon>> {
    let path = path.as_ref();
    let inventory_err = |reason: String| GlofError::Inventory { path: path.to_path_buf(), reason };

    let content = fs::read_to_string(path)?;
    let geojson: geojson::GeoJson =
        content.parse().map_err(|e| inventory_err(format!("failed to parse GeoJSON: {}", e)))?;

    let features = match geojson {
        geojson::GeoJson::FeatureCollection(fc) => fc.features,
        geojson::GeoJson::Feature(feature) => vec![feature],
        geojson::GeoJson::Geometry(_) => {
            return Err(inventory_err("expected a Feature or FeatureCollection".to_string()))
        }
    };

    let mut glaciers = Vec::with_capacity(features.len());
    for (position, feature) in features.into_iter().enumerate() {
        let properties = feature.properties.clone().unwrap_or_default();
        let id = property_string(&properties, &ID_KEYS)
            .or_else(|| feature.id.as_ref().map(|id| match id {
                geojson::feature::Id::String(s) => s.clone(),
                geojson::feature::Id::Number(n) => n.to_string(),
            }))
            .unwrap_or_else(|| format!("glacier-{}", position));

        let Some(geometry) = feature.geometry else {
            tracing::warn!(glacier = %id, "Skipping glacier without geometry");
            continue;
        };
        let geometry = geo::Geometry::<f64>::try_from(geometry)
            .map_err(|e| inventory_err(format!("glacier {}: {}", id, e)))?;
        let outline = match geometry {
            geo::Geometry::Polygon(polygon) => MultiPolygon::new(vec![polygon]),
            geo::Geometry::MultiPolygon(multi) => multi,
            other => {
                return Err(GlofError::InvalidGeometry {
                    feature_id: id,
                    reason: format!("expected a polygon outline, got {:?}", geometry_kind(&other)),
                })
            }
        };

        let area_ha = property_f64(&properties, &["area_ha"])
            .or_else(|| property_f64(&properties, &["area_km2", "Area"]).map(|km2| km2 * 100.0))
            .unwrap_or_else(|| outline.geodesic_area_unsigned() / 10_000.0);

        glaciers.push(GlacierPolygon {
            id,
            geometry: outline,
            area_ha,
            elevation_m: property_f64(&properties, &ELEVATION_KEYS),
        });
    }

    tracing::info!(path = %path.display(), glaciers = glaciers.len(), "Loaded glacier inventory");
    Ok(glaciers)
}

fn geometry_kind(geometry: &geo::Geometry<f64>) -> &'static str {
    match geometry {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::Line(_) => "Line",
        geo::Geometry::LineString(_) => "LineString",
        geo::Geometry::Polygon(_) => "Polygon",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::MultiPolygon(_) => "MultiPolygon",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        geo::Geometry::Rect(_) => "Rect",
        geo::Geometry::Triangle(_) => "Triangle",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::coord;
    use tempfile::TempDir;

    fn square(west: f64, south: f64, size: f64) -> MultiPolygon<f64> {
        MultiPolygon::new(vec![Rect::new(
            coord! { x: west, y: south },
            coord! { x: west + size, y: south + size },
        )
        .to_polygon()])
    }

    fn glacier(id: &str, west: f64, south: f64) -> GlacierPolygon {
        GlacierPolygon {
            id: id.to_string(),
            geometry: square(west, south, 0.01),
            area_ha: 100.0,
            elevation_m: Some(5500.0),
        }
    }

    #[test]
    fn test_candidates_by_envelope() {
        let index = GlacierIndex::new(vec![
            glacier("g1", 86.00, 28.00),
            glacier("g2", 86.10, 28.00),
            glacier("g3", 87.00, 28.00),
        ]);
        let lake = Rect::new(coord! { x: 86.005, y: 28.005 }, coord! { x: 86.02, y: 28.02 });

        assert_eq!(index.candidates_in(lake), vec![0]);
        // ~10 km reaches g2 (0.08 degrees east) but not g3
        assert_eq!(index.candidates_near(lake, 10_000.0), vec![0, 1]);
        assert_eq!(index.len(), 3);
    }

    #[test]
    fn test_read_inventory() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glaciers.geojson");
        std::fs::write(
            &path,
            r#"{
              "type": "FeatureCollection",
              "features": [
                {
                  "type": "Feature",
                  "properties": {"glac_id": "G086000E28000N", "area_km2": 1.5, "zmed": 5600},
                  "geometry": {"type": "Polygon", "coordinates": [[[86.0,28.0],[86.01,28.0],[86.01,28.01],[86.0,28.01],[86.0,28.0]]]}
                },
                {
                  "type": "Feature",
                  "properties": {},
                  "geometry": {"type": "MultiPolygon", "coordinates": [[[[86.1,28.0],[86.11,28.0],[86.11,28.01],[86.1,28.0]]]]}
                }
              ]
            }"#,
        )
        .unwrap();

        let glaciers = read_glacier_inventory(&path).unwrap();
        assert_eq!(glaciers.len(), 2);
        assert_eq!(glaciers[0].id, "G086000E28000N");
        assert!((glaciers[0].area_ha - 150.0).abs() < 1e-9);
        assert_eq!(glaciers[0].elevation_m, Some(5600.0));
        assert_eq!(glaciers[1].id, "glacier-1");
        assert!(glaciers[1].area_ha > 0.0);
        assert_eq!(glaciers[1].elevation_m, None);
    }

    #[test]
    fn test_point_glacier_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("glaciers.geojson");
        std::fs::write(
            &path,
            r#"{"type": "FeatureCollection", "features": [
                {"type": "Feature", "properties": {"id": "p"}, "geometry": {"type": "Point", "coordinates": [86.0, 28.0]}}
            ]}"#,
        )
        .unwrap();

        assert!(matches!(
            read_glacier_inventory(&path),
            Err(GlofError::InvalidGeometry { .. })
        ));
    }
}
