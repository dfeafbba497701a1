//! Distances between lake and glacier outlines.
//!
//! Geometries are stored in geographic coordinates. Planar work (closest
//! boundary points, centroid separation) happens in a local equirectangular
//! frame centred on the lake, which is accurate to well under a metre at the
//! scale of a glacier search radius. Reported distances are geodesic.

use geo::{
    coord, Closest, ClosestPoint, Coord, Distance, Euclidean, Haversine, Intersects, LineString,
    MapCoords, MultiPolygon, Point, Polygon,
};

/// Mean Earth radius (IUGG) in metres
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// Great-circle distance in metres between two (lon, lat) points
pub fn haversine_m(a: Point<f64>, b: Point<f64>) -> f64 {
    Haversine.distance(a, b)
}

/// Degrees of latitude spanned by a ground distance
pub fn metres_to_lat_degrees(metres: f64) -> f64 {
    (metres / EARTH_RADIUS_M).to_degrees()
}

/// Degrees of longitude spanned by a ground distance at a latitude
pub fn metres_to_lon_degrees(metres: f64, latitude: f64) -> f64 {
    let cos_lat = latitude.to_radians().cos().abs().max(1e-6);
    metres_to_lat_degrees(metres) / cos_lat
}

/// Equirectangular projection about a fixed origin, in metres
#[derive(Debug, Clone, Copy)]
pub struct LocalFrame {
    origin: Point<f64>,
    cos_lat: f64,
}

impl LocalFrame {
    pub fn new(origin: Point<f64>) -> Self {
        Self { origin, cos_lat: origin.y().to_radians().cos() }
    }

    pub fn project(&self, c: Coord<f64>) -> Coord<f64> {
        coord! {
            x: EARTH_RADIUS_M * (c.x - self.origin.x()).to_radians() * self.cos_lat,
            y: EARTH_RADIUS_M * (c.y - self.origin.y()).to_radians(),
        }
    }

    pub fn unproject(&self, c: Coord<f64>) -> Coord<f64> {
        coord! {
            x: self.origin.x() + (c.x / (EARTH_RADIUS_M * self.cos_lat)).to_degrees(),
            y: self.origin.y() + (c.y / EARTH_RADIUS_M).to_degrees(),
        }
    }

    /// Planar distance in metres between two geographic points
    pub fn planar_distance(&self, a: Point<f64>, b: Point<f64>) -> f64 {
        let a: Point<f64> = self.project(a.0).into();
        let b: Point<f64> = self.project(b.0).into();
        Euclidean.distance(a, b)
    }
}

fn rings(polygon: &Polygon<f64>) -> impl Iterator<Item = &LineString<f64>> {
    std::iter::once(polygon.exterior()).chain(polygon.interiors())
}

/// Closest point on any of `lines` to `p`, with its planar distance
fn closest_on(lines: &[&LineString<f64>], p: Point<f64>) -> Option<(Point<f64>, f64)> {
    lines
        .iter()
        .filter_map(|line| match line.closest_point(&p) {
            Closest::Intersection(q) | Closest::SinglePoint(q) => {
                Some((q, Euclidean.distance(p, q)))
            }
            Closest::Indeterminate => None,
        })
        .min_by(|a, b| a.1.total_cmp(&b.1))
}

/// Closest pair between two sets of boundary lines in the same planar frame.
///
/// For non-crossing polylines the minimum separation is always attained at a
/// vertex of one of them, so testing every vertex against the other set is exact.
fn closest_pair(
    a: &[&LineString<f64>],
    b: &[&LineString<f64>],
) -> Option<(Point<f64>, Point<f64>, f64)> {
    let forward = a.iter().flat_map(|line| line.points()).filter_map(|p| {
        closest_on(b, p).map(|(q, d)| (p, q, d))
    });
    let backward = b.iter().flat_map(|line| line.points()).filter_map(|q| {
        closest_on(a, q).map(|(p, d)| (p, q, d))
    });
    forward.chain(backward).min_by(|x, y| x.2.total_cmp(&y.2))
}

/// Geodesic distance in metres between a lake boundary and a glacier boundary.
///
/// Intersecting geometries are at distance 0. Returns `None` for empty input.
pub fn boundary_distance_m(lake: &Polygon<f64>, glacier: &MultiPolygon<f64>) -> Option<f64> {
    if lake.exterior().0.is_empty() || glacier.0.is_empty() {
        return None;
    }
    if lake.intersects(glacier) {
        return Some(0.0);
    }

    let origin = lake.exterior().0[0];
    let frame = LocalFrame::new(origin.into());
    let lake_m = lake.map_coords(|c| frame.project(c));
    let glacier_m = glacier.map_coords(|c| frame.project(c));

    let lake_lines: Vec<&LineString<f64>> = rings(&lake_m).collect();
    let glacier_lines: Vec<&LineString<f64>> = glacier_m.iter().flat_map(rings).collect();

    let (p, q, _) = closest_pair(&lake_lines, &glacier_lines)?;
    let p: Point<f64> = frame.unproject(p.0).into();
    let q: Point<f64> = frame.unproject(q.0).into();
    Some(haversine_m(p, q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geo::Rect;

    fn square(west: f64, south: f64, size: f64) -> Polygon<f64> {
        Rect::new(coord! { x: west, y: south }, coord! { x: west + size, y: south + size })
            .to_polygon()
    }

    #[test]
    fn test_frame_round_trip() {
        let frame = LocalFrame::new(Point::new(86.9, 27.9));
        let c = coord! { x: 86.95, y: 27.85 };
        let back = frame.unproject(frame.project(c));
        assert!((back.x - c.x).abs() < 1e-12);
        assert!((back.y - c.y).abs() < 1e-12);
    }

    #[test]
    fn test_planar_matches_haversine_locally() {
        let a = Point::new(86.90, 27.90);
        let b = Point::new(86.91, 27.91);
        let frame = LocalFrame::new(a);
        let planar = frame.planar_distance(a, b);
        let geodesic = haversine_m(a, b);
        assert!((planar - geodesic).abs() / geodesic < 1e-3);
    }

    #[test]
    fn test_touching_shapes_have_zero_distance() {
        let lake = square(86.0, 28.0, 0.01);
        let glacier = MultiPolygon::new(vec![square(86.01, 28.0, 0.01)]);
        assert_eq!(boundary_distance_m(&lake, &glacier), Some(0.0));
    }

    #[test]
    fn test_boundary_distance_east_gap() {
        let lake = square(86.0, 28.0, 0.01);
        let glacier = MultiPolygon::new(vec![square(86.02, 28.0, 0.01)]);

        let distance = boundary_distance_m(&lake, &glacier).unwrap();
        // 0.01 degrees of longitude along a parallel at ~28 N
        let expected = haversine_m(Point::new(86.01, 28.0), Point::new(86.02, 28.0));
        assert!((distance - expected).abs() < 1.0, "{} vs {}", distance, expected);
    }

    #[test]
    fn test_boundary_distance_uses_edges_not_vertices() {
        // Glacier vertex points at the middle of the lake's north edge
        let lake = square(86.0, 28.0, 0.02);
        let glacier = MultiPolygon::new(vec![Polygon::new(
            LineString::from(vec![(86.01, 28.03), (86.02, 28.05), (86.0, 28.05), (86.01, 28.03)]),
            vec![],
        )]);

        let distance = boundary_distance_m(&lake, &glacier).unwrap();
        let expected = haversine_m(Point::new(86.01, 28.02), Point::new(86.01, 28.03));
        assert!((distance - expected).abs() < 1.0);
    }

    #[test]
    fn test_degree_conversions() {
        let lat = metres_to_lat_degrees(111_195.0);
        assert!((lat - 1.0).abs() < 1e-3);
        assert!(metres_to_lon_degrees(1000.0, 60.0) > metres_to_lat_degrees(1000.0));
    }
}
