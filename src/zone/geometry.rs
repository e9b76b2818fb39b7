//! Geographic points and zone polygons
//!
//! Containment uses the even-odd ray casting rule on (lng, lat) treated as
//! planar coordinates, which is accurate for pasture-sized zones away from the
//! antimeridian.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Metres per degree of latitude (mean)
const METERS_PER_DEGREE_LAT: f64 = 111_320.0;

/// Rings whose area is below this fraction of their bounding square enclose nothing
const MIN_AREA_RATIO: f64 = 1e-9;

/// A WGS84 coordinate
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lng: f64,
}

impl GeoPoint {
    pub fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// Point displaced by the given distances in metres
    pub fn offset_meters(&self, north: f64, east: f64) -> Self {
        let meters_per_degree_lng = METERS_PER_DEGREE_LAT * self.lat.to_radians().cos();
        Self {
            lat: self.lat + north / METERS_PER_DEGREE_LAT,
            lng: self.lng + east / meters_per_degree_lng,
        }
    }
}

/// Malformed polygon geometry
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeometryError {
    #[error("polygon needs at least 3 distinct vertices, got {0}")]
    TooFewVertices(usize),

    #[error("non-finite coordinate at vertex {0}")]
    NonFiniteVertex(usize),

    #[error("polygon encloses no area")]
    Degenerate,

    #[error("non-finite test point")]
    NonFinitePoint,
}

/// A simple polygon given by its outer ring
///
/// The ring may be open or closed (first vertex repeated at the end).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    ring: Vec<GeoPoint>,
}

impl Polygon {
    pub fn new(ring: Vec<GeoPoint>) -> Self {
        Self { ring }
    }

    /// Axis-aligned square of `side_meters` centred on `center`
    pub fn square_around(center: GeoPoint, side_meters: f64) -> Self {
        let half = side_meters / 2.0;
        Self::new(vec![
            center.offset_meters(-half, -half),
            center.offset_meters(-half, half),
            center.offset_meters(half, half),
            center.offset_meters(half, -half),
        ])
    }

    pub fn vertices(&self) -> &[GeoPoint] {
        &self.ring
    }

    fn open_ring(&self) -> &[GeoPoint] {
        match (self.ring.first(), self.ring.last()) {
            (Some(first), Some(last)) if self.ring.len() > 1 && first == last => {
                &self.ring[..self.ring.len() - 1]
            }
            _ => &self.ring,
        }
    }

    /// Check the ring is usable for containment tests
    pub fn validate(&self) -> Result<(), GeometryError> {
        if let Some(index) = self.ring.iter().position(|p| !p.is_finite()) {
            return Err(GeometryError::NonFiniteVertex(index));
        }
        let ring = self.open_ring();
        let distinct = ring
            .iter()
            .enumerate()
            .filter(|(i, p)| !ring[..*i].contains(*p))
            .count();
        if distinct < 3 {
            return Err(GeometryError::TooFewVertices(distinct));
        }
        if shoelace_area(ring) <= MIN_AREA_RATIO * bounding_extent(ring).powi(2) {
            return Err(GeometryError::Degenerate);
        }
        Ok(())
    }

    /// Whether `point` lies inside the polygon
    pub fn contains(&self, point: GeoPoint) -> Result<bool, GeometryError> {
        self.validate()?;
        if !point.is_finite() {
            return Err(GeometryError::NonFinitePoint);
        }

        let ring = self.open_ring();
        let mut inside = false;
        let mut j = ring.len() - 1;
        for i in 0..ring.len() {
            let (xi, yi) = (ring[i].lng, ring[i].lat);
            let (xj, yj) = (ring[j].lng, ring[j].lat);

            if (yi > point.lat) != (yj > point.lat)
                && point.lng < (xj - xi) * (point.lat - yi) / (yj - yi) + xi
            {
                inside = !inside;
            }
            j = i;
        }

        Ok(inside)
    }
}

/// Unsigned planar area of an open ring in square degrees
fn shoelace_area(ring: &[GeoPoint]) -> f64 {
    // Relative to the first vertex to keep the products small
    let origin = ring[0];
    let mut twice_area = 0.0;
    let mut j = ring.len() - 1;
    for i in 0..ring.len() {
        let (xi, yi) = (ring[i].lng - origin.lng, ring[i].lat - origin.lat);
        let (xj, yj) = (ring[j].lng - origin.lng, ring[j].lat - origin.lat);
        twice_area += xj * yi - xi * yj;
        j = i;
    }
    (twice_area / 2.0).abs()
}

/// Longest side of the ring's bounding box in degrees
fn bounding_extent(ring: &[GeoPoint]) -> f64 {
    let (mut min_lat, mut max_lat) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_lng, mut max_lng) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in ring {
        min_lat = min_lat.min(p.lat);
        max_lat = max_lat.max(p.lat);
        min_lng = min_lng.min(p.lng);
        max_lng = max_lng.max(p.lng);
    }
    (max_lat - min_lat).max(max_lng - min_lng)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> Polygon {
        Polygon::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 1.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(1.0, 0.0),
        ])
    }

    #[test]
    fn test_square_contains() {
        let square = unit_square();

        assert_eq!(square.contains(GeoPoint::new(0.5, 0.5)), Ok(true));
        assert_eq!(square.contains(GeoPoint::new(1.5, 0.5)), Ok(false));
        assert_eq!(square.contains(GeoPoint::new(-0.1, -0.1)), Ok(false));
    }

    #[test]
    fn test_closed_ring_same_as_open() {
        let mut ring = unit_square().vertices().to_vec();
        ring.push(ring[0]);
        let closed = Polygon::new(ring);

        assert_eq!(closed.contains(GeoPoint::new(0.5, 0.5)), Ok(true));
        assert_eq!(closed.contains(GeoPoint::new(2.0, 2.0)), Ok(false));
    }

    #[test]
    fn test_concave_polygon() {
        // U shape opening to the north
        let u = Polygon::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(0.0, 3.0),
            GeoPoint::new(3.0, 3.0),
            GeoPoint::new(3.0, 2.0),
            GeoPoint::new(1.0, 2.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(3.0, 1.0),
            GeoPoint::new(3.0, 0.0),
        ]);

        assert_eq!(u.contains(GeoPoint::new(2.0, 0.5)), Ok(true));
        assert_eq!(u.contains(GeoPoint::new(2.0, 1.5)), Ok(false));
        assert_eq!(u.contains(GeoPoint::new(2.0, 2.5)), Ok(true));
    }

    #[test]
    fn test_malformed_geometry() {
        let degenerate = Polygon::new(vec![GeoPoint::new(0.0, 0.0), GeoPoint::new(1.0, 1.0)]);
        assert_eq!(
            degenerate.contains(GeoPoint::new(0.5, 0.5)),
            Err(GeometryError::TooFewVertices(2))
        );

        let nan = Polygon::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(f64::NAN, 1.0),
            GeoPoint::new(1.0, 1.0),
        ]);
        assert_eq!(
            nan.contains(GeoPoint::new(0.5, 0.5)),
            Err(GeometryError::NonFiniteVertex(1))
        );

        assert_eq!(
            unit_square().contains(GeoPoint::new(f64::INFINITY, 0.5)),
            Err(GeometryError::NonFinitePoint)
        );
    }

    #[test]
    fn test_zero_area_rings_rejected() {
        let p = GeoPoint::new(-20.0, -54.0);
        let collapsed = Polygon::new(vec![p, p, p, p]);
        assert_eq!(collapsed.validate(), Err(GeometryError::TooFewVertices(1)));
        assert_eq!(collapsed.contains(p), Err(GeometryError::TooFewVertices(1)));

        let repeated = Polygon::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 1.0),
        ]);
        assert_eq!(repeated.validate(), Err(GeometryError::TooFewVertices(2)));

        let line = Polygon::new(vec![
            GeoPoint::new(0.0, 0.0),
            GeoPoint::new(1.0, 1.0),
            GeoPoint::new(2.0, 2.0),
        ]);
        assert_eq!(line.contains(GeoPoint::new(5.0, 5.0)), Err(GeometryError::Degenerate));

        assert_eq!(unit_square().validate(), Ok(()));
    }

    #[test]
    fn test_square_around_meters() {
        let center = GeoPoint::new(-20.0, -54.0);
        let zone = Polygon::square_around(center, 100.0);

        assert_eq!(zone.contains(center), Ok(true));
        assert_eq!(zone.contains(center.offset_meters(40.0, 40.0)), Ok(true));
        assert_eq!(zone.contains(center.offset_meters(60.0, 0.0)), Ok(false));
        assert_eq!(zone.contains(center.offset_meters(5_000.0, 0.0)), Ok(false));
    }
}
