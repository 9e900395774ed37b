//! Geographic coordinates and great-circle distances
//!
//! All spatial statistics in geokrige work on longitude/latitude in degrees.
//! Planar Euclidean distance on unprojected degrees distorts both the
//! variogram and the kriging weights (a degree of longitude shrinks with
//! cos(latitude)), so every distance goes through the haversine formula on
//! a spherical Earth of mean radius [`EARTH_RADIUS_M`].

use geo::{Distance, Haversine};
use geo_types::Point;
use serde::{Deserialize, Serialize};

/// Mean Earth radius (IUGG), metres. Same value `geo::Haversine` uses.
pub const EARTH_RADIUS_M: f64 = 6_371_008.8;

/// A geographic coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoCoord {
    pub lon: f64,
    pub lat: f64,
}

impl GeoCoord {
    pub fn new(lon: f64, lat: f64) -> Self {
        Self { lon, lat }
    }

    /// Whether the coordinate is finite and inside the valid degree ranges.
    pub fn is_valid(&self) -> bool {
        self.lon.is_finite()
            && self.lat.is_finite()
            && (-180.0..=180.0).contains(&self.lon)
            && (-90.0..=90.0).contains(&self.lat)
    }

    /// Great-circle distance to `other`, in metres.
    #[inline]
    pub fn distance_m(&self, other: &GeoCoord) -> f64 {
        haversine_m(*self, *other)
    }

    /// Position on the unit sphere (x toward lon 0 on the equator, z toward
    /// the north pole).
    ///
    /// Chord length between unit vectors is monotone in great-circle
    /// distance, which lets a Cartesian k-d tree answer geodesic
    /// nearest-neighbour queries exactly.
    pub fn to_unit_vector(&self) -> [f64; 3] {
        let lon = self.lon.to_radians();
        let lat = self.lat.to_radians();
        let (slat, clat) = lat.sin_cos();
        let (slon, clon) = lon.sin_cos();
        [clat * clon, clat * slon, slat]
    }
}

impl From<GeoCoord> for Point<f64> {
    fn from(c: GeoCoord) -> Self {
        Point::new(c.lon, c.lat)
    }
}

impl From<Point<f64>> for GeoCoord {
    fn from(p: Point<f64>) -> Self {
        GeoCoord::new(p.x(), p.y())
    }
}

/// Haversine distance between two coordinates, metres.
#[inline]
pub fn haversine_m(a: GeoCoord, b: GeoCoord) -> f64 {
    Haversine::distance(Point::from(a), Point::from(b))
}

/// Convert a chord length on the unit sphere to a great-circle distance in metres.
#[inline]
pub fn chord_to_distance_m(chord: f64) -> f64 {
    2.0 * (chord / 2.0).clamp(-1.0, 1.0).asin() * EARTH_RADIUS_M
}

/// Convert a great-circle distance in metres to a unit-sphere chord length.
#[inline]
pub fn distance_m_to_chord(distance_m: f64) -> f64 {
    let angle = (distance_m / EARTH_RADIUS_M).min(std::f64::consts::PI);
    2.0 * (angle / 2.0).sin()
}

/// Bounding box of a set of coordinates: (min_lon, min_lat, max_lon, max_lat).
pub fn extent(coords: &[GeoCoord]) -> Option<(f64, f64, f64, f64)> {
    if coords.is_empty() {
        return None;
    }
    let mut ext = (f64::MAX, f64::MAX, f64::MIN, f64::MIN);
    for c in coords {
        ext.0 = ext.0.min(c.lon);
        ext.1 = ext.1.min(c.lat);
        ext.2 = ext.2.max(c.lon);
        ext.3 = ext.3.max(c.lat);
    }
    Some(ext)
}
