//! Coordinate Reference System handling
//!
//! Point datasets reach the statistics layer in geographic degrees
//! (EPSG:4326 axis order lon, lat). Loaders tag what they read with a
//! [`CRS`] and call [`CRS::to_geographic`] per coordinate. Only the systems
//! that show up in GeoJSON/CSV exports of point samples are supported:
//! WGS84 / CRS84 (identity) and spherical Web Mercator (EPSG:3857).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{Error, Result};
use crate::geodesy::GeoCoord;

/// Web Mercator uses the WGS84 semi-major axis on a sphere.
const WEB_MERCATOR_RADIUS: f64 = 6_378_137.0;

/// Coordinate Reference System representation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CRS {
    /// EPSG code if known
    epsg: Option<u32>,
    /// Name as it appeared in the source, e.g. `urn:ogc:def:crs:OGC:1.3:CRS84`
    name: Option<String>,
}

impl CRS {
    /// Create a CRS from an EPSG code
    pub fn from_epsg(code: u32) -> Self {
        Self {
            epsg: Some(code),
            name: None,
        }
    }

    /// Parse an authority string as found in GeoJSON `crs` members or CLI flags.
    ///
    /// Accepts `EPSG:4326`, `epsg:3857`, `urn:ogc:def:crs:EPSG::3857`,
    /// `urn:ogc:def:crs:OGC:1.3:CRS84`, `CRS84` and bare integers.
    pub fn parse(name: &str) -> Result<Self> {
        let trimmed = name.trim();
        let upper = trimmed.to_ascii_uppercase();

        if upper.ends_with("CRS84") {
            return Ok(Self {
                epsg: Some(4326),
                name: Some(trimmed.to_string()),
            });
        }

        let code = upper
            .rsplit(':')
            .next()
            .and_then(|tail| tail.parse::<u32>().ok())
            .ok_or_else(|| Error::UnsupportedCrs(trimmed.to_string()))?;

        Ok(Self {
            epsg: Some(code),
            name: Some(trimmed.to_string()),
        })
    }

    /// WGS84 geographic CRS (EPSG:4326)
    pub fn wgs84() -> Self {
        Self::from_epsg(4326)
    }

    /// Web Mercator (EPSG:3857)
    pub fn web_mercator() -> Self {
        Self::from_epsg(3857)
    }

    /// Get EPSG code if known
    pub fn epsg(&self) -> Option<u32> {
        self.epsg
    }

    /// Whether coordinates in this CRS are already geographic degrees.
    pub fn is_geographic(&self) -> bool {
        self.epsg == Some(4326)
    }

    /// Check if two CRS are equivalent
    pub fn is_equivalent(&self, other: &CRS) -> bool {
        match (self.epsg, other.epsg) {
            (Some(a), Some(b)) => a == b,
            _ => self.name.is_some() && self.name == other.name,
        }
    }

    /// Reproject a single (x, y) pair in this CRS to geographic degrees.
    pub fn to_geographic(&self, x: f64, y: f64) -> Result<GeoCoord> {
        match self.epsg {
            Some(4326) => Ok(GeoCoord::new(x, y)),
            Some(3857) | Some(900913) => {
                let lon = (x / WEB_MERCATOR_RADIUS).to_degrees();
                let lat = (2.0 * (y / WEB_MERCATOR_RADIUS).exp().atan()
                    - std::f64::consts::FRAC_PI_2)
                    .to_degrees();
                Ok(GeoCoord::new(lon, lat))
            }
            _ => Err(Error::UnsupportedCrs(self.identifier())),
        }
    }

    /// Get a string identifier for this CRS
    pub fn identifier(&self) -> String {
        if let Some(code) = self.epsg {
            return format!("EPSG:{}", code);
        }
        if let Some(name) = &self.name {
            return name.clone();
        }
        "Unknown".to_string()
    }
}

impl fmt::Display for CRS {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.identifier())
    }
}

impl Default for CRS {
    fn default() -> Self {
        Self::wgs84()
    }
}

/// Forward spherical Mercator: geographic degrees to EPSG:3857 metres.
pub fn geographic_to_web_mercator(coord: GeoCoord) -> (f64, f64) {
    let x = WEB_MERCATOR_RADIUS * coord.lon.to_radians();
    let y = WEB_MERCATOR_RADIUS
        * (std::f64::consts::FRAC_PI_4 + coord.lat.to_radians() / 2.0)
            .tan()
            .ln();
    (x, y)
}
