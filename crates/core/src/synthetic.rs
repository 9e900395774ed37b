//! Synthetic point datasets with a known trend and spatially correlated noise
//!
//! Generates `y = 2·x1 − x2 + s(lon, lat) + ε`, where `x1`, `x2` are
//! location-independent predictors, `s` is a smooth periodic field over the
//! sampling window (wavelength [`SyntheticParams::wavelength_deg`]) and `ε`
//! is small uniform white noise. A regression on (x1, x2) captures the trend;
//! the residual is dominated by `s`, which kriging can recover.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::f64::consts::TAU;

use crate::error::{Error, Result};
use crate::geodesy::GeoCoord;
use crate::points::{PointDataset, PointRecord};

/// Parameters for [`spatial_trend_dataset`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticParams {
    /// Number of points
    pub n: usize,
    /// RNG seed
    pub seed: u64,
    /// Sampling window (min_lon, min_lat, max_lon, max_lat), degrees
    pub extent: (f64, f64, f64, f64),
    /// Amplitude of the spatial field `s`
    pub spatial_amplitude: f64,
    /// Wavelength of `s`, degrees
    pub wavelength_deg: f64,
    /// Half-width of the uniform white noise `ε`
    pub noise: f64,
}

impl Default for SyntheticParams {
    fn default() -> Self {
        Self {
            n: 200,
            seed: 42,
            extent: (10.0, 45.0, 12.0, 47.0),
            spatial_amplitude: 3.0,
            wavelength_deg: 2.0,
            noise: 0.25,
        }
    }
}

/// The spatial component `s(lon, lat)` used by the generator.
pub fn spatial_field(coord: GeoCoord, params: &SyntheticParams) -> f64 {
    let k = TAU / params.wavelength_deg;
    params.spatial_amplitude * (k * coord.lon).sin() * (k * coord.lat).cos()
}

/// Generate a dataset with attributes `x1`, `x2` and target `y`.
pub fn spatial_trend_dataset(params: &SyntheticParams) -> Result<PointDataset> {
    let (min_lon, min_lat, max_lon, max_lat) = params.extent;
    if !(min_lon < max_lon && min_lat < max_lat) {
        return Err(Error::invalid_param(
            "extent",
            format!("{:?}", params.extent),
            "min must be below max on both axes",
        ));
    }
    if params.wavelength_deg <= 0.0 {
        return Err(Error::invalid_param("wavelength_deg", params.wavelength_deg, "must be positive"));
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut records = Vec::with_capacity(params.n);
    for _ in 0..params.n {
        let coord = GeoCoord::new(
            rng.gen_range(min_lon..max_lon),
            rng.gen_range(min_lat..max_lat),
        );
        let x1: f64 = rng.gen_range(0.0..10.0);
        let x2: f64 = rng.gen_range(0.0..10.0);
        let eps = if params.noise > 0.0 {
            rng.gen_range(-params.noise..params.noise)
        } else {
            0.0
        };
        let y = 2.0 * x1 - x2 + spatial_field(coord, params) + eps;
        records.push(PointRecord::new(coord).with("x1", x1).with("x2", x2).with("y", y));
    }
    PointDataset::new(records)
}
