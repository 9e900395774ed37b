//! Ordinary Kriging interpolation
//!
//! Best Linear Unbiased Estimator (BLUE) for spatial data. Uses a fitted
//! variogram model to compute optimal interpolation weights that minimize
//! estimation variance while satisfying an unbiasedness constraint.
//!
//! The kriging system for the k nearest sample points:
//! ```text
//! [γ(x₁,x₁) ... γ(x₁,xₖ) 1] [w₁]   [γ(x₁,x₀)]
//! [   ...     ...    ...    .]  [. ] = [   ...    ]
//! [γ(xₖ,x₁) ... γ(xₖ,xₖ) 1] [wₖ]   [γ(xₖ,x₀)]
//! [  1       ...    1       0] [μ ]   [    1     ]
//! ```
//! where γ is the semivariance from the fitted variogram, x₀ is the
//! target location, and μ is the Lagrange multiplier ensuring Σwᵢ = 1.
//! Distances are great-circle metres.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1993). Statistics for Spatial Data. Wiley.

use crate::maybe_rayon::*;
use ndarray::Array1;
use serde::{Deserialize, Serialize};
use tracing::warn;

use geokrige_core::geodesy::haversine_m;
use geokrige_core::{Error, GeoCoord, Result};

use super::kdtree::{KdTree, Neighbor};
use super::variogram::FittedVariogram;
use crate::linalg::solve_in_place;

/// Queries closer than this (metres) to a sample reuse its value; several
/// such samples are averaged.
const COINCIDENT_M: f64 = 1e-6;

/// Neighbourhood search parameters for Ordinary Kriging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct KrigingParams {
    /// Maximum number of nearest points to use per estimation (default 16).
    /// `None` uses every sample in range (global kriging).
    pub max_neighbors: Option<usize>,
    /// Maximum search radius in metres. Points beyond this are ignored.
    /// `None` means no radius limit.
    pub max_radius_m: Option<f64>,
}

impl Default for KrigingParams {
    fn default() -> Self {
        Self {
            max_neighbors: Some(16),
            max_radius_m: None,
        }
    }
}

/// Estimate at a single location.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KrigingEstimate {
    /// Interpolated value; `NaN` when no sample lies within the search radius
    pub value: f64,
    /// Kriging variance σ² = Σ wᵢ·γ(xᵢ,x₀) + μ. `NaN` when the system was
    /// singular and inverse-distance weights were used instead.
    pub variance: f64,
    /// Weights aligned with `neighbors`; they sum to 1
    pub weights: Vec<f64>,
    /// Indices of the samples that received the weights
    pub neighbors: Vec<usize>,
}

impl KrigingEstimate {
    fn empty() -> Self {
        Self {
            value: f64::NAN,
            variance: f64::NAN,
            weights: Vec::new(),
            neighbors: Vec::new(),
        }
    }
}

/// Ordinary kriging model over a fixed set of geographic samples.
#[derive(Debug, Clone)]
pub struct OrdinaryKriging {
    values: Vec<f64>,
    variogram: FittedVariogram,
    params: KrigingParams,
    tree: KdTree,
}

impl OrdinaryKriging {
    /// Index the samples for neighbour search.
    ///
    /// # Errors
    /// - [`Error::DimensionMismatch`] if `coords` and `values` differ in length
    /// - [`Error::InsufficientData`] for fewer than 2 samples
    /// - [`Error::InvalidParameter`] for a zero neighbour count or non-positive radius
    pub fn new(
        coords: Vec<GeoCoord>,
        values: Vec<f64>,
        variogram: FittedVariogram,
        params: &KrigingParams,
    ) -> Result<Self> {
        if values.len() != coords.len() {
            return Err(Error::DimensionMismatch {
                what: "kriging values",
                expected: coords.len(),
                actual: values.len(),
            });
        }
        if coords.len() < 2 {
            return Err(Error::InsufficientData(format!(
                "kriging requires at least 2 sample points, got {}",
                coords.len()
            )));
        }
        if params.max_neighbors == Some(0) {
            return Err(Error::invalid_param("max_neighbors", 0, "must be at least 1"));
        }
        if let Some(r) = params.max_radius_m {
            if !(r > 0.0) {
                return Err(Error::invalid_param("max_radius_m", r, "must be positive"));
            }
        }

        Ok(Self {
            tree: KdTree::build(&coords),
            values,
            variogram,
            params: params.clone(),
        })
    }

    pub fn variogram(&self) -> &FittedVariogram {
        &self.variogram
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn neighbors(&self, query: GeoCoord) -> Vec<Neighbor> {
        let k = self.params.max_neighbors.unwrap_or(self.values.len());
        match self.params.max_radius_m {
            Some(radius) => {
                let mut found = self.tree.within_radius(query, radius);
                found.truncate(k);
                found
            }
            None => self.tree.k_nearest(query, k),
        }
    }

    /// Estimate the value and kriging variance at one location.
    ///
    /// # Errors
    /// [`Error::InvalidCoordinate`] if `query` is not a valid lon/lat pair.
    pub fn predict_point(&self, query: GeoCoord) -> Result<KrigingEstimate> {
        if !query.is_valid() {
            return Err(Error::InvalidCoordinate {
                index: 0,
                lon: query.lon,
                lat: query.lat,
            });
        }

        let neighbors = self.neighbors(query);
        if neighbors.is_empty() {
            return Ok(KrigingEstimate::empty());
        }
        let k = neighbors.len();
        let indices: Vec<usize> = neighbors.iter().map(|n| n.index).collect();

        // Target is on a sample point: honour it exactly, averaging duplicates
        let coincident = neighbors.iter().take_while(|n| n.distance_m < COINCIDENT_M).count();
        if coincident > 0 {
            let share = 1.0 / coincident as f64;
            let mut weights = vec![0.0; k];
            weights[..coincident].fill(share);
            let value = indices[..coincident].iter().map(|&i| self.values[i]).sum::<f64>() * share;
            return Ok(KrigingEstimate {
                value,
                variance: 0.0,
                weights,
                neighbors: indices,
            });
        }

        // Build kriging system (k+1) × (k+1)
        let m = k + 1;
        let mut mat = vec![0.0_f64; m * m];
        let mut rhs = vec![0.0_f64; m];

        for i in 0..k {
            let ci = self.tree.coord(indices[i]);
            // γ(xᵢ, xᵢ) = 0 by convention; fill the upper triangle and mirror
            for j in (i + 1)..k {
                let h = haversine_m(ci, self.tree.coord(indices[j]));
                let g = self.variogram.evaluate(h);
                mat[i * m + j] = g;
                mat[j * m + i] = g;
            }
            // Lagrange constraint column and row
            mat[i * m + k] = 1.0;
            mat[k * m + i] = 1.0;
        }

        // RHS: γ(xᵢ, x₀) for each neighbor, plus 1.0 for constraint
        let gamma0: Vec<f64> = neighbors
            .iter()
            .map(|n| self.variogram.evaluate(n.distance_m))
            .collect();
        rhs[..k].copy_from_slice(&gamma0);
        rhs[k] = 1.0;

        match solve_in_place(m, &mut mat, &mut rhs) {
            Ok(solution) => {
                let weights = solution[..k].to_vec();
                let value = weights
                    .iter()
                    .zip(&indices)
                    .map(|(w, &idx)| w * self.values[idx])
                    .sum();
                // σ² = Σ wᵢ·γ(xᵢ,x₀) + μ
                let variance = weights
                    .iter()
                    .zip(&gamma0)
                    .map(|(w, g)| w * g)
                    .sum::<f64>()
                    + solution[k];
                Ok(KrigingEstimate {
                    value,
                    variance: variance.max(0.0),
                    weights,
                    neighbors: indices,
                })
            }
            Err(e) => {
                warn!(
                    "Kriging system singular at ({:.5}, {:.5}): {}; using inverse-distance weights",
                    query.lon, query.lat, e
                );
                let raw: Vec<f64> = neighbors
                    .iter()
                    .map(|n| 1.0 / (n.distance_m * n.distance_m))
                    .collect();
                let sum_w: f64 = raw.iter().sum();
                let weights: Vec<f64> = raw.iter().map(|w| w / sum_w).collect();
                let value = weights
                    .iter()
                    .zip(&indices)
                    .map(|(w, &idx)| w * self.values[idx])
                    .sum();
                Ok(KrigingEstimate {
                    value,
                    variance: f64::NAN,
                    weights,
                    neighbors: indices,
                })
            }
        }
    }

    /// Estimates at many locations, in query order.
    pub fn predict_many(&self, queries: &[GeoCoord]) -> Result<Vec<KrigingEstimate>> {
        queries
            .par_iter()
            .enumerate()
            .map(|(i, q)| {
                self.predict_point(*q).map_err(|e| match e {
                    Error::InvalidCoordinate { lon, lat, .. } => Error::InvalidCoordinate { index: i, lon, lat },
                    other => other,
                })
            })
            .collect()
    }

    /// Interpolated values at many locations.
    pub fn predict(&self, queries: &[GeoCoord]) -> Result<Array1<f64>> {
        Ok(self.predict_many(queries)?.into_iter().map(|e| e.value).collect())
    }

    /// Interpolated values and kriging variances at many locations.
    pub fn predict_with_variance(&self, queries: &[GeoCoord]) -> Result<(Array1<f64>, Array1<f64>)> {
        let estimates = self.predict_many(queries)?;
        let values = estimates.iter().map(|e| e.value).collect();
        let variances = estimates.iter().map(|e| e.variance).collect();
        Ok((values, variances))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interpolation::variogram::VariogramModel;
    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    fn generate_points(n: usize, seed: u64) -> (Vec<GeoCoord>, Vec<f64>) {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut coords = Vec::with_capacity(n);
        let mut values = Vec::with_capacity(n);
        for _ in 0..n {
            let lon = rng.gen_range(10.0..11.0);
            let lat = rng.gen_range(45.0..46.0);
            coords.push(GeoCoord::new(lon, lat));
            values.push(5.0 * (lon * 4.0).sin() + 3.0 * (lat * 3.0).cos());
        }
        (coords, values)
    }

    fn model() -> FittedVariogram {
        FittedVariogram::new(VariogramModel::Exponential, 0.1, 10.0, 30_000.0)
    }

    #[test]
    fn test_ok_basic() {
        let (coords, values) = generate_points(80, 42);
        let ok = OrdinaryKriging::new(coords, values, model(), &KrigingParams::default()).unwrap();
        let est = ok.predict_point(GeoCoord::new(10.5, 45.5)).unwrap();
        assert!(est.value.is_finite());
        assert!(est.variance >= 0.0);
        assert_eq!(est.weights.len(), 16);
        assert_eq!(est.neighbors.len(), 16);
    }

    #[test]
    fn test_weights_sum_to_one() {
        let (coords, values) = generate_points(60, 7);
        let ok = OrdinaryKriging::new(coords, values, model(), &KrigingParams::default()).unwrap();
        for q in [GeoCoord::new(10.2, 45.3), GeoCoord::new(10.9, 45.9), GeoCoord::new(9.5, 44.0)] {
            let est = ok.predict_point(q).unwrap();
            let sum: f64 = est.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "weights sum to {:.12} at {:?}", sum, q);
        }
    }

    #[test]
    fn test_exact_at_sample_points() {
        let (coords, values) = generate_points(40, 3);
        let zero_nugget = FittedVariogram::new(VariogramModel::Spherical, 0.0, 10.0, 50_000.0);
        let ok = OrdinaryKriging::new(coords.clone(), values.clone(), zero_nugget, &KrigingParams::default())
            .unwrap();
        let est = ok.predict(&coords).unwrap();
        for (i, (e, v)) in est.iter().zip(&values).enumerate() {
            assert!((e - v).abs() < 1e-9, "point {}: {:.6} vs {:.6}", i, e, v);
        }
        let (_, var) = ok.predict_with_variance(&coords[..5]).unwrap();
        assert!(var.iter().all(|v| *v == 0.0));
    }

    #[test]
    fn test_near_sample_point_converges() {
        // Zero nugget: the estimate is continuous and tends to the sample value
        let (coords, values) = generate_points(40, 5);
        let zero_nugget = FittedVariogram::new(VariogramModel::Exponential, 0.0, 10.0, 40_000.0);
        let ok = OrdinaryKriging::new(coords.clone(), values.clone(), zero_nugget, &KrigingParams::default())
            .unwrap();
        let q = GeoCoord::new(coords[0].lon + 1e-6, coords[0].lat);
        let est = ok.predict_point(q).unwrap();
        assert!(
            (est.value - values[0]).abs() < 0.05,
            "near-sample estimate {:.4} vs sample {:.4}",
            est.value,
            values[0]
        );
    }

    #[test]
    fn test_variance_grows_away_from_data() {
        let (coords, values) = generate_points(50, 11);
        let ok = OrdinaryKriging::new(coords.clone(), values, model(), &KrigingParams::default()).unwrap();
        let near = ok.predict_point(GeoCoord::new(coords[0].lon + 0.001, coords[0].lat)).unwrap();
        let far = ok.predict_point(GeoCoord::new(13.0, 48.0)).unwrap();
        assert!(
            far.variance > near.variance,
            "far {:.4} should exceed near {:.4}",
            far.variance,
            near.variance
        );
    }

    #[test]
    fn test_pure_nugget_gives_neighbourhood_mean() {
        let (coords, values) = generate_points(30, 9);
        let params = KrigingParams {
            max_neighbors: None,
            max_radius_m: None,
        };
        let ok = OrdinaryKriging::new(coords, values.clone(), FittedVariogram::pure_nugget(2.0), &params).unwrap();
        let est = ok.predict_point(GeoCoord::new(10.55, 45.45)).unwrap();
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        assert!((est.value - mean).abs() < 1e-9);
        for w in &est.weights {
            assert!((w - 1.0 / 30.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_search_radius() {
        let (coords, values) = generate_points(50, 2);
        let params = KrigingParams {
            max_neighbors: Some(16),
            max_radius_m: Some(20_000.0),
        };
        let ok = OrdinaryKriging::new(coords, values, model(), &params).unwrap();
        let inside = ok.predict_point(GeoCoord::new(10.5, 45.5)).unwrap();
        assert!(inside.value.is_finite());
        // Far outside the sample window: nothing within 20 km
        let outside = ok.predict_point(GeoCoord::new(20.0, 50.0)).unwrap();
        assert!(outside.value.is_nan());
        assert!(outside.weights.is_empty());
    }

    #[test]
    fn test_singular_system_falls_back_to_idw() {
        // Two samples at the same location make the matrix rank-deficient
        let coords = vec![
            GeoCoord::new(0.0, 0.0),
            GeoCoord::new(0.0, 0.0),
            GeoCoord::new(0.1, 0.0),
        ];
        let values = vec![1.0, 3.0, 5.0];
        let ok = OrdinaryKriging::new(coords, values, model(), &KrigingParams::default()).unwrap();
        let est = ok.predict_point(GeoCoord::new(0.05, 0.05)).unwrap();
        assert!(est.value.is_finite());
        assert!(est.variance.is_nan());
        assert!((est.weights.iter().sum::<f64>() - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_duplicate_samples_are_averaged_at_their_location() {
        let coords = vec![
            GeoCoord::new(0.0, 0.0),
            GeoCoord::new(0.0, 0.0),
            GeoCoord::new(0.1, 0.0),
            GeoCoord::new(0.0, 0.1),
        ];
        let values = vec![1.0, 3.0, 5.0, 7.0];
        let ok = OrdinaryKriging::new(coords, values, model(), &KrigingParams::default()).unwrap();
        let est = ok.predict_point(GeoCoord::new(0.0, 0.0)).unwrap();
        assert!((est.value - 2.0).abs() < 1e-12, "value {:.6}", est.value);
        assert_eq!(est.variance, 0.0);
        assert_eq!(&est.weights[..2], &[0.5, 0.5]);
        assert!(est.weights[2..].iter().all(|w| *w == 0.0));
        let mut dup = est.neighbors[..2].to_vec();
        dup.sort_unstable();
        assert_eq!(dup, vec![0, 1]);
    }

    #[test]
    fn test_constant_field() {
        let (coords, _) = generate_points(30, 1);
        let values = vec![42.0; coords.len()];
        let ok = OrdinaryKriging::new(coords, values, model(), &KrigingParams::default()).unwrap();
        let est = ok.predict_point(GeoCoord::new(10.3, 45.7)).unwrap();
        assert!((est.value - 42.0).abs() < 1e-9, "constant field, got {:.6}", est.value);
    }

    #[test]
    fn test_ok_too_few_points() {
        let result = OrdinaryKriging::new(
            vec![GeoCoord::new(0.0, 0.0)],
            vec![1.0],
            model(),
            &KrigingParams::default(),
        );
        assert!(matches!(result, Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_invalid_query_reports_index() {
        let (coords, values) = generate_points(10, 4);
        let ok = OrdinaryKriging::new(coords, values, model(), &KrigingParams::default()).unwrap();
        let queries = [GeoCoord::new(10.0, 45.0), GeoCoord::new(10.0, 95.0)];
        assert!(matches!(
            ok.predict(&queries),
            Err(Error::InvalidCoordinate { index: 1, .. })
        ));
    }
}
