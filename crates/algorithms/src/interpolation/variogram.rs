//! Variogram computation and model fitting
//!
//! Computes the empirical (experimental) variogram of a scalar field sampled
//! at geographic points and fits theoretical models (exponential, spherical,
//! Gaussian, pure nugget). Prerequisite for kriging.
//!
//! The semivariance γ(h) measures spatial dissimilarity as a function of
//! separation distance h:
//! ```text
//! γ(h) = (1/2N(h)) Σ [z(xᵢ) - z(xⱼ)]²   for all pairs with |xᵢ-xⱼ| in the bin around h
//! ```
//! Separations are great-circle distances in metres, so `range` and the lag
//! bins are in metres too.
//!
//! Reference:
//! Matheron, G. (1963). Principles of geostatistics. Economic Geology.
//! Cressie, N. (1985). Fitting variogram models by weighted least squares.
//! Mathematical Geology, 17(5).

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use geokrige_core::geodesy::haversine_m;
use geokrige_core::{Error, GeoCoord, Result};

use crate::linalg::solve_in_place;

/// Separations below this (metres) count as zero lag.
const ZERO_LAG_M: f64 = 1e-9;

/// Lower bound on the Gaussian nugget, as a fraction of the largest
/// empirical semivariance.
const GAUSSIAN_MIN_NUGGET: f64 = 1e-2;

/// Empirical variogram: semivariance values at discrete lag distances.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmpiricalVariogram {
    /// Lag distances (bin centers), metres
    pub lags: Vec<f64>,
    /// Semivariance values γ(h) at each lag; `NaN` for empty bins
    pub semivariance: Vec<f64>,
    /// Number of point pairs contributing to each lag bin
    pub pair_counts: Vec<usize>,
    /// Width of each bin, metres
    pub bin_width: f64,
    /// Pairs actually evaluated (after subsampling)
    pub pairs_used: usize,
}

impl EmpiricalVariogram {
    /// (bin center, semivariance) for bins that received at least one pair.
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.lags
            .iter()
            .zip(&self.semivariance)
            .zip(&self.pair_counts)
            .filter(|(_, cnt)| **cnt > 0)
            .map(|((&lag, &sv), _)| (lag, sv))
            .collect()
    }
}

/// Theoretical variogram model type
///
/// With c₀ = nugget, c = sill − nugget and a = range:
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VariogramModel {
    /// γ(h) = c₀ + c·[1 - exp(-h/a)]
    Exponential,
    /// γ(h) = c₀ + c·[1.5(h/a) - 0.5(h/a)³] for h < a; c₀ + c for h ≥ a
    Spherical,
    /// γ(h) = c₀ + c·[1 - exp(-(h/a)²)]
    Gaussian,
    /// γ(h) = c₀ for every h > 0: no spatial correlation
    Nugget,
}

impl VariogramModel {
    /// Models tried by [`fit_best_variogram`]
    pub const STRUCTURED: [VariogramModel; 3] = [
        VariogramModel::Exponential,
        VariogramModel::Spherical,
        VariogramModel::Gaussian,
    ];

    /// Shape function f(t), t = h/a, with f(0) = 0 and f → 1.
    fn shape(self, t: f64) -> f64 {
        match self {
            VariogramModel::Exponential => 1.0 - (-t).exp(),
            VariogramModel::Spherical => {
                if t >= 1.0 {
                    1.0
                } else {
                    1.5 * t - 0.5 * t * t * t
                }
            }
            VariogramModel::Gaussian => 1.0 - (-t * t).exp(),
            VariogramModel::Nugget => 1.0,
        }
    }

    /// df/dt
    fn shape_derivative(self, t: f64) -> f64 {
        match self {
            VariogramModel::Exponential => (-t).exp(),
            VariogramModel::Spherical => {
                if t >= 1.0 {
                    0.0
                } else {
                    1.5 - 1.5 * t * t
                }
            }
            VariogramModel::Gaussian => 2.0 * t * (-t * t).exp(),
            VariogramModel::Nugget => 0.0,
        }
    }
}

impl std::str::FromStr for VariogramModel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "exponential" | "exp" => Ok(VariogramModel::Exponential),
            "spherical" | "sph" => Ok(VariogramModel::Spherical),
            "gaussian" | "gau" => Ok(VariogramModel::Gaussian),
            "nugget" | "nug" => Ok(VariogramModel::Nugget),
            other => Err(Error::invalid_param(
                "model",
                other,
                "expected exponential, spherical, gaussian or nugget",
            )),
        }
    }
}

/// Fitted variogram model parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedVariogram {
    /// Model type
    pub model: VariogramModel,
    /// Nugget (c₀): semivariance as h → 0⁺ (measurement error + micro-scale variation)
    pub nugget: f64,
    /// Sill (c₀ + c): semivariance at which the model levels off
    pub sill: f64,
    /// Range (a), metres. For the exponential and Gaussian forms the model
    /// reaches ~63% of the partial sill at h = a.
    pub range: f64,
    /// Partial sill (c = sill - nugget)
    pub partial_sill: f64,
    /// Weighted residual sum of squares from fitting (lower = better)
    pub rss: f64,
}

impl FittedVariogram {
    /// Build a model from nugget, sill and range.
    pub fn new(model: VariogramModel, nugget: f64, sill: f64, range: f64) -> Self {
        Self {
            model,
            nugget,
            sill,
            range,
            partial_sill: sill - nugget,
            rss: 0.0,
        }
    }

    /// Flat model: all variance is nugget, no spatial correlation.
    ///
    /// Ordinary kriging with this model weights every neighbour equally,
    /// so the interpolated value is the neighbourhood mean.
    pub fn pure_nugget(variance: f64) -> Self {
        Self::new(VariogramModel::Nugget, variance, variance, 0.0)
    }

    /// Whether the model carries no spatially correlated variance.
    pub fn is_pure_nugget(&self) -> bool {
        self.model == VariogramModel::Nugget || self.partial_sill <= 0.0
    }

    /// Evaluate the fitted variogram model at distance h (metres)
    pub fn evaluate(&self, h: f64) -> f64 {
        if h < ZERO_LAG_M {
            return 0.0;
        }
        if self.model == VariogramModel::Nugget || self.range <= 0.0 {
            return self.sill;
        }
        self.nugget + self.partial_sill * self.model.shape(h / self.range)
    }

    /// Covariance C(h) = sill − γ(h).
    pub fn covariance(&self, h: f64) -> f64 {
        self.sill - self.evaluate(h)
    }
}

/// Parameters for empirical variogram computation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VariogramParams {
    /// Number of lag bins (default 15)
    pub n_lags: usize,
    /// Bin width in metres. Overrides `n_lags` when set.
    pub bin_width_m: Option<f64>,
    /// Maximum lag distance, metres. If None, half the maximum pairwise distance.
    pub max_lag_m: Option<f64>,
    /// Upper bound on evaluated point pairs. Above it, a uniform random
    /// subsample of pairs (without replacement) is used. `None` = all pairs.
    pub max_pairs: Option<usize>,
    /// Seed for pair subsampling
    pub seed: u64,
}

impl Default for VariogramParams {
    fn default() -> Self {
        Self {
            n_lags: 15,
            bin_width_m: None,
            max_lag_m: None,
            max_pairs: Some(200_000),
            seed: 0,
        }
    }
}

/// Compute the empirical (experimental) variogram of `values` at `coords`.
///
/// # Returns
/// [`EmpiricalVariogram`] with lag distances, semivariance, and pair counts.
///
/// # Errors
/// - [`Error::DimensionMismatch`] if `coords` and `values` differ in length
/// - [`Error::InsufficientData`] for fewer than 2 points
/// - [`Error::VariogramFit`] if every sample sits at the same location
pub fn empirical_variogram(
    coords: &[GeoCoord],
    values: &[f64],
    params: &VariogramParams,
) -> Result<EmpiricalVariogram> {
    let n = coords.len();
    if values.len() != n {
        return Err(Error::DimensionMismatch {
            what: "variogram values",
            expected: n,
            actual: values.len(),
        });
    }
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "need at least 2 points for a variogram, got {}",
            n
        )));
    }
    if params.bin_width_m.is_none() && params.n_lags == 0 {
        return Err(Error::invalid_param("n_lags", 0, "must be positive"));
    }
    if values.iter().any(|v| !v.is_finite()) {
        return Err(Error::invalid_param("values", "non-finite", "variogram values must be finite"));
    }

    // (distance, squared difference) for every evaluated pair
    let pairs: Vec<(f64, f64)> = sample_pairs(n, params.max_pairs, params.seed)
        .into_iter()
        .map(|(i, j)| {
            let dz = values[i] - values[j];
            (haversine_m(coords[i], coords[j]), dz * dz)
        })
        .collect();

    let max_dist = pairs.iter().map(|(d, _)| *d).fold(0.0_f64, f64::max);
    if max_dist < ZERO_LAG_M {
        return Err(Error::VariogramFit(
            "all sample locations coincide; spatial structure cannot be estimated".into(),
        ));
    }

    // Convention: max lag = half of max distance
    let max_lag = params.max_lag_m.unwrap_or(max_dist / 2.0);
    if !(max_lag > 0.0) {
        return Err(Error::invalid_param("max_lag_m", max_lag, "must be positive"));
    }

    let (n_lags, bin_width) = match params.bin_width_m {
        Some(w) if w > 0.0 => (((max_lag / w).ceil() as usize).max(1), w),
        Some(w) => return Err(Error::invalid_param("bin_width_m", w, "must be positive")),
        None => (params.n_lags, max_lag / params.n_lags as f64),
    };

    let lags: Vec<f64> = (0..n_lags).map(|k| (k as f64 + 0.5) * bin_width).collect();
    let mut semivariance = vec![0.0_f64; n_lags];
    let mut pair_counts = vec![0_usize; n_lags];

    for &(d, sq_diff) in &pairs {
        if d > max_lag {
            continue;
        }
        let bin = ((d / bin_width) as usize).min(n_lags - 1);
        semivariance[bin] += sq_diff;
        pair_counts[bin] += 1;
    }

    // Average: γ(h) = (1/2N) Σ (zᵢ - zⱼ)²
    for k in 0..n_lags {
        if pair_counts[k] > 0 {
            semivariance[k] /= 2.0 * pair_counts[k] as f64;
        } else {
            semivariance[k] = f64::NAN;
        }
    }

    debug!(
        "Empirical variogram: {} points, {} pairs, {} bins of {:.1} m",
        n,
        pairs.len(),
        n_lags,
        bin_width
    );

    Ok(EmpiricalVariogram {
        lags,
        semivariance,
        pair_counts,
        bin_width,
        pairs_used: pairs.len(),
    })
}

/// All `i < j` index pairs, or a uniform subsample of `max_pairs` of them.
fn sample_pairs(n: usize, max_pairs: Option<usize>, seed: u64) -> Vec<(usize, usize)> {
    let total = n * (n - 1) / 2;
    match max_pairs {
        Some(m) if m < total => {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut picked: Vec<usize> = rand::seq::index::sample(&mut rng, total, m).into_vec();
            picked.sort_unstable();
            picked.into_iter().map(|k| unrank_pair(n, k)).collect()
        }
        _ => (0..n)
            .flat_map(|i| ((i + 1)..n).map(move |j| (i, j)))
            .collect(),
    }
}

/// Map a linear index over upper-triangle pairs back to `(i, j)`, `i < j`.
fn unrank_pair(n: usize, k: usize) -> (usize, usize) {
    // Pairs with first index < i: i·(2n − i − 1)/2
    let offset = |i: usize| i * (2 * n - i - 1) / 2;
    let (mut lo, mut hi) = (0, n - 1);
    while lo + 1 < hi {
        let mid = (lo + hi) / 2;
        if offset(mid) <= k {
            lo = mid;
        } else {
            hi = mid;
        }
    }
    let i = if offset(hi) <= k { hi } else { lo };
    (i, i + 1 + (k - offset(i)))
}

/// Fit a theoretical variogram model to an empirical variogram.
///
/// Pair-count weighted nonlinear least squares: a coarse grid search over
/// (nugget, sill, range) picks a starting point, then Levenberg–Marquardt
/// refines it inside the bounds nugget ≥ 0 (≥ 1% of the largest
/// semivariance for the Gaussian form), partial sill ≥ 0,
/// range ∈ [max_lag/1000, 10·max_lag].
///
/// # Errors
/// [`Error::VariogramFit`] when fewer than 3 bins hold pairs, every
/// semivariance is zero, or the refinement ends on non-finite parameters.
pub fn fit_variogram(
    empirical: &EmpiricalVariogram,
    model: VariogramModel,
) -> Result<FittedVariogram> {
    // Collect valid (non-NaN) lag/semivariance pairs with counts
    let valid: Vec<(f64, f64, f64)> = empirical
        .lags
        .iter()
        .zip(empirical.semivariance.iter())
        .zip(empirical.pair_counts.iter())
        .filter(|((_, sv), cnt)| sv.is_finite() && **cnt > 0)
        .map(|((&lag, &sv), &cnt)| (lag, sv, cnt as f64))
        .collect();

    if valid.len() < 3 {
        return Err(Error::VariogramFit(format!(
            "need at least 3 non-empty lag bins, got {}",
            valid.len()
        )));
    }

    let max_lag = valid.iter().map(|(l, _, _)| *l).fold(0.0_f64, f64::max);
    let max_sv = valid.iter().map(|(_, sv, _)| *sv).fold(0.0_f64, f64::max);

    if max_sv <= 0.0 {
        return Err(Error::VariogramFit("all semivariance values are zero".into()));
    }

    if model == VariogramModel::Nugget {
        let total_w: f64 = valid.iter().map(|(_, _, w)| w).sum();
        let c0 = valid.iter().map(|(_, sv, w)| sv * w).sum::<f64>() / total_w;
        let mut fitted = FittedVariogram::pure_nugget(c0);
        fitted.rss = weighted_rss(&valid, &fitted);
        return Ok(fitted);
    }

    // A Gaussian with zero nugget makes neighbouring rows of the kriging
    // matrix nearly identical; keep a small nugget to bound its conditioning
    let min_nugget = match model {
        VariogramModel::Gaussian => GAUSSIAN_MIN_NUGGET * max_sv,
        _ => 0.0,
    };
    let bounds = Bounds {
        nugget: (min_nugget, 2.0 * max_sv),
        partial_sill: (0.0, 10.0 * max_sv),
        range: (max_lag * 1e-3, max_lag * 10.0),
    };

    let start = grid_search(&valid, model, max_sv, max_lag);
    let fitted = levenberg_marquardt(&valid, model, start, &bounds)?;

    debug!(
        "Fitted {:?} variogram: nugget {:.4}, sill {:.4}, range {:.1} m, rss {:.4e}",
        model, fitted.nugget, fitted.sill, fitted.range, fitted.rss
    );
    Ok(fitted)
}

/// Fit all structured models and return the best one (lowest RSS).
pub fn fit_best_variogram(empirical: &EmpiricalVariogram) -> Result<FittedVariogram> {
    let mut best: Option<FittedVariogram> = None;
    let mut last_err = None;
    for model in VariogramModel::STRUCTURED {
        match fit_variogram(empirical, model) {
            Ok(fitted) => {
                if best.as_ref().is_none_or(|b| fitted.rss < b.rss) {
                    best = Some(fitted);
                }
            }
            Err(e) => last_err = Some(e),
        }
    }

    best.ok_or_else(|| match last_err {
        Some(Error::VariogramFit(msg)) => Error::VariogramFit(msg),
        Some(other) => other,
        None => Error::VariogramFit("could not fit any variogram model".into()),
    })
}

struct Bounds {
    nugget: (f64, f64),
    partial_sill: (f64, f64),
    range: (f64, f64),
}

impl Bounds {
    fn clamp(&self, theta: [f64; 3]) -> [f64; 3] {
        [
            theta[0].clamp(self.nugget.0, self.nugget.1),
            theta[1].clamp(self.partial_sill.0, self.partial_sill.1),
            theta[2].clamp(self.range.0, self.range.1),
        ]
    }
}

fn from_theta(model: VariogramModel, theta: [f64; 3]) -> FittedVariogram {
    FittedVariogram::new(model, theta[0], theta[0] + theta[1], theta[2])
}

fn weighted_rss(valid: &[(f64, f64, f64)], trial: &FittedVariogram) -> f64 {
    valid
        .iter()
        .map(|&(lag, sv, w)| {
            let r = sv - trial.evaluate(lag);
            w * r * r
        })
        .sum()
}

fn grid_search(
    valid: &[(f64, f64, f64)],
    model: VariogramModel,
    max_sv: f64,
    max_lag: f64,
) -> [f64; 3] {
    let n_nugget = 10;
    let n_sill = 10;
    let n_range = 20;

    let mut best_rss = f64::MAX;
    let mut best = [0.0, max_sv, max_lag];

    for in_ in 0..=n_nugget {
        let nugget = max_sv * in_ as f64 / (2.0 * n_nugget as f64);
        for is in 1..=n_sill {
            let sill = 1.2 * max_sv * is as f64 / n_sill as f64;
            if sill <= nugget {
                continue;
            }
            for ir in 1..=n_range {
                let range = max_lag * ir as f64 / n_range as f64;
                let theta = [nugget, sill - nugget, range];
                let rss = weighted_rss(valid, &from_theta(model, theta));
                if rss < best_rss {
                    best_rss = rss;
                    best = theta;
                }
            }
        }
    }
    best
}

fn levenberg_marquardt(
    valid: &[(f64, f64, f64)],
    model: VariogramModel,
    start: [f64; 3],
    bounds: &Bounds,
) -> Result<FittedVariogram> {
    const MAX_ITER: usize = 500;
    const REL_TOL: f64 = 1e-10;
    const STEP_TOL: f64 = 1e-8;
    const MAX_LAMBDA: f64 = 1e12;

    let mut theta = bounds.clamp(start);
    let mut rss = weighted_rss(valid, &from_theta(model, theta));
    let mut lambda = 1e-3;

    for iter in 0..MAX_ITER {
        // Normal equations JᵀWJ δ = JᵀW r
        let mut jtj = [0.0_f64; 9];
        let mut jtr = [0.0_f64; 3];
        for &(h, sv, w) in valid {
            let t = h / theta[2];
            let pred = theta[0] + theta[1] * model.shape(t);
            let r = sv - pred;
            let grad = [
                1.0,
                model.shape(t),
                -theta[1] * model.shape_derivative(t) * t / theta[2],
            ];
            for a in 0..3 {
                jtr[a] += w * grad[a] * r;
                for b in 0..3 {
                    jtj[a * 3 + b] += w * grad[a] * grad[b];
                }
            }
        }
        let trace = jtj[0] + jtj[4] + jtj[8];

        loop {
            let mut mat = jtj;
            for a in 0..3 {
                mat[a * 3 + a] += lambda * (jtj[a * 3 + a] + 1e-12 * trace);
            }
            let mut rhs = jtr;
            let step = solve_in_place(3, &mut mat, &mut rhs);

            if let Ok(delta) = step {
                let trial = bounds.clamp([
                    theta[0] + delta[0],
                    theta[1] + delta[1],
                    theta[2] + delta[2],
                ]);
                let trial_rss = weighted_rss(valid, &from_theta(model, trial));
                if trial_rss.is_finite() && trial_rss <= rss {
                    let improvement = rss - trial_rss;
                    let step = norm(&[trial[0] - theta[0], trial[1] - theta[1], trial[2] - theta[2]]);
                    let scale = norm(&theta);
                    theta = trial;
                    rss = trial_rss;
                    lambda = (lambda / 10.0).max(1e-12);
                    if improvement <= REL_TOL * rss.max(f64::MIN_POSITIVE) || step <= STEP_TOL * scale {
                        return finish(model, theta, rss, iter);
                    }
                    break;
                }
            }

            lambda *= 10.0;
            if lambda > MAX_LAMBDA {
                // No damped step improves the fit: stationary point within bounds
                return finish(model, theta, rss, iter);
            }
        }
    }

    // Accepted steps never raise the RSS, so theta is the best iterate
    warn!(
        "{:?} variogram still improving after {} LM iterations; keeping best iterate",
        model, MAX_ITER
    );
    finish(model, theta, rss, MAX_ITER - 1)
}

fn norm(v: &[f64; 3]) -> f64 {
    v.iter().map(|x| x * x).sum::<f64>().sqrt()
}

fn finish(model: VariogramModel, theta: [f64; 3], rss: f64, iter: usize) -> Result<FittedVariogram> {
    if !theta.iter().all(|v| v.is_finite()) || !rss.is_finite() {
        return Err(Error::VariogramFit(format!(
            "{:?} model produced non-finite parameters",
            model
        )));
    }
    let mut fitted = from_theta(model, theta);
    fitted.rss = rss;
    debug!("{:?} variogram converged after {} LM iterations", model, iter + 1);
    Ok(fitted)
}
