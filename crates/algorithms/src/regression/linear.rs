//! Ordinary least squares with intercept
//!
//! Solves the normal equations on centred data:
//! ```text
//! (XcᵀXc + αI) β = Xcᵀ yc,     β₀ = ȳ − x̄ᵀβ
//! ```
//! Centring keeps the system well conditioned and leaves the intercept
//! unpenalized when α > 0. With an intercept the training residuals have
//! zero mean, which is what ordinary kriging of residuals expects.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use tracing::debug;

use geokrige_core::{Error, Result};

use super::{check_predict_cols, check_training_data, Predictable, Trainable};
use crate::linalg::solve_in_place;

/// Columns whose centred sum of squares is below this (relative to n and
/// the column scale) are treated as constant.
const CONSTANT_TOL: f64 = 1e-20;

/// Linear regression `y = β₀ + Xβ`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LinearRegression {
    /// Ridge penalty α (0 = plain OLS)
    pub alpha: f64,
    #[serde(skip)]
    coefficients: Option<Vec<f64>>,
    #[serde(skip)]
    intercept: f64,
}

impl LinearRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(alpha: f64) -> Self {
        Self {
            alpha,
            ..Self::default()
        }
    }

    /// Fitted slopes, one per predictor column
    pub fn coefficients(&self) -> Option<&[f64]> {
        self.coefficients.as_deref()
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Trainable for LinearRegression {
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
        check_training_data(x, y)?;
        if !(self.alpha >= 0.0) {
            return Err(Error::invalid_param("alpha", self.alpha, "must be non-negative"));
        }

        let p = x.ncols();
        let x_mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InsufficientData("empty predictor matrix".into()))?;
        let y_mean = y.mean().unwrap_or(0.0);
        let xc = x - &x_mean;
        let yc = y - y_mean;

        let gram = xc.t().dot(&xc);
        let xty = xc.t().dot(&yc);

        // Constant columns centre to zero; they get a zero slope
        let n = x.nrows() as f64;
        let active: Vec<usize> = (0..p)
            .filter(|&j| gram[[j, j]] > CONSTANT_TOL * n * (1.0 + x_mean[j] * x_mean[j]))
            .collect();
        if active.len() < p {
            debug!("OLS: {} constant predictor column(s) get zero slope", p - active.len());
        }

        let q = active.len();
        let mut mat = vec![0.0_f64; q * q];
        for (a, &ja) in active.iter().enumerate() {
            for (b, &jb) in active.iter().enumerate() {
                mat[a * q + b] = gram[[ja, jb]];
            }
            mat[a * q + a] += self.alpha;
        }
        let mut rhs: Vec<f64> = active.iter().map(|&j| xty[j]).collect();

        let solved = solve_in_place(q, &mut mat, &mut rhs).map_err(|e| {
            let detail = match e {
                Error::Algorithm(msg) => msg,
                other => other.to_string(),
            };
            Error::Algorithm(format!("OLS: {} (collinear predictors?)", detail))
        })?;
        let mut beta = vec![0.0_f64; p];
        for (&j, b) in active.iter().zip(solved) {
            beta[j] = b;
        }

        self.intercept = y_mean - x_mean.iter().zip(&beta).map(|(m, b)| m * b).sum::<f64>();
        self.coefficients = Some(beta);
        Ok(())
    }
}

impl Predictable for LinearRegression {
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        check_predict_cols(self.n_features(), x)?;
        let beta = self
            .coefficients
            .as_ref()
            .ok_or(Error::NotFitted("predict"))?;
        let beta = Array1::from(beta.clone());
        Ok(x.dot(&beta) + self.intercept)
    }

    fn n_features(&self) -> Option<usize> {
        self.coefficients.as_ref().map(Vec::len)
    }
}
