//! Regression Kriging (RK)
//!
//! Hybrid method that decomposes the field into:
//! ```text
//! Z(x) = m(x) + ε(x)
//! ```
//! where m(x) is a trend learned by any [`Regressor`] from per-point
//! covariates and ε(x) is a spatially correlated residual interpolated by
//! Ordinary Kriging over great-circle distances.
//!
//! Steps of [`RegressionKriging::fit`]:
//! 1. Standardize predictors (optional, statistics from the training rows)
//! 2. Fit the regressor: m(x)
//! 3. Residuals: ε(xᵢ) = z(xᵢ) − m(xᵢ)
//! 4. Empirical variogram of the residuals, then a fitted model
//! 5. Index the residuals for Ordinary Kriging
//!
//! Prediction is Z̃(x) = m(x) + ε̃(x).
//!
//! Reference:
//! Hengl, T. et al. (2007). About regression-kriging. Computers & Geosciences.
//! Odeh, I.O.A., McBratney, A.B. & Chittleborough, D.J. (1995). Further
//! results on prediction of soil properties from terrain attributes.
//! Geoderma, 67.

use ndarray::{Array1, Array2, Zip};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use geokrige_core::{Error, GeoCoord, Result};

use super::kriging::{KrigingParams, OrdinaryKriging};
use super::variogram::{
    empirical_variogram, fit_best_variogram, fit_variogram, EmpiricalVariogram, FittedVariogram,
    VariogramModel, VariogramParams,
};
use crate::preprocessing::StandardScaler;
use crate::regression::Regressor;

/// What to do when the residual variogram cannot be fitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FitFailurePolicy {
    /// Propagate [`Error::VariogramFit`] from `fit`
    #[default]
    Error,
    /// Log a warning and use a flat (pure nugget) variogram at the residual
    /// variance; predictions then add the neighbourhood mean residual
    PureNugget,
}

/// Parameters for Regression Kriging
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RegressionKrigingParams {
    /// Standardize predictor columns before fitting the regressor (default true)
    pub standardize: bool,
    /// Empirical variogram binning for the residuals
    pub variogram: VariogramParams,
    /// Variogram model; `None` picks the best of exponential, spherical
    /// and Gaussian by weighted RSS
    pub model: Option<VariogramModel>,
    /// Neighbourhood search for kriging the residuals
    pub kriging: KrigingParams,
    /// Behaviour when the residual variogram cannot be fitted (default
    /// [`FitFailurePolicy::Error`])
    pub fit_failure: FitFailurePolicy,
}

impl Default for RegressionKrigingParams {
    fn default() -> Self {
        Self {
            standardize: true,
            variogram: VariogramParams::default(),
            model: None,
            kriging: KrigingParams::default(),
            fit_failure: FitFailurePolicy::Error,
        }
    }
}

/// State produced by a successful fit.
#[derive(Debug, Clone)]
pub struct FittedResiduals {
    scaler: Option<StandardScaler>,
    n_features: usize,
    coords: Vec<GeoCoord>,
    residuals: Array1<f64>,
    empirical: Option<EmpiricalVariogram>,
    kriging: OrdinaryKriging,
}

impl FittedResiduals {
    /// Variogram used to krige the residuals.
    pub fn variogram(&self) -> &FittedVariogram {
        self.kriging.variogram()
    }

    /// Empirical residual variogram. `None` when a variogram was supplied
    /// or the fit fell back to a pure nugget because estimation failed.
    pub fn empirical_variogram(&self) -> Option<&EmpiricalVariogram> {
        self.empirical.as_ref()
    }

    /// Training residuals z − m(x), aligned with [`Self::training_coords`].
    pub fn residuals(&self) -> &Array1<f64> {
        &self.residuals
    }

    pub fn training_coords(&self) -> &[GeoCoord] {
        &self.coords
    }

    pub fn scaler(&self) -> Option<&StandardScaler> {
        self.scaler.as_ref()
    }
}

/// Regression kriging model: a trend regressor plus kriged residuals.
///
/// Starts unfitted; a successful [`fit`](Self::fit) makes it fitted and a
/// failed one leaves it unfitted. Refitting replaces all fitted state.
#[derive(Debug)]
pub struct RegressionKriging<R: Regressor> {
    regressor: R,
    params: RegressionKrigingParams,
    fitted: Option<FittedResiduals>,
}

impl<R: Regressor> RegressionKriging<R> {
    pub fn new(regressor: R, params: RegressionKrigingParams) -> Self {
        Self {
            regressor,
            params,
            fitted: None,
        }
    }

    pub fn params(&self) -> &RegressionKrigingParams {
        &self.params
    }

    pub fn regressor(&self) -> &R {
        &self.regressor
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    /// Fitted state, or `None` before a successful fit.
    pub fn fitted(&self) -> Option<&FittedResiduals> {
        self.fitted.as_ref()
    }

    /// Fit the trend, then estimate and fit the residual variogram.
    ///
    /// # Errors
    /// - [`Error::DimensionMismatch`] if `x`, `coords` and `y` disagree in length
    /// - errors from the regressor
    /// - [`Error::VariogramFit`] when the residual variogram cannot be fitted
    ///   and the policy is [`FitFailurePolicy::Error`]
    pub fn fit(&mut self, x: &Array2<f64>, coords: &[GeoCoord], y: &Array1<f64>) -> Result<&FittedResiduals> {
        self.fit_inner(x, coords, y, None)
    }

    /// Fit the trend and krige residuals with a pre-fitted variogram.
    ///
    /// Use this when the residual variogram is controlled externally.
    pub fn fit_with_variogram(
        &mut self,
        x: &Array2<f64>,
        coords: &[GeoCoord],
        y: &Array1<f64>,
        variogram: FittedVariogram,
    ) -> Result<&FittedResiduals> {
        self.fit_inner(x, coords, y, Some(variogram))
    }

    fn fit_inner(
        &mut self,
        x: &Array2<f64>,
        coords: &[GeoCoord],
        y: &Array1<f64>,
        variogram: Option<FittedVariogram>,
    ) -> Result<&FittedResiduals> {
        self.fitted = None;
        check_coords(x, coords)?;
        if y.len() != x.nrows() {
            return Err(Error::DimensionMismatch {
                what: "target length",
                expected: x.nrows(),
                actual: y.len(),
            });
        }

        let scaler = if self.params.standardize {
            let mut scaler = StandardScaler::new();
            scaler.fit(x)?;
            Some(scaler)
        } else {
            None
        };
        let x_fit = match &scaler {
            Some(s) => s.transform(x)?,
            None => x.clone(),
        };

        self.regressor.fit(&x_fit, y)?;
        let trend = self.regressor.predict(&x_fit)?;
        let residuals = y - &trend;
        let resid_vec = residuals.to_vec();

        let (variogram, empirical) = match variogram {
            Some(v) => (v, None),
            None => self.fit_residual_variogram(coords, &resid_vec)?,
        };

        info!(
            "Residual variogram: {:?}, nugget {:.4}, sill {:.4}, range {:.0} m",
            variogram.model, variogram.nugget, variogram.sill, variogram.range
        );

        let kriging = OrdinaryKriging::new(coords.to_vec(), resid_vec, variogram, &self.params.kriging)?;

        self.fitted = Some(FittedResiduals {
            scaler,
            n_features: x.ncols(),
            coords: coords.to_vec(),
            residuals,
            empirical,
            kriging,
        });
        self.fitted.as_ref().ok_or(Error::NotFitted("fit"))
    }

    fn fit_residual_variogram(
        &self,
        coords: &[GeoCoord],
        residuals: &[f64],
    ) -> Result<(FittedVariogram, Option<EmpiricalVariogram>)> {
        let attempt = empirical_variogram(coords, residuals, &self.params.variogram).and_then(|emp| {
            let fitted = match self.params.model {
                Some(model) => fit_variogram(&emp, model),
                None => fit_best_variogram(&emp),
            }?;
            Ok((fitted, emp))
        });

        match attempt {
            Ok((fitted, emp)) => Ok((fitted, Some(emp))),
            Err(Error::VariogramFit(msg)) if self.params.fit_failure == FitFailurePolicy::PureNugget => {
                let n = residuals.len().max(1) as f64;
                let mean = residuals.iter().sum::<f64>() / n;
                let variance = residuals.iter().map(|r| (r - mean) * (r - mean)).sum::<f64>() / n;
                warn!(
                    "Residual variogram fit failed ({}); using pure nugget at variance {:.4}",
                    msg, variance
                );
                Ok((FittedVariogram::pure_nugget(variance.max(1e-12)), None))
            }
            Err(e) => Err(e),
        }
    }

    fn prepare(&self, x: &Array2<f64>) -> Result<(&FittedResiduals, Array2<f64>)> {
        let fitted = self.fitted.as_ref().ok_or(Error::NotFitted("predict"))?;
        if x.ncols() != fitted.n_features {
            return Err(Error::DimensionMismatch {
                what: "predictor columns",
                expected: fitted.n_features,
                actual: x.ncols(),
            });
        }
        let x_pred = match &fitted.scaler {
            Some(s) => s.transform(x)?,
            None => x.clone(),
        };
        Ok((fitted, x_pred))
    }

    /// Trend component m(x) only.
    pub fn predict_trend(&self, x: &Array2<f64>) -> Result<Array1<f64>> {
        let (_, x_pred) = self.prepare(x)?;
        self.regressor.predict(&x_pred)
    }

    /// Final predictions m(x) + ε̃(x).
    ///
    /// # Errors
    /// - [`Error::NotFitted`] before a successful fit
    /// - [`Error::DimensionMismatch`] on a column count differing from training,
    ///   or when `coords` and `x` differ in length
    pub fn predict(&self, x: &Array2<f64>, coords: &[GeoCoord]) -> Result<Array1<f64>> {
        self.predict_with_variance(x, coords).map(|(pred, _)| pred)
    }

    /// Final predictions and the kriging variance of the residual component.
    ///
    /// Locations with no sample inside the search radius receive the trend
    /// alone (the residual mean is zero) and a `NaN` variance.
    pub fn predict_with_variance(
        &self,
        x: &Array2<f64>,
        coords: &[GeoCoord],
    ) -> Result<(Array1<f64>, Array1<f64>)> {
        let (fitted, x_pred) = self.prepare(x)?;
        check_coords(x, coords)?;

        let trend = self.regressor.predict(&x_pred)?;
        let (resid, variance) = fitted.kriging.predict_with_variance(coords)?;

        let uncovered = resid.iter().filter(|r| r.is_nan()).count();
        if uncovered > 0 {
            debug!("{} of {} locations had no residual neighbours; using trend", uncovered, coords.len());
        }

        let mut pred = trend;
        Zip::from(&mut pred).and(&resid).for_each(|p, &r| {
            if r.is_finite() {
                *p += r;
            }
        });
        Ok((pred, variance))
    }
}

fn check_coords(x: &Array2<f64>, coords: &[GeoCoord]) -> Result<()> {
    if coords.len() != x.nrows() {
        return Err(Error::DimensionMismatch {
            what: "coordinate count",
            expected: x.nrows(),
            actual: coords.len(),
        });
    }
    Ok(())
}
