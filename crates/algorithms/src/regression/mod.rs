//! Trend models for regression kriging
//!
//! The orchestrator only needs two capabilities from a base model: learn
//! from `(X, y)` and predict `ŷ` for new rows. They are split into
//! [`Trainable`] and [`Predictable`] so read-only consumers (evaluation,
//! concurrent prediction) can ask for less; [`Regressor`] is both.
//!
//! - [`LinearRegression`]: ordinary least squares with optional ridge penalty
//! - [`MlpRegressor`]: multilayer perceptron trained with Adam

mod linear;
mod mlp;

pub use linear::LinearRegression;
pub use mlp::{MlpParams, MlpRegressor};

use ndarray::{Array1, Array2};

use geokrige_core::{Error, Result};

/// A model that can be fitted to predictors and targets.
pub trait Trainable {
    /// Fit on `x` (rows = samples) and aligned targets `y`.
    fn fit(&mut self, x: &Array2<f64>, y: &Array1<f64>) -> Result<()>;
}

/// A fitted model that maps predictor rows to target estimates.
pub trait Predictable {
    /// Predict one value per row of `x`.
    ///
    /// # Errors
    /// - [`Error::NotFitted`] before a successful fit
    /// - [`Error::DimensionMismatch`] if `x` has a different column count than the training data
    fn predict(&self, x: &Array2<f64>) -> Result<Array1<f64>>;

    /// Number of predictor columns seen during fitting, if fitted.
    fn n_features(&self) -> Option<usize>;
}

/// Anything trainable and predictable can serve as the trend model.
pub trait Regressor: Trainable + Predictable {}

impl<T: Trainable + Predictable> Regressor for T {}

/// Shared input checks for `fit` implementations.
pub(crate) fn check_training_data(x: &Array2<f64>, y: &Array1<f64>) -> Result<()> {
    if x.nrows() != y.len() {
        return Err(Error::DimensionMismatch {
            what: "target length",
            expected: x.nrows(),
            actual: y.len(),
        });
    }
    if x.nrows() == 0 || x.ncols() == 0 {
        return Err(Error::InsufficientData(format!(
            "cannot fit on a {}x{} predictor matrix",
            x.nrows(),
            x.ncols()
        )));
    }
    if x.iter().chain(y.iter()).any(|v| !v.is_finite()) {
        return Err(Error::invalid_param("x/y", "non-finite", "training data must be finite"));
    }
    Ok(())
}

/// Shared input checks for `predict` implementations.
pub(crate) fn check_predict_cols(fitted: Option<usize>, x: &Array2<f64>) -> Result<usize> {
    let expected = fitted.ok_or(Error::NotFitted("predict"))?;
    if x.ncols() != expected {
        return Err(Error::DimensionMismatch {
            what: "predictor columns",
            expected,
            actual: x.ncols(),
        });
    }
    Ok(expected)
}
