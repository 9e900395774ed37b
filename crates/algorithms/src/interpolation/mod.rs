//! Geostatistical interpolation of point residuals
//!
//! - Variogram: empirical variogram on great-circle lags and model fitting
//! - k-d tree: exact geodesic neighbour search on the unit sphere
//! - Ordinary Kriging: BLUE interpolation over the k nearest samples
//! - Regression Kriging: any regressor's trend + OK on its residuals

pub mod kdtree;
pub mod kriging;
mod regression_kriging;
pub mod variogram;

pub use kdtree::{KdTree, Neighbor};
pub use kriging::{KrigingEstimate, KrigingParams, OrdinaryKriging};
pub use regression_kriging::{
    FitFailurePolicy, FittedResiduals, RegressionKriging, RegressionKrigingParams,
};
pub use variogram::{
    empirical_variogram, fit_best_variogram, fit_variogram, EmpiricalVariogram, FittedVariogram,
    VariogramModel, VariogramParams,
};
