//! # geokrige algorithms
//!
//! Regression kriging on geographic point data.
//!
//! ## Modules
//!
//! - **preprocessing**: seeded train/test split, standardization
//! - **regression**: trend models (`LinearRegression`, `MlpRegressor`)
//! - **interpolation**: variograms, ordinary kriging, regression kriging
//! - **evaluation**: MSE, RMSE, MAE, R²
//! - **workflow**: split → fit → score in one call

pub mod evaluation;
pub mod interpolation;
pub(crate) mod linalg;
pub(crate) mod maybe_rayon;
pub mod preprocessing;
pub mod regression;
pub mod workflow;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::evaluation::{mae, mse, r2, rmse, Metrics};
    pub use crate::interpolation::{
        empirical_variogram, fit_best_variogram, fit_variogram, EmpiricalVariogram,
        FitFailurePolicy, FittedVariogram, KrigingEstimate, KrigingParams, OrdinaryKriging,
        RegressionKriging, RegressionKrigingParams, VariogramModel, VariogramParams,
    };
    pub use crate::preprocessing::{split_design, train_test_split, Split, StandardScaler};
    pub use crate::regression::{
        LinearRegression, MlpParams, MlpRegressor, Predictable, Regressor, Trainable,
    };
    pub use crate::workflow::{run_workflow, WorkflowConfig, WorkflowReport};
    pub use geokrige_core::prelude::*;
}
