//! End-to-end hold-out evaluation of regression kriging
//!
//! Split a [`Design`], fit [`RegressionKriging`] on the training rows, and
//! score both the trend alone and trend + kriged residuals on the test rows.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use geokrige_core::{Design, Result};

use crate::evaluation::Metrics;
use crate::interpolation::{
    empirical_variogram, EmpiricalVariogram, FittedVariogram, RegressionKriging,
    RegressionKrigingParams,
};
use crate::preprocessing::split_design;
use crate::regression::Regressor;

/// Hold-out split and model configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Fraction of rows held out for testing, in (0, 1)
    pub test_fraction: f64,
    /// Seed for the train/test partition
    pub seed: u64,
    #[serde(flatten)]
    pub rk: RegressionKrigingParams,
    /// Also compute the variogram of the raw target on all rows
    pub exploratory_variogram: bool,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            test_fraction: 0.2,
            seed: 42,
            rk: RegressionKrigingParams::default(),
            exploratory_variogram: true,
        }
    }
}

/// One held-out location.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestPrediction {
    /// Row index in the input design
    pub row: usize,
    pub lon: f64,
    pub lat: f64,
    pub observed: f64,
    /// Regressor output alone
    pub trend: f64,
    /// Trend + kriged residual
    pub predicted: f64,
    pub kriging_variance: f64,
}

/// Everything `run_workflow` measured.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowReport {
    pub target: String,
    pub features: Vec<String>,
    pub n_train: usize,
    pub n_test: usize,
    /// Test metrics of the regressor alone
    pub regressor: Metrics,
    /// Test metrics of regression kriging
    pub regression_kriging: Metrics,
    /// Residual variogram used for kriging
    pub variogram: FittedVariogram,
    /// Empirical residual variogram (training rows); `None` under the
    /// pure-nugget fallback
    pub residual_variogram: Option<EmpiricalVariogram>,
    /// Variogram of the raw target on all rows. Diagnostic only, never
    /// used by the model.
    pub exploratory_variogram: Option<EmpiricalVariogram>,
    pub predictions: Vec<TestPrediction>,
}

impl WorkflowReport {
    /// Relative MSE reduction of regression kriging over the regressor
    /// alone; positive when kriging helps.
    pub fn mse_improvement(&self) -> f64 {
        if self.regressor.mse == 0.0 {
            return 0.0;
        }
        1.0 - self.regression_kriging.mse / self.regressor.mse
    }
}

/// Split, fit, predict, and score.
///
/// The regressor is trained once inside [`RegressionKriging`]; its trend on
/// the test rows is the regressor-only baseline, so both metrics come from
/// the same fitted model on the same split.
pub fn run_workflow<R: Regressor>(design: &Design, config: &WorkflowConfig, regressor: R) -> Result<WorkflowReport> {
    let exploratory_variogram = if config.exploratory_variogram {
        match empirical_variogram(
            design.coords(),
            &design.y().to_vec(),
            &config.rk.variogram,
        ) {
            Ok(emp) => Some(emp),
            Err(e) => {
                debug!("Skipping exploratory variogram: {}", e);
                None
            }
        }
    } else {
        None
    };

    let (train, test, split) = split_design(design, config.test_fraction, config.seed)?;
    info!(
        "Fitting regression kriging on {} rows, testing on {}",
        train.len(),
        test.len()
    );

    let mut rk = RegressionKriging::new(regressor, config.rk.clone());
    let fitted = rk.fit(train.x(), train.coords(), train.y())?;
    let variogram = fitted.variogram().clone();
    let residual_variogram = fitted.empirical_variogram().cloned();

    let trend = rk.predict_trend(test.x())?;
    let (predicted, variance) = rk.predict_with_variance(test.x(), test.coords())?;

    let regressor_metrics = Metrics::compute(test.y(), &trend)?;
    let rk_metrics = Metrics::compute(test.y(), &predicted)?;
    info!("Regressor:          {}", regressor_metrics);
    info!("Regression kriging: {}", rk_metrics);

    let predictions = split
        .test
        .iter()
        .enumerate()
        .map(|(i, &row)| {
            let c = test.coords()[i];
            TestPrediction {
                row,
                lon: c.lon,
                lat: c.lat,
                observed: test.y()[i],
                trend: trend[i],
                predicted: predicted[i],
                kriging_variance: variance[i],
            }
        })
        .collect();

    Ok(WorkflowReport {
        target: design.target_name().to_string(),
        features: design.feature_names().to_vec(),
        n_train: train.len(),
        n_test: test.len(),
        regressor: regressor_metrics,
        regression_kriging: rk_metrics,
        variogram,
        residual_variogram,
        exploratory_variogram,
        predictions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::regression::LinearRegression;
    use geokrige_core::synthetic::{spatial_trend_dataset, SyntheticParams};

    fn design() -> Design {
        spatial_trend_dataset(&SyntheticParams::default())
            .unwrap()
            .to_design(&["x1", "x2"], "y")
            .unwrap()
    }

    #[test]
    fn test_report_shapes() {
        let d = design();
        let report = run_workflow(&d, &WorkflowConfig::default(), LinearRegression::new()).unwrap();
        assert_eq!(report.n_train + report.n_test, d.len());
        assert_eq!(report.n_test, 40);
        assert_eq!(report.predictions.len(), report.n_test);
        assert_eq!(report.features, vec!["x1".to_string(), "x2".to_string()]);
        assert!(report.exploratory_variogram.is_some());
        assert!(report.residual_variogram.is_some());
    }

    #[test]
    fn test_config_json_defaults() {
        let cfg: WorkflowConfig = serde_json::from_str(r#"{"seed": 7, "model": "spherical"}"#).unwrap();
        assert_eq!(cfg.seed, 7);
        assert_eq!(cfg.test_fraction, 0.2);
        assert_eq!(
            cfg.rk.model,
            Some(crate::interpolation::VariogramModel::Spherical)
        );
        assert_eq!(cfg.rk.kriging.max_neighbors, Some(16));
    }

    #[test]
    fn test_invalid_fraction_propagates() {
        let cfg = WorkflowConfig {
            test_fraction: 1.5,
            ..Default::default()
        };
        assert!(matches!(
            run_workflow(&design(), &cfg, LinearRegression::new()),
            Err(geokrige_core::Error::InvalidFraction(_))
        ));
    }
}
