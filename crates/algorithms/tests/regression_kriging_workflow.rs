//! End-to-end behaviour of the regression kriging pipeline on synthetic data.
//!
//! The synthetic generator produces `y = 2·x1 − x2 + s(lon, lat) + ε` on
//! 200 points, so a linear trend on (x1, x2) leaves a spatially smooth
//! residual that kriging should recover.

use geokrige_algorithms::prelude::*;
use geokrige_core::synthetic::{spatial_trend_dataset, SyntheticParams};
use ndarray::{Array1, Array2, Axis};

// ── Fixtures ──────────────────────────────────────────────────────────

fn synthetic_design() -> Design {
    spatial_trend_dataset(&SyntheticParams::default())
        .expect("synthetic dataset")
        .to_design(&["x1", "x2"], "y")
        .expect("design")
}

fn fitted_linear_rk(train: &Design) -> RegressionKriging<LinearRegression> {
    let mut rk = RegressionKriging::new(LinearRegression::new(), RegressionKrigingParams::default());
    rk.fit(train.x(), train.coords(), train.y()).expect("fit");
    rk
}

// ── Splitter ──────────────────────────────────────────────────────────

#[test]
fn test_split_is_reproducible() {
    let d = synthetic_design();
    let (a_train, a_test, a) = split_design(&d, 0.2, 42).unwrap();
    let (_, _, b) = split_design(&d, 0.2, 42).unwrap();
    let (_, _, c) = split_design(&d, 0.2, 43).unwrap();

    assert_eq!(a, b, "same seed must give the same partition");
    assert_ne!(a.test, c.test, "different seeds should give different partitions");
    assert_eq!(a_train.len(), 160);
    assert_eq!(a_test.len(), 40);

    // Rows stay aligned across X, y and coordinates
    for (i, &row) in a.test.iter().enumerate() {
        assert_eq!(a_test.coords()[i], d.coords()[row]);
        assert_eq!(a_test.y()[i], d.y()[row]);
        assert_eq!(a_test.x().row(i), d.x().row(row));
    }
}

#[test]
fn test_split_rejects_bad_fraction() {
    let d = synthetic_design();
    for p in [0.0, 1.0, -0.1, f64::NAN] {
        assert!(
            matches!(split_design(&d, p, 1), Err(Error::InvalidFraction(_))),
            "fraction {p} should be rejected"
        );
    }
}

// ── Standardizer ──────────────────────────────────────────────────────

#[test]
fn test_standardized_training_columns() {
    let d = synthetic_design();
    let (train, _, _) = split_design(&d, 0.2, 42).unwrap();
    let mut scaler = StandardScaler::new();
    let z = scaler.fit_transform(train.x()).unwrap();

    let mean = z.mean_axis(Axis(0)).unwrap();
    let std = z.std_axis(Axis(0), 0.0);
    for j in 0..z.ncols() {
        assert!(mean[j].abs() < 1e-10, "column {j} mean {:.3e}", mean[j]);
        assert!((std[j] - 1.0).abs() < 1e-10, "column {j} std {:.6}", std[j]);
    }
}

// ── Kriging ───────────────────────────────────────────────────────────

#[test]
fn test_kriging_weights_sum_to_one() {
    let d = synthetic_design();
    let variogram = FittedVariogram::new(VariogramModel::Spherical, 0.3, 2.5, 80_000.0);
    for k in [1, 4, 16, 64] {
        let params = KrigingParams {
            max_neighbors: Some(k),
            max_radius_m: None,
        };
        let ok = OrdinaryKriging::new(d.coords().to_vec(), d.y().to_vec(), variogram.clone(), &params).unwrap();
        for q in [GeoCoord::new(10.37, 45.81), GeoCoord::new(11.9, 46.02), GeoCoord::new(8.0, 50.0)] {
            let est = ok.predict_point(q).unwrap();
            let sum: f64 = est.weights.iter().sum();
            assert!((sum - 1.0).abs() < 1e-9, "k={k} at {q:?}: weights sum to {sum:.12}");
            assert_eq!(est.weights.len(), k.min(d.len()));
        }
    }
}

// ── Orchestrator state ────────────────────────────────────────────────

#[test]
fn test_predict_before_fit_is_not_fitted() {
    let d = synthetic_design();
    let rk = RegressionKriging::new(LinearRegression::new(), RegressionKrigingParams::default());
    assert!(matches!(rk.predict(d.x(), d.coords()), Err(Error::NotFitted(_))));
    assert!(rk.fitted().is_none());
}

#[test]
fn test_predict_with_wrong_column_count() {
    let d = synthetic_design();
    let rk = fitted_linear_rk(&d);
    let x3 = Array2::<f64>::zeros((d.len(), 3));
    assert!(matches!(
        rk.predict(&x3, d.coords()),
        Err(Error::DimensionMismatch { expected: 2, actual: 3, .. })
    ));
}

#[test]
fn test_concurrent_prediction_from_shared_model() {
    let d = synthetic_design();
    let (train, test, _) = split_design(&d, 0.25, 5).unwrap();
    let rk = fitted_linear_rk(&train);
    let expected = rk.predict(test.x(), test.coords()).unwrap();

    std::thread::scope(|s| {
        let handles: Vec<_> = (0..4)
            .map(|_| s.spawn(|| rk.predict(test.x(), test.coords()).unwrap()))
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    });
}

// ── Degenerate variograms ─────────────────────────────────────────────

#[test]
fn test_pure_nugget_degrades_to_trend() {
    let d = synthetic_design();
    let (train, test, _) = split_design(&d, 0.2, 42).unwrap();
    let params = RegressionKrigingParams {
        kriging: KrigingParams {
            max_neighbors: None,
            max_radius_m: None,
        },
        ..Default::default()
    };
    let mut rk = RegressionKriging::new(LinearRegression::new(), params);
    rk.fit_with_variogram(train.x(), train.coords(), train.y(), FittedVariogram::pure_nugget(1.0))
        .unwrap();

    // OLS residuals have zero mean, and a flat variogram weights them equally
    let pred = rk.predict(test.x(), test.coords()).unwrap();
    let trend = rk.predict_trend(test.x()).unwrap();
    for (i, (p, t)) in pred.iter().zip(trend.iter()).enumerate() {
        assert!((p - t).abs() < 1e-8, "row {i}: prediction {p:.6} vs trend {t:.6}");
    }
}

#[test]
fn test_identical_coordinates() {
    let d = synthetic_design();
    let same = vec![GeoCoord::new(11.0, 46.0); d.len()];

    let mut strict = RegressionKriging::new(LinearRegression::new(), RegressionKrigingParams::default());
    assert!(matches!(strict.fit(d.x(), &same, d.y()), Err(Error::VariogramFit(_))));
    assert!(!strict.is_fitted());

    let lenient_params = RegressionKrigingParams {
        fit_failure: FitFailurePolicy::PureNugget,
        ..Default::default()
    };
    let mut lenient = RegressionKriging::new(LinearRegression::new(), lenient_params);
    let fitted = lenient.fit(d.x(), &same, d.y()).unwrap();
    assert!(fitted.variogram().is_pure_nugget());
    let variance = fitted.residuals().var(0.0);
    assert!((fitted.variogram().sill - variance).abs() < 1e-9);
}

// ── Accuracy ──────────────────────────────────────────────────────────

#[test]
fn test_exact_at_training_points_with_zero_nugget() {
    let d = synthetic_design();
    let mut rk = RegressionKriging::new(LinearRegression::new(), RegressionKrigingParams::default());
    let variogram = FittedVariogram::new(VariogramModel::Exponential, 0.0, 2.5, 60_000.0);
    let fitted = rk.fit_with_variogram(d.x(), d.coords(), d.y(), variogram).unwrap();
    let residuals: Array1<f64> = fitted.residuals().clone();

    let pred = rk.predict(d.x(), d.coords()).unwrap();
    let trend = rk.predict_trend(d.x()).unwrap();
    let kriged = &pred - &trend;
    for i in 0..d.len() {
        assert!(
            (kriged[i] - residuals[i]).abs() < 1e-8,
            "row {i}: kriged residual {:.6} vs training residual {:.6}",
            kriged[i],
            residuals[i]
        );
        assert!((pred[i] - d.y()[i]).abs() < 1e-8);
    }
}

#[test]
fn test_regression_kriging_beats_regression_alone() {
    let d = synthetic_design();
    let report = run_workflow(&d, &WorkflowConfig::default(), LinearRegression::new()).unwrap();

    assert_eq!(report.n_train + report.n_test, 200);
    assert!(
        report.regression_kriging.mse < report.regressor.mse,
        "RK MSE {:.4} should beat regressor MSE {:.4}",
        report.regression_kriging.mse,
        report.regressor.mse
    );
    assert!(report.mse_improvement() > 0.0);
    assert!(report.variogram.range > 0.0);
    assert!(report.variogram.sill > report.variogram.nugget);
}

#[test]
fn test_each_variogram_form_beats_regression_alone() {
    let d = synthetic_design();
    for model in VariogramModel::STRUCTURED {
        let mut config = WorkflowConfig::default();
        config.rk.model = Some(model);
        let report = run_workflow(&d, &config, LinearRegression::new())
            .unwrap_or_else(|e| panic!("{model:?}: {e}"));
        assert_eq!(report.variogram.model, model);
        assert!(
            report.regression_kriging.mse < report.regressor.mse,
            "{model:?}: RK MSE {:.4} should beat regressor MSE {:.4}",
            report.regression_kriging.mse,
            report.regressor.mse
        );
    }
}

#[test]
fn test_unstructured_residuals_fit_pure_nugget() {
    // No spatial field: the residuals are white noise
    let d = spatial_trend_dataset(&SyntheticParams {
        spatial_amplitude: 0.0,
        noise: 1.0,
        ..SyntheticParams::default()
    })
    .unwrap()
    .to_design(&["x1", "x2"], "y")
    .unwrap();
    let (train, test, _) = split_design(&d, 0.2, 42).unwrap();
    let params = RegressionKrigingParams {
        model: Some(VariogramModel::Nugget),
        kriging: KrigingParams {
            max_neighbors: None,
            max_radius_m: None,
        },
        ..Default::default()
    };
    let mut rk = RegressionKriging::new(LinearRegression::new(), params);
    let fitted = rk.fit(train.x(), train.coords(), train.y()).unwrap();
    assert!(fitted.variogram().is_pure_nugget());
    assert!(fitted.empirical_variogram().is_some());
    // Uniform noise on [-1, 1) has variance 1/3
    assert!((fitted.variogram().sill - 1.0 / 3.0).abs() < 0.1, "sill {:.4}", fitted.variogram().sill);

    let pred = rk.predict(test.x(), test.coords()).unwrap();
    let trend = rk.predict_trend(test.x()).unwrap();
    for (i, (p, t)) in pred.iter().zip(trend.iter()).enumerate() {
        assert!((p - t).abs() < 1e-8, "row {i}: prediction {p:.6} vs trend {t:.6}");
    }
}

#[test]
fn test_constant_predictor_column_is_accepted() {
    let d = synthetic_design();
    let mut x = Array2::<f64>::ones((d.len(), 3));
    x.slice_mut(ndarray::s![.., ..2]).assign(d.x());
    let mut rk = RegressionKriging::new(LinearRegression::new(), RegressionKrigingParams::default());
    rk.fit(&x, d.coords(), d.y()).expect("constant column should not fail the fit");
    assert!(rk.predict(&x, d.coords()).unwrap().iter().all(|v| v.is_finite()));
}

#[test]
fn test_mlp_workflow_runs() {
    let d = synthetic_design();
    let mlp = MlpRegressor::new(MlpParams {
        hidden_layer_sizes: vec![16],
        learning_rate: 1e-2,
        max_epochs: 150,
        seed: 1,
        ..Default::default()
    });
    let report = run_workflow(&d, &WorkflowConfig::default(), mlp).unwrap();
    assert!(report.regressor.mse.is_finite());
    assert!(report.regression_kriging.mse.is_finite());
    assert!(report.predictions.iter().all(|p| p.predicted.is_finite()));
}

#[test]
fn test_report_serializes_to_json() {
    let d = synthetic_design();
    let report = run_workflow(&d, &WorkflowConfig::default(), LinearRegression::new()).unwrap();
    let json = serde_json::to_value(&report).unwrap();
    assert!(json["variogram"]["range"].is_number());
    assert!(json["regression_kriging"]["rmse"].is_number());
    assert_eq!(json["predictions"].as_array().unwrap().len(), report.n_test);
}
