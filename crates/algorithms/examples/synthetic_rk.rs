//! Regression kriging vs plain regression on the synthetic dataset
//!
//! Run:
//!   cargo run -p geokrige-algorithms --example synthetic_rk --release
//!
//! Custom size (default 200):
//!   cargo run -p geokrige-algorithms --example synthetic_rk --release -- 1000

use std::env;
use std::time::Instant;

use geokrige_algorithms::prelude::*;
use geokrige_core::synthetic::{spatial_trend_dataset, SyntheticParams};

fn main() -> Result<()> {
    let n = env::args().nth(1).and_then(|s| s.parse().ok()).unwrap_or(200);
    let dataset = spatial_trend_dataset(&SyntheticParams {
        n,
        ..SyntheticParams::default()
    })?;
    let design = dataset.to_design(&["x1", "x2"], "y")?;

    println!("=== Regression kriging on {} synthetic points ===\n", n);
    println!("{:<10} {:>12} {:>12} {:>10} {:>10}", "trend", "MSE (reg)", "MSE (RK)", "gain", "time");

    let config = WorkflowConfig::default();

    let start = Instant::now();
    let report = run_workflow(&design, &config, LinearRegression::new())?;
    print_row("linear", &report, start.elapsed());

    let start = Instant::now();
    let mlp = MlpRegressor::new(MlpParams {
        hidden_layer_sizes: vec![32, 16],
        learning_rate: 5e-3,
        ..MlpParams::default()
    });
    let report = run_workflow(&design, &config, mlp)?;
    print_row("mlp", &report, start.elapsed());

    let v = &report.variogram;
    println!(
        "\nResidual variogram ({:?}): nugget {:.3}, sill {:.3}, range {:.1} km",
        v.model,
        v.nugget,
        v.sill,
        v.range / 1000.0
    );
    Ok(())
}

fn print_row(name: &str, report: &WorkflowReport, elapsed: std::time::Duration) {
    println!(
        "{:<10} {:>12.4} {:>12.4} {:>9.1}% {:>10.2?}",
        name,
        report.regressor.mse,
        report.regression_kriging.mse,
        100.0 * report.mse_improvement(),
        elapsed
    );
}
