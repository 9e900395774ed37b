//! geokrige CLI - regression kriging for geographic point data

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use serde_json::json;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

use geokrige_algorithms::interpolation::{
    empirical_variogram, fit_best_variogram, fit_variogram, FitFailurePolicy, VariogramModel,
    VariogramParams,
};
use geokrige_algorithms::regression::{LinearRegression, MlpParams, MlpRegressor};
use geokrige_algorithms::workflow::{run_workflow, WorkflowConfig, WorkflowReport};
use geokrige_core::geodesy::extent;
use geokrige_core::io::{read_points, write_geojson, LoadOptions};
use geokrige_core::synthetic::{spatial_trend_dataset, SyntheticParams};
use geokrige_core::{PointDataset, CRS};

// ─── CLI structure ──────────────────────────────────────────────────────

#[derive(Parser)]
#[command(name = "geokrige")]
#[command(author, version, about = "Regression kriging for geographic point data", long_about = None)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show record count, attributes and extent of a point file
    Info {
        #[command(flatten)]
        input: InputArgs,
    },
    /// Empirical variogram of one attribute and its fitted model
    Variogram {
        #[command(flatten)]
        input: InputArgs,
        /// Attribute to analyse
        #[arg(short, long)]
        field: String,
        /// Number of lag bins
        #[arg(long, default_value = "15")]
        n_lags: usize,
        /// Maximum lag in kilometres (default: half the largest separation)
        #[arg(long)]
        max_lag_km: Option<f64>,
        /// Model form; best of all forms when omitted
        #[arg(short, long, value_enum)]
        model: Option<ModelArg>,
        /// Write the JSON result here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Hold-out comparison of the regressor alone vs regression kriging
    Evaluate {
        #[command(flatten)]
        input: InputArgs,
        /// Target attribute
        #[arg(short, long)]
        target: String,
        /// Predictor attributes, comma-separated
        #[arg(short, long, value_delimiter = ',', required = true)]
        features: Vec<String>,
        /// Trend model
        #[arg(short, long, value_enum, default_value = "linear")]
        regressor: RegressorArg,
        /// JSON file with a workflow configuration; flags below override it
        #[arg(long)]
        config: Option<PathBuf>,
        /// Fraction of records held out for testing
        #[arg(long)]
        test_fraction: Option<f64>,
        /// Seed for the train/test split
        #[arg(long)]
        seed: Option<u64>,
        /// Number of variogram lag bins
        #[arg(long)]
        n_lags: Option<usize>,
        /// Neighbours per kriging system (0 = all points)
        #[arg(long)]
        max_neighbors: Option<usize>,
        /// Residual variogram model; best fit when omitted
        #[arg(short, long, value_enum)]
        model: Option<ModelArg>,
        /// Use a pure nugget variogram when the residual fit fails
        #[arg(long)]
        nugget_fallback: bool,
        /// Skip predictor standardization
        #[arg(long)]
        no_standardize: bool,
        /// MLP hidden layer sizes, comma-separated
        #[arg(long, value_delimiter = ',', default_value = "64,32")]
        hidden: Vec<usize>,
        /// MLP training epochs
        #[arg(long, default_value = "300")]
        epochs: usize,
        /// Write the JSON report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Write a synthetic trend + spatial field dataset as GeoJSON
    Synth {
        /// Output GeoJSON file
        output: PathBuf,
        /// Number of points
        #[arg(short, long, default_value = "200")]
        n: usize,
        /// RNG seed
        #[arg(short, long, default_value = "42")]
        seed: u64,
    },
}

#[derive(Args)]
struct InputArgs {
    /// Input GeoJSON or CSV file
    input: PathBuf,
    /// CRS of the input coordinates (e.g. EPSG:4326, EPSG:3857)
    #[arg(long)]
    crs: Option<String>,
    /// CSV longitude / x column
    #[arg(long, default_value = "lon")]
    lon_column: String,
    /// CSV latitude / y column
    #[arg(long, default_value = "lat")]
    lat_column: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum ModelArg {
    Exponential,
    Spherical,
    Gaussian,
}

impl From<ModelArg> for VariogramModel {
    fn from(m: ModelArg) -> Self {
        match m {
            ModelArg::Exponential => VariogramModel::Exponential,
            ModelArg::Spherical => VariogramModel::Spherical,
            ModelArg::Gaussian => VariogramModel::Gaussian,
        }
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum RegressorArg {
    Linear,
    Mlp,
}

// ─── Helpers ────────────────────────────────────────────────────────────

fn setup_logging(verbose: bool) -> Result<()> {
    let level = if verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).context("setting default subscriber failed")
}

fn spinner(msg: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(msg.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

fn read_input(args: &InputArgs) -> Result<PointDataset> {
    let crs = args
        .crs
        .as_deref()
        .map(|s| CRS::parse(s).with_context(|| format!("Invalid CRS: {}", s)))
        .transpose()?;
    let options = LoadOptions {
        crs,
        lon_column: args.lon_column.clone(),
        lat_column: args.lat_column.clone(),
        ..LoadOptions::default()
    };
    let pb = spinner("Reading points...");
    let dataset = read_points(&args.input, &options)
        .with_context(|| format!("Failed to read {}", args.input.display()))?;
    pb.finish_and_clear();
    info!("Input: {} points, {} attributes", dataset.len(), dataset.attribute_names().len());
    Ok(dataset)
}

fn emit_json(value: &serde_json::Value, output: Option<&Path>) -> Result<()> {
    let text = serde_json::to_string_pretty(value).context("Failed to serialize result")?;
    match output {
        Some(path) => {
            std::fs::write(path, text).with_context(|| format!("Failed to write {}", path.display()))?;
            println!("Report saved to: {}", path.display());
        }
        None => println!("{}", text),
    }
    Ok(())
}

fn load_config(path: Option<&Path>) -> Result<WorkflowConfig> {
    match path {
        Some(p) => {
            let text = std::fs::read_to_string(p).with_context(|| format!("Failed to read {}", p.display()))?;
            serde_json::from_str(&text).with_context(|| format!("Invalid workflow config {}", p.display()))
        }
        None => Ok(WorkflowConfig::default()),
    }
}

fn summarize(report: &WorkflowReport, elapsed: std::time::Duration) {
    info!(
        "Variogram: {:?}, nugget {:.4}, sill {:.4}, range {:.1} km",
        report.variogram.model,
        report.variogram.nugget,
        report.variogram.sill,
        report.variogram.range / 1000.0
    );
    info!("Regressor           {}", report.regressor);
    info!("Regression kriging  {}", report.regression_kriging);
    info!("MSE improvement: {:.1}%", 100.0 * report.mse_improvement());
    info!("Processing time: {:.2?}", elapsed);
}

// ─── Main ───────────────────────────────────────────────────────────────

fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    match cli.command {
        // ── Info ─────────────────────────────────────────────────────
        Commands::Info { input } => {
            let dataset = read_input(&input)?;
            println!("File: {}", input.input.display());
            println!("Records: {}", dataset.len());
            println!("Attributes: {}", dataset.attribute_names().join(", "));
            if let Some((min_lon, min_lat, max_lon, max_lat)) = extent(&dataset.coords()) {
                println!(
                    "Extent: ({:.6}, {:.6}) - ({:.6}, {:.6})",
                    min_lon, min_lat, max_lon, max_lat
                );
            }
        }

        // ── Variogram ────────────────────────────────────────────────
        Commands::Variogram {
            input,
            field,
            n_lags,
            max_lag_km,
            model,
            output,
        } => {
            let dataset = read_input(&input)?;
            let values = dataset.column(&field)?.to_vec();
            let params = VariogramParams {
                n_lags,
                max_lag_m: max_lag_km.map(|km| km * 1000.0),
                ..VariogramParams::default()
            };

            let start = Instant::now();
            let pb = spinner("Computing variogram...");
            let emp = empirical_variogram(&dataset.coords(), &values, &params)
                .context("Failed to compute empirical variogram")?;
            let fitted = match model {
                Some(m) => fit_variogram(&emp, m.into()),
                None => fit_best_variogram(&emp),
            };
            pb.finish_and_clear();

            let fitted = match fitted {
                Ok(f) => Some(f),
                Err(e) => {
                    warn!("Variogram fit failed: {}", e);
                    None
                }
            };
            info!("Processing time: {:.2?}", start.elapsed());

            emit_json(
                &json!({
                    "field": field,
                    "empirical": emp,
                    "pairs": emp.pairs(),
                    "fitted": fitted,
                }),
                output.as_deref(),
            )?;
        }

        // ── Evaluate ─────────────────────────────────────────────────
        Commands::Evaluate {
            input,
            target,
            features,
            regressor,
            config,
            test_fraction,
            seed,
            n_lags,
            max_neighbors,
            model,
            nugget_fallback,
            no_standardize,
            hidden,
            epochs,
            output,
        } => {
            let mut cfg = load_config(config.as_deref())?;
            if let Some(p) = test_fraction {
                cfg.test_fraction = p;
            }
            if let Some(s) = seed {
                cfg.seed = s;
            }
            if let Some(n) = n_lags {
                cfg.rk.variogram.n_lags = n;
            }
            if let Some(k) = max_neighbors {
                cfg.rk.kriging.max_neighbors = (k > 0).then_some(k);
            }
            if let Some(m) = model {
                cfg.rk.model = Some(m.into());
            }
            if nugget_fallback {
                cfg.rk.fit_failure = FitFailurePolicy::PureNugget;
            }
            if no_standardize {
                cfg.rk.standardize = false;
            }

            let dataset = read_input(&input)?;
            let design = dataset
                .to_design(features.as_slice(), &target)
                .context("Failed to build design matrix")?;

            let start = Instant::now();
            let pb = spinner("Fitting regression kriging...");
            let report = match regressor {
                RegressorArg::Linear => run_workflow(&design, &cfg, LinearRegression::new()),
                RegressorArg::Mlp => {
                    let params = MlpParams {
                        hidden_layer_sizes: hidden,
                        max_epochs: epochs,
                        seed: cfg.seed,
                        ..MlpParams::default()
                    };
                    run_workflow(&design, &cfg, MlpRegressor::new(params))
                }
            }
            .context("Regression kriging workflow failed")?;
            pb.finish_and_clear();

            summarize(&report, start.elapsed());
            emit_json(&serde_json::to_value(&report)?, output.as_deref())?;
        }

        // ── Synth ────────────────────────────────────────────────────
        Commands::Synth { output, n, seed } => {
            let params = SyntheticParams {
                n,
                seed,
                ..SyntheticParams::default()
            };
            let dataset = spatial_trend_dataset(&params).context("Failed to generate dataset")?;
            write_geojson(&dataset, &output)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("Synthetic dataset ({} points) saved to: {}", n, output.display());
        }
    }

    Ok(())
}
