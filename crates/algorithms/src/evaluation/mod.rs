//! Hold-out accuracy metrics
//!
//! - MSE: mean squared error
//! - RMSE: root mean squared error
//! - MAE: mean absolute error
//! - R²: coefficient of determination, 1 − SS_res / SS_tot

use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use geokrige_core::{Error, Result};

fn paired<'a>(
    y_true: impl Into<ArrayView1<'a, f64>>,
    y_pred: impl Into<ArrayView1<'a, f64>>,
) -> Result<(ArrayView1<'a, f64>, ArrayView1<'a, f64>)> {
    let (t, p) = (y_true.into(), y_pred.into());
    if t.len() != p.len() {
        return Err(Error::DimensionMismatch {
            what: "prediction length",
            expected: t.len(),
            actual: p.len(),
        });
    }
    if t.is_empty() {
        return Err(Error::InsufficientData("cannot score an empty prediction set".into()));
    }
    Ok((t, p))
}

/// Mean squared error.
pub fn mse<'a>(y_true: impl Into<ArrayView1<'a, f64>>, y_pred: impl Into<ArrayView1<'a, f64>>) -> Result<f64> {
    let (t, p) = paired(y_true, y_pred)?;
    Ok(t.iter().zip(p.iter()).map(|(a, b)| (a - b) * (a - b)).sum::<f64>() / t.len() as f64)
}

pub fn rmse<'a>(y_true: impl Into<ArrayView1<'a, f64>>, y_pred: impl Into<ArrayView1<'a, f64>>) -> Result<f64> {
    mse(y_true, y_pred).map(f64::sqrt)
}

/// Mean absolute error.
pub fn mae<'a>(y_true: impl Into<ArrayView1<'a, f64>>, y_pred: impl Into<ArrayView1<'a, f64>>) -> Result<f64> {
    let (t, p) = paired(y_true, y_pred)?;
    Ok(t.iter().zip(p.iter()).map(|(a, b)| (a - b).abs()).sum::<f64>() / t.len() as f64)
}

/// Coefficient of determination.
///
/// A constant `y_true` has no variance to explain: the result is 1 for a
/// perfect prediction and `-inf` otherwise.
pub fn r2<'a>(y_true: impl Into<ArrayView1<'a, f64>>, y_pred: impl Into<ArrayView1<'a, f64>>) -> Result<f64> {
    let (t, p) = paired(y_true, y_pred)?;
    let mean = t.sum() / t.len() as f64;
    let ss_res: f64 = t.iter().zip(p.iter()).map(|(a, b)| (a - b) * (a - b)).sum();
    let ss_tot: f64 = t.iter().map(|a| (a - mean) * (a - mean)).sum();
    if ss_tot == 0.0 {
        return Ok(if ss_res == 0.0 { 1.0 } else { f64::NEG_INFINITY });
    }
    Ok(1.0 - ss_res / ss_tot)
}

/// All metrics for one set of predictions.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Metrics {
    pub n: usize,
    pub mse: f64,
    pub rmse: f64,
    pub mae: f64,
    pub r2: f64,
}

impl Metrics {
    pub fn compute<'a>(
        y_true: impl Into<ArrayView1<'a, f64>>,
        y_pred: impl Into<ArrayView1<'a, f64>>,
    ) -> Result<Self> {
        let (t, p) = paired(y_true, y_pred)?;
        let mse = mse(t, p)?;
        Ok(Self {
            n: t.len(),
            mse,
            rmse: mse.sqrt(),
            mae: mae(t, p)?,
            r2: r2(t, p)?,
        })
    }
}

impl std::fmt::Display for Metrics {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "n={} MSE={:.4} RMSE={:.4} MAE={:.4} R²={:.4}",
            self.n, self.mse, self.rmse, self.mae, self.r2
        )
    }
}
