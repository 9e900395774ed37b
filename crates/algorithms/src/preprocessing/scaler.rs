//! Z-score standardization of predictor columns

use ndarray::{Array1, Array2, Axis};

use geokrige_core::{Error, Result};

/// Columns with a standard deviation below this are treated as constant.
const MIN_SCALE: f64 = 1e-12;

/// Per-column mean / standard-deviation scaler.
///
/// Fit on training rows only and reuse the same statistics for every later
/// `transform`; refitting on test data leaks the test distribution into
/// the model. The standard deviation is the population one (ddof = 0).
///
/// A constant column has σ = 0; its scale is set to 1 so `transform`
/// centres it to zero instead of dividing by zero.
#[derive(Debug, Clone, Default)]
pub struct StandardScaler {
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compute column statistics from `x`.
    pub fn fit(&mut self, x: &Array2<f64>) -> Result<&mut Self> {
        if x.nrows() == 0 {
            return Err(Error::InsufficientData(
                "cannot fit a scaler on zero rows".into(),
            ));
        }
        let mean = x
            .mean_axis(Axis(0))
            .ok_or_else(|| Error::InsufficientData("empty predictor matrix".into()))?;
        let scale = x
            .std_axis(Axis(0), 0.0)
            .mapv(|s| if s < MIN_SCALE { 1.0 } else { s });
        self.mean = Some(mean);
        self.scale = Some(scale);
        Ok(self)
    }

    /// Apply `(x − μ) / σ` column-wise.
    pub fn transform(&self, x: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.stats("transform")?;
        check_cols(mean.len(), x.ncols())?;
        Ok((x - mean) / scale)
    }

    pub fn fit_transform(&mut self, x: &Array2<f64>) -> Result<Array2<f64>> {
        self.fit(x)?;
        self.transform(x)
    }

    /// Undo [`transform`](Self::transform).
    pub fn inverse_transform(&self, z: &Array2<f64>) -> Result<Array2<f64>> {
        let (mean, scale) = self.stats("inverse_transform")?;
        check_cols(mean.len(), z.ncols())?;
        Ok(z * scale + mean)
    }

    pub fn is_fitted(&self) -> bool {
        self.mean.is_some()
    }

    /// Fitted column means
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    /// Fitted column scales (σ, or 1 for constant columns)
    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    fn stats(&self, op: &'static str) -> Result<(&Array1<f64>, &Array1<f64>)> {
        match (&self.mean, &self.scale) {
            (Some(m), Some(s)) => Ok((m, s)),
            _ => Err(Error::NotFitted(op)),
        }
    }
}

fn check_cols(expected: usize, actual: usize) -> Result<()> {
    if expected != actual {
        return Err(Error::DimensionMismatch {
            what: "predictor columns",
            expected,
            actual,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_standardized_mean_zero_std_one() {
        let x = array![[1.0, 10.0], [2.0, 30.0], [3.0, 20.0], [6.0, 60.0]];
        let z = StandardScaler::new().fit_transform(&x).unwrap();

        for j in 0..2 {
            let col = z.column(j);
            let mean = col.mean().unwrap();
            let std = col.std(0.0);
            assert!(mean.abs() < 1e-12, "column {} mean = {}", j, mean);
            assert!((std - 1.0).abs() < 1e-12, "column {} std = {}", j, std);
        }
    }

    #[test]
    fn test_constant_column_is_centred_not_divided() {
        let x = array![[5.0, 1.0], [5.0, 2.0], [5.0, 3.0]];
        let mut scaler = StandardScaler::new();
        let z = scaler.fit_transform(&x).unwrap();
        assert_eq!(scaler.scale().unwrap()[0], 1.0);
        assert!(z.column(0).iter().all(|v| *v == 0.0));
        assert!(z.iter().all(|v| v.is_finite()));
    }

    #[test]
    fn test_test_data_uses_training_statistics() {
        let train = array![[0.0], [2.0]];
        let test = array![[4.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit(&train).unwrap();
        let z = scaler.transform(&test).unwrap();
        // μ = 1, σ = 1
        assert!((z[[0, 0]] - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_inverse_roundtrip() {
        let x = array![[1.0, -4.0], [3.0, 8.0], [2.0, 0.5]];
        let mut scaler = StandardScaler::new();
        let z = scaler.fit_transform(&x).unwrap();
        let back = scaler.inverse_transform(&z).unwrap();
        for (a, b) in back.iter().zip(x.iter()) {
            assert!((a - b).abs() < 1e-12);
        }
    }

    #[test]
    fn test_errors() {
        let scaler = StandardScaler::new();
        assert!(matches!(scaler.transform(&array![[1.0]]), Err(Error::NotFitted(_))));

        let mut scaler = StandardScaler::new();
        scaler.fit(&array![[1.0, 2.0]]).unwrap();
        assert!(matches!(
            scaler.transform(&array![[1.0]]),
            Err(Error::DimensionMismatch { .. })
        ));

        let empty = Array2::<f64>::zeros((0, 2));
        assert!(StandardScaler::new().fit(&empty).is_err());
    }
}
