//! Seeded train/test partitioning
//!
//! The partition is a simple random sample without replacement of row
//! indices. It is computed once and applied to X, y and coordinates
//! together through [`Design::select`], never per array.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use geokrige_core::{Design, Error, Result};

/// Disjoint train and test row indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

/// Partition `0..n` into train and test sets.
///
/// The test set holds `round(test_fraction · n)` rows, clamped so that both
/// sides keep at least one row. The same `(n, test_fraction, seed)` always
/// yields the same partition.
///
/// # Errors
/// - [`Error::InvalidFraction`] if `test_fraction` is not in the open interval (0, 1)
/// - [`Error::InsufficientData`] if `n < 2`
pub fn train_test_split(n: usize, test_fraction: f64, seed: u64) -> Result<Split> {
    if !(test_fraction > 0.0 && test_fraction < 1.0) {
        return Err(Error::InvalidFraction(test_fraction));
    }
    if n < 2 {
        return Err(Error::InsufficientData(format!(
            "need at least 2 records to split into train and test, got {}",
            n
        )));
    }

    let n_test = ((test_fraction * n as f64).round() as usize).clamp(1, n - 1);

    let mut indices: Vec<usize> = (0..n).collect();
    let mut rng = StdRng::seed_from_u64(seed);
    indices.shuffle(&mut rng);

    let test = indices[..n_test].to_vec();
    let train = indices[n_test..].to_vec();
    debug!("Split {} rows into {} train / {} test (seed {})", n, train.len(), test.len(), seed);

    Ok(Split { train, test })
}

/// Split a design into aligned (train, test) designs.
pub fn split_design(design: &Design, test_fraction: f64, seed: u64) -> Result<(Design, Design, Split)> {
    let split = train_test_split(design.len(), test_fraction, seed)?;
    let train = design.select(&split.train)?;
    let test = design.select(&split.test)?;
    Ok((train, test, split))
}

#[cfg(test)]
mod tests {
    use super::*;
    use geokrige_core::GeoCoord;
    use ndarray::{Array1, Array2};
    use std::collections::HashSet;

    #[test]
    fn test_same_seed_same_partition() {
        let a = train_test_split(100, 0.25, 7).unwrap();
        let b = train_test_split(100, 0.25, 7).unwrap();
        assert_eq!(a, b);

        let c = train_test_split(100, 0.25, 8).unwrap();
        assert_ne!(a.test, c.test, "different seeds should give different partitions");
    }

    #[test]
    fn test_disjoint_and_complete() {
        let split = train_test_split(53, 0.3, 1).unwrap();
        assert_eq!(split.test.len(), 16);
        assert_eq!(split.train.len(), 37);

        let train: HashSet<_> = split.train.iter().copied().collect();
        let test: HashSet<_> = split.test.iter().copied().collect();
        assert!(train.is_disjoint(&test));
        assert_eq!(train.len() + test.len(), 53);
    }

    #[test]
    fn test_invalid_fraction() {
        for p in [0.0, 1.0, -0.2, 1.5, f64::NAN] {
            assert!(
                matches!(train_test_split(10, p, 0), Err(Error::InvalidFraction(_))),
                "fraction {} should be rejected",
                p
            );
        }
    }

    #[test]
    fn test_insufficient_data() {
        assert!(matches!(train_test_split(1, 0.5, 0), Err(Error::InsufficientData(_))));
        assert!(matches!(train_test_split(0, 0.5, 0), Err(Error::InsufficientData(_))));
    }

    #[test]
    fn test_tiny_fraction_keeps_both_sides() {
        let split = train_test_split(5, 0.01, 3).unwrap();
        assert_eq!(split.test.len(), 1);
        let split = train_test_split(5, 0.99, 3).unwrap();
        assert_eq!(split.train.len(), 1);
    }

    #[test]
    fn test_split_design_keeps_rows_aligned() {
        let n = 20;
        let x = Array2::from_shape_fn((n, 2), |(i, j)| (i * 10 + j) as f64);
        let y = Array1::from_shape_fn(n, |i| i as f64);
        let coords: Vec<GeoCoord> = (0..n).map(|i| GeoCoord::new(i as f64, -(i as f64))).collect();
        let design = Design::new(x, y, coords, vec!["a".into(), "b".into()], "y".into()).unwrap();

        let (train, test, _) = split_design(&design, 0.25, 99).unwrap();
        for part in [&train, &test] {
            for i in 0..part.len() {
                let id = part.y()[i];
                assert_eq!(part.x()[[i, 0]], id * 10.0);
                assert_eq!(part.x()[[i, 1]], id * 10.0 + 1.0);
                assert_eq!(part.coords()[i].lon, id);
                assert_eq!(part.coords()[i].lat, -id);
            }
        }
        assert_eq!(train.len() + test.len(), n);
    }
}
