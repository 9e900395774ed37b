//! Small dense linear solves
//!
//! The systems here are kriging neighbourhoods (k + 1 unknowns, typically
//! 5–50), normal equations for a handful of predictors, and 3×3
//! Levenberg–Marquardt steps. Gaussian elimination with partial pivoting is
//! enough at that size.

use geokrige_core::{Error, Result};

/// Pivots below this are treated as zero.
const SINGULAR_EPS: f64 = 1e-14;

/// Solve `A·x = b` for a row-major `n × n` matrix `A`.
///
/// `mat` and `rhs` are overwritten with the eliminated system.
pub(crate) fn solve_in_place(n: usize, mat: &mut [f64], rhs: &mut [f64]) -> Result<Vec<f64>> {
    debug_assert_eq!(mat.len(), n * n);
    debug_assert_eq!(rhs.len(), n);

    // Forward elimination
    for col in 0..n {
        let mut max_val = mat[col * n + col].abs();
        let mut max_row = col;
        for row in (col + 1)..n {
            let val = mat[row * n + col].abs();
            if val > max_val {
                max_val = val;
                max_row = row;
            }
        }

        if max_val < SINGULAR_EPS || !max_val.is_finite() {
            return Err(Error::Algorithm(format!(
                "singular {}x{} system (pivot {:.3e} in column {})",
                n, n, max_val, col
            )));
        }

        if max_row != col {
            for j in 0..n {
                mat.swap(col * n + j, max_row * n + j);
            }
            rhs.swap(col, max_row);
        }

        let pivot = mat[col * n + col];
        for row in (col + 1)..n {
            let factor = mat[row * n + col] / pivot;
            mat[row * n + col] = 0.0;
            for j in (col + 1)..n {
                mat[row * n + j] -= factor * mat[col * n + j];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    // Back substitution
    let mut x = vec![0.0_f64; n];
    for col in (0..n).rev() {
        let mut sum = rhs[col];
        for j in (col + 1)..n {
            sum -= mat[col * n + j] * x[j];
        }
        x[col] = sum / mat[col * n + col];
    }

    Ok(x)
}
