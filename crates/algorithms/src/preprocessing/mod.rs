//! Data preparation before model fitting
//!
//! - Split: seeded train/test partition applied to X, y and coordinates together
//! - Scaler: z-score standardization fitted on training rows only

mod scaler;
mod split;

pub use scaler::StandardScaler;
pub use split::{split_design, train_test_split, Split};
