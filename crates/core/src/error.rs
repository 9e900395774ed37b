//! Error types for geokrige

use thiserror::Error;

/// Main error type for geokrige operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Invalid test fraction: {0} (must lie strictly between 0 and 1)")]
    InvalidFraction(f64),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Model is not fitted: call `fit` before `{0}`")]
    NotFitted(&'static str),

    #[error("Variogram fit failed: {0}")]
    VariogramFit(String),

    #[error("Dimension mismatch in {what}: expected {expected}, got {actual}")]
    DimensionMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid coordinate at record {index}: ({lon}, {lat})")]
    InvalidCoordinate { index: usize, lon: f64, lat: f64 },

    #[error("Record {index} attribute set differs from the first record: {reason}")]
    AttributeMismatch { index: usize, reason: String },

    #[error("Missing attribute: {0}")]
    MissingAttribute(String),

    #[error("Unsupported CRS: {0}")]
    UnsupportedCrs(String),

    #[error("Invalid parameter: {name} = {value} ({reason})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        reason: String,
    },

    #[error("Algorithm error: {0}")]
    Algorithm(String),
}

impl Error {
    /// Shorthand for [`Error::InvalidParameter`].
    pub fn invalid_param(name: &'static str, value: impl ToString, reason: impl Into<String>) -> Self {
        Error::InvalidParameter {
            name,
            value: value.to_string(),
            reason: reason.into(),
        }
    }
}

/// Result type alias for geokrige operations
pub type Result<T> = std::result::Result<T, Error>;
