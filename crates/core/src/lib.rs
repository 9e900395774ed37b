//! # geokrige core
//!
//! Core types, errors and I/O for the geokrige regression-kriging toolkit.
//!
//! This crate provides:
//! - `GeoCoord` and great-circle distance helpers
//! - `PointDataset` / `Design`: validated point features and the aligned
//!   (X, y, coordinates) triple models train on
//! - `CRS`: the coordinate systems loaders understand
//! - GeoJSON and CSV point readers
//! - A synthetic trend + spatial-field dataset generator

pub mod crs;
pub mod error;
pub mod geodesy;
pub mod io;
pub mod points;
pub mod synthetic;

pub use crs::CRS;
pub use error::{Error, Result};
pub use geodesy::GeoCoord;
pub use points::{Design, PointDataset, PointRecord};

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::crs::CRS;
    pub use crate::error::{Error, Result};
    pub use crate::geodesy::GeoCoord;
    pub use crate::points::{Design, PointDataset, PointRecord};
}
