//! Reading and writing point datasets
//!
//! Loaders return a validated [`PointDataset`](crate::points::PointDataset)
//! whose coordinates are already in geographic degrees. Only numeric
//! attributes are kept; see [`LoadOptions`] for how columns are chosen.

mod geojson;
mod table;

pub use geojson::{read_geojson, read_geojson_str, write_geojson, write_geojson_string};
pub use table::{read_csv, read_csv_from_reader};

use std::path::Path;

use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::points::PointDataset;

/// Options shared by all point loaders.
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Attributes to keep. `None` keeps every attribute that is numeric in
    /// all records.
    pub attributes: Option<Vec<String>>,
    /// CRS of the input coordinates. `None` uses whatever the file declares,
    /// falling back to WGS84.
    pub crs: Option<CRS>,
    /// CSV column holding x / longitude (default `lon`)
    pub lon_column: String,
    /// CSV column holding y / latitude (default `lat`)
    pub lat_column: String,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            attributes: None,
            crs: None,
            lon_column: "lon".to_string(),
            lat_column: "lat".to_string(),
        }
    }
}

/// Load a point dataset, picking the format from the file extension.
///
/// `.geojson` / `.json` go to the GeoJSON reader, `.csv` / `.txt` to the
/// CSV reader.
pub fn read_points<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<PointDataset> {
    let path = path.as_ref();
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .unwrap_or_default();

    match ext.as_str() {
        "geojson" | "json" => read_geojson(path, options),
        "csv" | "txt" => read_csv(path, options),
        other => Err(Error::invalid_param(
            "path",
            path.display(),
            format!("unsupported extension '{}' (expected geojson, json or csv)", other),
        )),
    }
}
