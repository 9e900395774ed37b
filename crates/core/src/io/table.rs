//! Delimited text (CSV) point tables

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::debug;

use super::LoadOptions;
use crate::error::{Error, Result};
use crate::points::{PointDataset, PointRecord};

/// Read a CSV file with coordinate columns and numeric attributes.
pub fn read_csv<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<PointDataset> {
    let file = File::open(path.as_ref())?;
    debug!("Reading CSV points from {}", path.as_ref().display());
    read_csv_from_reader(file, options)
}

/// Read CSV points from any reader (header row required).
pub fn read_csv_from_reader<R: Read>(reader: R, options: &LoadOptions) -> Result<PointDataset> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let headers = rdr.headers()?.clone();

    let find = |name: &str| {
        headers
            .iter()
            .position(|h| h.eq_ignore_ascii_case(name))
            .ok_or_else(|| Error::MissingAttribute(name.to_string()))
    };
    let lon_idx = find(&options.lon_column)?;
    let lat_idx = find(&options.lat_column)?;

    let rows: Vec<csv::StringRecord> = rdr.records().collect::<std::result::Result<_, _>>()?;

    let columns: Vec<(usize, String)> = match &options.attributes {
        Some(names) => names
            .iter()
            .map(|n| find(n).map(|i| (i, n.clone())))
            .collect::<Result<_>>()?,
        None => headers
            .iter()
            .enumerate()
            .filter(|(i, _)| *i != lon_idx && *i != lat_idx)
            .filter(|(i, _)| {
                rows.iter()
                    .all(|r| r.get(*i).is_some_and(|v| v.parse::<f64>().is_ok()))
            })
            .map(|(i, h)| (i, h.to_string()))
            .collect(),
    };

    let crs = options.crs.clone().unwrap_or_default();
    let parse = |row: &csv::StringRecord, idx: usize, index: usize, name: &str| -> Result<f64> {
        row.get(idx)
            .and_then(|v| v.parse::<f64>().ok())
            .ok_or_else(|| Error::AttributeMismatch {
                index,
                reason: format!("column '{}' is not numeric", name),
            })
    };

    let mut records = Vec::with_capacity(rows.len());
    for (index, row) in rows.iter().enumerate() {
        let x = parse(row, lon_idx, index, &options.lon_column)?;
        let y = parse(row, lat_idx, index, &options.lat_column)?;
        let mut attributes = BTreeMap::new();
        for (col, name) in &columns {
            attributes.insert(name.clone(), parse(row, *col, index, name)?);
        }
        records.push(PointRecord {
            coord: crs.to_geographic(x, y)?,
            attributes,
        });
    }

    debug!("Loaded {} CSV rows with {} numeric attributes", records.len(), columns.len());
    PointDataset::new(records)
}
