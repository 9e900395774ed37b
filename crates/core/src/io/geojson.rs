//! GeoJSON point FeatureCollections

use serde_json::{json, Map, Value};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::debug;

use super::LoadOptions;
use crate::crs::CRS;
use crate::error::{Error, Result};
use crate::points::{PointDataset, PointRecord};

/// Read a GeoJSON file of Point features.
pub fn read_geojson<P: AsRef<Path>>(path: P, options: &LoadOptions) -> Result<PointDataset> {
    let reader = BufReader::new(File::open(path.as_ref())?);
    let doc: Value = serde_json::from_reader(reader)?;
    debug!("Parsed GeoJSON from {}", path.as_ref().display());
    parse_document(&doc, options)
}

/// Parse GeoJSON text of Point features.
pub fn read_geojson_str(text: &str, options: &LoadOptions) -> Result<PointDataset> {
    let doc: Value = serde_json::from_str(text)?;
    parse_document(&doc, options)
}

fn parse_document(doc: &Value, options: &LoadOptions) -> Result<PointDataset> {
    if doc.get("type").and_then(Value::as_str) != Some("FeatureCollection") {
        return Err(Error::invalid_param(
            "type",
            doc.get("type").cloned().unwrap_or(Value::Null),
            "expected a FeatureCollection",
        ));
    }

    let crs = match &options.crs {
        Some(crs) => crs.clone(),
        None => declared_crs(doc)?.unwrap_or_default(),
    };

    let features = doc
        .get("features")
        .and_then(Value::as_array)
        .ok_or_else(|| Error::invalid_param("features", "missing", "FeatureCollection has no features array"))?;

    let mut raw: Vec<(f64, f64, &Map<String, Value>)> = Vec::with_capacity(features.len());
    let empty = Map::new();
    for (i, feature) in features.iter().enumerate() {
        let geometry = feature
            .get("geometry")
            .ok_or_else(|| Error::invalid_param("geometry", i, "feature has no geometry"))?;
        let gtype = geometry.get("type").and_then(Value::as_str).unwrap_or("null");
        if gtype != "Point" {
            return Err(Error::invalid_param(
                "geometry",
                gtype,
                format!("feature {} is not a Point", i),
            ));
        }
        let coords = geometry
            .get("coordinates")
            .and_then(Value::as_array)
            .filter(|c| c.len() >= 2)
            .ok_or_else(|| Error::invalid_param("coordinates", i, "Point needs at least two coordinates"))?;
        let x = coords[0].as_f64().unwrap_or(f64::NAN);
        let y = coords[1].as_f64().unwrap_or(f64::NAN);
        let props = feature
            .get("properties")
            .and_then(Value::as_object)
            .unwrap_or(&empty);
        raw.push((x, y, props));
    }

    let columns: Vec<String> = match &options.attributes {
        Some(cols) => cols.clone(),
        None => numeric_columns(raw.iter().map(|(_, _, p)| *p)),
    };

    let mut records = Vec::with_capacity(raw.len());
    for (i, (x, y, props)) in raw.into_iter().enumerate() {
        let coord = crs.to_geographic(x, y)?;
        let mut attributes = BTreeMap::new();
        for col in &columns {
            let value = props
                .get(col)
                .and_then(Value::as_f64)
                .ok_or_else(|| Error::AttributeMismatch {
                    index: i,
                    reason: format!("attribute '{}' missing or not numeric", col),
                })?;
            attributes.insert(col.clone(), value);
        }
        records.push(PointRecord { coord, attributes });
    }

    debug!(
        "Loaded {} point features with {} numeric attributes ({})",
        records.len(),
        columns.len(),
        crs
    );
    PointDataset::new(records)
}

/// Attributes that hold a number in every feature.
fn numeric_columns<'a>(mut props: impl Iterator<Item = &'a Map<String, Value>>) -> Vec<String> {
    let Some(first) = props.next() else {
        return Vec::new();
    };
    let mut cols: Vec<String> = first
        .iter()
        .filter(|(_, v)| v.is_number())
        .map(|(k, _)| k.clone())
        .collect();
    for p in props {
        cols.retain(|c| p.get(c).is_some_and(Value::is_number));
    }
    cols.sort();
    cols
}

/// The legacy GeoJSON 2008 `crs` member, if present.
fn declared_crs(doc: &Value) -> Result<Option<CRS>> {
    match doc
        .get("crs")
        .and_then(|c| c.get("properties"))
        .and_then(|p| p.get("name"))
        .and_then(Value::as_str)
    {
        Some(name) => CRS::parse(name).map(Some),
        None => Ok(None),
    }
}

/// Serialize a dataset as a GeoJSON FeatureCollection (RFC 7946, WGS84).
pub fn write_geojson_string(dataset: &PointDataset) -> Result<String> {
    Ok(serde_json::to_string_pretty(&to_document(dataset))?)
}

/// Write a dataset as a GeoJSON FeatureCollection.
pub fn write_geojson<P: AsRef<Path>>(dataset: &PointDataset, path: P) -> Result<()> {
    let writer = BufWriter::new(File::create(path.as_ref())?);
    serde_json::to_writer_pretty(writer, &to_document(dataset))?;
    debug!("Wrote {} features to {}", dataset.len(), path.as_ref().display());
    Ok(())
}

fn to_document(dataset: &PointDataset) -> Value {
    let features: Vec<Value> = dataset
        .iter()
        .map(|rec| {
            json!({
                "type": "Feature",
                "geometry": {
                    "type": "Point",
                    "coordinates": [rec.coord.lon, rec.coord.lat],
                },
                "properties": rec.attributes,
            })
        })
        .collect();
    json!({
        "type": "FeatureCollection",
        "features": features,
    })
}
