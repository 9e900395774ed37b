//! Point datasets: geographic coordinates plus named numeric attributes
//!
//! [`PointDataset`] is what loaders produce. [`Design`] is what models
//! consume: predictor matrix, target vector and coordinates extracted
//! together so that row `i` of each refers to the same record. Anything that
//! reorders or subsets rows goes through [`Design::select`], which moves all
//! three at once.

use ndarray::{Array1, Array2, Axis};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::error::{Error, Result};
use crate::geodesy::GeoCoord;

/// A single point feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    pub coord: GeoCoord,
    pub attributes: BTreeMap<String, f64>,
}

impl PointRecord {
    pub fn new(coord: GeoCoord) -> Self {
        Self {
            coord,
            attributes: BTreeMap::new(),
        }
    }

    /// Builder-style attribute setter
    pub fn with(mut self, key: impl Into<String>, value: f64) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Set an attribute
    pub fn set(&mut self, key: impl Into<String>, value: f64) {
        self.attributes.insert(key.into(), value);
    }

    /// Get an attribute
    pub fn get(&self, key: &str) -> Option<f64> {
        self.attributes.get(key).copied()
    }
}

/// Validated collection of point records.
///
/// Every record has a valid geographic coordinate and exactly the same
/// attribute names as the first record.
#[derive(Debug, Clone, Default, Serialize)]
pub struct PointDataset {
    records: Vec<PointRecord>,
}

impl PointDataset {
    /// Validate and wrap a list of records.
    pub fn new(records: Vec<PointRecord>) -> Result<Self> {
        if let Some(first) = records.first() {
            for (index, rec) in records.iter().enumerate() {
                if !rec.coord.is_valid() {
                    return Err(Error::InvalidCoordinate {
                        index,
                        lon: rec.coord.lon,
                        lat: rec.coord.lat,
                    });
                }
                if index > 0 && !rec.attributes.keys().eq(first.attributes.keys()) {
                    let missing: Vec<&str> = first
                        .attributes
                        .keys()
                        .filter(|k| !rec.attributes.contains_key(*k))
                        .map(String::as_str)
                        .collect();
                    let extra: Vec<&str> = rec
                        .attributes
                        .keys()
                        .filter(|k| !first.attributes.contains_key(*k))
                        .map(String::as_str)
                        .collect();
                    return Err(Error::AttributeMismatch {
                        index,
                        reason: format!("missing {:?}, unexpected {:?}", missing, extra),
                    });
                }
                if let Some((name, _)) = rec.attributes.iter().find(|(_, v)| !v.is_finite()) {
                    return Err(Error::AttributeMismatch {
                        index,
                        reason: format!("attribute '{}' is not finite", name),
                    });
                }
            }
        }
        Ok(Self { records })
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[PointRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &PointRecord> {
        self.records.iter()
    }

    /// Attribute names shared by every record, sorted.
    pub fn attribute_names(&self) -> Vec<String> {
        self.records
            .first()
            .map(|r| r.attributes.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Coordinates in record order.
    pub fn coords(&self) -> Vec<GeoCoord> {
        self.records.iter().map(|r| r.coord).collect()
    }

    /// One attribute as a column vector.
    pub fn column(&self, name: &str) -> Result<Array1<f64>> {
        self.records
            .iter()
            .map(|r| r.get(name).ok_or_else(|| Error::MissingAttribute(name.to_string())))
            .collect::<Result<Vec<f64>>>()
            .map(Array1::from)
    }

    /// Extract an aligned (X, y, coords) triple.
    ///
    /// Column order of X follows `features`. The target must not also be a
    /// feature.
    pub fn to_design<S: AsRef<str>>(&self, features: &[S], target: &str) -> Result<Design> {
        if features.is_empty() {
            return Err(Error::invalid_param("features", "[]", "at least one predictor is required"));
        }
        if features.iter().any(|f| f.as_ref() == target) {
            return Err(Error::invalid_param(
                "features",
                target,
                "target attribute cannot also be a predictor",
            ));
        }

        let n = self.records.len();
        let p = features.len();
        let mut x = Array2::<f64>::zeros((n, p));
        for (j, name) in features.iter().enumerate() {
            let col = self.column(name.as_ref())?;
            x.column_mut(j).assign(&col);
        }
        let y = self.column(target)?;

        Design::new(
            x,
            y,
            self.coords(),
            features.iter().map(|f| f.as_ref().to_string()).collect(),
            target.to_string(),
        )
    }
}

impl IntoIterator for PointDataset {
    type Item = PointRecord;
    type IntoIter = std::vec::IntoIter<PointRecord>;

    fn into_iter(self) -> Self::IntoIter {
        self.records.into_iter()
    }
}

/// Aligned predictor matrix, target vector and coordinates.
#[derive(Debug, Clone)]
pub struct Design {
    x: Array2<f64>,
    y: Array1<f64>,
    coords: Vec<GeoCoord>,
    feature_names: Vec<String>,
    target_name: String,
}

impl Design {
    pub fn new(
        x: Array2<f64>,
        y: Array1<f64>,
        coords: Vec<GeoCoord>,
        feature_names: Vec<String>,
        target_name: String,
    ) -> Result<Self> {
        let n = x.nrows();
        if y.len() != n {
            return Err(Error::DimensionMismatch {
                what: "target length",
                expected: n,
                actual: y.len(),
            });
        }
        if coords.len() != n {
            return Err(Error::DimensionMismatch {
                what: "coordinate count",
                expected: n,
                actual: coords.len(),
            });
        }
        if feature_names.len() != x.ncols() {
            return Err(Error::DimensionMismatch {
                what: "feature names",
                expected: x.ncols(),
                actual: feature_names.len(),
            });
        }
        Ok(Self {
            x,
            y,
            coords,
            feature_names,
            target_name,
        })
    }

    pub fn len(&self) -> usize {
        self.y.len()
    }

    pub fn is_empty(&self) -> bool {
        self.y.is_empty()
    }

    pub fn n_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn x(&self) -> &Array2<f64> {
        &self.x
    }

    pub fn y(&self) -> &Array1<f64> {
        &self.y
    }

    pub fn coords(&self) -> &[GeoCoord] {
        &self.coords
    }

    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn target_name(&self) -> &str {
        &self.target_name
    }

    /// Rows at `indices`, in that order, across X, y and coords together.
    pub fn select(&self, indices: &[usize]) -> Result<Design> {
        if let Some(&bad) = indices.iter().find(|&&i| i >= self.len()) {
            return Err(Error::invalid_param(
                "indices",
                bad,
                format!("row index out of range for {} rows", self.len()),
            ));
        }
        Ok(Design {
            x: self.x.select(Axis(0), indices),
            y: self.y.select(Axis(0), indices),
            coords: indices.iter().map(|&i| self.coords[i]).collect(),
            feature_names: self.feature_names.clone(),
            target_name: self.target_name.clone(),
        })
    }
}
