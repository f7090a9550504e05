//! Vector feature tables and the readers that load them.

use crate::{RasterError, Result};
use serde_json::Value as JsonValue;
use std::collections::BTreeMap;
use std::path::Path;

/// A single property value.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Number(f64),
    Text(String),
}

impl Value {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Number(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Value::Null,
            JsonValue::Bool(b) => Value::Bool(*b),
            JsonValue::Number(n) => n.as_f64().map(Value::Number).unwrap_or(Value::Null),
            JsonValue::String(s) => Value::Text(s.clone()),
            other => Value::Text(other.to_string()),
        }
    }
}

/// One feature's properties.
pub type Properties = BTreeMap<String, Value>;

/// A table of features; each property name is a column.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VectorTable {
    rows: Vec<Properties>,
}

impl VectorTable {
    pub fn new(rows: Vec<Properties>) -> Self {
        Self { rows }
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Properties] {
        &self.rows
    }

    /// True when at least one feature carries the property.
    pub fn has_column(&self, name: &str) -> bool {
        self.rows.iter().any(|r| r.contains_key(name))
    }

    /// Value of `name` in row `index`, `Value::Null` when absent.
    pub fn get(&self, index: usize, name: &str) -> &Value {
        self.rows
            .get(index)
            .and_then(|r| r.get(name))
            .unwrap_or(&Value::Null)
    }

    /// Numeric view of a column; non-numeric cells are `None`.
    pub fn column_f64(&self, name: &str) -> Vec<Option<f64>> {
        self.rows
            .iter()
            .map(|r| r.get(name).and_then(Value::as_f64))
            .collect()
    }

    /// Boolean view of a column; non-boolean cells are `None`.
    pub fn column_bool(&self, name: &str) -> Vec<Option<bool>> {
        self.rows
            .iter()
            .map(|r| r.get(name).and_then(Value::as_bool))
            .collect()
    }

    /// Keep only rows whose mask entry is `true`.
    pub fn filter(&self, keep: &[bool]) -> Result<VectorTable> {
        if keep.len() != self.rows.len() {
            return Err(RasterError::InvalidVector(format!(
                "mask has {} entries for {} rows",
                keep.len(),
                self.rows.len()
            )));
        }
        let rows = self
            .rows
            .iter()
            .zip(keep)
            .filter(|(_, k)| **k)
            .map(|(r, _)| r.clone())
            .collect();
        Ok(VectorTable { rows })
    }
}

/// Loads a staged vector tile into a table.
pub trait VectorReader {
    fn read(&self, path: &Path) -> Result<VectorTable>;
}

/// Reads GeoJSON `FeatureCollection` files. Geometry is ignored; the staged
/// centroid and area properties carry everything the rasterizer needs.
#[derive(Debug, Clone, Copy, Default)]
pub struct GeoJsonReader;

impl VectorReader for GeoJsonReader {
    fn read(&self, path: &Path) -> Result<VectorTable> {
        let text = std::fs::read_to_string(path)?;
        let doc: JsonValue = serde_json::from_str(&text)?;

        let features = doc
            .get("features")
            .and_then(JsonValue::as_array)
            .ok_or_else(|| {
                RasterError::InvalidVector(format!("{} is not a FeatureCollection", path.display()))
            })?;

        let rows = features
            .iter()
            .map(|f| {
                f.get("properties")
                    .and_then(JsonValue::as_object)
                    .map(|props| {
                        props
                            .iter()
                            .map(|(k, v)| (k.clone(), Value::from_json(v)))
                            .collect::<Properties>()
                    })
                    .unwrap_or_default()
            })
            .collect();

        Ok(VectorTable::new(rows))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const COLLECTION: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {"type": "Feature", "geometry": null,
             "properties": {"staging_centroid_x": 1.5, "staging_duplicated": false, "name": "a"}},
            {"type": "Feature", "geometry": null,
             "properties": {"staging_centroid_x": 2.5, "staging_duplicated": true, "name": null}},
            {"type": "Feature", "geometry": null, "properties": null}
        ]
    }"#;

    #[test]
    fn test_read_feature_collection() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("0.geojson");
        std::fs::write(&path, COLLECTION).unwrap();

        let table = GeoJsonReader.read(&path).unwrap();
        assert_eq!(table.len(), 3);
        assert_eq!(table.column_f64("staging_centroid_x"), vec![Some(1.5), Some(2.5), None]);
        assert_eq!(table.column_bool("staging_duplicated"), vec![Some(false), Some(true), None]);
        assert_eq!(table.get(0, "name"), &Value::Text("a".to_string()));
        assert_eq!(table.get(1, "name"), &Value::Null);
        assert!(table.has_column("name"));
        assert!(!table.has_column("area"));
    }

    #[test]
    fn test_not_a_collection() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("bad.geojson");
        std::fs::write(&path, r#"{"type": "Feature"}"#).unwrap();
        assert!(matches!(GeoJsonReader.read(&path), Err(RasterError::InvalidVector(_))));
    }

    #[test]
    fn test_filter_mask() {
        let mut row = Properties::new();
        row.insert("v".to_string(), Value::Number(1.0));
        let table = VectorTable::new(vec![row.clone(), row.clone(), row]);
        assert_eq!(table.filter(&[true, false, true]).unwrap().len(), 2);
        assert!(table.filter(&[true]).is_err());
    }
}
