//! Dataset descriptions handed to checks.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;

/// Bounding box in dataset coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    /// Minimum x
    pub min_x: f64,
    /// Minimum y
    pub min_y: f64,
    /// Maximum x
    pub max_x: f64,
    /// Maximum y
    pub max_y: f64,
}

impl Bounds {
    /// Create bounds from `[min_x, min_y, max_x, max_y]`.
    pub fn from_slice(values: &[f64]) -> Option<Self> {
        match values {
            [min_x, min_y, max_x, max_y] => Some(Self {
                min_x: *min_x,
                min_y: *min_y,
                max_x: *max_x,
                max_y: *max_y,
            }),
            _ => None,
        }
    }

    /// `[min_x, min_y, max_x, max_y]`
    pub fn to_array(&self) -> [f64; 4] {
        [self.min_x, self.min_y, self.max_x, self.max_y]
    }

    /// Whether every edge is within `tolerance` of the other box.
    pub fn approx_eq(&self, other: &Bounds, tolerance: f64) -> bool {
        self.to_array()
            .iter()
            .zip(other.to_array().iter())
            .all(|(a, b)| (a - b).abs() <= tolerance)
    }
}

/// Pixel value -> RGBA entry.
pub type Colormap = BTreeMap<i64, [u8; 4]>;

/// Parsed raster profile (creation options and layout).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterProfile {
    /// GDAL driver short name, e.g. `GTiff`
    pub driver: String,

    /// Data type of the first band, e.g. `uint8`
    pub dtype: String,

    /// NoData value
    #[serde(default)]
    pub nodata: Option<f64>,

    /// Width in pixels
    pub width: u64,

    /// Height in pixels
    pub height: u64,

    /// Number of bands
    pub count: u32,

    /// CRS identifier, e.g. `EPSG:3035`
    #[serde(default)]
    pub crs: Option<String>,

    /// Internal tiling
    #[serde(default)]
    pub tiled: bool,

    /// Block width
    #[serde(default)]
    pub blockxsize: Option<u32>,

    /// Block height
    #[serde(default)]
    pub blockysize: Option<u32>,

    /// Compression, e.g. `lzw`
    #[serde(default)]
    pub compress: Option<String>,
}

/// A single vector feature: its attributes and area in CRS units.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    /// Attribute values
    #[serde(default)]
    pub attributes: Map<String, Value>,

    /// Geometry area
    #[serde(default)]
    pub area: f64,

    /// Geometry validity as reported by the backend
    #[serde(default = "default_true")]
    pub valid: bool,
}

fn default_true() -> bool {
    true
}

/// An in-memory vector layer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorLayer {
    /// OGR driver short name, e.g. `GPKG`
    pub driver: String,

    /// Layer name
    #[serde(default)]
    pub name: Option<String>,

    /// CRS identifier
    #[serde(default)]
    pub crs: Option<String>,

    /// Attribute field names in declaration order
    #[serde(default)]
    pub fields: Vec<String>,

    /// Features
    #[serde(default)]
    pub features: Vec<Feature>,
}

impl VectorLayer {
    /// Features whose `attribute` equals `class`.
    ///
    /// When nothing matches, values are compared as strings so that a
    /// numeric class also selects text-typed attributes.
    pub fn select(&self, attribute: &str, class: &Value) -> VectorLayer {
        let exact: Vec<Feature> = self
            .features
            .iter()
            .filter(|f| f.attributes.get(attribute) == Some(class))
            .cloned()
            .collect();

        let features = if exact.is_empty() {
            let wanted = value_text(class);
            self.features
                .iter()
                .filter(|f| f.attributes.get(attribute).map(value_text).as_deref() == Some(wanted.as_str()))
                .cloned()
                .collect()
        } else {
            exact
        };

        VectorLayer {
            features,
            ..self.clone_empty()
        }
    }

    /// Values of one attribute over all features that carry it.
    pub fn values(&self, attribute: &str) -> Vec<&Value> {
        self.features
            .iter()
            .filter_map(|f| f.attributes.get(attribute))
            .collect()
    }

    /// Same layer metadata, no features.
    pub fn clone_empty(&self) -> VectorLayer {
        VectorLayer {
            driver: self.driver.clone(),
            name: self.name.clone(),
            crs: self.crs.clone(),
            fields: self.fields.clone(),
            features: Vec::new(),
        }
    }
}

fn value_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Which part of a vector source to read.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VectorQuery {
    /// Layer name; first layer when absent
    #[serde(default)]
    pub layer: Option<String>,

    /// Spatial filter
    #[serde(default)]
    pub bbox: Option<Bounds>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn feature(class: Value) -> Feature {
        let mut attributes = Map::new();
        attributes.insert("code".to_string(), class);
        Feature {
            attributes,
            area: 100.0,
            valid: true,
        }
    }

    #[test]
    fn test_select_exact() {
        let layer = VectorLayer {
            driver: "GPKG".to_string(),
            features: vec![feature(json!(1)), feature(json!(2)), feature(json!(1))],
            ..Default::default()
        };
        let selected = layer.select("code", &json!(1));
        assert_eq!(selected.features.len(), 2);
        assert_eq!(selected.driver, "GPKG");
    }

    #[test]
    fn test_select_falls_back_to_text() {
        let layer = VectorLayer {
            driver: "ESRI Shapefile".to_string(),
            features: vec![feature(json!("311")), feature(json!("312"))],
            ..Default::default()
        };
        let selected = layer.select("code", &json!(311));
        assert_eq!(selected.features.len(), 1);
    }

    #[test]
    fn test_bounds_tolerance() {
        let a = Bounds::from_slice(&[0.0, 0.0, 10.0, 10.0]).unwrap();
        let b = Bounds::from_slice(&[0.0, 0.0, 10.0, 10.0000001]).unwrap();
        assert!(a.approx_eq(&b, 1e-6));
        assert!(!a.approx_eq(&b, 1e-9));
        assert!(Bounds::from_slice(&[1.0, 2.0]).is_none());
    }
}
