//! Aggregation check variants.
//!
//! Aggregation compares the tested raster against the data it was
//! aggregated from. The source is either a finer raster (`aggregation_raster`,
//! with one of four statistic modes) or a polygon layer
//! (`aggregation_from_vector`). The two keys are mutually exclusive.

use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;

use crate::config::TestSpecifications;
use crate::dataset::Bounds;
use crate::error::{QcError, Result};

/// Statistic mode of a raster aggregation check.
#[derive(Debug, Clone, PartialEq)]
pub enum AggregationMode {
    /// Share of one class per aggregated pixel
    Binary {
        /// Class counted in the source raster
        raster_class: Option<Value>,
        /// Aggregation function, e.g. `mean`
        agg_function: String,
        /// Number of sampled pixels
        num_samples: u32,
    },
    /// Continuous values
    Continuous,
    /// Class boundaries detected by an edge filter
    Border {
        /// Class whose boundary is compared
        raster_class: Option<Value>,
        /// Edge filter, `prewitt` by default
        filter_type: String,
    },
    /// Pixels aggregated purely from nodata
    Nodata {
        /// Value expected where only nodata was aggregated
        unique_aggregated_value: Option<Value>,
        /// Number of sampled pixels
        num_samples: u32,
    },
}

impl AggregationMode {
    /// Check id implementing this mode.
    pub fn check_id(&self) -> &'static str {
        match self {
            Self::Binary { .. } => "aggregation_binary",
            Self::Continuous => "aggregation_cont",
            Self::Border { .. } => "aggregation_border",
            Self::Nodata { .. } => "aggregation_nodata",
        }
    }
}

/// Aggregation from a finer raster.
#[derive(Debug, Clone, PartialEq)]
pub struct RasterAggregation {
    /// Source raster
    pub input_file: PathBuf,
    /// Statistic mode
    pub mode: AggregationMode,
    /// NoData value of the source
    pub nodata_value: Option<f64>,
    /// Skip aggregated pixels built only from nodata
    pub exclude_all_nodata: bool,
}

/// Aggregation from the polygons of one attribute class.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct VectorAggregation {
    /// Source vector file
    pub input_file: PathBuf,
    /// Layer to read
    #[serde(default)]
    pub layer: Option<String>,
    /// Attribute used to select polygons
    pub attribute_name: String,
    /// Selected attribute value
    pub attribute_class: Value,
    /// Compare area shares rather than presence
    #[serde(default = "default_true")]
    pub extract_area: bool,
    /// Spatial filter applied while reading
    #[serde(default, deserialize_with = "deserialize_bbox")]
    pub bbox: Option<Bounds>,
    /// Resolution of the rasterised polygons
    #[serde(default = "default_input_res", rename = "input_res")]
    pub input_resolution: f64,
    /// Number of sampled pixels
    #[serde(default = "default_samples")]
    pub num_samples: u32,
    /// NoData value of the tested raster
    #[serde(default)]
    pub nodata_value: Option<f64>,
    /// Skip aggregated pixels built only from nodata
    #[serde(default = "default_true")]
    pub exclude_all_nodata: bool,
}

/// Configured aggregation check.
#[derive(Debug, Clone, PartialEq)]
pub enum Aggregation {
    /// `aggregation_raster`
    Raster(RasterAggregation),
    /// `aggregation_from_vector`
    FromVector(VectorAggregation),
}

impl Aggregation {
    /// Configuration key enabling this variant.
    pub fn key(&self) -> &'static str {
        match self {
            Self::Raster(_) => "aggregation_raster",
            Self::FromVector(_) => "aggregation_from_vector",
        }
    }

    /// Read the aggregation variant from the enabled tests.
    pub fn from_tests(tests: &TestSpecifications) -> Result<Option<Self>> {
        let raster = tests.get("aggregation_raster").filter(|s| s.is_truthy());
        let vector = tests.get("aggregation_from_vector").filter(|s| s.is_truthy());

        match (raster, vector) {
            (Some(_), Some(_)) => Err(QcError::InvalidConfig(
                "aggregation_raster and aggregation_from_vector are mutually exclusive".to_string(),
            )),
            (Some(spec), None) => {
                let raw: RawRasterAggregation = serde_json::from_value(spec.value().clone())
                    .map_err(|e| QcError::InvalidConfig(format!("aggregation_raster: {}", e)))?;
                Ok(Some(Self::Raster(raw.into_aggregation()?)))
            }
            (None, Some(spec)) => {
                let parsed: VectorAggregation = serde_json::from_value(spec.value().clone())
                    .map_err(|e| QcError::InvalidConfig(format!("aggregation_from_vector: {}", e)))?;
                Ok(Some(Self::FromVector(parsed)))
            }
            (None, None) => Ok(None),
        }
    }
}

#[derive(Deserialize)]
struct RawRasterAggregation {
    input_file: PathBuf,
    #[serde(default = "default_agg_check")]
    agg_check: String,
    #[serde(default = "default_agg_function")]
    agg_function: String,
    #[serde(default = "default_true")]
    exclude_all_nodata: bool,
    #[serde(default = "default_samples")]
    num_samples: u32,
    #[serde(default)]
    nodata_value: Option<f64>,
    #[serde(default)]
    raster_class: Option<Value>,
    #[serde(default = "default_filter")]
    filter_type: String,
    #[serde(default)]
    unique_aggregated_value: Option<Value>,
}

impl RawRasterAggregation {
    fn into_aggregation(self) -> Result<RasterAggregation> {
        let (mode, exclude_all_nodata) = match self.agg_check.as_str() {
            "binary" => (
                AggregationMode::Binary {
                    raster_class: self.raster_class,
                    agg_function: self.agg_function,
                    num_samples: self.num_samples,
                },
                self.exclude_all_nodata,
            ),
            "cont" => (AggregationMode::Continuous, self.exclude_all_nodata),
            "border" => (
                AggregationMode::Border {
                    raster_class: self.raster_class,
                    filter_type: self.filter_type,
                },
                true,
            ),
            "nodata" => (
                AggregationMode::Nodata {
                    unique_aggregated_value: self.unique_aggregated_value,
                    num_samples: self.num_samples,
                },
                false,
            ),
            other => {
                return Err(QcError::InvalidConfig(format!(
                    "unknown agg_check '{}', expected binary, cont, border or nodata",
                    other
                )))
            }
        };

        // Border detection runs on class edges only, nodata is not used.
        let nodata_value = match mode {
            AggregationMode::Border { .. } => None,
            _ => self.nodata_value,
        };

        Ok(RasterAggregation {
            input_file: self.input_file,
            mode,
            nodata_value,
            exclude_all_nodata,
        })
    }
}

fn deserialize_bbox<'de, D>(deserializer: D) -> std::result::Result<Option<Bounds>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let values: Option<Vec<f64>> = Option::deserialize(deserializer)?;
    match values {
        None => Ok(None),
        Some(v) => Bounds::from_slice(&v)
            .map(Some)
            .ok_or_else(|| serde::de::Error::custom("bbox needs four numbers")),
    }
}

fn default_true() -> bool {
    true
}

fn default_samples() -> u32 {
    10
}

fn default_input_res() -> f64 {
    10.0
}

fn default_agg_check() -> String {
    "binary".to_string()
}

fn default_agg_function() -> String {
    "mean".to_string()
}

fn default_filter() -> String {
    "prewitt".to_string()
}
