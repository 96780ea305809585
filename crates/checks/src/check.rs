//! Check abstraction.

use geoqc_core::{CheckResult, RasterProfile, Specification, VectorLayer};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;

use crate::backend::{BackendError, GeoBackend, RasterHandle};

/// A check that can be run against a dataset.
pub trait QcCheck: Send + Sync {
    /// Check id, used to look it up in the catalog.
    fn id(&self) -> &str;

    /// Short description.
    fn description(&self) -> &str;

    /// Input shape the check expects.
    fn input_kind(&self) -> InputKind;

    /// Run the check.
    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError>;
}

/// Input shapes a check can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputKind {
    /// Path of the tested file
    File,
    /// Parsed raster profile
    RasterProfile,
    /// Open raster dataset
    RasterHandle,
    /// In-memory vector layer
    VectorLayer,
}

impl InputKind {
    /// Parse the `input` field of an external check definition.
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "file" | "path" => Some(Self::File),
            "profile" => Some(Self::RasterProfile),
            "vector" | "layer" => Some(Self::VectorLayer),
            _ => None,
        }
    }
}

/// Prepared input handed to a check.
#[derive(Clone, Copy)]
pub enum CheckInput<'a> {
    /// Path of the tested file
    File(&'a Path),
    /// Parsed raster profile
    RasterProfile(&'a RasterProfile),
    /// Open raster dataset
    RasterHandle(&'a dyn RasterHandle),
    /// In-memory vector layer, possibly pre-filtered
    VectorLayer(&'a VectorLayer),
}

impl<'a> CheckInput<'a> {
    /// Shape of this input.
    pub fn kind(&self) -> InputKind {
        match self {
            Self::File(_) => InputKind::File,
            Self::RasterProfile(_) => InputKind::RasterProfile,
            Self::RasterHandle(_) => InputKind::RasterHandle,
            Self::VectorLayer(_) => InputKind::VectorLayer,
        }
    }

    /// The path, or an input mismatch error.
    pub fn file(&self) -> Result<&'a Path, CheckError> {
        match *self {
            Self::File(path) => Ok(path),
            other => Err(CheckError::mismatch(InputKind::File, other.kind())),
        }
    }

    /// The raster profile, or an input mismatch error.
    pub fn profile(&self) -> Result<&'a RasterProfile, CheckError> {
        match *self {
            Self::RasterProfile(profile) => Ok(profile),
            other => Err(CheckError::mismatch(InputKind::RasterProfile, other.kind())),
        }
    }

    /// The raster handle, or an input mismatch error.
    pub fn raster(&self) -> Result<&'a dyn RasterHandle, CheckError> {
        match *self {
            Self::RasterHandle(handle) => Ok(handle),
            other => Err(CheckError::mismatch(InputKind::RasterHandle, other.kind())),
        }
    }

    /// The vector layer, or an input mismatch error.
    pub fn vector(&self) -> Result<&'a VectorLayer, CheckError> {
        match *self {
            Self::VectorLayer(layer) => Ok(layer),
            other => Err(CheckError::mismatch(InputKind::VectorLayer, other.kind())),
        }
    }
}

impl std::fmt::Debug for CheckInput<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::File(path) => f.debug_tuple("File").field(path).finish(),
            Self::RasterProfile(profile) => f.debug_tuple("RasterProfile").field(profile).finish(),
            Self::RasterHandle(_) => f.write_str("RasterHandle(..)"),
            Self::VectorLayer(layer) => f
                .debug_struct("VectorLayer")
                .field("driver", &layer.driver)
                .field("features", &layer.features.len())
                .finish(),
        }
    }
}

/// Extra named parameters for a check call.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CheckOptions(BTreeMap<String, Value>);

impl CheckOptions {
    /// No options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an option.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Set an option if a value is present.
    pub fn with_opt<V: Into<Value>>(self, key: impl Into<String>, value: Option<V>) -> Self {
        match value {
            Some(v) => self.with(key, v),
            None => self,
        }
    }

    /// Raw option value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// String option.
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Value::as_str)
    }

    /// Numeric option.
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(Value::as_f64)
    }

    /// Boolean option.
    pub fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(Value::as_bool)
    }

    /// Iterate over all options.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }

    /// Options as a JSON object.
    pub fn to_json(&self) -> Value {
        Value::Object(self.0.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
    }
}

/// Everything a check may use besides its input and specification.
pub struct CheckContext<'a> {
    /// Dataset access
    pub backend: &'a dyn GeoBackend,

    /// Named parameters of this call
    pub options: &'a CheckOptions,
}

/// Errors a check may raise instead of producing a result.
#[derive(Debug, thiserror::Error)]
pub enum CheckError {
    /// Dataset access failed
    #[error(transparent)]
    Backend(#[from] BackendError),

    /// The specification has an unusable shape
    #[error("Invalid specification: {0}")]
    InvalidSpecification(String),

    /// The check was handed the wrong input shape
    #[error("Expected {expected:?} input, got {actual:?}")]
    InputMismatch {
        /// Declared input
        expected: InputKind,
        /// Supplied input
        actual: InputKind,
    },

    /// An external check command failed
    #[error("Command failed: {0}")]
    Command(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CheckError {
    pub(crate) fn mismatch(expected: InputKind, actual: InputKind) -> Self {
        Self::InputMismatch { expected, actual }
    }

    pub(crate) fn spec(message: impl Into<String>) -> Self {
        Self::InvalidSpecification(message.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_accessors() {
        let path = Path::new("/data/a.tif");
        let input = CheckInput::File(path);
        assert_eq!(input.kind(), InputKind::File);
        assert_eq!(input.file().unwrap(), path);
        assert!(matches!(
            input.vector(),
            Err(CheckError::InputMismatch { expected: InputKind::VectorLayer, actual: InputKind::File })
        ));
    }

    #[test]
    fn test_options() {
        let options = CheckOptions::new()
            .with("value_field", "Value")
            .with("samples", 10)
            .with_opt("nodata", None::<f64>)
            .with_opt("mask", Some(true));
        assert_eq!(options.get_str("value_field"), Some("Value"));
        assert_eq!(options.get_f64("samples"), Some(10.0));
        assert_eq!(options.get("nodata"), None);
        assert_eq!(options.get_bool("mask"), Some(true));
        assert_eq!(options.to_json()["samples"], json!(10));
    }

    #[test]
    fn test_input_kind_parse() {
        assert_eq!(InputKind::parse("file"), Some(InputKind::File));
        assert_eq!(InputKind::parse("profile"), Some(InputKind::RasterProfile));
        assert_eq!(InputKind::parse("vector"), Some(InputKind::VectorLayer));
        assert_eq!(InputKind::parse("reader"), None);
    }
}
