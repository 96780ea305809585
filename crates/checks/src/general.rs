//! Checks independent of the data format: CRS, extent, filename,
//! ancillary files, attributes and value range.

use geoqc_core::{Bounds, CheckResult, Specification};
use regex::Regex;
use serde_json::Value;
use std::path::{Path, PathBuf};

use crate::check::{CheckContext, CheckError, CheckInput, InputKind, QcCheck};
use crate::property::{outcome, Comparison};

/// Option set by the engine when the specification is a reference dataset.
pub const REFERENCE_OPTION: &str = "reference";

/// Coordinate reference system.
///
/// The specification is a CRS identifier (`EPSG:3035`, or a bare EPSG code),
/// a list of accepted identifiers, or a reference dataset path when the
/// `reference` option is set.
pub struct CrsCheck;

impl QcCheck for CrsCheck {
    fn id(&self) -> &str {
        "crs"
    }

    fn description(&self) -> &str {
        "Coordinate reference system matches the specification"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::File
    }

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let path = input.file()?;
        let tested = ctx.backend.crs(path)?;

        let expected: Vec<String> = if ctx.options.get_bool(REFERENCE_OPTION) == Some(true) {
            let reference = specification
                .as_str()
                .ok_or_else(|| CheckError::spec("reference dataset must be a path"))?;
            vec![ctx.backend.crs(Path::new(reference))?]
        } else {
            match specification.value() {
                Value::Number(n) => vec![format!("EPSG:{}", n)],
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|v| match v {
                        Value::Number(n) => format!("EPSG:{}", n),
                        other => other.as_str().map(str::to_string).unwrap_or_else(|| other.to_string()),
                    })
                    .collect(),
                other => return Err(CheckError::spec(format!("unsupported CRS specification {}", other))),
            }
        };

        let passed = expected.iter().any(|e| normalize_crs(e) == normalize_crs(&tested));
        Ok(outcome(passed, expected.join(", "), tested, Comparison::Eq))
    }
}

fn normalize_crs(crs: &str) -> String {
    crs.trim().to_uppercase().replace(' ', "")
}

/// Dataset extent.
///
/// The specification is `[min_x, min_y, max_x, max_y]` or, with the
/// `reference` option, a reference dataset path. The `tolerance` option
/// (default `1e-6`) bounds the allowed difference per edge.
pub struct ExtentCheck;

impl QcCheck for ExtentCheck {
    fn id(&self) -> &str {
        "extent"
    }

    fn description(&self) -> &str {
        "Extent matches the bounding box or the reference dataset"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::File
    }

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let path = input.file()?;
        let tested = ctx.backend.bounds(path)?;
        let tolerance = ctx.options.get_f64("tolerance").unwrap_or(1e-6);

        let expected = if ctx.options.get_bool(REFERENCE_OPTION) == Some(true) {
            let reference = specification
                .as_str()
                .ok_or_else(|| CheckError::spec("reference dataset must be a path"))?;
            ctx.backend.bounds(Path::new(reference))?
        } else {
            specification
                .as_f64_list()
                .as_deref()
                .and_then(Bounds::from_slice)
                .ok_or_else(|| CheckError::spec("extent needs [min_x, min_y, max_x, max_y]"))?
        };

        let passed = tested.approx_eq(&expected, tolerance);
        Ok(outcome(
            passed,
            format!("{:?}", expected.to_array()),
            format!("{:?}", tested.to_array()),
            Comparison::Eq,
        ))
    }
}

/// Filename conventions.
///
/// The specification is one regular expression, or a list of them, that the
/// file stem must fully match. The optional `extension` option lists the
/// accepted extensions.
pub struct FilenameCheck;

impl QcCheck for FilenameCheck {
    fn id(&self) -> &str {
        "filename"
    }

    fn description(&self) -> &str {
        "File name matches the naming convention"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::File
    }

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let path = input.file()?;
        let file_name = path
            .file_name()
            .and_then(|n| n.to_str())
            .unwrap_or_default();
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

        let patterns = match specification.value() {
            Value::String(s) => vec![s.clone()],
            Value::Array(_) => specification.as_string_list().unwrap_or_default(),
            other => return Err(CheckError::spec(format!("unsupported filename specification {}", other))),
        };

        let mut info = Vec::new();
        let mut name_ok = false;
        for pattern in &patterns {
            let re = Regex::new(&format!("^(?:{})$", pattern))
                .map_err(|e| CheckError::spec(format!("invalid pattern '{}': {}", pattern, e)))?;
            if re.is_match(stem) {
                name_ok = true;
                break;
            }
        }
        if !name_ok {
            info.push(format!("'{}' matches none of the naming patterns", stem));
        }

        let accepted_ext: Vec<String> = ctx
            .options
            .get("extension")
            .map(|v| Specification::new(v.clone()).as_string_list().unwrap_or_default())
            .unwrap_or_default()
            .into_iter()
            .map(|e| e.trim_start_matches('.').to_lowercase())
            .collect();
        let ext_ok = accepted_ext.is_empty() || accepted_ext.contains(&extension.to_lowercase());
        if !ext_ok {
            info.push(format!("extension '{}' not in {:?}", extension, accepted_ext));
        }

        let mut rendered = patterns.join(" | ");
        if !accepted_ext.is_empty() {
            rendered.push_str(&format!(" (.{})", accepted_ext.join(", .")));
        }
        Ok(outcome(name_ok && ext_ok, rendered, file_name, Comparison::Eq).with_info_lines(info))
    }
}

/// Existence of an ancillary file (metadata, legend, quicklook ...).
///
/// The specification is a mapping with optional `filename`, `ext` and
/// `folder`. Missing parts default to the tested file's stem and folder.
pub struct AncillaryFileCheck;

impl AncillaryFileCheck {
    /// Location the ancillary file is expected at.
    pub fn expected_path(tested: &Path, specification: &Specification) -> PathBuf {
        let folder = specification
            .get("folder")
            .and_then(|f| f.as_str().map(PathBuf::from))
            .or_else(|| tested.parent().map(Path::to_path_buf))
            .unwrap_or_default();
        let name = specification
            .get("filename")
            .and_then(|f| f.as_str().map(str::to_string))
            .unwrap_or_else(|| tested.to_string_lossy().into_owned());
        let stem = Path::new(&name)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or(name);
        match specification.get("ext").and_then(|e| e.as_str().map(str::to_string)) {
            Some(ext) => folder.join(format!("{}.{}", stem, ext.trim_start_matches('.'))),
            None => folder.join(stem),
        }
    }
}

impl QcCheck for AncillaryFileCheck {
    fn id(&self) -> &str {
        "ancillary_file"
    }

    fn description(&self) -> &str {
        "Ancillary file exists next to the dataset"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::File
    }

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let expected = Self::expected_path(input.file()?, specification);
        let found = expected.exists();
        let tested = if found { "found" } else { "missing" };
        Ok(outcome(found, expected.display(), tested, Comparison::Eq))
    }
}

/// Attribute table columns.
///
/// The specification lists the required column names. The input is the
/// raster attribute table or the vector layer itself.
pub struct AttributesCheck;

impl QcCheck for AttributesCheck {
    fn id(&self) -> &str {
        "attributes"
    }

    fn description(&self) -> &str {
        "Attribute table has the required columns"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::VectorLayer
    }

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let layer = input.vector()?;
        let required = specification
            .as_string_list()
            .ok_or_else(|| CheckError::spec("attributes must be a list or a comma-separated string"))?;

        let missing: Vec<&String> = required
            .iter()
            .filter(|name| !layer.fields.iter().any(|f| f.eq_ignore_ascii_case(name)))
            .collect();

        let mut result = outcome(
            missing.is_empty(),
            required.join(", "),
            layer.fields.join(", "),
            Comparison::Eq,
        );
        if !missing.is_empty() {
            result = result.with_info(format!(
                "Missing attributes: {}",
                missing.iter().map(|s| s.as_str()).collect::<Vec<_>>().join(", ")
            ));
        }
        Ok(result)
    }
}

/// Valid value range of an attribute column.
///
/// The specification is `[min, max]`; the `value_field` option names the
/// column (`Value` by default).
pub struct ValueRangeCheck;

impl QcCheck for ValueRangeCheck {
    fn id(&self) -> &str {
        "valid_value_range"
    }

    fn description(&self) -> &str {
        "Attribute values lie within the valid range"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::VectorLayer
    }

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let layer = input.vector()?;
        let field = ctx.options.get_str("value_field").unwrap_or("Value");
        let (min, max) = match specification.as_f64_list().as_deref() {
            Some([min, max]) => (*min, *max),
            _ => return Err(CheckError::spec("valid_value_range needs [min, max]")),
        };
        let rendered = format!("[{}, {}]", min, max);

        let values = layer.values(field);
        if values.is_empty() {
            return Ok(outcome(false, rendered, "no values", Comparison::Eq)
                .with_info(format!("Field '{}' not found or empty", field)));
        }

        let numbers: Vec<f64> = values
            .iter()
            .filter_map(|v| Specification::new((*v).clone()).as_f64())
            .collect();
        let non_numeric = values.len() - numbers.len();
        let outside = numbers.iter().filter(|v| **v < min || **v > max).count();

        let observed_min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
        let observed_max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        let tested = if numbers.is_empty() {
            "no numeric values".to_string()
        } else {
            format!("[{}, {}]", observed_min, observed_max)
        };

        let mut result = outcome(outside == 0 && non_numeric == 0, rendered, tested, Comparison::Eq);
        if outside > 0 {
            result = result.with_info(format!("{} values outside the valid range", outside));
        }
        if non_numeric > 0 {
            result = result.with_info(format!("{} non-numeric values", non_numeric));
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DatasetDescriptor, MemoryBackend};
    use crate::check::CheckOptions;
    use geoqc_core::{Feature, Outcome, VectorLayer};
    use serde_json::json;

    fn backend() -> MemoryBackend {
        MemoryBackend::new()
            .with_dataset(
                "/data/tile.tif",
                DatasetDescriptor {
                    crs: Some("EPSG:3035".to_string()),
                    bounds: Bounds::from_slice(&[0.0, 0.0, 100.0, 100.0]),
                    ..Default::default()
                },
            )
            .with_dataset(
                "/ref/ref.tif",
                DatasetDescriptor {
                    crs: Some("EPSG:3035".to_string()),
                    bounds: Bounds::from_slice(&[0.0, 0.0, 100.0, 200.0]),
                    ..Default::default()
                },
            )
    }

    fn run(check: &dyn QcCheck, options: &CheckOptions, input: CheckInput<'_>, spec: Value) -> CheckResult {
        let backend = backend();
        let ctx = CheckContext { backend: &backend, options };
        check.run(&ctx, &input, &Specification::new(spec)).unwrap()
    }

    #[test]
    fn test_crs_match() {
        let path = Path::new("/data/tile.tif");
        let result = run(&CrsCheck, &CheckOptions::new(), CheckInput::File(path), json!("epsg:3035"));
        assert!(result.is_passed());
        let result = run(&CrsCheck, &CheckOptions::new(), CheckInput::File(path), json!(3035));
        assert!(result.is_passed());
        let result = run(&CrsCheck, &CheckOptions::new(), CheckInput::File(path), json!(["EPSG:4326"]));
        assert_eq!(result.outcome, Outcome::Failed);
    }

    #[test]
    fn test_crs_reference() {
        let options = CheckOptions::new().with(REFERENCE_OPTION, true);
        let result = run(&CrsCheck, &options, CheckInput::File(Path::new("/data/tile.tif")), json!("/ref/ref.tif"));
        assert!(result.is_passed());
    }

    #[test]
    fn test_extent() {
        let path = Path::new("/data/tile.tif");
        let result = run(&ExtentCheck, &CheckOptions::new(), CheckInput::File(path), json!([0, 0, 100, 100]));
        assert!(result.is_passed());

        let options = CheckOptions::new().with(REFERENCE_OPTION, true);
        let result = run(&ExtentCheck, &options, CheckInput::File(path), json!("/ref/ref.tif"));
        assert!(!result.is_passed());
    }

    #[test]
    fn test_extent_bad_specification() {
        let backend = backend();
        let options = CheckOptions::new();
        let ctx = CheckContext { backend: &backend, options: &options };
        let err = ExtentCheck
            .run(&ctx, &CheckInput::File(Path::new("/data/tile.tif")), &Specification::new(json!([1, 2])))
            .unwrap_err();
        assert!(matches!(err, CheckError::InvalidSpecification(_)));
    }

    #[test]
    fn test_filename() {
        let path = Path::new("/data/CLMS_HRL_30SVH_3035_V010.tif");
        let options = CheckOptions::new().with("extension", json!(["tif", ".TIFF"]));
        let result = run(&FilenameCheck, &options, CheckInput::File(path), json!(r"CLMS_HRL_\w{5}_\d{4}_V\d{3}"));
        assert!(result.is_passed(), "{}", result.message());

        let options = CheckOptions::new().with("extension", "gpkg");
        let result = run(&FilenameCheck, &options, CheckInput::File(path), json!(["foo", "bar"]));
        assert!(!result.is_passed());
        assert_eq!(result.info.len(), 2);
    }

    #[test]
    fn test_ancillary_file() {
        let dir = tempfile::tempdir().unwrap();
        let tested = dir.path().join("tile.tif");
        std::fs::write(dir.path().join("tile.xml"), "<metadata/>").unwrap();

        let result = run(&AncillaryFileCheck, &CheckOptions::new(), CheckInput::File(&tested), json!({"ext": "xml"}));
        assert!(result.is_passed());
        let result = run(&AncillaryFileCheck, &CheckOptions::new(), CheckInput::File(&tested), json!({"ext": ".clr"}));
        assert!(!result.is_passed());
    }

    #[test]
    fn test_ancillary_expected_path() {
        let spec = Specification::new(json!({"filename": "legend.qml", "ext": "qml", "folder": "/styles"}));
        assert_eq!(
            AncillaryFileCheck::expected_path(Path::new("/data/tile.tif"), &spec),
            PathBuf::from("/styles/legend.qml")
        );
    }

    fn table(values: &[Value]) -> VectorLayer {
        VectorLayer {
            driver: "ESRI Shapefile".to_string(),
            fields: vec!["Value".to_string(), "Count".to_string()],
            features: values
                .iter()
                .map(|v| {
                    let mut attributes = serde_json::Map::new();
                    attributes.insert("Value".to_string(), v.clone());
                    Feature { attributes, area: 0.0, valid: true }
                })
                .collect(),
            ..Default::default()
        }
    }

    #[test]
    fn test_attributes() {
        let layer = table(&[]);
        let result = run(&AttributesCheck, &CheckOptions::new(), CheckInput::VectorLayer(&layer), json!("value, Count"));
        assert!(result.is_passed());
        let result = run(&AttributesCheck, &CheckOptions::new(), CheckInput::VectorLayer(&layer), json!(["Value", "Class"]));
        assert!(!result.is_passed());
        assert_eq!(result.info, vec!["Missing attributes: Class"]);
    }

    #[test]
    fn test_value_range() {
        let layer = table(&[json!(1), json!(2), json!(254)]);
        let result = run(&ValueRangeCheck, &CheckOptions::new(), CheckInput::VectorLayer(&layer), json!([0, 255]));
        assert!(result.is_passed());
        assert_eq!(result.tested, "[1, 254]");

        let result = run(&ValueRangeCheck, &CheckOptions::new(), CheckInput::VectorLayer(&layer), json!([0, 100]));
        assert!(!result.is_passed());
        assert_eq!(result.info, vec!["1 values outside the valid range"]);
    }

    #[test]
    fn test_value_range_missing_field() {
        let layer = table(&[json!(1)]);
        let options = CheckOptions::new().with("value_field", "Class");
        let result = run(&ValueRangeCheck, &options, CheckInput::VectorLayer(&layer), json!([0, 1]));
        assert!(!result.is_passed());
    }
}
