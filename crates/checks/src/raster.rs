//! Raster property checks.

use geoqc_core::{CheckResult, Colormap, Specification};
use serde_json::Value;

use crate::check::{CheckContext, CheckError, CheckInput, InputKind, QcCheck};
use crate::property::{check_property, outcome, Comparison};

macro_rules! check_meta {
    ($id:literal, $description:literal, $kind:expr) => {
        fn id(&self) -> &str {
            $id
        }

        fn description(&self) -> &str {
            $description
        }

        fn input_kind(&self) -> InputKind {
            $kind
        }
    };
}

/// Data type of every band.
pub struct DataTypeCheck;

impl QcCheck for DataTypeCheck {
    check_meta!("data_type", "All bands have the specified data type", InputKind::RasterHandle);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let raster = input.raster()?;
        let expected = specification
            .as_str()
            .ok_or_else(|| CheckError::spec("data_type must be a string"))?
            .to_lowercase();
        let dtypes = raster.dtypes();
        let passed = !dtypes.is_empty() && dtypes.iter().all(|d| d.to_lowercase() == expected);
        Ok(outcome(passed, expected, dtypes.join(", "), Comparison::Eq))
    }
}

/// Raster driver.
pub struct RasterDriverCheck;

impl QcCheck for RasterDriverCheck {
    check_meta!("raster_driver", "Raster is written with the specified driver", InputKind::RasterProfile);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let profile = input.profile()?;
        let expected = specification
            .as_str()
            .ok_or_else(|| CheckError::spec("raster_driver must be a string"))?;
        Ok(check_property(profile.driver.as_str(), expected, Comparison::Eq))
    }
}

/// Pixel size. The specification is one number or `[x, y]`.
pub struct ResolutionCheck;

impl QcCheck for ResolutionCheck {
    check_meta!("resolution", "Pixel size matches the specification", InputKind::RasterHandle);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let raster = input.raster()?;
        let (x, y) = raster.resolution();
        let (ex, ey) = match (specification.as_f64(), specification.as_f64_list().as_deref()) {
            (Some(v), _) => (v, v),
            (None, Some([ex, ey])) => (*ex, *ey),
            _ => return Err(CheckError::spec("resolution must be a number or [x, y]")),
        };
        // Geotransforms store y as negative, compare magnitudes.
        let passed = (x.abs() - ex.abs()).abs() < 1e-9 && (y.abs() - ey.abs()).abs() < 1e-9;
        Ok(outcome(
            passed,
            format!("({}, {})", ex, ey),
            format!("({}, {})", x.abs(), y.abs()),
            Comparison::Eq,
        ))
    }
}

/// NoData value.
pub struct NodataCheck;

impl QcCheck for NodataCheck {
    check_meta!("nodata", "NoData value matches the specification", InputKind::RasterHandle);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let raster = input.raster()?;
        let expected = specification
            .as_f64()
            .ok_or_else(|| CheckError::spec("nodata must be a number"))?;
        let tested = raster.nodata();
        let passed = tested.map_or(false, |v| v == expected || (v.is_nan() && expected.is_nan()));
        let rendered = tested.map_or_else(|| "None".to_string(), |v| v.to_string());
        Ok(outcome(passed, expected, rendered, Comparison::Eq))
    }
}

/// Compression, compared case-insensitively.
pub struct CompressionCheck;

impl QcCheck for CompressionCheck {
    check_meta!("compression", "Raster uses the specified compression", InputKind::RasterProfile);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let profile = input.profile()?;
        let expected = specification
            .as_str()
            .ok_or_else(|| CheckError::spec("compression must be a string"))?
            .to_lowercase();
        let tested = profile
            .compress
            .as_deref()
            .map(str::to_lowercase)
            .unwrap_or_else(|| "none".to_string());
        Ok(check_property(tested.as_str(), expected.as_str(), Comparison::Eq))
    }
}

/// Internal block size. The specification is one number or `[x, y]`.
pub struct BlocksizeCheck;

impl QcCheck for BlocksizeCheck {
    check_meta!("blocksize", "Internal tiles have the specified size", InputKind::RasterProfile);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let profile = input.profile()?;
        let expected = match (specification.as_f64(), specification.as_f64_list().as_deref()) {
            (Some(v), _) => {
                let size = whole::<u32>(v, "blocksize")?;
                (size, size)
            }
            (None, Some([x, y])) => (whole::<u32>(*x, "blocksize")?, whole::<u32>(*y, "blocksize")?),
            _ => return Err(CheckError::spec("blocksize must be a number or [x, y]")),
        };
        let tested = (profile.blockxsize.unwrap_or(0), profile.blockysize.unwrap_or(0));
        let mut result = outcome(
            tested == expected,
            format!("[{}, {}]", expected.0, expected.1),
            format!("[{}, {}]", tested.0, tested.1),
            Comparison::Eq,
        );
        if !profile.tiled {
            result = result.with_info("Raster is not tiled");
        }
        Ok(result)
    }
}

/// Number of bands.
pub struct BandsCheck;

impl QcCheck for BandsCheck {
    check_meta!("bands", "Raster has the specified number of bands", InputKind::RasterProfile);

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let profile = input.profile()?;
        let expected = specification
            .as_f64()
            .ok_or_else(|| CheckError::spec("bands must be a number"))?;
        let expected = whole::<u32>(expected, "bands")?;
        Ok(check_property(&profile.count, &expected, Comparison::Eq))
    }
}

/// Overviews (pyramids).
///
/// `true` requires any overview on the first band; a list requires exactly
/// those decimation factors.
pub struct OverviewsCheck;

impl QcCheck for OverviewsCheck {
    check_meta!("overviews", "Raster has overviews", InputKind::File);

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let raster = ctx.backend.open_raster(input.file()?)?;
        let factors = raster.overview_factors(1);
        let rendered = format!("{:?}", factors);

        match specification.value() {
            Value::Bool(_) => Ok(outcome(!factors.is_empty(), "overviews present", rendered, Comparison::Eq)),
            Value::Array(_) => {
                let expected: Vec<u32> = specification
                    .as_f64_list()
                    .ok_or_else(|| CheckError::spec("overview factors must be numbers"))?
                    .into_iter()
                    .map(|f| whole::<u32>(f, "overview factor"))
                    .collect::<Result<_, _>>()?;
                Ok(outcome(factors == expected, format!("{:?}", expected), rendered, Comparison::Eq))
            }
            other => Err(CheckError::spec(format!("unsupported overviews specification {}", other))),
        }
    }
}

/// An embedded colormap on the first band.
pub struct ColormapEmbeddedCheck;

impl QcCheck for ColormapEmbeddedCheck {
    check_meta!("colormap_embedded", "Raster embeds a colormap", InputKind::File);

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        _specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let raster = ctx.backend.open_raster(input.file()?)?;
        let colormap = raster.colormap(1);
        let tested = match &colormap {
            Some(map) => format!("{} entries", map.len()),
            None => "no colormap".to_string(),
        };
        Ok(outcome(colormap.is_some(), "colormap embedded", tested, Comparison::Eq))
    }
}

/// Colormap values.
///
/// The specification maps pixel values to `[r, g, b]` or `[r, g, b, a]`.
/// Only the listed values are compared.
pub struct ColormapCorrectCheck;

impl ColormapCorrectCheck {
    fn expected(specification: &Specification) -> Result<Colormap, CheckError> {
        let mut colormap = Colormap::new();
        for (key, value) in specification.entries() {
            let pixel: i64 = key
                .trim()
                .parse()
                .map_err(|_| CheckError::spec(format!("colormap key '{}' is not a pixel value", key)))?;
            let channels: Vec<u8> = value
                .as_f64_list()
                .ok_or_else(|| CheckError::spec(format!("colormap entry {} must be a list", pixel)))?
                .into_iter()
                .map(|c| whole::<u8>(c, "colormap channel"))
                .collect::<Result<_, _>>()?;
            let rgba = match channels.as_slice() {
                [r, g, b] => [*r, *g, *b, 255],
                [r, g, b, a] => [*r, *g, *b, *a],
                _ => return Err(CheckError::spec(format!("colormap entry {} needs 3 or 4 channels", pixel))),
            };
            colormap.insert(pixel, rgba);
        }
        if colormap.is_empty() {
            return Err(CheckError::spec("colormap specification must be a mapping"));
        }
        Ok(colormap)
    }
}

impl QcCheck for ColormapCorrectCheck {
    check_meta!("colormap_correct", "Embedded colormap has the specified colours", InputKind::File);

    fn run(
        &self,
        ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let expected = Self::expected(specification)?;
        let raster = ctx.backend.open_raster(input.file()?)?;
        let Some(actual) = raster.colormap(1) else {
            return Ok(outcome(false, format!("{} entries", expected.len()), "no colormap", Comparison::Eq));
        };

        let mismatches: Vec<String> = expected
            .iter()
            .filter(|(pixel, rgba)| actual.get(*pixel) != Some(*rgba))
            .map(|(pixel, rgba)| match actual.get(pixel) {
                Some(found) => format!("{}: expected {:?}, found {:?}", pixel, rgba, found),
                None => format!("{}: expected {:?}, missing", pixel, rgba),
            })
            .collect();

        Ok(outcome(
            mismatches.is_empty(),
            format!("{} entries", expected.len()),
            format!("{} entries", actual.len()),
            Comparison::Eq,
        )
        .with_info_lines(mismatches))
    }
}

/// A non-negative whole number that fits in `T`.
fn whole<T: TryFrom<u64>>(value: f64, what: &str) -> Result<T, CheckError> {
    if !value.is_finite() || value < 0.0 || value.fract() != 0.0 {
        return Err(CheckError::spec(format!("{} must be a non-negative whole number, got {}", what, value)));
    }
    T::try_from(value as u64).map_err(|_| CheckError::spec(format!("{} {} is out of range", what, value)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{DatasetDescriptor, MemoryBackend, RasterDescriptor, RasterHandle};
    use crate::check::CheckOptions;
    use geoqc_core::RasterProfile;
    use serde_json::json;
    use std::path::Path;

    fn descriptor() -> RasterDescriptor {
        let mut colormap = Colormap::new();
        colormap.insert(0, [0, 0, 0, 0]);
        colormap.insert(1, [255, 0, 0, 255]);
        RasterDescriptor {
            profile: RasterProfile {
                driver: "GTiff".to_string(),
                dtype: "uint8".to_string(),
                nodata: Some(255.0),
                width: 1000,
                height: 1000,
                count: 1,
                crs: Some("EPSG:3035".to_string()),
                tiled: true,
                blockxsize: Some(256),
                blockysize: Some(256),
                compress: Some("LZW".to_string()),
            },
            resolution: (10.0, -10.0),
            dtypes: Vec::new(),
            overviews: vec![vec![2, 4, 8, 16]],
            colormap: Some(colormap),
        }
    }

    fn backend() -> MemoryBackend {
        MemoryBackend::new().with_dataset(
            "/data/tile.tif",
            DatasetDescriptor {
                raster: Some(descriptor()),
                ..Default::default()
            },
        )
    }

    fn run(check: &dyn QcCheck, input: CheckInput<'_>, spec: Value) -> Result<CheckResult, CheckError> {
        let backend = backend();
        let options = CheckOptions::new();
        let ctx = CheckContext { backend: &backend, options: &options };
        check.run(&ctx, &input, &Specification::new(spec))
    }

    #[test]
    fn test_handle_checks() {
        let raster = descriptor();
        let handle: &dyn RasterHandle = &raster;
        assert!(run(&DataTypeCheck, CheckInput::RasterHandle(handle), json!("UInt8")).unwrap().is_passed());
        assert!(run(&ResolutionCheck, CheckInput::RasterHandle(handle), json!(10)).unwrap().is_passed());
        assert!(!run(&ResolutionCheck, CheckInput::RasterHandle(handle), json!([20, 20])).unwrap().is_passed());
        assert!(run(&NodataCheck, CheckInput::RasterHandle(handle), json!(255)).unwrap().is_passed());
        assert!(!run(&NodataCheck, CheckInput::RasterHandle(handle), json!(0)).unwrap().is_passed());
    }

    #[test]
    fn test_profile_checks() {
        let raster = descriptor();
        let profile = CheckInput::RasterProfile(&raster.profile);
        assert!(run(&RasterDriverCheck, profile, json!("GTiff")).unwrap().is_passed());
        assert!(run(&CompressionCheck, profile, json!("lzw")).unwrap().is_passed());
        assert!(run(&BlocksizeCheck, profile, json!(256)).unwrap().is_passed());
        assert!(!run(&BlocksizeCheck, profile, json!([512, 512])).unwrap().is_passed());
        assert!(run(&BandsCheck, profile, json!(1)).unwrap().is_passed());
        assert!(!run(&BandsCheck, profile, json!(3)).unwrap().is_passed());
    }

    #[test]
    fn test_profile_check_rejects_handle() {
        let raster = descriptor();
        let err = run(&RasterDriverCheck, CheckInput::RasterHandle(&raster), json!("GTiff")).unwrap_err();
        assert!(matches!(err, CheckError::InputMismatch { .. }));
    }

    #[test]
    fn test_overviews() {
        let path = Path::new("/data/tile.tif");
        assert!(run(&OverviewsCheck, CheckInput::File(path), json!(true)).unwrap().is_passed());
        assert!(run(&OverviewsCheck, CheckInput::File(path), json!([2, 4, 8, 16])).unwrap().is_passed());
        assert!(!run(&OverviewsCheck, CheckInput::File(path), json!([2, 4])).unwrap().is_passed());
    }

    #[test]
    fn test_colormap() {
        let path = Path::new("/data/tile.tif");
        assert!(run(&ColormapEmbeddedCheck, CheckInput::File(path), json!(true)).unwrap().is_passed());

        let result = run(&ColormapCorrectCheck, CheckInput::File(path), json!({"1": [255, 0, 0]})).unwrap();
        assert!(result.is_passed());

        let result = run(&ColormapCorrectCheck, CheckInput::File(path), json!({"1": [0, 255, 0], "2": [1, 1, 1]})).unwrap();
        assert!(!result.is_passed());
        assert_eq!(result.info.len(), 2);
    }

    #[test]
    fn test_rejects_fractional_and_out_of_range_numbers() {
        let raster = descriptor();
        let profile = CheckInput::RasterProfile(&raster.profile);
        let path = Path::new("/data/tile.tif");
        let invalid = |r: Result<CheckResult, CheckError>| matches!(r, Err(CheckError::InvalidSpecification(_)));

        assert!(invalid(run(&BandsCheck, profile, json!(-1))));
        assert!(invalid(run(&BlocksizeCheck, profile, json!(256.7))));
        assert!(invalid(run(&BlocksizeCheck, profile, json!([256, -256]))));
        assert!(invalid(run(&OverviewsCheck, CheckInput::File(path), json!([2, 4.5]))));
        assert!(invalid(run(&ColormapCorrectCheck, CheckInput::File(path), json!({"1": [300, 0, 0]}))));
    }

    #[test]
    fn test_missing_raster_is_an_error() {
        let err = run(&OverviewsCheck, CheckInput::File(Path::new("/nope.tif")), json!(true)).unwrap_err();
        assert!(matches!(err, CheckError::Backend(_)));
    }
}
