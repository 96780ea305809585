//! The domain check sequence.
//!
//! A fixed order of checks, grouped by what they inspect. Every step asks the
//! executor to attempt its check; disabled checks are no-ops there. Order
//! only matters for how the report reads.

use geoqc_checks::general::REFERENCE_OPTION;
use geoqc_checks::CheckInput;
use geoqc_core::{
    Aggregation, AggregationMode, QcConfig, RasterAggregation, Specification, VectorAggregation,
    VectorQuery,
};
use serde_json::json;
use std::path::{Path, PathBuf};

use crate::executor::{CheckCall, TestExecutor};

const RASTER_CHECKS: [(&str, &str); 7] = [
    ("data_type", "Data Type"),
    ("raster_driver", "Raster driver"),
    ("resolution", "Resolution"),
    ("nodata", "NoData"),
    ("compression", "Compression"),
    ("blocksize", "Blocksize"),
    ("bands", "Number of bands"),
];

const VECTOR_CHECKS: [(&str, &str); 3] = [
    ("vector_driver", "Vector driver"),
    ("validity", "Validity"),
    ("vector_mmu", "Vector minimum mapping unit"),
];

/// Ordered domain checks for one tested file.
pub struct DomainSequence<'a> {
    aggregation: Option<&'a Aggregation>,
    reference: Option<PathBuf>,
}

impl<'a> DomainSequence<'a> {
    /// Sequence for `target`, resolving the reference file for it.
    pub fn new(config: &'a QcConfig, aggregation: Option<&'a Aggregation>, target: &Path) -> Self {
        Self {
            aggregation,
            reference: config.reference_file_for(target),
        }
    }

    /// Resolved reference file.
    pub fn reference(&self) -> Option<&Path> {
        self.reference.as_deref()
    }

    /// Attempt every check in order.
    pub fn run(&self, exec: &mut TestExecutor) {
        self.identity(exec);
        self.table(exec);
        self.ancillary_files(exec);
        self.aggregation(exec);
        self.vector(exec);
        self.raster(exec);
        self.pyramids_and_mmu(exec);
        self.border(exec);
        self.colormap(exec);
        self.cog(exec);
    }

    fn identity(&self, exec: &mut TestExecutor) {
        // CRS: `true` means "same as the reference file".
        if let Some(spec) = exec.tests().get("crs").cloned() {
            let header = "Coordinate reference system";
            if spec.as_bool() == Some(true) {
                match &self.reference {
                    Some(reference) => {
                        exec.execute(
                            CheckCall::new("crs")
                                .header(header)
                                .specification(reference.display().to_string())
                                .option(REFERENCE_OPTION, true),
                        );
                    }
                    None => {
                        exec.record_not_completed("crs", Some(header), "crs: true needs a reference_file");
                    }
                }
            } else {
                exec.execute(CheckCall::new("crs").header(header));
            }
        }

        let attribute_table = raster_attribute_table(exec.target());
        exec.execute(
            CheckCall::new("attributes")
                .header("Attributes")
                .source(attribute_table.clone()),
        );

        let value_field = exec
            .tests()
            .get("value_field")
            .and_then(|s| s.as_str().map(str::to_string))
            .unwrap_or_else(|| "Value".to_string());
        exec.execute(
            CheckCall::new("valid_value_range")
                .header("Value Range")
                .source(attribute_table)
                .option("value_field", value_field),
        );

        if let Some(spec) = exec.tests().get("extent").cloned() {
            if spec.as_list().is_some() {
                exec.execute(CheckCall::new("extent").header("Extent"));
            } else if let Some(reference) = &self.reference {
                exec.execute(
                    CheckCall::new("extent")
                        .header("Extent")
                        .specification(reference.display().to_string())
                        .option(REFERENCE_OPTION, true),
                );
            } else {
                tracing::warn!("Extent check skipped: neither a bounding box nor a reference file is configured");
            }
        }

        let extension = exec.tests().get("extension").map(|s| s.value().clone());
        exec.execute(
            CheckCall::new("filename_specs")
                .check("filename")
                .header("Filename")
                .option_opt("extension", extension),
        );
    }

    fn table(&self, exec: &mut TestExecutor) {
        exec.execute(CheckCall::new("table").header("Table"));
    }

    fn ancillary_files(&self, exec: &mut TestExecutor) {
        let Some(aux_files) = exec.tests().get("aux_files").cloned() else {
            return;
        };
        if !aux_files.is_mapping() {
            exec.record_not_completed("aux_files", None, "aux_files must map a name to a file description");
            return;
        }
        let target = exec.target().display().to_string();
        for (name, spec) in aux_files.entries() {
            let spec = if spec.is_truthy() {
                spec
            } else {
                Specification::new(json!({ "filename": target }))
            };
            exec.execute(
                CheckCall::new("aux_files")
                    .check("ancillary_file")
                    .header(&name)
                    .specification(spec),
            );
        }
    }

    fn aggregation(&self, exec: &mut TestExecutor) {
        match self.aggregation {
            Some(Aggregation::Raster(agg)) => raster_aggregation(exec, agg),
            Some(Aggregation::FromVector(agg)) => vector_aggregation(exec, agg),
            None => {}
        }
    }

    fn vector(&self, exec: &mut TestExecutor) {
        let enabled: Vec<(&str, &str)> = VECTOR_CHECKS
            .iter()
            .copied()
            .filter(|(name, _)| exec.is_enabled(name))
            .collect();
        if enabled.is_empty() {
            return;
        }

        let layer = match exec.backend().read_vector(exec.target(), &VectorQuery::default()) {
            Ok(layer) => layer,
            Err(e) => {
                for (name, header) in enabled {
                    exec.record_not_completed(name, Some(header), &e);
                }
                return;
            }
        };

        for (name, header) in enabled {
            exec.execute(CheckCall::new(name).header(header).input(CheckInput::VectorLayer(&layer)));
        }
    }

    fn raster(&self, exec: &mut TestExecutor) {
        if !RASTER_CHECKS.iter().any(|(name, _)| exec.is_enabled(name)) {
            return;
        }

        let opened = exec
            .backend()
            .raster_profile(exec.target())
            .and_then(|profile| Ok((profile, exec.backend().open_raster(exec.target())?)));
        let (profile, handle) = match opened {
            Ok(opened) => opened,
            Err(e) => {
                tracing::warn!(file = %exec.target().display(), error = %e, "Raster checks skipped: dataset cannot be opened as a raster");
                return;
            }
        };

        for (name, header) in RASTER_CHECKS {
            exec.execute(
                CheckCall::new(name)
                    .header(header)
                    .input(CheckInput::RasterProfile(&profile))
                    .input(CheckInput::RasterHandle(handle.as_ref())),
            );
        }
    }

    fn pyramids_and_mmu(&self, exec: &mut TestExecutor) {
        exec.execute(CheckCall::new("overviews").header("Pyramids"));

        // GRAC layers use their own MMU rule.
        let is_grac = exec.target().to_string_lossy().contains("GRAC");
        exec.execute(
            CheckCall::new("raster_mmu")
                .check(if is_grac { "raster_mmu_grac" } else { "raster_mmu" })
                .header("Raster minimum mapping unit"),
        );
    }

    fn border(&self, exec: &mut TestExecutor) {
        let Some(spec) = exec.tests().get("valid_border").cloned() else {
            return;
        };
        let Some(reference) = &self.reference else {
            tracing::warn!("Border check skipped: no reference_file configured");
            return;
        };

        let mask = spec.get("mask").map(|m| m.is_truthy()).unwrap_or(false);
        let mut call = CheckCall::new("valid_border")
            .header(if mask { "valid_mask" } else { "valid_border" })
            .option("boundary_file", reference.display().to_string())
            .option("mask", mask);
        for key in ["inside_value", "no_data_value", "valid_outside"] {
            call = call.option_opt(key, spec.get(key).map(Specification::into_value));
        }
        exec.execute(call);
    }

    fn colormap(&self, exec: &mut TestExecutor) {
        exec.execute(CheckCall::new("colormap_embedded").header("Colormap embedded"));
        exec.execute(CheckCall::new("colormap_correct").header("Colormap values"));
    }

    fn cog(&self, exec: &mut TestExecutor) {
        exec.execute(CheckCall::new("cog").header("valid_COG"));
    }
}

/// `<stem>.tif.vat.dbf` next to the file when present, else the file itself.
fn raster_attribute_table(target: &Path) -> PathBuf {
    let stem = target.with_extension("");
    let rat = PathBuf::from(format!("{}.tif.vat.dbf", stem.display()));
    if rat.exists() {
        rat
    } else {
        target.to_path_buf()
    }
}

fn raster_aggregation(exec: &mut TestExecutor, agg: &RasterAggregation) {
    let mut call = CheckCall::new("aggregation_raster")
        .check(agg.mode.check_id())
        .header("Aggregation")
        .specification(agg.input_file.display().to_string())
        .option("input_file", agg.input_file.display().to_string())
        .option("exclude_all_nodata", agg.exclude_all_nodata)
        .option_opt("nodata_value", agg.nodata_value);

    call = match &agg.mode {
        AggregationMode::Binary { raster_class, agg_function, num_samples } => call
            .option_opt("raster_class", raster_class.clone())
            .option("agg_function", agg_function.as_str())
            .option("num_samples", *num_samples),
        AggregationMode::Continuous => call,
        AggregationMode::Border { raster_class, filter_type } => call
            .option_opt("raster_class", raster_class.clone())
            .option("filter_type", filter_type.as_str()),
        AggregationMode::Nodata { unique_aggregated_value, num_samples } => call
            .option_opt("unique_aggregated_value", unique_aggregated_value.clone())
            .option("num_samples", *num_samples),
    };
    exec.execute(call);
}

fn vector_aggregation(exec: &mut TestExecutor, agg: &VectorAggregation) {
    const NAME: &str = "aggregation_from_vector";
    const HEADER: &str = "Aggregation";

    let query = VectorQuery {
        layer: agg.layer.clone(),
        bbox: agg.bbox,
    };
    let source = match exec.backend().read_vector(&agg.input_file, &query) {
        Ok(layer) => layer,
        Err(e) => {
            exec.record_not_completed(NAME, Some(HEADER), &e);
            return;
        }
    };

    let mut selected = source.select(&agg.attribute_name, &agg.attribute_class);
    if selected.features.is_empty() {
        tracing::warn!(attribute = %agg.attribute_name, class = %agg.attribute_class, "No intersecting polygons found");
    }

    let target_crs = match exec.backend().crs(exec.target()) {
        Ok(crs) => crs,
        Err(e) => {
            exec.record_not_completed(NAME, Some(HEADER), &e);
            return;
        }
    };
    if selected.crs.as_deref() != Some(target_crs.as_str()) {
        selected = match exec.backend().reproject(selected, &target_crs) {
            Ok(layer) => layer,
            Err(e) => {
                exec.record_not_completed(NAME, Some(HEADER), &e);
                return;
            }
        };
    }

    exec.execute(
        CheckCall::new(NAME)
            .check("aggregation_vector")
            .header(HEADER)
            .specification(agg.input_file.display().to_string())
            .input(CheckInput::VectorLayer(&selected))
            .option("num_samples", agg.num_samples)
            .option("exclude_all_nodata", agg.exclude_all_nodata)
            .option("input_res", agg.input_resolution)
            .option("extract_area", agg.extract_area)
            .option_opt("nodata_value", agg.nodata_value)
            .option("attribute_class", agg.attribute_class.clone()),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selector::select;
    use geoqc_checks::{
        CheckCatalog, CheckContext, CheckError, DatasetDescriptor, InputKind, MemoryBackend, QcCheck,
        RasterDescriptor,
    };
    use geoqc_core::{CheckResult, Feature, Outcome, RasterProfile, VectorLayer};
    use std::sync::Arc;

    /// Records how many features it was handed.
    struct CountFeatures(&'static str);

    impl QcCheck for CountFeatures {
        fn id(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "Counts features"
        }
        fn input_kind(&self) -> InputKind {
            InputKind::VectorLayer
        }
        fn run(
            &self,
            ctx: &CheckContext<'_>,
            input: &CheckInput<'_>,
            specification: &Specification,
        ) -> Result<CheckResult, geoqc_checks::CheckError> {
            let layer = input.vector()?;
            let samples = ctx.options.get_f64("num_samples").unwrap_or_default();
            Ok(CheckResult::passed(specification.display(), format!("{} features", layer.features.len()))
                .with_info(format!("samples {}", samples)))
        }
    }

    /// Passes for any file input.
    struct Always(&'static str);

    impl QcCheck for Always {
        fn id(&self) -> &str {
            self.0
        }
        fn description(&self) -> &str {
            "Always passes"
        }
        fn input_kind(&self) -> InputKind {
            InputKind::File
        }
        fn run(&self, ctx: &CheckContext<'_>, _: &CheckInput<'_>, spec: &Specification) -> Result<CheckResult, CheckError> {
            Ok(CheckResult::passed(spec.display(), ctx.options.to_json().to_string()))
        }
    }

    fn raster() -> DatasetDescriptor {
        DatasetDescriptor {
            crs: Some("EPSG:3035".to_string()),
            raster: Some(RasterDescriptor {
                profile: RasterProfile {
                    driver: "GTiff".to_string(),
                    dtype: "uint8".to_string(),
                    count: 1,
                    nodata: Some(255.0),
                    ..Default::default()
                },
                resolution: (10.0, -10.0),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn polygons(crs: &str) -> DatasetDescriptor {
        let feature = |code: i64| {
            let mut f = Feature { area: 100.0, valid: true, ..Default::default() };
            f.attributes.insert("code".to_string(), json!(code));
            f
        };
        DatasetDescriptor {
            layers: vec![VectorLayer {
                driver: "GPKG".to_string(),
                crs: Some(crs.to_string()),
                fields: vec!["code".to_string()],
                features: vec![feature(1), feature(2), feature(1)],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn run(config: &str, target: &str, backend: MemoryBackend) -> geoqc_core::ResultLedger {
        let config = QcConfig::from_yaml(config).unwrap();
        let aggregation = Aggregation::from_tests(&config.tests).unwrap();
        let mut catalog = CheckCatalog::builtin();
        catalog.register(Arc::new(CountFeatures("aggregation_vector")));
        catalog.register(Arc::new(Always("raster_mmu")));
        catalog.register(Arc::new(Always("raster_mmu_grac")));
        catalog.register(Arc::new(Always("aggregation_binary")));

        let mut exec = TestExecutor::new(target, select(&config.tests), Arc::new(catalog), Arc::new(backend));
        DomainSequence::new(&config, aggregation.as_ref(), Path::new(target)).run(&mut exec);
        exec.into_ledger()
    }

    #[test]
    fn test_raster_block_headers_in_order() {
        let config = "Tests:\n  data_type: uint8\n  nodata: 255\n  bands: 1\n  crs: EPSG:3035\n";
        let ledger = run(config, "/data/tile.tif", MemoryBackend::new().with_dataset("/data/tile.tif", raster()));

        let names: Vec<_> = ledger.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Coordinate reference system", "Data Type", "NoData", "Number of bands"]);
        assert!(ledger.all_passed());
    }

    #[test]
    fn test_raster_block_skipped_when_not_raster() {
        let config = "Tests:\n  data_type: uint8\n  nodata: 255\n  vector_driver: GPKG\n";
        let ledger = run(
            config,
            "/data/parcels.gpkg",
            MemoryBackend::new().with_dataset("/data/parcels.gpkg", polygons("EPSG:3035")),
        );

        let names: Vec<_> = ledger.iter().map(|e| e.name.as_str()).collect();
        assert_eq!(names, vec!["Vector driver"]);
    }

    #[test]
    fn test_vector_checks_not_completed_when_unreadable() {
        let config = "Tests:\n  vector_driver: GPKG\n  validity: true\n";
        let ledger = run(config, "/data/tile.tif", MemoryBackend::new().with_dataset("/data/tile.tif", raster()));

        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger.get("Vector driver").unwrap().outcome, Outcome::NotCompleted);
        assert_eq!(ledger.get("Validity").unwrap().outcome, Outcome::NotCompleted);
    }

    #[test]
    fn test_crs_true_without_reference() {
        let ledger = run("Tests:\n  crs: true\n", "/data/tile.tif", MemoryBackend::new());
        assert_eq!(
            ledger.get("Coordinate reference system").unwrap().outcome,
            Outcome::NotCompleted
        );
    }

    #[test]
    fn test_crs_and_extent_against_reference() {
        let mut reference = raster();
        reference.bounds = geoqc_core::Bounds::from_slice(&[0.0, 0.0, 100.0, 100.0]);
        let mut tile = raster();
        tile.bounds = reference.bounds;

        let backend = MemoryBackend::new()
            .with_dataset("/data/CLMS_X_30SVH_3035_V010.tif", tile)
            .with_dataset("/ref/mask_30SVH.tif", reference);
        let config = "reference_file: /ref/mask_{tile_id}.tif\nTests:\n  crs: true\n  extent: true\n";
        let ledger = run(config, "/data/CLMS_X_30SVH_3035_V010.tif", backend);

        assert_eq!(ledger.len(), 2);
        assert!(ledger.all_passed());
        assert_eq!(ledger.get("Extent").unwrap().specification, "[0.0, 0.0, 100.0, 100.0]");
    }

    #[test]
    fn test_extent_skipped_without_box_or_reference() {
        let ledger = run("Tests:\n  extent: true\n", "/data/tile.tif", MemoryBackend::new());
        assert!(ledger.is_empty());
    }

    #[test]
    fn test_ancillary_files_use_descriptive_names() {
        let dir = tempfile::TempDir::new().unwrap();
        let target = dir.path().join("tile.tif");
        std::fs::write(dir.path().join("tile.xml"), "<meta/>").unwrap();

        let config = "Tests:\n  aux_files:\n    Metadata:\n      ext: xml\n    Legend:\n      ext: qml\n";
        let ledger = run(config, &target.display().to_string(), MemoryBackend::new());

        assert!(ledger.get("Metadata").unwrap().is_passed());
        assert!(!ledger.get("Legend").unwrap().is_passed());
    }

    #[test]
    fn test_vector_aggregation_selects_class() {
        let backend = MemoryBackend::new()
            .with_dataset("/data/tile.tif", raster())
            .with_dataset("/data/polygons.gpkg", polygons("EPSG:3035"));
        let config = "Tests:\n  aggregation_from_vector:\n    input_file: /data/polygons.gpkg\n    attribute_name: code\n    attribute_class: 1\n    num_samples: 5\n";
        let ledger = run(config, "/data/tile.tif", backend);

        let result = ledger.get("Aggregation").unwrap();
        assert_eq!(result.tested, "2 features");
        assert_eq!(result.info, vec!["samples 5"]);
    }

    #[test]
    fn test_vector_aggregation_needs_reprojection() {
        let backend = MemoryBackend::new()
            .with_dataset("/data/tile.tif", raster())
            .with_dataset("/data/polygons.gpkg", polygons("EPSG:4326"));
        let config = "Tests:\n  aggregation_from_vector:\n    input_file: /data/polygons.gpkg\n    attribute_name: code\n    attribute_class: 1\n";
        let ledger = run(config, "/data/tile.tif", backend);

        assert_eq!(ledger.get("Aggregation").unwrap().outcome, Outcome::NotCompleted);
    }

    #[test]
    fn test_raster_aggregation_dispatches_by_mode() {
        let config = "Tests:\n  aggregation_raster:\n    input_file: /data/fine.tif\n    agg_check: binary\n    raster_class: 1\n";
        let ledger = run(config, "/data/tile.tif", MemoryBackend::new());

        let result = ledger.get("Aggregation").unwrap();
        assert!(result.is_passed());
        assert_eq!(result.specification, "/data/fine.tif");
        assert!(result.tested.contains("\"agg_function\":\"mean\""));
    }

    #[test]
    fn test_grac_mmu_variant() {
        let ledger = run("Tests:\n  raster_mmu: 4\n", "/data/VLCC_GRAC_tile.tif", MemoryBackend::new());
        assert!(ledger.get("Raster minimum mapping unit").unwrap().is_passed());
    }

    #[test]
    fn test_table_recorded() {
        let ledger = run("Tests:\n  table: true\n", "/data/table.csv", MemoryBackend::new());
        assert_eq!(ledger.get("Table").unwrap().message(), "Not completed.");
    }
}
