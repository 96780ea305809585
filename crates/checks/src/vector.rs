//! Vector checks.

use geoqc_core::{CheckResult, Specification};

use crate::check::{CheckContext, CheckError, CheckInput, InputKind, QcCheck};
use crate::property::{check_property, outcome, Comparison};

/// OGR driver of the vector file.
pub struct VectorDriverCheck;

impl QcCheck for VectorDriverCheck {
    fn id(&self) -> &str {
        "vector_driver"
    }

    fn description(&self) -> &str {
        "Vector file is written with the specified driver"
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
        let expected = specification
            .as_str()
            .ok_or_else(|| CheckError::spec("vector_driver must be a string"))?;
        Ok(check_property(layer.driver.as_str(), expected, Comparison::Eq))
    }
}

/// The layer has features and every geometry is valid.
pub struct ValidityCheck;

impl QcCheck for ValidityCheck {
    fn id(&self) -> &str {
        "validity"
    }

    fn description(&self) -> &str {
        "Vector file is not empty and its geometries are valid"
    }

    fn input_kind(&self) -> InputKind {
        InputKind::VectorLayer
    }

    fn run(
        &self,
        _ctx: &CheckContext<'_>,
        input: &CheckInput<'_>,
        _specification: &Specification,
    ) -> Result<CheckResult, CheckError> {
        let layer = input.vector()?;
        let invalid = layer.features.iter().filter(|f| !f.valid).count();
        let passed = !layer.features.is_empty() && invalid == 0;

        let mut result = outcome(
            passed,
            "not empty, valid geometries",
            format!("{} features", layer.features.len()),
            Comparison::Eq,
        );
        if layer.features.is_empty() {
            result = result.with_info("Vector file is empty");
        }
        if invalid > 0 {
            result = result.with_info(format!("{} invalid geometries", invalid));
        }
        Ok(result)
    }
}

/// Minimum mapping unit: the smallest feature area allowed (m²).
pub struct VectorMmuCheck;

impl QcCheck for VectorMmuCheck {
    fn id(&self) -> &str {
        "vector_mmu"
    }

    fn description(&self) -> &str {
        "No feature is smaller than the minimum mapping unit"
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
        let mmu = specification
            .as_f64()
            .ok_or_else(|| CheckError::spec("vector_mmu must be an area"))?;

        if layer.features.is_empty() {
            return Ok(outcome(false, format!(">= {}", mmu), "no features", Comparison::Eq));
        }

        let smallest = layer
            .features
            .iter()
            .map(|f| f.area)
            .fold(f64::INFINITY, f64::min);
        let below = layer.features.iter().filter(|f| f.area < mmu).count();

        let mut result = check_property(&smallest, &mmu, Comparison::Ge);
        if below > 0 {
            result = result.with_info(format!("{} features below the minimum mapping unit", below));
        }
        Ok(result)
    }
}
