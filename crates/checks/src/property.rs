//! Property comparison shared by the built-in checks.

use geoqc_core::CheckResult;
use std::fmt::Display;

/// Operator comparing a dataset property with its specification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    /// Equal
    Eq,
    /// Less than
    Lt,
    /// Greater than
    Gt,
    /// Less than or equal
    Le,
    /// Greater than or equal
    Ge,
}

impl Comparison {
    /// Operator symbol; empty for equality.
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "",
            Self::Lt => "<",
            Self::Gt => ">",
            Self::Le => "<=",
            Self::Ge => ">=",
        }
    }

    /// Apply the operator.
    pub fn holds<T: PartialOrd + ?Sized>(self, property: &T, specified: &T) -> bool {
        match self {
            Self::Eq => property == specified,
            Self::Lt => property < specified,
            Self::Gt => property > specified,
            Self::Le => property <= specified,
            Self::Ge => property >= specified,
        }
    }
}

/// Compare a dataset property with its specification and build the result.
///
/// The rendered specification carries the operator, e.g. `>= 0.5`.
pub fn check_property<T>(property: &T, specified: &T, comparison: Comparison) -> CheckResult
where
    T: PartialOrd + Display + ?Sized,
{
    let passed = comparison.holds(property, specified);
    outcome(passed, specified, property, comparison)
}

/// Build a result for an outcome decided elsewhere.
pub fn outcome<S, P>(passed: bool, specified: S, property: P, comparison: Comparison) -> CheckResult
where
    S: Display,
    P: Display,
{
    let specification = match comparison {
        Comparison::Eq => specified.to_string(),
        op => format!("{} {}", op.symbol(), specified),
    };
    let result = CheckResult::with_outcome(passed, specification, property.to_string());
    tracing::debug!(passed, "Property check finished");
    result
}
