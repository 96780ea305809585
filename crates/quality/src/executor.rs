//! Test executor.
//!
//! Every check goes through [`TestExecutor::execute`]: it resolves the
//! specification, looks the check up in the catalog, prepares the input the
//! check declares and records the outcome. A check that errors or panics is
//! recorded as `Not completed.` and the run continues.

use geoqc_checks::{
    BackendError, CheckCatalog, CheckContext, CheckError, CheckInput, CheckOptions, GeoBackend,
    InputKind, RasterHandle,
};
use geoqc_core::{CheckResult, RasterProfile, ResultLedger, Specification, VectorLayer, VectorQuery};
use serde_json::Value;
use std::any::Any;
use std::fmt::Display;
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::selector::EnabledTests;

/// One attempted check.
///
/// `name` is the configuration key that enables it. The catalog id defaults
/// to `name`, the ledger key to `header` or else `name`.
#[derive(Debug)]
pub struct CheckCall<'a> {
    name: &'a str,
    check: Option<&'a str>,
    header: Option<&'a str>,
    specification: Option<Specification>,
    source: Option<PathBuf>,
    inputs: Vec<CheckInput<'a>>,
    options: CheckOptions,
}

impl<'a> CheckCall<'a> {
    /// Attempt the check enabled by `name`.
    pub fn new(name: &'a str) -> Self {
        Self {
            name,
            check: None,
            header: None,
            specification: None,
            source: None,
            inputs: Vec::new(),
            options: CheckOptions::new(),
        }
    }

    /// Catalog id, when it differs from the configuration key.
    pub fn check(mut self, id: &'a str) -> Self {
        self.check = Some(id);
        self
    }

    /// Name the result is recorded under.
    pub fn header(mut self, header: &'a str) -> Self {
        self.header = Some(header);
        self
    }

    /// Specification to use instead of the configured one.
    pub fn specification(mut self, specification: impl Into<Specification>) -> Self {
        self.specification = Some(specification.into());
        self
    }

    /// Dataset to prepare inputs from, instead of the tested file.
    pub fn source(mut self, path: impl Into<PathBuf>) -> Self {
        self.source = Some(path.into());
        self
    }

    /// Offer an already prepared input. The one matching the check's
    /// declared kind is used; otherwise the input is prepared from the source.
    pub fn input(mut self, input: CheckInput<'a>) -> Self {
        self.inputs.push(input);
        self
    }

    /// Add a named option.
    pub fn option(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.options = self.options.with(key, value);
        self
    }

    /// Add a named option if a value is present.
    pub fn option_opt<V: Into<Value>>(mut self, key: impl Into<String>, value: Option<V>) -> Self {
        self.options = self.options.with_opt(key, value);
        self
    }
}

/// Input prepared by the executor for one call.
enum Prepared {
    File,
    Profile(RasterProfile),
    Handle(Box<dyn RasterHandle>),
    Layer(VectorLayer),
}

impl Prepared {
    fn load(backend: &dyn GeoBackend, kind: InputKind, path: &Path) -> Result<Self, BackendError> {
        Ok(match kind {
            InputKind::File => Self::File,
            InputKind::RasterProfile => Self::Profile(backend.raster_profile(path)?),
            InputKind::RasterHandle => Self::Handle(backend.open_raster(path)?),
            InputKind::VectorLayer => Self::Layer(backend.read_vector(path, &VectorQuery::default())?),
        })
    }

    fn input<'a>(&'a self, path: &'a Path) -> CheckInput<'a> {
        match self {
            Self::File => CheckInput::File(path),
            Self::Profile(profile) => CheckInput::RasterProfile(profile),
            Self::Handle(handle) => CheckInput::RasterHandle(handle.as_ref()),
            Self::Layer(layer) => CheckInput::VectorLayer(layer),
        }
    }
}

enum Failure {
    Prepare(BackendError),
    Check(CheckError),
}

/// Runs checks for one tested file and owns its ledger.
pub struct TestExecutor {
    target: PathBuf,
    tests: EnabledTests,
    catalog: Arc<CheckCatalog>,
    backend: Arc<dyn GeoBackend>,
    ledger: ResultLedger,
}

impl TestExecutor {
    /// Create an executor with an empty ledger.
    pub fn new(
        target: impl Into<PathBuf>,
        tests: EnabledTests,
        catalog: Arc<CheckCatalog>,
        backend: Arc<dyn GeoBackend>,
    ) -> Self {
        Self {
            target: target.into(),
            tests,
            catalog,
            backend,
            ledger: ResultLedger::new(),
        }
    }

    /// Tested file.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Enabled checks.
    pub fn tests(&self) -> &EnabledTests {
        &self.tests
    }

    /// Dataset access.
    pub fn backend(&self) -> &dyn GeoBackend {
        self.backend.as_ref()
    }

    /// Results so far.
    pub fn ledger(&self) -> &ResultLedger {
        &self.ledger
    }

    /// Finish and hand over the ledger.
    pub fn into_ledger(self) -> ResultLedger {
        self.ledger
    }

    /// Whether the configuration key is enabled.
    pub fn is_enabled(&self, name: &str) -> bool {
        self.tests.contains(name)
    }

    /// Run one check and record its result. Returns whether something was
    /// recorded.
    pub fn execute(&mut self, call: CheckCall<'_>) -> bool {
        if !self.tests.contains(call.name) {
            return false;
        }

        let specification = match call.specification {
            Some(spec) if spec.is_truthy() => spec,
            _ => match self.tests.get(call.name) {
                Some(spec) if spec.is_truthy() => spec.clone(),
                _ => return false,
            },
        };

        let record_as = call.header.unwrap_or(call.name).to_string();
        let check_id = call.check.unwrap_or(call.name);
        let Some(check) = self.catalog.get(check_id) else {
            tracing::warn!(check = check_id, name = %record_as, "No implementation registered for check");
            return self.ledger.record_not_completed(record_as);
        };

        let source = call.source.as_deref().unwrap_or(&self.target);
        let kind = check.input_kind();
        let backend = self.backend.as_ref();
        let (inputs, options) = (&call.inputs, &call.options);

        // Input preparation reads the dataset, so it runs inside the same
        // boundary as the check itself.
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| -> Result<CheckResult, Failure> {
            let prepared;
            let input = match inputs.iter().find(|i| i.kind() == kind) {
                Some(input) => *input,
                None => {
                    prepared = Prepared::load(backend, kind, source).map_err(Failure::Prepare)?;
                    prepared.input(source)
                }
            };
            tracing::debug!(check = check_id, name = %record_as, input = ?input, "Running check");
            let ctx = CheckContext { backend, options };
            check.run(&ctx, &input, &specification).map_err(Failure::Check)
        }));

        let result = match outcome {
            Ok(Ok(result)) => result,
            Ok(Err(Failure::Prepare(e))) => {
                tracing::warn!(check = check_id, name = %record_as, error = %e, "Could not prepare check input");
                CheckResult::not_completed()
            }
            Ok(Err(Failure::Check(e))) => {
                tracing::error!(check = check_id, name = %record_as, error = %e, "Check failed to complete");
                CheckResult::not_completed()
            }
            Err(payload) => {
                tracing::error!(check = check_id, name = %record_as, panic = %panic_message(payload.as_ref()), "Check panicked");
                CheckResult::not_completed()
            }
        };
        self.ledger.record(record_as, result)
    }

    /// Record a value returned by an external collaborator; anything that
    /// is not a check result becomes `Not completed.`.
    pub fn record_value(&mut self, name: &str, header: Option<&str>, value: &Value) -> bool {
        if !self.tests.contains(name) {
            return false;
        }
        self.ledger.record_value(header.unwrap_or(name), value)
    }

    /// Record an enabled check as not completed because its input could not
    /// be prepared.
    pub fn record_not_completed(&mut self, name: &str, header: Option<&str>, reason: impl Display) -> bool {
        if !self.tests.contains(name) {
            return false;
        }
        let record_as = header.unwrap_or(name);
        tracing::warn!(check = name, name = record_as, reason = %reason, "Check not completed");
        self.ledger.record_not_completed(record_as)
    }
}

pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
