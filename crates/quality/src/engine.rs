//! QC engine for one tested file.

use geoqc_checks::{CheckCatalog, GeoBackend};
use geoqc_core::{Aggregation, QcConfig, QcError, ResultLedger};
use geoqc_storage::{HtmlReportWriter, ReportWriter};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::error::{QualityError, Result};
use crate::executor::{panic_message, TestExecutor};
use crate::finalize::{Finalizer, QcReport};
use crate::selector::{select, EnabledTests};
use crate::sequence::DomainSequence;

/// Collaborators shared by every file of a batch.
#[derive(Clone)]
pub struct EngineContext {
    /// Dataset access
    pub backend: Arc<dyn GeoBackend>,

    /// Check implementations
    pub catalog: Arc<CheckCatalog>,

    /// HTML report writer
    pub writer: Arc<dyn ReportWriter>,
}

impl EngineContext {
    /// Built-in checks and the HTML writer on top of `backend`.
    pub fn new(backend: Arc<dyn GeoBackend>) -> Self {
        Self {
            backend,
            catalog: Arc::new(CheckCatalog::builtin()),
            writer: Arc::new(HtmlReportWriter::new()),
        }
    }

    /// Use another catalog.
    pub fn with_catalog(mut self, catalog: Arc<CheckCatalog>) -> Self {
        self.catalog = catalog;
        self
    }

    /// Use another report writer.
    pub fn with_writer(mut self, writer: Arc<dyn ReportWriter>) -> Self {
        self.writer = writer;
        self
    }
}

/// Runs the configured checks against one file and finalizes its report.
///
/// The engine owns an immutable configuration snapshot, the enabled tests
/// derived from it and, while running, the ledger.
pub struct QcEngine {
    config: Arc<QcConfig>,
    target: PathBuf,
    tests: EnabledTests,
    aggregation: Option<Aggregation>,
    context: EngineContext,
}

impl QcEngine {
    /// Create an engine.
    ///
    /// Fails before any check runs when the input is missing or the
    /// aggregation settings are contradictory.
    pub fn new(config: Arc<QcConfig>, target: impl Into<PathBuf>, context: EngineContext) -> Result<Self> {
        let target = target.into();
        if target.as_os_str().is_empty() {
            return Err(QcError::MissingInput("no path given".to_string()).into());
        }
        if !target.exists() {
            return Err(QcError::MissingInput(target.display().to_string()).into());
        }

        let tests = select(&config.tests);
        let aggregation = Aggregation::from_tests(&config.tests)?;
        tracing::debug!(file = %target.display(), enabled = tests.len(), "QC engine ready");

        Ok(Self {
            config,
            target,
            tests,
            aggregation,
            context,
        })
    }

    /// Tested file.
    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Enabled checks.
    pub fn enabled_tests(&self) -> &EnabledTests {
        &self.tests
    }

    /// Run the check sequence on the current thread and return the ledger.
    ///
    /// Checks block on dataset reads and external commands, so inside a
    /// runtime use [`QcEngine::run`], which moves the sequence onto the
    /// blocking pool.
    pub fn run_checks(&self) -> ResultLedger {
        run_sequence(&self.config, self.aggregation.as_ref(), &self.target, self.tests.clone(), &self.context)
    }

    /// Run the check sequence on the blocking pool. A panic anywhere in it
    /// ends this file's run with [`QualityError::Aborted`].
    async fn run_checks_blocking(&self) -> Result<ResultLedger> {
        let config = self.config.clone();
        let aggregation = self.aggregation.clone();
        let target = self.target.clone();
        let tests = self.tests.clone();
        let context = self.context.clone();

        tokio::task::spawn_blocking(move || run_sequence(&config, aggregation.as_ref(), &target, tests, &context))
            .await
            .map_err(|e| {
                let reason = if e.is_panic() {
                    panic_message(e.into_panic().as_ref())
                } else {
                    e.to_string()
                };
                tracing::error!(file = %self.target.display(), reason = %reason, "Check sequence aborted");
                QualityError::Aborted(reason)
            })
    }

    /// Run the checks and finalize the report.
    ///
    /// When the report already exists and `overwrite` is off, no check runs
    /// and the existing report is returned.
    pub async fn run(&self) -> Result<QcReport> {
        let finalizer = Finalizer::new(&self.config, self.context.writer.as_ref());

        if !self.config.overwrite {
            if let Some(report) = finalizer.existing(&self.target).await? {
                tracing::info!(path = %report.report_path.display(), "QC report already exists, skipping checks");
                return Ok(report);
            }
        }

        tracing::info!(file = %self.target.display(), "Running QC checks");
        let ledger = self.run_checks_blocking().await?;
        finalizer.finalize(&ledger, &self.target).await
    }
}

fn run_sequence(
    config: &QcConfig,
    aggregation: Option<&Aggregation>,
    target: &Path,
    tests: EnabledTests,
    context: &EngineContext,
) -> ResultLedger {
    let mut exec = TestExecutor::new(target, tests, context.catalog.clone(), context.backend.clone());
    DomainSequence::new(config, aggregation, target).run(&mut exec);
    exec.into_ledger()
}
