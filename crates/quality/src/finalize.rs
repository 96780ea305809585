//! Report finalization.

use geoqc_core::{QcConfig, ReportFormat, ResultLedger};
use geoqc_storage::{JsonReportStore, ReportEntries, ReportWriter};
use std::path::{Path, PathBuf};

use crate::error::Result;

/// What happened to the report file.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportStatus {
    /// The report was written by this run
    Written,
    /// A report already existed and was left untouched
    AlreadyExists {
        /// Unchanged file content
        content: String,
    },
}

/// Outcome of one file's QC run.
#[derive(Debug, Clone, PartialEq)]
pub struct QcReport {
    /// Tested file
    pub target: PathBuf,

    /// Report file
    pub report_path: PathBuf,

    /// Report format
    pub format: ReportFormat,

    /// Per-check entries in execution order
    pub entries: ReportEntries,

    /// Number of passed checks
    pub passed: usize,

    /// Number of recorded checks
    pub total: usize,

    /// Whether the report was written or already existed
    pub status: ReportStatus,

    /// Whether `entries` reflect the report's checks. False for an existing
    /// HTML report, which is returned without being parsed.
    pub outcome_known: bool,
}

impl QcReport {
    fn new(target: &Path, report_path: PathBuf, format: ReportFormat, entries: ReportEntries, status: ReportStatus) -> Self {
        Self {
            target: target.to_path_buf(),
            report_path,
            format,
            passed: entries.passed(),
            total: entries.len(),
            entries,
            status,
            outcome_known: true,
        }
    }

    fn unknown(mut self) -> Self {
        self.outcome_known = false;
        self
    }

    /// Every recorded check passed. A run with no checks succeeds; a report
    /// with an unknown outcome does not.
    pub fn succeeded(&self) -> bool {
        self.outcome_known && self.passed == self.total
    }

    /// Number of checks that did not pass.
    pub fn failed(&self) -> usize {
        self.total - self.passed
    }

    /// Human-readable overall outcome.
    pub fn summary_line(&self) -> String {
        if !self.outcome_known {
            format!(
                "QC report already exists at {}; outcome not re-evaluated.",
                self.report_path.display()
            )
        } else if self.succeeded() {
            format!("QC finished successfully. Passed: {} of {} tests.", self.passed, self.total)
        } else {
            format!(
                "Tests failed: {}, passed: {} of {} tests.",
                self.failed(),
                self.passed,
                self.total
            )
        }
    }
}

/// Turns a ledger into a persisted report.
pub struct Finalizer<'a> {
    config: &'a QcConfig,
    writer: &'a dyn ReportWriter,
    store: JsonReportStore,
}

impl<'a> Finalizer<'a> {
    /// Create a finalizer. The writer renders HTML reports.
    pub fn new(config: &'a QcConfig, writer: &'a dyn ReportWriter) -> Self {
        Self {
            config,
            writer,
            store: JsonReportStore::new(),
        }
    }

    /// Report path for a tested file.
    pub fn report_path(&self, target: &Path) -> PathBuf {
        self.config.report_format().report_path(target)
    }

    /// The report already on disk, if any.
    ///
    /// JSON reports are parsed back into entries; HTML reports are returned
    /// as raw content with no entries.
    pub async fn existing(&self, target: &Path) -> Result<Option<QcReport>> {
        let path = self.report_path(target);
        let format = self.config.report_format();
        match format {
            ReportFormat::Json => {
                let Some(entries) = self.store.read(&path).await? else {
                    return Ok(None);
                };
                let content = tokio::fs::read_to_string(&path).await?;
                Ok(Some(QcReport::new(target, path, format, entries, ReportStatus::AlreadyExists { content })))
            }
            ReportFormat::Html => match tokio::fs::read_to_string(&path).await {
                Ok(content) => Ok(Some(
                    QcReport::new(target, path, format, ReportEntries::new(), ReportStatus::AlreadyExists { content })
                        .unknown(),
                )),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
                Err(e) => Err(e.into()),
            },
        }
    }

    /// Persist the ledger and compute the overall outcome.
    ///
    /// An existing HTML report is kept unless `overwrite` is set; the
    /// returned report then carries its unchanged content.
    pub async fn finalize(&self, ledger: &ResultLedger, target: &Path) -> Result<QcReport> {
        let path = self.report_path(target);
        let format = self.config.report_format();
        let entries = ReportEntries::from_ledger(ledger);

        let status = match format {
            ReportFormat::Html => {
                if !self.config.overwrite {
                    match tokio::fs::read_to_string(&path).await {
                        Ok(content) => {
                            tracing::info!(path = %path.display(), "QC report already exists");
                            let report = QcReport::new(target, path, format, entries, ReportStatus::AlreadyExists { content });
                            return Ok(report);
                        }
                        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
                        Err(e) => return Err(e.into()),
                    }
                }
                self.write_html(ledger, &entries, target, &path).await?;
                ReportStatus::Written
            }
            ReportFormat::Json => {
                self.store.write(&path, &entries).await?;
                ReportStatus::Written
            }
        };

        let report = QcReport::new(target, path, format, entries, status);
        tracing::info!(file = %target.display(), "{}", report.summary_line());
        Ok(report)
    }

    /// Render next to the report and move it into place once complete, so an
    /// interrupted render never looks like a finished report.
    async fn write_html(&self, ledger: &ResultLedger, entries: &ReportEntries, target: &Path, path: &Path) -> Result<()> {
        let partial = partial_path(path);
        match self.render_html(ledger, entries, target, &partial).await {
            Ok(()) => {
                tokio::fs::rename(&partial, path).await?;
                Ok(())
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await {
                    if cleanup.kind() != std::io::ErrorKind::NotFound {
                        tracing::warn!(path = %partial.display(), error = %cleanup, "Could not remove partial report");
                    }
                }
                Err(e.into())
            }
        }
    }

    async fn render_html(
        &self,
        ledger: &ResultLedger,
        entries: &ReportEntries,
        target: &Path,
        out: &Path,
    ) -> geoqc_storage::Result<()> {
        self.writer.start(target, self.config.qb.as_deref(), out).await?;
        for entry in ledger.iter() {
            self.writer.test_result(&entry.name, &entry.result, out).await?;
        }
        self.writer.summary(out, entries).await
    }
}

/// `tile.html` -> `tile.html.partial`
fn partial_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_os_string();
    name.push(".partial");
    PathBuf::from(name)
}
