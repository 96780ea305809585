//! Batch driver.
//!
//! Runs the engine over one file or every file listed in a manifest, one
//! after another. A file that fails is logged and left out of the summary;
//! the batch carries on.

use geoqc_core::{QcConfig, QcError};
use geoqc_storage::{publish, SummaryTable};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::engine::{EngineContext, QcEngine};
use crate::error::Result;
use crate::finalize::{QcReport, ReportStatus};

/// Options of a batch run.
#[derive(Debug, Clone, Copy, Default)]
pub struct BatchOptions {
    /// Never copy accepted files to the destination
    pub check_only: bool,
}

/// Result of a batch run.
#[derive(Debug, Default)]
pub struct BatchOutcome {
    /// Reports of the files that ran to completion
    pub reports: Vec<QcReport>,

    /// Files that failed, with the reason
    pub failures: Vec<(PathBuf, String)>,

    /// Summary table, for multi-file runs
    pub summary_path: Option<PathBuf>,

    /// Copies of accepted files
    pub published: Vec<PathBuf>,
}

impl BatchOutcome {
    /// No file failed and every report passed. An existing HTML report,
    /// whose outcome is unknown, does not count as passed.
    pub fn all_passed(&self) -> bool {
        self.failures.is_empty() && self.reports.iter().all(QcReport::succeeded)
    }
}

/// Runs QC over many files with one configuration.
pub struct BatchDriver {
    config: Arc<QcConfig>,
    context: EngineContext,
    options: BatchOptions,
}

impl BatchDriver {
    /// Create a driver.
    pub fn new(config: Arc<QcConfig>, context: EngineContext, options: BatchOptions) -> Self {
        Self {
            config,
            context,
            options,
        }
    }

    /// Files to test: the manifest's lines for `.txt`/`.csv`, else the input
    /// itself. Blank lines and `#` comments are skipped; only the first
    /// tab-separated column is used.
    pub async fn inputs(input: &Path) -> Result<Vec<PathBuf>> {
        if input.as_os_str().is_empty() {
            return Err(QcError::MissingInput("no path given".to_string()).into());
        }
        if !is_manifest(input) {
            return Ok(vec![input.to_path_buf()]);
        }

        let text = tokio::fs::read_to_string(input).await?;
        Ok(text
            .lines()
            .filter_map(|line| line.split('\t').next())
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(PathBuf::from)
            .collect())
    }

    /// Run the batch.
    pub async fn run(&self, input: &Path) -> Result<BatchOutcome> {
        let files = Self::inputs(input).await?;
        let mut outcome = BatchOutcome::default();
        let mut summary = SummaryTable::new();

        for file in &files {
            match self.run_file(file).await {
                Ok(report) => {
                    if let Some(copy) = self.publish_if_accepted(&report).await {
                        outcome.published.push(copy);
                    }
                    if report.outcome_known {
                        summary.add(file.display().to_string(), report.entries.clone());
                    } else {
                        tracing::info!(file = %file.display(), "Existing report has no parsed results, left out of the summary");
                    }
                    outcome.reports.push(report);
                }
                Err(e) => {
                    tracing::error!(file = %file.display(), error = %e, "QC run failed");
                    outcome.failures.push((file.clone(), e.to_string()));
                }
            }
        }

        if files.len() > 1 {
            outcome.summary_path = Some(summary.write(input).await?);
        }
        Ok(outcome)
    }

    async fn run_file(&self, file: &Path) -> Result<QcReport> {
        let engine = QcEngine::new(self.config.clone(), file, self.context.clone())?;
        engine.run().await
    }

    async fn publish_if_accepted(&self, report: &QcReport) -> Option<PathBuf> {
        if self.options.check_only || !report.succeeded() || report.status != ReportStatus::Written {
            return None;
        }
        let destination = self.config.destination.as_deref()?;
        match publish(&report.target, destination).await {
            Ok(copy) => Some(copy),
            Err(e) => {
                tracing::warn!(file = %report.target.display(), error = %e, "Could not publish accepted file");
                None
            }
        }
    }
}

fn is_manifest(input: &Path) -> bool {
    matches!(
        input.extension().and_then(|e| e.to_str()).map(str::to_lowercase).as_deref(),
        Some("txt") | Some("csv")
    )
}
