//! JSON report files.
//!
//! One report per tested file, written next to it as `<stem>.json` with
//! four-space indentation.

use serde::Serialize;
use serde_json::ser::PrettyFormatter;
use std::path::Path;
use tokio::fs;

use crate::error::Result;
use crate::report::ReportEntries;

/// Reads and writes per-file JSON reports.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonReportStore;

impl JsonReportStore {
    /// Create a store.
    pub fn new() -> Self {
        Self
    }

    /// Write a report, replacing any existing file.
    pub async fn write(&self, path: &Path, entries: &ReportEntries) -> Result<()> {
        let mut buf = Vec::new();
        let formatter = PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        entries.serialize(&mut serializer)?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        fs::write(path, &buf).await?;
        tracing::debug!(path = %path.display(), entries = entries.len(), "Wrote JSON report");
        Ok(())
    }

    /// Read a report. Returns `None` if it does not exist.
    pub async fn read(&self, path: &Path) -> Result<Option<ReportEntries>> {
        match fs::read_to_string(path).await {
            Ok(json) => Ok(Some(serde_json::from_str(&json)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
