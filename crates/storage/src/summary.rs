//! Batch summary table.
//!
//! Rows are tested files, columns are check names in first-seen order and
//! cells hold the `Test Result` of that check. Written as `;`-delimited text.

use chrono::{DateTime, Local};
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::Result;
use crate::report::ReportEntries;

const DELIMITER: char = ';';

/// Per-file pass/fail projection over a batch.
#[derive(Debug, Clone, Default)]
pub struct SummaryTable {
    columns: Vec<String>,
    rows: Vec<(String, ReportEntries)>,
}

impl SummaryTable {
    /// Empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add the report of one file.
    pub fn add(&mut self, file: impl Into<String>, entries: ReportEntries) {
        for name in entries.names() {
            if !self.columns.iter().any(|c| c == name) {
                self.columns.push(name.to_string());
            }
        }
        self.rows.push((file.into(), entries));
    }

    /// Number of files.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether no file was added.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column headers.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Render the table.
    pub fn to_delimited(&self) -> String {
        let mut out = String::new();
        for column in &self.columns {
            out.push(DELIMITER);
            out.push_str(&field(column));
        }
        out.push('\n');

        for (file, entries) in &self.rows {
            out.push_str(&field(file));
            for column in &self.columns {
                out.push(DELIMITER);
                if let Some(entry) = entries.get(column) {
                    out.push_str(&field(&entry.test_result));
                }
            }
            out.push('\n');
        }
        out
    }

    /// Summary path for a manifest: `<stem>_QC_summary_<Mon-DD-YYYY_HH-MM>.csv`
    /// in the manifest's folder.
    pub fn path_for(manifest: &Path, at: DateTime<Local>) -> PathBuf {
        let stem = manifest
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let name = format!("{}_QC_summary_{}.csv", stem, at.format("%b-%d-%Y_%H-%M"));
        manifest.with_file_name(name)
    }

    /// Write the table next to the manifest and return its path.
    pub async fn write(&self, manifest: &Path) -> Result<PathBuf> {
        let path = Self::path_for(manifest, Local::now());
        fs::write(&path, self.to_delimited()).await?;
        tracing::info!(path = %path.display(), files = self.len(), "Wrote QC summary");
        Ok(path)
    }
}

fn field(text: &str) -> String {
    if text.contains(DELIMITER) || text.contains('"') || text.contains('\n') {
        format!("\"{}\"", text.replace('"', "\"\""))
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::ReportEntry;
    use chrono::TimeZone;

    fn entry(result: &str) -> ReportEntry {
        ReportEntry {
            test_result: result.to_string(),
            specifications: String::new(),
            tested_file: String::new(),
            info: None,
        }
    }

    #[test]
    fn test_columns_in_first_seen_order() {
        let mut first = ReportEntries::new();
        first.push("Extent", entry("Passed"));
        first.push("Data Type", entry("Failed"));
        let mut second = ReportEntries::new();
        second.push("Extent", entry("Passed"));
        second.push("Pyramids", entry("Not completed"));

        let mut table = SummaryTable::new();
        table.add("/data/a.tif", first);
        table.add("/data/b;c.tif", second);

        assert_eq!(table.columns(), ["Extent", "Data Type", "Pyramids"]);
        assert_eq!(
            table.to_delimited(),
            ";Extent;Data Type;Pyramids\n\
             /data/a.tif;Passed;Failed;\n\
             \"/data/b;c.tif\";Passed;;Not completed\n"
        );
    }

    #[test]
    fn test_path_for() {
        let at = Local.with_ymd_and_hms(2024, 3, 5, 14, 7, 0).unwrap();
        assert_eq!(
            SummaryTable::path_for(Path::new("/runs/tiles.txt"), at),
            PathBuf::from("/runs/tiles_QC_summary_Mar-05-2024_14-07.csv")
        );
    }

    #[tokio::test]
    async fn test_write() {
        let dir = tempfile::TempDir::new().unwrap();
        let manifest = dir.path().join("list.csv");
        let mut table = SummaryTable::new();
        table.add("a.tif", ReportEntries::new());

        let path = table.write(&manifest).await.unwrap();
        assert_eq!(path.parent(), Some(dir.path()));
        assert!(path.file_name().unwrap().to_string_lossy().starts_with("list_QC_summary_"));
        assert_eq!(std::fs::read_to_string(path).unwrap(), "\na.tif\n");
    }
}
