//! QC run configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{QcError, Result};
use crate::spec::Specification;

/// Mapping from check name to its raw specification.
pub type TestSpecifications = BTreeMap<String, Specification>;

/// Output format of the per-file report.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportFormat {
    /// `<stem>.json`
    Json,
    /// `<stem>.html`, rendered through a report writer
    Html,
}

impl ReportFormat {
    /// File extension used for the report.
    pub fn extension(self) -> &'static str {
        match self {
            Self::Json => "json",
            Self::Html => "html",
        }
    }

    /// Report path for a tested file: its extension replaced.
    pub fn report_path(self, input: &Path) -> PathBuf {
        input.with_extension(self.extension())
    }
}

/// An external command that implements a check.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExternalCheckSpec {
    /// Program to run
    pub command: String,

    /// Arguments; `{input}`, `{spec}` and `{option:<name>}` are substituted
    #[serde(default)]
    pub args: Vec<String>,

    /// Input shape the command expects: `file`, `profile` or `vector`
    #[serde(default = "default_input")]
    pub input: String,

    /// Seconds before the command is killed; five minutes when unset
    #[serde(default)]
    pub timeout: Option<u64>,
}

fn default_input() -> String {
    "file".to_string()
}

/// Full QC configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QcConfig {
    /// Check name -> specification
    #[serde(rename = "Tests", default)]
    pub tests: TestSpecifications,

    /// Check id -> external command implementing it
    #[serde(rename = "Checks", default)]
    pub checks: BTreeMap<String, ExternalCheckSpec>,

    /// Write an HTML report instead of JSON
    #[serde(default)]
    pub html_report: bool,

    /// Re-run and rewrite reports that already exist
    #[serde(default)]
    pub overwrite: bool,

    /// Trusted comparison dataset; may contain `{tile_id}`
    #[serde(default)]
    pub reference_file: Option<String>,

    /// Quality band label shown in HTML reports
    #[serde(default)]
    pub qb: Option<String>,

    /// Folder accepted files are copied to
    #[serde(default)]
    pub destination: Option<PathBuf>,

    /// Exit with a failure status when any file fails QC
    #[serde(default)]
    pub fail_on_error: bool,
}

impl QcConfig {
    /// Load configuration from a YAML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if path.as_os_str().is_empty() {
            return Err(QcError::MissingConfig);
        }
        let text = std::fs::read_to_string(path)?;
        let config = Self::from_yaml(&text)?;
        tracing::debug!(path = %path.display(), tests = config.tests.len(), "Loaded QC configuration");
        Ok(config)
    }

    /// Parse configuration from YAML text.
    pub fn from_yaml(text: &str) -> Result<Self> {
        Ok(serde_yaml::from_str(text)?)
    }

    /// Report format selected by `html_report`.
    pub fn report_format(&self) -> ReportFormat {
        if self.html_report {
            ReportFormat::Html
        } else {
            ReportFormat::Json
        }
    }

    /// Reference file for one tested dataset, with `{tile_id}` resolved.
    pub fn reference_file_for(&self, input: &Path) -> Option<PathBuf> {
        let template = self.reference_file.as_deref().filter(|r| !r.is_empty())?;
        let resolved = match tile_id(input) {
            Some(tile) => template.replace("{tile_id}", &tile),
            None => template.to_string(),
        };
        Some(PathBuf::from(resolved))
    }
}

/// Tile identifier: the third-from-last `_` token of the file stem.
pub fn tile_id(input: &Path) -> Option<String> {
    let stem = input.file_stem()?.to_str()?;
    let parts: Vec<&str> = stem.split('_').collect();
    if parts.len() < 3 {
        return None;
    }
    Some(parts[parts.len() - 3].to_string())
}
