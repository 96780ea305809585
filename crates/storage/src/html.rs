//! HTML report writer.

use async_trait::async_trait;
use geoqc_core::CheckResult;
use std::path::Path;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::error::Result;
use crate::report::ReportEntries;

/// Writes a human-readable report incrementally: a header, one section per
/// check, then a summary.
#[async_trait]
pub trait ReportWriter: Send + Sync {
    /// Start a new report for `in_file`, truncating `out`.
    async fn start(&self, in_file: &Path, qb: Option<&str>, out: &Path) -> Result<()>;

    /// Append the result of one check.
    async fn test_result(&self, name: &str, result: &CheckResult, out: &Path) -> Result<()>;

    /// Append the summary over all checks and close the report.
    async fn summary(&self, out: &Path, entries: &ReportEntries) -> Result<()>;
}

/// Plain HTML implementation of [`ReportWriter`].
#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlReportWriter;

impl HtmlReportWriter {
    /// Create a writer.
    pub fn new() -> Self {
        Self
    }

    async fn append(out: &Path, html: &str) -> Result<()> {
        let mut file = OpenOptions::new().append(true).create(true).open(out).await?;
        file.write_all(html.as_bytes()).await?;
        file.flush().await?;
        Ok(())
    }
}

#[async_trait]
impl ReportWriter for HtmlReportWriter {
    async fn start(&self, in_file: &Path, qb: Option<&str>, out: &Path) -> Result<()> {
        let name = in_file
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| in_file.display().to_string());
        let mut html = format!(
            "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>QC report: {name}</title>\n</head>\n<body>\n<h1>QC report: {name}</h1>\n<p>File: <code>{path}</code></p>\n<p>Date: {date}</p>\n",
            name = escape(&name),
            path = escape(&in_file.display().to_string()),
            date = chrono::Local::now().format("%Y-%m-%d %H:%M"),
        );
        if let Some(qb) = qb {
            html.push_str(&format!("<p>Quality band: {}</p>\n", escape(qb)));
        }
        fs::write(out, html.as_bytes()).await?;
        Ok(())
    }

    async fn test_result(&self, name: &str, result: &CheckResult, out: &Path) -> Result<()> {
        let mut html = format!(
            "<h2>{}</h2>\n<p class=\"{}\"><strong>{}</strong></p>\n",
            escape(name),
            css_class(result),
            result.outcome.label(),
        );
        if !result.specification.is_empty() || !result.tested.is_empty() {
            html.push_str(&format!(
                "<ul>\n<li>Specifications: {}</li>\n<li>Tested file: {}</li>\n</ul>\n",
                escape(&result.specification),
                escape(&result.tested),
            ));
        }
        if !result.info.is_empty() {
            html.push_str("<pre>");
            html.push_str(&escape(&result.info.join("\n")));
            html.push_str("</pre>\n");
        }
        Self::append(out, &html).await
    }

    async fn summary(&self, out: &Path, entries: &ReportEntries) -> Result<()> {
        let mut html = String::from(
            "<h2>Summary</h2>\n<table>\n<tr><th>Test</th><th>Result</th></tr>\n",
        );
        for (name, entry) in entries.iter() {
            html.push_str(&format!(
                "<tr><td>{}</td><td>{}</td></tr>\n",
                escape(name),
                escape(&entry.test_result)
            ));
        }
        html.push_str(&format!(
            "</table>\n<p>Passed: {} of {} tests.</p>\n</body>\n</html>\n",
            entries.passed(),
            entries.len()
        ));
        Self::append(out, &html).await
    }
}

fn css_class(result: &CheckResult) -> &'static str {
    match result.outcome {
        geoqc_core::Outcome::Passed => "passed",
        geoqc_core::Outcome::Failed => "failed",
        geoqc_core::Outcome::NotCompleted => "not-completed",
    }
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
