//! Report persistence for GeoQC.
//!
//! Per-file JSON reports, the HTML report writer, the batch summary table
//! and publishing of accepted files.

#![warn(missing_docs)]

pub mod error;
pub mod report;
pub mod json_report;
pub mod html;
pub mod summary;
pub mod publish;

pub use error::{StorageError, Result};
pub use report::{ReportEntry, ReportEntries};
pub use json_report::JsonReportStore;
pub use html::{ReportWriter, HtmlReportWriter};
pub use summary::SummaryTable;
pub use publish::publish;
