//! GeoQC core data models.
//!
//! This crate defines the configuration, check results and result ledger
//! shared by the check implementations and the orchestration engine.

#![warn(missing_docs)]

// Configuration
mod config;
mod spec;
mod aggregation;

// Results
mod result;
mod ledger;

// Datasets
mod dataset;

mod error;

// Re-exports
pub use config::{QcConfig, ExternalCheckSpec, ReportFormat, TestSpecifications, tile_id};
pub use spec::Specification;
pub use aggregation::{Aggregation, AggregationMode, RasterAggregation, VectorAggregation};
pub use result::{CheckResult, Outcome, NOT_COMPLETED};
pub use ledger::{ResultLedger, LedgerEntry};
pub use dataset::{Bounds, Colormap, Feature, RasterProfile, VectorLayer, VectorQuery};
pub use error::{QcError, Result};
