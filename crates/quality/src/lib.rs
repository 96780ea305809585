//! Quality control orchestration
//!
//! Test selection, per-check execution with isolation, the domain check
//! sequence, report finalization and the batch driver.

#![warn(missing_docs)]

pub mod error;
pub mod selector;
pub mod executor;
pub mod sequence;
pub mod finalize;
pub mod engine;
pub mod batch;

pub use error::{QualityError, Result};
pub use selector::{select, EnabledTests};
pub use executor::{CheckCall, TestExecutor};
pub use sequence::DomainSequence;
pub use finalize::{Finalizer, QcReport, ReportStatus};
pub use engine::{EngineContext, QcEngine};
pub use batch::{BatchDriver, BatchOptions, BatchOutcome};
