//! Check implementations
//!
//! The uniform check contract, the dataset-access seam and the built-in
//! geospatial property checks.

#![warn(missing_docs)]

pub mod check;
pub mod backend;
pub mod property;
pub mod general;
pub mod raster;
pub mod vector;
pub mod command;
pub mod catalog;

pub use check::{QcCheck, CheckContext, CheckInput, CheckOptions, CheckError, InputKind};
pub use backend::{
    GeoBackend, RasterHandle, BackendError, DatasetDescriptor, RasterDescriptor,
    MemoryBackend, DescriptorBackend,
};
pub use property::{check_property, Comparison};
pub use command::CommandCheck;
pub use catalog::CheckCatalog;
