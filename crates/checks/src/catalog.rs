//! Check catalog.

use geoqc_core::ExternalCheckSpec;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::check::QcCheck;
use crate::command::CommandCheck;
use crate::general::{
    AncillaryFileCheck, AttributesCheck, CrsCheck, ExtentCheck, FilenameCheck, ValueRangeCheck,
};
use crate::raster::{
    BandsCheck, BlocksizeCheck, ColormapCorrectCheck, ColormapEmbeddedCheck, CompressionCheck,
    DataTypeCheck, NodataCheck, OverviewsCheck, RasterDriverCheck, ResolutionCheck,
};
use crate::vector::{ValidityCheck, VectorDriverCheck, VectorMmuCheck};

/// Catalog of check implementations, keyed by check id.
#[derive(Clone)]
pub struct CheckCatalog {
    checks: HashMap<String, Arc<dyn QcCheck>>,
}

impl CheckCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self {
            checks: HashMap::new(),
        }
    }

    /// Catalog with every built-in check registered.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        let builtins: Vec<Arc<dyn QcCheck>> = vec![
            Arc::new(CrsCheck),
            Arc::new(ExtentCheck),
            Arc::new(FilenameCheck),
            Arc::new(AncillaryFileCheck),
            Arc::new(AttributesCheck),
            Arc::new(ValueRangeCheck),
            Arc::new(VectorDriverCheck),
            Arc::new(ValidityCheck),
            Arc::new(VectorMmuCheck),
            Arc::new(DataTypeCheck),
            Arc::new(RasterDriverCheck),
            Arc::new(ResolutionCheck),
            Arc::new(NodataCheck),
            Arc::new(CompressionCheck),
            Arc::new(BlocksizeCheck),
            Arc::new(BandsCheck),
            Arc::new(OverviewsCheck),
            Arc::new(ColormapEmbeddedCheck),
            Arc::new(ColormapCorrectCheck),
        ];
        for check in builtins {
            catalog.register(check);
        }
        catalog
    }

    /// Register external command checks. They replace built-ins of the same id.
    pub fn with_commands(mut self, commands: &BTreeMap<String, ExternalCheckSpec>) -> Self {
        for (id, spec) in commands {
            self.register(Arc::new(CommandCheck::new(id.clone(), spec.clone())));
        }
        self
    }

    /// Register a check, returning the one it replaced.
    pub fn register(&mut self, check: Arc<dyn QcCheck>) -> Option<Arc<dyn QcCheck>> {
        let id = check.id().to_string();
        let previous = self.checks.insert(id.clone(), check);
        if previous.is_some() {
            tracing::debug!(check = %id, "Replaced registered check");
        }
        previous
    }

    /// Remove a check.
    pub fn unregister(&mut self, id: &str) -> Option<Arc<dyn QcCheck>> {
        self.checks.remove(id)
    }

    /// Get a check by id.
    pub fn get(&self, id: &str) -> Option<Arc<dyn QcCheck>> {
        self.checks.get(id).cloned()
    }

    /// Whether a check is registered.
    pub fn contains(&self, id: &str) -> bool {
        self.checks.contains_key(id)
    }

    /// Registered ids, sorted.
    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.checks.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }

    /// Number of registered checks.
    pub fn len(&self) -> usize {
        self.checks.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.checks.is_empty()
    }
}

impl Default for CheckCatalog {
    fn default() -> Self {
        Self::new()
    }
}
