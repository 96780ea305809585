//! Dataset access.
//!
//! Checks never open files themselves; they go through a [`GeoBackend`],
//! which is where a geospatial library (or remote storage) plugs in. Two
//! backends ship with the crate: [`MemoryBackend`], holding dataset
//! descriptions in memory, and [`DescriptorBackend`], reading them from a
//! `<file>.qc.json` sidecar next to each dataset.

use geoqc_core::{Bounds, Colormap, RasterProfile, VectorLayer, VectorQuery};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Errors raised while opening or reading a dataset.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    /// The dataset does not exist or cannot be found
    #[error("Dataset not found: {0}")]
    NotFound(PathBuf),

    /// The dataset exists but is not a raster
    #[error("Not a raster dataset: {0}")]
    NotRaster(PathBuf),

    /// The dataset exists but is not a vector source
    #[error("Not a vector dataset: {0}")]
    NotVector(PathBuf),

    /// The requested layer does not exist
    #[error("Layer '{layer}' not found in {path}")]
    LayerNotFound {
        /// Dataset
        path: PathBuf,
        /// Requested layer
        layer: String,
    },

    /// The backend cannot perform the operation
    #[error("Unsupported operation: {0}")]
    Unsupported(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed dataset description
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// An open raster dataset.
///
/// Handles are scoped to one file's run and released when dropped.
pub trait RasterHandle: Send + Sync {
    /// Pixel size `(x, y)`.
    fn resolution(&self) -> (f64, f64);

    /// NoData value of the first band.
    fn nodata(&self) -> Option<f64>;

    /// Data type of every band.
    fn dtypes(&self) -> Vec<String>;

    /// Overview decimation factors of a band (1-based).
    fn overview_factors(&self, band: usize) -> Vec<u32>;

    /// Embedded colormap of a band (1-based).
    fn colormap(&self, band: usize) -> Option<Colormap>;
}

/// Access to geospatial datasets.
pub trait GeoBackend: Send + Sync {
    /// CRS identifier of a raster or vector dataset.
    fn crs(&self, path: &Path) -> Result<String, BackendError>;

    /// Bounds of a raster or vector dataset.
    fn bounds(&self, path: &Path) -> Result<Bounds, BackendError>;

    /// Parsed raster profile.
    fn raster_profile(&self, path: &Path) -> Result<RasterProfile, BackendError>;

    /// Open a raster dataset.
    fn open_raster(&self, path: &Path) -> Result<Box<dyn RasterHandle>, BackendError>;

    /// Read a vector layer.
    fn read_vector(&self, path: &Path, query: &VectorQuery) -> Result<VectorLayer, BackendError>;

    /// Reproject a layer to another CRS.
    fn reproject(&self, layer: VectorLayer, crs: &str) -> Result<VectorLayer, BackendError>;
}

/// Description of a raster dataset.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RasterDescriptor {
    /// Profile
    pub profile: RasterProfile,

    /// Pixel size `(x, y)`
    pub resolution: (f64, f64),

    /// Data type of every band; the profile dtype repeated when empty
    #[serde(default)]
    pub dtypes: Vec<String>,

    /// Overview factors per band, first band first
    #[serde(default)]
    pub overviews: Vec<Vec<u32>>,

    /// Colormap of the first band
    #[serde(default)]
    pub colormap: Option<Colormap>,
}

impl RasterHandle for RasterDescriptor {
    fn resolution(&self) -> (f64, f64) {
        self.resolution
    }

    fn nodata(&self) -> Option<f64> {
        self.profile.nodata
    }

    fn dtypes(&self) -> Vec<String> {
        if self.dtypes.is_empty() {
            vec![self.profile.dtype.clone(); self.profile.count.max(1) as usize]
        } else {
            self.dtypes.clone()
        }
    }

    fn overview_factors(&self, band: usize) -> Vec<u32> {
        band.checked_sub(1)
            .and_then(|i| self.overviews.get(i))
            .cloned()
            .unwrap_or_default()
    }

    fn colormap(&self, band: usize) -> Option<Colormap> {
        if band == 1 {
            self.colormap.clone()
        } else {
            None
        }
    }
}

/// Description of a dataset: what a geospatial library would report.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DatasetDescriptor {
    /// CRS identifier
    #[serde(default)]
    pub crs: Option<String>,

    /// Bounds
    #[serde(default)]
    pub bounds: Option<Bounds>,

    /// Raster part, for raster datasets
    #[serde(default)]
    pub raster: Option<RasterDescriptor>,

    /// Vector layers, for vector datasets
    #[serde(default)]
    pub layers: Vec<VectorLayer>,
}

impl DatasetDescriptor {
    fn crs(&self, path: &Path) -> Result<String, BackendError> {
        self.crs
            .clone()
            .or_else(|| self.raster.as_ref().and_then(|r| r.profile.crs.clone()))
            .or_else(|| self.layers.first().and_then(|l| l.crs.clone()))
            .ok_or_else(|| BackendError::Unsupported(format!("no CRS for {}", path.display())))
    }

    fn bounds(&self, path: &Path) -> Result<Bounds, BackendError> {
        self.bounds
            .ok_or_else(|| BackendError::Unsupported(format!("no bounds for {}", path.display())))
    }

    fn raster(&self, path: &Path) -> Result<&RasterDescriptor, BackendError> {
        self.raster
            .as_ref()
            .ok_or_else(|| BackendError::NotRaster(path.to_path_buf()))
    }

    fn vector(&self, path: &Path, query: &VectorQuery) -> Result<VectorLayer, BackendError> {
        let layer = match &query.layer {
            Some(name) => self
                .layers
                .iter()
                .find(|l| l.name.as_deref() == Some(name.as_str()))
                .ok_or_else(|| BackendError::LayerNotFound {
                    path: path.to_path_buf(),
                    layer: name.clone(),
                })?,
            None => self
                .layers
                .first()
                .ok_or_else(|| BackendError::NotVector(path.to_path_buf()))?,
        };
        // Descriptions carry no geometry, so a bbox cannot filter features.
        if query.bbox.is_some() {
            tracing::debug!(path = %path.display(), "Ignoring bbox filter for described layer");
        }
        Ok(layer.clone())
    }
}

fn reproject_same_crs(layer: VectorLayer, crs: &str) -> Result<VectorLayer, BackendError> {
    if layer.crs.as_deref() == Some(crs) {
        Ok(layer)
    } else {
        Err(BackendError::Unsupported(format!(
            "reprojection from {} to {} needs a geospatial backend",
            layer.crs.as_deref().unwrap_or("unknown CRS"),
            crs
        )))
    }
}

/// Backend holding dataset descriptions in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    datasets: HashMap<PathBuf, DatasetDescriptor>,
}

impl MemoryBackend {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a dataset.
    pub fn insert(&mut self, path: impl Into<PathBuf>, dataset: DatasetDescriptor) {
        self.datasets.insert(path.into(), dataset);
    }

    /// Register a dataset, builder style.
    pub fn with_dataset(mut self, path: impl Into<PathBuf>, dataset: DatasetDescriptor) -> Self {
        self.insert(path, dataset);
        self
    }

    fn dataset(&self, path: &Path) -> Result<&DatasetDescriptor, BackendError> {
        self.datasets
            .get(path)
            .ok_or_else(|| BackendError::NotFound(path.to_path_buf()))
    }
}

impl GeoBackend for MemoryBackend {
    fn crs(&self, path: &Path) -> Result<String, BackendError> {
        self.dataset(path)?.crs(path)
    }

    fn bounds(&self, path: &Path) -> Result<Bounds, BackendError> {
        self.dataset(path)?.bounds(path)
    }

    fn raster_profile(&self, path: &Path) -> Result<RasterProfile, BackendError> {
        Ok(self.dataset(path)?.raster(path)?.profile.clone())
    }

    fn open_raster(&self, path: &Path) -> Result<Box<dyn RasterHandle>, BackendError> {
        Ok(Box::new(self.dataset(path)?.raster(path)?.clone()))
    }

    fn read_vector(&self, path: &Path, query: &VectorQuery) -> Result<VectorLayer, BackendError> {
        self.dataset(path)?.vector(path, query)
    }

    fn reproject(&self, layer: VectorLayer, crs: &str) -> Result<VectorLayer, BackendError> {
        reproject_same_crs(layer, crs)
    }
}

/// Backend reading `<file>.qc.json` dataset descriptions.
///
/// Each sidecar is parsed once; clones share the parsed descriptions.
#[derive(Debug, Clone, Default)]
pub struct DescriptorBackend {
    cache: Arc<Mutex<HashMap<PathBuf, Arc<DatasetDescriptor>>>>,
}

impl DescriptorBackend {
    /// Create the backend.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sidecar path for a dataset: `a.tif` -> `a.tif.qc.json`.
    pub fn descriptor_path(path: &Path) -> PathBuf {
        let mut name = path.as_os_str().to_os_string();
        name.push(".qc.json");
        PathBuf::from(name)
    }

    fn load(&self, path: &Path) -> Result<Arc<DatasetDescriptor>, BackendError> {
        if let Some(cached) = self.cached().get(path) {
            return Ok(cached.clone());
        }

        let sidecar = Self::descriptor_path(path);
        let dataset: DatasetDescriptor = match std::fs::read_to_string(&sidecar) {
            Ok(json) => serde_json::from_str(&json)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BackendError::NotFound(path.to_path_buf()))
            }
            Err(e) => return Err(e.into()),
        };
        tracing::debug!(path = %sidecar.display(), "Loaded dataset description");

        let dataset = Arc::new(dataset);
        self.cached().insert(path.to_path_buf(), dataset.clone());
        Ok(dataset)
    }

    fn cached(&self) -> std::sync::MutexGuard<'_, HashMap<PathBuf, Arc<DatasetDescriptor>>> {
        // The map stays consistent even if a holder panicked.
        self.cache.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl GeoBackend for DescriptorBackend {
    fn crs(&self, path: &Path) -> Result<String, BackendError> {
        self.load(path)?.crs(path)
    }

    fn bounds(&self, path: &Path) -> Result<Bounds, BackendError> {
        self.load(path)?.bounds(path)
    }

    fn raster_profile(&self, path: &Path) -> Result<RasterProfile, BackendError> {
        Ok(self.load(path)?.raster(path)?.profile.clone())
    }

    fn open_raster(&self, path: &Path) -> Result<Box<dyn RasterHandle>, BackendError> {
        Ok(Box::new(self.load(path)?.raster(path)?.clone()))
    }

    fn read_vector(&self, path: &Path, query: &VectorQuery) -> Result<VectorLayer, BackendError> {
        self.load(path)?.vector(path, query)
    }

    fn reproject(&self, layer: VectorLayer, crs: &str) -> Result<VectorLayer, BackendError> {
        reproject_same_crs(layer, crs)
    }
}
