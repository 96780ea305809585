//! Publishing of accepted files.

use std::path::{Path, PathBuf};
use tokio::fs;

use crate::error::{Result, StorageError};

/// Copy an accepted file into `destination`, creating the folder if needed.
/// Returns the path of the copy.
pub async fn publish(file: &Path, destination: &Path) -> Result<PathBuf> {
    let name = file
        .file_name()
        .ok_or_else(|| StorageError::NotFound(file.to_path_buf()))?;
    fs::create_dir_all(destination).await?;
    let target = destination.join(name);
    fs::copy(file, &target).await?;
    tracing::info!(from = %file.display(), to = %target.display(), "Published accepted file");
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_creates_destination() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("tile.tif");
        std::fs::write(&file, b"raster").unwrap();

        let target = publish(&file, &dir.path().join("trusted/zone")).await.unwrap();
        assert_eq!(target, dir.path().join("trusted/zone/tile.tif"));
        assert_eq!(std::fs::read(target).unwrap(), b"raster");
    }

    #[tokio::test]
    async fn test_publish_missing_file() {
        let dir = TempDir::new().unwrap();
        assert!(publish(&dir.path().join("none.tif"), dir.path()).await.is_err());
    }
}
