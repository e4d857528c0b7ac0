//! Downloaded engine assets (recognition models, tessdata)
//!
//! Assets are fetched once into the user cache directory and reused.

use crate::error::OcrError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

const CACHE_DIR_NAME: &str = "docscan";

/// Recognition models exceed ureq's default 10MB body limit
const MAX_ASSET_SIZE: u64 = 200 * 1024 * 1024;

/// Root of the asset cache, created on demand
pub fn cache_dir(subdir: &str) -> Result<PathBuf, OcrError> {
    let dir = dirs::cache_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join(CACHE_DIR_NAME)
        .join(subdir);

    fs::create_dir_all(&dir).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create cache directory {:?}: {}", dir, e))
    })?;

    Ok(dir)
}

/// Return the cached copy of `filename`, downloading it from `url` first if needed
pub fn ensure_downloaded(dir: &Path, filename: &str, url: &str) -> Result<PathBuf, OcrError> {
    let path = dir.join(filename);

    if path.exists() {
        tracing::info!("Using cached {} from {:?}", filename, dir);
        return Ok(path);
    }

    tracing::info!("Downloading {} (this may take a moment)...", filename);
    download_file(url, &path)?;
    tracing::info!("Downloaded {} to {:?}", filename, path);

    Ok(path)
}

/// Download into a `.partial` sibling, then rename into place
fn download_file(url: &str, path: &Path) -> Result<(), OcrError> {
    let response = ureq::get(url)
        .call()
        .map_err(|e| OcrError::InitializationError(format!("Failed to download {}: {}", url, e)))?;

    let mut body = response.into_body();
    let buffer = body.with_config().limit(MAX_ASSET_SIZE).read_to_vec().map_err(|e| {
        OcrError::InitializationError(format!("Failed to read response from {}: {}", url, e))
    })?;

    let partial = path.with_extension("partial");
    let mut file = fs::File::create(&partial).map_err(|e| {
        OcrError::InitializationError(format!("Failed to create {:?}: {}", partial, e))
    })?;

    file.write_all(&buffer)
        .map_err(|e| OcrError::InitializationError(format!("Failed to write {:?}: {}", partial, e)))?;

    fs::rename(&partial, path).map_err(|e| {
        OcrError::InitializationError(format!("Failed to move {:?} into place: {}", partial, e))
    })
}
