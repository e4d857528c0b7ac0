use crate::error::OcrError;
use std::fs;
use std::path::{Path, PathBuf};

const RESULT_SUFFIX: &str = "_text.txt";

/// `scan.page1.png` -> `scan.page1_text.txt`
pub fn result_file_name(image_name: &str) -> String {
    let stem = Path::new(image_name)
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(image_name);
    format!("{}{}", stem, RESULT_SUFFIX)
}

/// Directory holding one extracted text file per processed image
#[derive(Debug, Clone)]
pub struct ResultsDir {
    root: PathBuf,
}

impl ResultsDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write (or overwrite) the text extracted from `image_name`
    pub fn save(&self, image_name: &str, text: &str) -> Result<PathBuf, OcrError> {
        fs::create_dir_all(&self.root)
            .map_err(|e| OcrError::Internal(format!("Failed to create {:?}: {}", self.root, e)))?;

        let path = self.root.join(result_file_name(image_name));
        fs::write(&path, text)
            .map_err(|e| OcrError::Internal(format!("Failed to write {:?}: {}", path, e)))?;

        tracing::debug!("Saved {} chars to {:?}", text.len(), path);
        Ok(path)
    }

    /// Names of `.txt` files, sorted
    pub fn list(&self) -> Vec<String> {
        let entries = match fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                tracing::warn!("Cannot list results in {:?}: {}", self.root, e);
                return Vec::new();
            }
        };

        let mut names: Vec<String> = entries
            .filter_map(Result::ok)
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.to_lowercase().ends_with(".txt"))
            .collect();
        names.sort();
        names
    }

    pub fn read(&self, name: &str) -> Result<String, OcrError> {
        let path = self.resolve(name)?;
        fs::read_to_string(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OcrError::NotFound(name.to_string()),
            _ => OcrError::Internal(format!("Failed to read {:?}: {}", path, e)),
        })
    }

    pub fn remove(&self, name: &str) -> Result<(), OcrError> {
        let path = self.resolve(name)?;
        fs::remove_file(&path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => OcrError::NotFound(name.to_string()),
            _ => OcrError::Internal(format!("Failed to remove {:?}: {}", path, e)),
        })?;
        tracing::info!("Removed result {:?}", path);
        Ok(())
    }

    /// Only bare `.txt` file names inside the results directory are addressable
    fn resolve(&self, name: &str) -> Result<PathBuf, OcrError> {
        let is_bare = Path::new(name).file_name().and_then(|n| n.to_str()) == Some(name);
        if !is_bare || name.starts_with('.') || !name.to_lowercase().ends_with(".txt") {
            return Err(OcrError::InvalidRequest(format!(
                "'{}' is not a result file name",
                name
            )));
        }
        Ok(self.root.join(name))
    }
}
