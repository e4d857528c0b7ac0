use crate::error::OcrError;
use crate::preprocessing::Preset;
use crate::GlobalArgs;
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

const APP_DIR: &str = "docscan";
const USER_SETTINGS_FILE: &str = "config.json";
const PROJECT_SETTINGS_FILE: &str = ".docscan.json";

const DEFAULT_IMAGES_DIR: &str = "images";
const DEFAULT_RESULTS_DIR: &str = "results/extracted_texts";
const DEFAULT_LANGUAGE: &str = "por";
const DEFAULT_HOST: &str = "127.0.0.1";
const DEFAULT_PORT: u16 = 9292;
const DEFAULT_MAX_FILE_SIZE: usize = 50 * 1024 * 1024;

/// Which history backend records processed documents
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    /// Append-only CSV file next to the result texts
    #[default]
    Csv,
    /// Single-table SQLite database keeping the full text
    Sqlite,
}

impl StoreKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Csv => "csv",
            Self::Sqlite => "sqlite",
        }
    }
}

/// Settings persisted between runs
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub images_dir: Option<PathBuf>,
    pub results_dir: Option<PathBuf>,
    pub store: Option<StoreKind>,
    pub language: Option<String>,
    pub preset: Option<String>,
}

impl Settings {
    /// Candidate settings files, most specific first.
    ///
    /// An explicit path wins outright; otherwise the per-user file is tried
    /// before the project file in the working directory.
    pub fn candidates(explicit: Option<&Path>) -> Vec<PathBuf> {
        if let Some(path) = explicit {
            return vec![path.to_path_buf()];
        }

        let mut paths = Vec::new();
        if let Some(dir) = dirs::config_dir() {
            paths.push(dir.join(APP_DIR).join(USER_SETTINGS_FILE));
        }
        paths.push(PathBuf::from(PROJECT_SETTINGS_FILE));
        paths
    }

    /// Load the first readable settings file, or defaults when none exists
    pub fn load_from(paths: &[PathBuf]) -> Self {
        for path in paths {
            if !path.exists() {
                continue;
            }

            match fs::read_to_string(path)
                .map_err(|e| e.to_string())
                .and_then(|raw| serde_json::from_str::<Settings>(&raw).map_err(|e| e.to_string()))
            {
                Ok(settings) => {
                    tracing::debug!("Loaded settings from {:?}", path);
                    return settings;
                }
                Err(e) => {
                    tracing::warn!("Ignoring unreadable settings file {:?}: {}", path, e);
                }
            }
        }

        Self::default()
    }

    /// Save to the first candidate that accepts the write
    pub fn save(&self, paths: &[PathBuf]) -> Result<PathBuf, OcrError> {
        let mut last_error = None;

        for path in paths {
            match self.save_to(path) {
                Ok(()) => return Ok(path.clone()),
                Err(e) => {
                    tracing::warn!("Could not write settings to {:?}: {}", path, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error
            .unwrap_or_else(|| OcrError::Internal("No settings location available".to_string())))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), OcrError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                OcrError::Internal(format!("Failed to create settings directory: {}", e))
            })?;
        }

        let json = serde_json::to_string_pretty(self)
            .map_err(|e| OcrError::Internal(format!("Failed to serialize settings: {}", e)))?;

        fs::write(path, json)
            .map_err(|e| OcrError::Internal(format!("Failed to write settings: {}", e)))
    }
}

/// Runtime configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub images_dir: PathBuf,
    pub results_dir: PathBuf,
    pub store: StoreKind,
    pub language: String,
    pub preset: Preset,
    pub engine: Option<String>,
    pub tessdata_path: Option<String>,
    pub host: String,
    pub port: u16,
    pub max_file_size: usize,
}

impl Config {
    /// Merge command line arguments over saved settings over defaults
    pub fn resolve(args: &GlobalArgs, settings: &Settings) -> Result<Self, OcrError> {
        let preset_name = args
            .preset
            .clone()
            .or_else(|| settings.preset.clone());

        let preset = match preset_name {
            Some(name) => Preset::from_str(&name).ok_or_else(|| {
                OcrError::InvalidRequest(format!(
                    "Unknown preset '{}'. Valid options: none, minimal, standard, aggressive",
                    name
                ))
            })?,
            None => Preset::default(),
        };

        Ok(Self {
            images_dir: args
                .images_dir
                .clone()
                .or_else(|| settings.images_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_IMAGES_DIR)),
            results_dir: args
                .results_dir
                .clone()
                .or_else(|| settings.results_dir.clone())
                .unwrap_or_else(|| PathBuf::from(DEFAULT_RESULTS_DIR)),
            store: args.store.or(settings.store).unwrap_or_default(),
            language: args
                .language
                .clone()
                .or_else(|| settings.language.clone())
                .unwrap_or_else(|| DEFAULT_LANGUAGE.to_string()),
            preset,
            engine: args.engine.clone(),
            tessdata_path: args.tessdata_path.clone(),
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        })
    }

    /// Create the images and results directories if missing
    pub fn ensure_dirs(&self) -> Result<(), OcrError> {
        for dir in [&self.images_dir, &self.results_dir] {
            fs::create_dir_all(dir).map_err(|e| {
                OcrError::Internal(format!("Failed to create directory {:?}: {}", dir, e))
            })?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn empty_args() -> GlobalArgs {
        GlobalArgs {
            images_dir: None,
            results_dir: None,
            store: None,
            language: None,
            preset: None,
            engine: None,
            tessdata_path: None,
            settings: None,
            log_level: "info".to_string(),
        }
    }

    #[test]
    fn test_defaults_without_settings() {
        let config = Config::resolve(&empty_args(), &Settings::default()).unwrap();
        assert_eq!(config.images_dir, PathBuf::from("images"));
        assert_eq!(config.results_dir, PathBuf::from("results/extracted_texts"));
        assert_eq!(config.store, StoreKind::Csv);
        assert_eq!(config.language, "por");
        assert_eq!(config.preset, Preset::Standard);
        assert_eq!(config.port, 9292);
    }

    #[test]
    fn test_args_override_settings() {
        let settings = Settings {
            images_dir: Some(PathBuf::from("/saved/images")),
            results_dir: Some(PathBuf::from("/saved/results")),
            store: Some(StoreKind::Sqlite),
            language: Some("eng".to_string()),
            preset: Some("minimal".to_string()),
        };
        let mut args = empty_args();
        args.images_dir = Some(PathBuf::from("/cli/images"));
        args.preset = Some("aggressive".to_string());

        let config = Config::resolve(&args, &settings).unwrap();
        assert_eq!(config.images_dir, PathBuf::from("/cli/images"));
        assert_eq!(config.results_dir, PathBuf::from("/saved/results"));
        assert_eq!(config.store, StoreKind::Sqlite);
        assert_eq!(config.language, "eng");
        assert_eq!(config.preset, Preset::Aggressive);
    }

    #[test]
    fn test_unknown_preset_is_rejected() {
        let mut args = empty_args();
        args.preset = Some("extreme".to_string());
        let err = Config::resolve(&args, &Settings::default()).unwrap_err();
        assert!(matches!(err, OcrError::InvalidRequest(_)));
    }

    #[test]
    fn test_settings_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let settings = Settings {
            images_dir: Some(PathBuf::from("scans")),
            store: Some(StoreKind::Sqlite),
            ..Default::default()
        };

        let written = settings.save(&[path.clone()]).unwrap();
        assert_eq!(written, path);
        assert_eq!(Settings::load_from(&[path]), settings);
    }

    #[test]
    fn test_load_skips_corrupt_file() {
        let dir = tempfile::tempdir().unwrap();
        let broken = dir.path().join("broken.json");
        let good = dir.path().join("good.json");
        fs::write(&broken, "{ not json").unwrap();
        fs::write(&good, r#"{"language": "eng"}"#).unwrap();

        let settings = Settings::load_from(&[broken, good]);
        assert_eq!(settings.language.as_deref(), Some("eng"));
        assert!(settings.images_dir.is_none());
    }

    #[test]
    fn test_load_missing_files_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::load_from(&[dir.path().join("absent.json")]);
        assert_eq!(settings, Settings::default());
    }

    #[test]
    fn test_explicit_candidate_wins() {
        let explicit = PathBuf::from("/tmp/custom.json");
        assert_eq!(Settings::candidates(Some(&explicit)), vec![explicit]);
    }
}
