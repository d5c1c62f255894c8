//! Model management for stem separation
//!
//! Locates ONNX models in the local cache. When a download base URL is
//! configured, missing files are fetched on first use.

use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use stemstream_core::separation::{Result, SeparationError};

use super::config::ModelType;

/// Manages model lookup, downloads and caching
pub struct ModelManager {
    /// Directory where models are cached
    cache_dir: PathBuf,
    /// Base URL for downloads; `None` disables downloading
    download_base_url: Option<String>,
}

impl ModelManager {
    /// Create a ModelManager with the default cache directory
    ///
    /// Default location: `~/.cache/stemstream/models/`
    pub fn new() -> Result<Self> {
        Ok(Self::with_cache_dir(Self::default_cache_dir()?))
    }

    /// Create a ModelManager with a custom cache directory
    pub fn with_cache_dir(cache_dir: PathBuf) -> Self {
        Self {
            cache_dir,
            download_base_url: None,
        }
    }

    /// Enable downloads of missing models from `base_url`
    pub fn with_download_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.download_base_url = Some(base_url.into());
        self
    }

    fn default_cache_dir() -> Result<PathBuf> {
        let base = dirs::cache_dir().ok_or_else(|| {
            SeparationError::InvalidConfig("Could not determine cache directory".to_string())
        })?;
        Ok(base.join("stemstream").join("models"))
    }

    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    /// Get the local path where a model would be stored
    pub fn model_path(&self, model: ModelType) -> PathBuf {
        self.cache_dir.join(model.filename())
    }

    /// Get the local path for the external data file
    pub fn data_path(&self, model: ModelType) -> PathBuf {
        self.cache_dir.join(model.data_filename())
    }

    /// Check if a model is present (including its external data file)
    pub fn is_model_available(&self, model: ModelType) -> bool {
        let model_exists = self.model_path(model).exists();
        let data_exists = !model.has_external_data() || self.data_path(model).exists();
        model_exists && data_exists
    }

    /// Get the path to a model, downloading missing files if allowed
    ///
    /// Returns the path of the `.onnx` file.
    pub fn ensure_model(&self, model: ModelType) -> Result<PathBuf> {
        let model_path = self.model_path(model);
        let data_path = self.data_path(model);

        let mut missing = Vec::new();
        if !model_path.exists() {
            missing.push((model.filename().to_string(), model_path.clone()));
        }
        if model.has_external_data() && !data_path.exists() {
            missing.push((model.data_filename(), data_path));
        }

        if missing.is_empty() {
            log::info!("Model {} found at {:?}", model, model_path);
            return Ok(model_path);
        }

        let Some(base_url) = &self.download_base_url else {
            return Err(SeparationError::ModelNotFound(missing.remove(0).1));
        };

        for (filename, target) in &missing {
            let url = format!("{}/{}", base_url.trim_end_matches('/'), filename);
            self.download_file(&url, target)?;
        }
        Ok(model_path)
    }

    /// Download a file into the cache directory
    ///
    /// The body goes to a `.tmp` file first and is renamed once complete.
    fn download_file(&self, url: &str, target_path: &Path) -> Result<()> {
        fs::create_dir_all(&self.cache_dir)?;
        let temp_path = target_path.with_extension("tmp");

        log::info!("Downloading {} to {:?}", url, target_path);

        let response = ureq::get(url)
            .call()
            .map_err(|e| SeparationError::ModelDownloadFailed(format!("{}: {}", url, e)))?;

        let content_length: Option<u64> = response
            .header("Content-Length")
            .and_then(|s| s.parse().ok());

        let mut file = fs::File::create(&temp_path)?;
        let mut reader = response.into_reader();
        let downloaded = io::copy(&mut reader, &mut file)?;
        file.flush()?;
        drop(file);

        if let Some(expected) = content_length {
            if downloaded != expected {
                fs::remove_file(&temp_path).ok();
                return Err(SeparationError::ModelDownloadFailed(format!(
                    "Download incomplete: expected {} bytes, got {}",
                    expected, downloaded
                )));
            }
        }

        fs::rename(&temp_path, target_path)?;

        log::info!(
            "Downloaded {:?} ({} bytes)",
            target_path.file_name().unwrap_or_default(),
            downloaded
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_model_paths() {
        let dir = TempDir::new().unwrap();
        let manager = ModelManager::with_cache_dir(dir.path().to_path_buf());

        assert_eq!(manager.model_path(ModelType::HtDemucs), dir.path().join("htdemucs.onnx"));
        assert_eq!(
            manager.data_path(ModelType::HtDemucsFt),
            dir.path().join("htdemucs_ft.onnx.data")
        );
    }

    #[test]
    fn test_missing_model_without_download_url() {
        let dir = TempDir::new().unwrap();
        let manager = ModelManager::with_cache_dir(dir.path().to_path_buf());

        assert!(!manager.is_model_available(ModelType::HtDemucs));
        match manager.ensure_model(ModelType::HtDemucs) {
            Err(SeparationError::ModelNotFound(path)) => {
                assert_eq!(path, dir.path().join("htdemucs.onnx"))
            }
            other => panic!("unexpected result {:?}", other),
        }
    }

    #[test]
    fn test_model_needs_its_data_file() {
        let dir = TempDir::new().unwrap();
        let manager = ModelManager::with_cache_dir(dir.path().to_path_buf());
        fs::write(manager.model_path(ModelType::HtDemucs), b"graph").unwrap();

        assert!(!manager.is_model_available(ModelType::HtDemucs));
        assert!(matches!(
            manager.ensure_model(ModelType::HtDemucs),
            Err(SeparationError::ModelNotFound(path)) if path.ends_with("htdemucs.onnx.data")
        ));

        fs::write(manager.data_path(ModelType::HtDemucs), b"weights").unwrap();
        assert!(manager.is_model_available(ModelType::HtDemucs));
        assert_eq!(
            manager.ensure_model(ModelType::HtDemucs).unwrap(),
            manager.model_path(ModelType::HtDemucs)
        );
    }
}
