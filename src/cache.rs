//! Model cache management for downloaded ONNX weights
//!
//! Models live in an XDG-compliant cache directory:
//! - Linux/macOS: `~/.cache/petaug/models/`
//! - Windows: `%LOCALAPPDATA%/petaug/models/`
//!
//! `PETAUG_CACHE_DIR` overrides the location.

use crate::download::Downloader;
use crate::error::{PipelineError, Result};
use crate::models::ModelSpec;
use std::fs;
use std::path::{Path, PathBuf};

/// Environment variable overriding the cache root
pub const CACHE_DIR_ENV: &str = "PETAUG_CACHE_DIR";

/// Model cache manager
#[derive(Debug, Clone)]
pub struct ModelCache {
    cache_dir: PathBuf,
}

impl ModelCache {
    /// Create a cache manager at the default location
    ///
    /// # Errors
    /// - Failed to determine cache directory
    /// - Failed to create cache directory
    pub fn new() -> Result<Self> {
        Self::with_dir(Self::default_cache_dir()?)
    }

    /// Create a cache manager rooted at `cache_dir`
    pub fn with_dir<P: Into<PathBuf>>(cache_dir: P) -> Result<Self> {
        let cache_dir = cache_dir.into();
        if !cache_dir.exists() {
            fs::create_dir_all(&cache_dir).map_err(|e| {
                PipelineError::file_io_error("create cache directory", &cache_dir, &e)
            })?;
        }
        Ok(Self { cache_dir })
    }

    fn default_cache_dir() -> Result<PathBuf> {
        if let Ok(cache_override) = std::env::var(CACHE_DIR_ENV) {
            return Ok(PathBuf::from(cache_override).join("models"));
        }

        Ok(dirs::cache_dir()
            .ok_or_else(|| {
                PipelineError::invalid_config(format!(
                    "Failed to determine cache directory. Set {CACHE_DIR_ENV} environment variable."
                ))
            })?
            .join("petaug")
            .join("models"))
    }

    #[must_use]
    pub fn cache_dir(&self) -> &Path {
        &self.cache_dir
    }

    #[must_use]
    pub fn model_path(&self, spec: &ModelSpec) -> PathBuf {
        self.cache_dir.join(spec.file_name)
    }

    /// A model counts as cached when its file exists and is non-empty
    #[must_use]
    pub fn is_cached(&self, spec: &ModelSpec) -> bool {
        fs::metadata(self.model_path(spec)).is_ok_and(|m| m.is_file() && m.len() > 0)
    }

    /// Return the cached model path, downloading it first if needed.
    ///
    /// The file is fetched to a `.part` sibling and renamed into place, so an
    /// interrupted download is never mistaken for a cached model.
    pub async fn ensure_model(&self, spec: &ModelSpec, downloader: &Downloader) -> Result<PathBuf> {
        let final_path = self.model_path(spec);
        if self.is_cached(spec) {
            tracing::debug!(model = spec.name, path = %final_path.display(), "Model cache hit");
            return Ok(final_path);
        }

        tracing::info!(model = spec.name, "Model not cached, downloading");
        let part_path = final_path.with_extension("onnx.part");
        downloader.download_file(spec.url, &part_path).await?;
        fs::rename(&part_path, &final_path).map_err(|e| {
            PipelineError::file_io_error("move downloaded model to cache", &final_path, &e)
        })?;

        tracing::info!(model = spec.name, path = %final_path.display(), "Model cached");
        Ok(final_path)
    }
}
