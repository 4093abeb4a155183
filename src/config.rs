//! Configuration types for dataset preparation

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Oxford-IIIT Pet image archive
pub const DATASET_URL: &str = "https://www.robots.ox.ac.uk/~vgg/data/pets/data/images.tar.gz";

/// Directory layout shared by every stage:
/// `<root>/raw/<class>/<file>.jpg`, `<root>/masks/<class>/<file>.png`,
/// `<root>/augmented/<method>/<class>/<file>_<tag>.jpg`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataLayout {
    pub root: PathBuf,
}

impl Default for DataLayout {
    fn default() -> Self {
        Self::new("data")
    }
}

impl DataLayout {
    pub fn new<P: Into<PathBuf>>(root: P) -> Self {
        Self { root: root.into() }
    }

    #[must_use]
    pub fn raw(&self) -> PathBuf {
        self.root.join("raw")
    }

    #[must_use]
    pub fn masks(&self) -> PathBuf {
        self.root.join("masks")
    }

    #[must_use]
    pub fn augmented(&self) -> PathBuf {
        self.root.join("augmented")
    }

    /// Output root of one augmentation method
    #[must_use]
    pub fn augmented_method(&self, method: &str) -> PathBuf {
        self.augmented().join(method)
    }

    /// Scratch area used by the repair step
    #[must_use]
    pub fn repair_temp(&self) -> PathBuf {
        self.root.join("temp_fix")
    }
}

/// Execution provider options for ONNX Runtime
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ExecutionProvider {
    /// CUDA when available, CPU otherwise
    #[default]
    Auto,
    /// CPU execution (always available)
    Cpu,
    /// NVIDIA CUDA GPU acceleration
    Cuda,
}

impl std::fmt::Display for ExecutionProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Auto => write!(f, "auto"),
            Self::Cpu => write!(f, "cpu"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

impl std::str::FromStr for ExecutionProvider {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "auto" => Ok(Self::Auto),
            "cpu" => Ok(Self::Cpu),
            "cuda" => Ok(Self::Cuda),
            other => Err(PipelineError::invalid_config(format!(
                "Unknown execution provider '{other}' (expected auto, cpu or cuda)"
            ))),
        }
    }
}

/// Device selection for ONNX sessions: one provider and one GPU index per process
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DeviceConfig {
    pub execution_provider: ExecutionProvider,
    pub gpu_id: u32,
}

impl DeviceConfig {
    #[must_use]
    pub fn new(execution_provider: ExecutionProvider, gpu_id: u32) -> Self {
        Self {
            execution_provider,
            gpu_id,
        }
    }

    /// Human-readable device name for logs
    #[must_use]
    pub fn describe(&self) -> String {
        match self.execution_provider {
            ExecutionProvider::Cpu => "cpu".to_string(),
            ExecutionProvider::Auto | ExecutionProvider::Cuda => format!("cuda:{}", self.gpu_id),
        }
    }
}

/// Base port of the diffusion server bound to GPU 0
pub const DIFFUSION_BASE_PORT: u32 = 7860;

/// Largest GPU index whose default server port is still a valid TCP port
pub const MAX_DIFFUSION_GPU_ID: u32 = 65_535 - DIFFUSION_BASE_PORT;

/// Multistep sampler used for every diffusion request
pub const DEFAULT_SAMPLER: &str = "DPM++ 2M";

/// Connection settings for a Stable Diffusion WebUI compatible server
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffusionConfig {
    /// Server base URL, e.g. `http://127.0.0.1:7860`
    pub base_url: String,
    /// Checkpoint to load before generating (`None` keeps the server's current one)
    pub checkpoint: Option<String>,
    /// Sampler name as known to the server
    pub sampler: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl DiffusionConfig {
    /// Server URL for a GPU: one server per device, listening on `7860 + gpu_id`.
    /// Indices above [`MAX_DIFFUSION_GPU_ID`] yield a URL that fails [`Self::validate`].
    #[must_use]
    pub fn url_for_gpu(gpu_id: u32) -> String {
        let port = u64::from(DIFFUSION_BASE_PORT) + u64::from(gpu_id);
        format!("http://127.0.0.1:{port}")
    }

    #[must_use]
    pub fn for_gpu(gpu_id: u32) -> Self {
        Self {
            base_url: Self::url_for_gpu(gpu_id),
            checkpoint: None,
            sampler: DEFAULT_SAMPLER.to_string(),
            timeout: Duration::from_secs(600),
        }
    }

    #[must_use]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = base_url.into();
        self
    }

    #[must_use]
    pub fn with_checkpoint<S: Into<String>>(mut self, checkpoint: Option<S>) -> Self {
        self.checkpoint = checkpoint.map(Into::into);
        self
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(PipelineError::invalid_config(format!(
                "Diffusion server URL must start with http:// or https://: {}",
                self.base_url
            )));
        }
        // rejects ports above 65535 among other malformed URLs
        if let Err(e) = reqwest::Url::parse(&self.base_url) {
            return Err(PipelineError::invalid_config(format!(
                "Invalid diffusion server URL '{}': {e}",
                self.base_url
            )));
        }
        if self.timeout.is_zero() {
            return Err(PipelineError::invalid_config(
                "Diffusion request timeout must be greater than zero",
            ));
        }
        Ok(())
    }

    /// Endpoint URL below the server base
    #[must_use]
    pub fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }
}

impl Default for DiffusionConfig {
    fn default() -> Self {
        Self::for_gpu(0)
    }
}

/// Ensure a directory exists, reporting the path on failure
pub(crate) fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)
        .map_err(|e| PipelineError::file_io_error("create directory", path, &e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_data_layout_paths() {
        let layout = DataLayout::default();
        assert_eq!(layout.raw(), PathBuf::from("data/raw"));
        assert_eq!(layout.masks(), PathBuf::from("data/masks"));
        assert_eq!(
            layout.augmented_method("inpainting_bg"),
            PathBuf::from("data/augmented/inpainting_bg")
        );
        assert_eq!(layout.repair_temp(), PathBuf::from("data/temp_fix"));
    }

    #[test]
    fn test_execution_provider_parsing() {
        assert_eq!("cuda".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cuda);
        assert_eq!("CPU".parse::<ExecutionProvider>().unwrap(), ExecutionProvider::Cpu);
        assert!("coreml".parse::<ExecutionProvider>().is_err());
        assert_eq!(ExecutionProvider::default().to_string(), "auto");
    }

    #[test]
    fn test_device_describe() {
        assert_eq!(DeviceConfig::new(ExecutionProvider::Auto, 2).describe(), "cuda:2");
        assert_eq!(DeviceConfig::new(ExecutionProvider::Cpu, 2).describe(), "cpu");
    }

    #[test]
    fn test_diffusion_config() {
        let config = DiffusionConfig::for_gpu(1);
        assert_eq!(config.base_url, "http://127.0.0.1:7861");
        assert_eq!(config.sampler, DEFAULT_SAMPLER);
        assert!(config.validate().is_ok());

        let config = config.with_base_url("http://gpu-box:7860/");
        assert_eq!(config.endpoint("/sdapi/v1/img2img"), "http://gpu-box:7860/sdapi/v1/img2img");

        let invalid = DiffusionConfig::default().with_base_url("gpu-box:7860");
        assert!(invalid.validate().is_err());

        let invalid = DiffusionConfig::default().with_timeout(Duration::ZERO);
        assert!(invalid.validate().is_err());
    }

    #[test]
    fn test_gpu_port_bounds() {
        let last = DiffusionConfig::for_gpu(MAX_DIFFUSION_GPU_ID);
        assert_eq!(last.base_url, "http://127.0.0.1:65535");
        assert!(last.validate().is_ok());

        let past_range = DiffusionConfig::for_gpu(70_000);
        assert_eq!(past_range.base_url, "http://127.0.0.1:77860");
        assert!(past_range.validate().is_err());

        let extreme = DiffusionConfig::for_gpu(u32::MAX);
        assert!(extreme.validate().is_err());
    }
}
