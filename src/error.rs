//! Error types for dataset preparation operations

use thiserror::Error;

/// Result type alias for dataset preparation operations
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Failure of any pipeline component.
///
/// Per-item problems inside batch loops are logged and counted by the caller;
/// a value of this type reaching the binary means the command failed.
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image processing error: {0}")]
    Image(#[from] image::ImageError),

    /// Dataset download or diffusion server request
    #[error("Network error: {0}")]
    Network(String),

    /// Dataset `.tar.gz` could not be unpacked
    #[error("Archive error: {0}")]
    Archive(String),

    #[error("Inference error: {0}")]
    Inference(String),

    /// ONNX session creation, checkpoint loading
    #[error("Model error: {0}")]
    Model(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Processing error: {0}")]
    Processing(String),

    /// Child stage of the pipeline controller exited non-zero
    #[error("Step [{stage}] failed (exit code: {code})")]
    StageFailed { stage: String, code: i32 },

    /// Ctrl-C while a child stage was running
    #[error("Step [{stage}] interrupted by user")]
    Interrupted { stage: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn invalid_config<S: Into<String>>(msg: S) -> Self {
        Self::InvalidConfig(msg.into())
    }

    pub fn model<S: Into<String>>(msg: S) -> Self {
        Self::Model(msg.into())
    }

    pub fn processing<S: Into<String>>(msg: S) -> Self {
        Self::Processing(msg.into())
    }

    pub fn inference<S: Into<String>>(msg: S) -> Self {
        Self::Inference(msg.into())
    }

    pub fn archive<S: Into<String>>(msg: S) -> Self {
        Self::Archive(msg.into())
    }

    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// Wrap an IO error with the attempted operation and path, keeping its kind
    pub fn file_io_error<P: AsRef<std::path::Path>>(
        operation: &str,
        path: P,
        error: &std::io::Error,
    ) -> Self {
        let message = format!("Failed to {operation} '{}': {error}", path.as_ref().display());
        Self::Io(std::io::Error::new(error.kind(), message))
    }

    pub fn network_error<S: Into<String>, E: std::fmt::Display>(context: S, error: E) -> Self {
        Self::Network(format!("{}: {error}", context.into()))
    }

    /// Out-of-range parameter, e.g. an adapter scale above 1.0
    pub fn config_value_error<T: std::fmt::Display>(
        parameter: &str,
        value: T,
        valid_range: &str,
    ) -> Self {
        Self::InvalidConfig(format!("Invalid {parameter}: {value} (valid range: {valid_range})"))
    }
}
