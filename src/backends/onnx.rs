//! ONNX Runtime session construction shared by the mask and embedding models
//!
//! Sessions are built once per process for one device: the execution
//! provider and GPU index are fixed at construction time.

use crate::config::{DeviceConfig, ExecutionProvider};
use crate::error::{PipelineError, Result};
use ndarray::{Array4, ArrayD};
use ort::execution_providers::{CUDAExecutionProvider, ExecutionProvider as OrtExecutionProvider};
use ort::session::{builder::GraphOptimizationLevel, Session};
use ort::value::Value;
use std::path::Path;

/// List ONNX Runtime execution providers with availability status and descriptions
///
/// Returns `(name, available, description)` tuples.
#[must_use]
pub fn list_providers() -> Vec<(String, bool, String)> {
    log::debug!("🔍 System Hardware Analysis:");
    log::debug!("  - Platform: {os}", os = std::env::consts::OS);
    log::debug!("  - Architecture: {arch}", arch = std::env::consts::ARCH);

    let cuda_available =
        OrtExecutionProvider::is_available(&CUDAExecutionProvider::default()).unwrap_or(false);
    if cuda_available {
        log::info!("✅ CUDA execution provider is available");
    } else {
        log::debug!("❌ CUDA execution provider is not available");
    }

    vec![
        (
            "CPU".to_string(),
            true,
            "Always available, uses CPU for inference".to_string(),
        ),
        (
            "CUDA".to_string(),
            cuda_available,
            "NVIDIA GPU acceleration (requires CUDA toolkit and compatible GPU)".to_string(),
        ),
    ]
}

/// Build an optimized session for `model_path` on the configured device
///
/// # Errors
/// - Model file missing or not a valid ONNX graph
/// - Explicit CUDA request could not be honored by the runtime
pub fn build_session(model_path: &Path, device: DeviceConfig) -> Result<Session> {
    let load_start = std::time::Instant::now();

    if !model_path.is_file() {
        return Err(PipelineError::model(format!(
            "Model file not found: {}",
            model_path.display()
        )));
    }

    let builder = Session::builder()
        .map_err(|e| PipelineError::inference(format!("Failed to create session builder: {e}")))?
        .with_optimization_level(GraphOptimizationLevel::Level3)
        .map_err(|e| {
            PipelineError::inference(format!("Failed to set optimization level: {e}"))
        })?;

    let cuda_provider = CUDAExecutionProvider::default().with_device_id(device.gpu_id as i32);
    let cuda_available = OrtExecutionProvider::is_available(&cuda_provider).unwrap_or(false);

    let builder = match device.execution_provider {
        ExecutionProvider::Cpu => {
            log::info!("Using CPU execution provider");
            builder
        },
        ExecutionProvider::Auto if !cuda_available => {
            log::warn!("⚠️ No hardware acceleration available, falling back to CPU");
            builder
        },
        ExecutionProvider::Cuda if !cuda_available => {
            log::warn!("CUDA execution provider requested but not available, falling back to CPU");
            builder
        },
        ExecutionProvider::Auto | ExecutionProvider::Cuda => {
            log::info!("🚀 Using CUDA execution provider on device {}", device.gpu_id);
            builder
                .with_execution_providers([cuda_provider.build()])
                .map_err(|e| {
                    PipelineError::inference(format!("Failed to set CUDA execution provider: {e}"))
                })?
        },
    };

    let session = builder.commit_from_file(model_path).map_err(|e| {
        PipelineError::model(format!(
            "Failed to load model '{}': {e}",
            model_path.display()
        ))
    })?;

    log::debug!("✅ ONNX Runtime session created successfully");
    log::debug!("  - Model: {}", model_path.display());
    log::debug!("  - Device: {}", device.describe());
    log::info!(
        "📊 Model loading complete: {:.0}ms",
        load_start.elapsed().as_secs_f64() * 1000.0
    );

    Ok(session)
}

/// Run a single-input session and extract the output named `output`,
/// or the first output when `output` is `None`
pub fn run_single(
    session: &mut Session,
    input: Array4<f32>,
    output: Option<&str>,
) -> Result<ArrayD<f32>> {
    let inference_start = std::time::Instant::now();
    log::debug!("🚀 Starting inference with input shape: {:?}", input.dim());

    let input_value = Value::from_array(input).map_err(|e| {
        PipelineError::processing(format!("Failed to convert input tensor: {e}"))
    })?;

    let outputs = session
        .run(ort::inputs![input_value])
        .map_err(|e| PipelineError::inference(format!("ONNX inference failed: {e}")))?;

    let key = match output {
        Some(name) => name.to_string(),
        None => outputs
            .keys()
            .next()
            .map(ToString::to_string)
            .ok_or_else(|| PipelineError::inference("No output tensors found"))?,
    };

    let tensor = outputs
        .get(key.as_str())
        .ok_or_else(|| PipelineError::inference(format!("Output tensor '{key}' not found")))?
        .try_extract_array::<f32>()
        .map_err(|e| PipelineError::inference(format!("Failed to extract output tensor: {e}")))?
        .to_owned();

    log::debug!(
        "  ⚡ Inference: {:.2}ms, output '{key}' shape {:?}",
        inference_start.elapsed().as_secs_f64() * 1000.0,
        tensor.shape()
    );

    Ok(tensor)
}
