//! Concrete model implementations
//!
//! - ONNX Runtime sessions for the U²-Net mask model and the CLIP vision tower
//! - HTTP client for the diffusion server (inpainting and IP-Adapter variations)

#[cfg(feature = "onnx")]
pub mod clip;
pub mod diffusion;
#[cfg(feature = "onnx")]
pub mod onnx;
#[cfg(feature = "onnx")]
pub mod u2net;

// Test utilities for backend testing
#[cfg(test)]
pub mod test_utils;

#[cfg(feature = "onnx")]
pub use self::clip::ClipImageEmbedder;
pub use self::diffusion::{DiffusionClient, IpAdapterConfig};
#[cfg(feature = "onnx")]
pub use self::u2net::U2NetMaskGenerator;
