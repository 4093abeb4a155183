//! CLIP vision tower embedder

use super::onnx;
use crate::config::DeviceConfig;
use crate::error::Result;
use crate::inference::ImageEmbedder;
use crate::models::{clip, CLIP_VISION};
use crate::utils::ImagePreprocessor;
use image::DynamicImage;
use ort::session::Session;
use std::path::Path;

/// Image embedder backed by the CLIP ViT-B/32 vision export
pub struct ClipImageEmbedder {
    session: Session,
}

impl std::fmt::Debug for ClipImageEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ClipImageEmbedder").finish_non_exhaustive()
    }
}

impl ClipImageEmbedder {
    pub fn load(model_path: &Path, device: DeviceConfig) -> Result<Self> {
        tracing::info!(
            model = CLIP_VISION.name,
            device = %device.describe(),
            "Loading embedding model"
        );
        let session = onnx::build_session(model_path, device)?;
        Ok(Self { session })
    }
}

impl ImageEmbedder for ClipImageEmbedder {
    fn name(&self) -> &str {
        CLIP_VISION.name
    }

    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<f32>> {
        let input = ImagePreprocessor::clip_input(image);
        let output = onnx::run_single(&mut self.session, input, Some(clip::EMBEDDING_OUTPUT))?;
        Ok(output.iter().copied().collect())
    }
}
