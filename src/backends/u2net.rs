//! U²-Net foreground mask generator

use super::onnx;
use crate::config::DeviceConfig;
use crate::error::{PipelineError, Result};
use crate::inference::MaskGenerator;
use crate::models::SegmentationModel;
use crate::services::ImageIOService;
use crate::utils::ImagePreprocessor;
use image::DynamicImage;
use ndarray::{Axis, Ix2};
use ort::session::Session;
use std::path::Path;

/// Mask generator backed by an ONNX Runtime U²-Net session
pub struct U2NetMaskGenerator {
    session: Session,
    model: SegmentationModel,
}

impl std::fmt::Debug for U2NetMaskGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("U2NetMaskGenerator")
            .field("model", &self.model)
            .finish_non_exhaustive()
    }
}

impl U2NetMaskGenerator {
    /// Load a U²-Net export from disk onto the configured device
    pub fn load(model: SegmentationModel, model_path: &Path, device: DeviceConfig) -> Result<Self> {
        tracing::info!(model = %model, device = %device.describe(), "Loading segmentation model");
        let session = onnx::build_session(model_path, device)?;
        Ok(Self { session, model })
    }

    #[must_use]
    pub fn model(&self) -> SegmentationModel {
        self.model
    }

    fn predict(&mut self, image: &DynamicImage) -> Result<image::GrayImage> {
        let input = ImagePreprocessor::u2net_input(image);
        let output = onnx::run_single(&mut self.session, input, None)?;

        // (1, 1, H, W): first batch item, first channel
        let prediction = output
            .index_axis(Axis(0), 0)
            .index_axis_move(Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .map_err(|e| {
                PipelineError::inference(format!("Unexpected U²-Net output shape: {e}"))
            })?;

        ImagePreprocessor::prediction_to_mask(prediction, image.width(), image.height())
    }
}

impl MaskGenerator for U2NetMaskGenerator {
    fn name(&self) -> &str {
        self.model.name()
    }

    fn generate_mask(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        let image = image::load_from_memory(image_bytes)?;
        let mask = self.predict(&image)?;
        ImageIOService::encode_png(&DynamicImage::ImageLuma8(mask))
    }
}
