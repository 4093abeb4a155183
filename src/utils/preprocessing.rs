//! Tensor preprocessing and postprocessing for the ONNX models
//!
//! Kept free of ONNX Runtime types so the numeric conventions can be tested
//! without model files.

use crate::error::{PipelineError, Result};
use crate::models::{clip, imagenet, SegmentationModel};
use image::{imageops::FilterType, DynamicImage, GrayImage, RgbImage};
use ndarray::{Array4, ArrayView2};

/// Image preprocessing utilities for the mask and embedding networks
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    /// U²-Net input: 320×320 Lanczos resize, scaled by the image maximum,
    /// ImageNet-normalized, NCHW.
    #[must_use]
    pub fn u2net_input(image: &DynamicImage) -> Array4<f32> {
        let size = SegmentationModel::INPUT_SIZE;
        let resized =
            image::imageops::resize(&image.to_rgb8(), size, size, FilterType::Lanczos3);

        let max_value = resized
            .pixels()
            .flat_map(|p| p.0)
            .max()
            .map_or(0.0, f32::from)
            .max(1e-6);

        Self::to_tensor(&resized, max_value, imagenet::MEAN, imagenet::STD)
    }

    /// CLIP input: shortest side to 224 (bicubic), center crop, rescale to
    /// 0..1, CLIP-normalized, NCHW.
    #[must_use]
    pub fn clip_input(image: &DynamicImage) -> Array4<f32> {
        let size = clip::INPUT_SIZE;
        let rgb = image.to_rgb8();
        let (width, height) = rgb.dimensions();
        let shortest = width.min(height).max(1);

        let scaled = |side: u32| {
            ((u64::from(side) * u64::from(size)) / u64::from(shortest)).max(u64::from(size)) as u32
        };
        let new_width = scaled(width);
        let new_height = scaled(height);
        let resized = image::imageops::resize(&rgb, new_width, new_height, FilterType::CatmullRom);

        let left = (new_width - size) / 2;
        let top = (new_height - size) / 2;
        let cropped = image::imageops::crop_imm(&resized, left, top, size, size).to_image();

        Self::to_tensor(&cropped, 255.0, clip::MEAN, clip::STD)
    }

    #[allow(clippy::indexing_slicing)]
    // Safe: tensor dimensions are allocated from the image dimensions
    fn to_tensor(image: &RgbImage, scale: f32, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
        let (width, height) = image.dimensions();
        let mut tensor = Array4::<f32>::zeros((1, 3, height as usize, width as usize));

        for (x, y, pixel) in image.enumerate_pixels() {
            for channel in 0..3 {
                tensor[[0, channel, y as usize, x as usize]] =
                    (f32::from(pixel[channel]) / scale - mean[channel]) / std[channel];
            }
        }

        tensor
    }

    /// Turn a raw U²-Net prediction into an 8-bit mask at the source size.
    ///
    /// The prediction is min-max normalized; a constant prediction yields an
    /// all-black mask.
    pub fn prediction_to_mask(
        prediction: ArrayView2<'_, f32>,
        width: u32,
        height: u32,
    ) -> Result<GrayImage> {
        let (rows, cols) = prediction.dim();
        let min = prediction.iter().copied().fold(f32::INFINITY, f32::min);
        let max = prediction.iter().copied().fold(f32::NEG_INFINITY, f32::max);
        let range = max - min;

        let pixels: Vec<u8> = prediction
            .iter()
            .map(|&value| {
                if range > f32::EPSILON {
                    (((value - min) / range) * 255.0).clamp(0.0, 255.0) as u8
                } else {
                    0
                }
            })
            .collect();

        let mask = GrayImage::from_raw(cols as u32, rows as u32, pixels).ok_or_else(|| {
            PipelineError::processing(format!(
                "Prediction of shape {rows}x{cols} is not a valid mask"
            ))
        })?;

        Ok(image::imageops::resize(&mask, width, height, FilterType::Lanczos3))
    }
}

/// Scale a vector to unit L2 norm; zero vectors are returned unchanged
#[must_use]
pub fn l2_normalize(mut vector: Vec<f32>) -> Vec<f32> {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > f32::EPSILON {
        for value in &mut vector {
            *value /= norm;
        }
    }
    vector
}

/// Dot product of two equally sized vectors
pub fn dot(a: &[f32], b: &[f32]) -> Result<f32> {
    if a.len() != b.len() {
        return Err(PipelineError::processing(format!(
            "Embedding length mismatch: {} vs {}",
            a.len(),
            b.len()
        )));
    }
    Ok(a.iter().zip(b).map(|(x, y)| x * y).sum())
}
