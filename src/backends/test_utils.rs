//! Test utilities and mock models
//!
//! Mock implementations of the model traits so the pipeline stages can be
//! tested without model files, ONNX Runtime or a diffusion server.

use crate::error::{PipelineError, Result};
use crate::inference::{
    ImageEmbedder, InpaintModel, InpaintRequest, MaskGenerator, VariationModel, VariationRequest,
};
use crate::services::ImageIOService;
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use std::sync::{Arc, Mutex};

/// Mock mask model producing a centered square foreground
#[derive(Debug, Clone, Default)]
pub struct MockMaskGenerator {
    /// Number of `generate_mask` calls
    calls: Arc<Mutex<usize>>,
    /// Whether to simulate inference failure
    should_fail: bool,
}

impl MockMaskGenerator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn call_count(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

impl MaskGenerator for MockMaskGenerator {
    fn name(&self) -> &str {
        "mock-u2net"
    }

    fn generate_mask(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        *self.calls.lock().unwrap() += 1;
        if self.should_fail {
            return Err(PipelineError::inference("Mock mask inference failed"));
        }

        let image = image::load_from_memory(image_bytes)?;
        let (width, height) = (image.width(), image.height());
        let mask = GrayImage::from_fn(width, height, |x, y| {
            let inside = (width / 4..width * 3 / 4).contains(&x)
                && (height / 4..height * 3 / 4).contains(&y);
            Luma([if inside { 255 } else { 0 }])
        });
        ImageIOService::encode_png(&DynamicImage::ImageLuma8(mask))
    }
}

/// Mock embedder: the embedding is the mean RGB color of the image
#[derive(Debug, Clone, Default)]
pub struct MockEmbedder {
    should_fail: bool,
}

impl MockEmbedder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_failing() -> Self {
        Self { should_fail: true }
    }
}

impl ImageEmbedder for MockEmbedder {
    fn name(&self) -> &str {
        "mock-clip"
    }

    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<f32>> {
        if self.should_fail {
            return Err(PipelineError::inference("Mock embedding failed"));
        }

        let rgb = image.to_rgb8();
        let count = (rgb.width() * rgb.height()).max(1) as f32;
        let mut sums = [0.0_f32; 3];
        for pixel in rgb.pixels() {
            for (sum, value) in sums.iter_mut().zip(pixel.0) {
                *sum += f32::from(value);
            }
        }
        Ok(sums.iter().map(|sum| sum / count).collect())
    }
}

/// Mock diffusion model returning solid-color images and recording prompts
#[derive(Debug, Clone, Default)]
pub struct MockDiffusion {
    prompts: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
}

impl MockDiffusion {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Prompts received so far, in call order
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    fn record(&self, prompt: &str) -> Result<()> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        if self.should_fail {
            return Err(PipelineError::inference("Mock diffusion failed"));
        }
        Ok(())
    }
}

#[async_trait]
impl InpaintModel for MockDiffusion {
    async fn inpaint(&self, request: &InpaintRequest) -> Result<DynamicImage> {
        self.record(&request.prompt)?;
        let (width, height) = request.image.dimensions();
        Ok(DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([30, 120, 200]))))
    }
}

#[async_trait]
impl VariationModel for MockDiffusion {
    async fn generate_variations(&self, request: &VariationRequest) -> Result<Vec<DynamicImage>> {
        self.record(&request.prompt)?;
        Ok((0..request.num_images)
            .map(|i| {
                let shade = (i * 40 % 256) as u8;
                DynamicImage::ImageRgb8(RgbImage::from_pixel(
                    request.width,
                    request.height,
                    Rgb([shade, 100, 100]),
                ))
            })
            .collect())
    }
}

/// Helpers for building fixture files
pub mod test_helpers {
    use image::{DynamicImage, Rgb, RgbImage};
    use std::path::Path;

    /// Write a small solid-color JPEG, creating parent directories
    pub fn write_jpeg(path: &Path, color: [u8; 3]) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        DynamicImage::ImageRgb8(RgbImage::from_pixel(16, 12, Rgb(color)))
            .save_with_format(path, image::ImageFormat::Jpeg)
            .unwrap();
    }

    /// Write a small solid greyscale PNG mask, creating parent directories
    pub fn write_mask(path: &Path, value: u8) {
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        image::GrayImage::from_pixel(16, 12, image::Luma([value]))
            .save_with_format(path, image::ImageFormat::Png)
            .unwrap();
    }

    /// Build an in-memory `.tar.gz` from `(path, contents)` entries
    pub fn build_tar_gz(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
        let mut builder = tar::Builder::new(encoder);
        for (name, data) in entries {
            let mut header = tar::Header::new_gnu();
            header.set_size(data.len() as u64);
            header.set_mode(0o644);
            header.set_cksum();
            builder
                .append_data(&mut header, name, *data)
                .unwrap();
        }
        builder.into_inner().unwrap().finish().unwrap()
    }
}

pub use test_helpers::build_tar_gz;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_mask_generator() {
        let mut generator = MockMaskGenerator::new();
        let image = DynamicImage::ImageRgb8(RgbImage::new(8, 8));
        let bytes = ImageIOService::encode_png(&image).unwrap();

        let mask = image::load_from_memory(&generator.generate_mask(&bytes).unwrap()).unwrap();
        let mask = mask.to_luma8();
        assert_eq!(mask.dimensions(), (8, 8));
        assert_eq!(mask.get_pixel(4, 4).0[0], 255);
        assert_eq!(mask.get_pixel(0, 0).0[0], 0);
        assert_eq!(generator.call_count(), 1);

        let mut failing = MockMaskGenerator::new_failing();
        assert!(failing.generate_mask(&bytes).is_err());
    }

    #[tokio::test]
    async fn test_mock_diffusion_records_prompts() {
        let model = MockDiffusion::new();
        let request = InpaintRequest {
            image: RgbImage::new(4, 4),
            mask: GrayImage::new(4, 4),
            prompt: "snow".to_string(),
            negative_prompt: String::new(),
            steps: 1,
            guidance_scale: 1.0,
        };
        let output = model.inpaint(&request).await.unwrap();
        assert_eq!(output.width(), 4);
        assert_eq!(model.prompts(), vec!["snow".to_string()]);
    }

    #[test]
    fn test_build_tar_gz_extracts() {
        let archive = build_tar_gz(&[("images/Beagle_1.jpg", b"x".as_slice())]);
        let decoder = flate2::read::GzDecoder::new(archive.as_slice());
        let mut tar = tar::Archive::new(decoder);
        let names: Vec<String> = tar
            .entries()
            .unwrap()
            .map(|e| e.unwrap().path().unwrap().display().to_string())
            .collect();
        assert_eq!(names, vec!["images/Beagle_1.jpg"]);
    }
}
