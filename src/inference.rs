//! Model boundary contracts
//!
//! Every pretrained network is reached through one of these traits. The
//! pipeline stages only see the traits, so the concrete runtimes (ONNX
//! sessions, the diffusion server) stay swappable and mockable.

use crate::error::Result;
use crate::utils::{dot, l2_normalize};
use async_trait::async_trait;
use image::{DynamicImage, GrayImage, RgbImage};

/// Foreground mask model: raw image bytes in, single-channel PNG bytes out
/// (white foreground, black background)
pub trait MaskGenerator {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Generate a mask for an encoded image
    ///
    /// # Errors
    /// - Undecodable input
    /// - Inference failures
    fn generate_mask(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>>;
}

/// Image embedding model
pub trait ImageEmbedder {
    /// Model name for logs
    fn name(&self) -> &str;

    /// Raw (unnormalized) feature vector for one image
    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<f32>>;

    /// L2-normalized feature vectors for a pair of images
    fn embed_pair(
        &mut self,
        first: &DynamicImage,
        second: &DynamicImage,
    ) -> Result<(Vec<f32>, Vec<f32>)> {
        let first = l2_normalize(self.embed(first)?);
        let second = l2_normalize(self.embed(second)?);
        Ok((first, second))
    }

    /// Cosine similarity of two images in embedding space
    fn similarity(&mut self, first: &DynamicImage, second: &DynamicImage) -> Result<f32> {
        let (a, b) = self.embed_pair(first, second)?;
        dot(&a, &b)
    }
}

/// Diffusion inpainting request: the white region of `mask` is repainted
#[derive(Debug, Clone)]
pub struct InpaintRequest {
    pub image: RgbImage,
    pub mask: GrayImage,
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub guidance_scale: f32,
}

/// Image-prompt conditioned text-to-image request
#[derive(Debug, Clone)]
pub struct VariationRequest {
    pub conditioning_image: RgbImage,
    pub prompt: String,
    pub negative_prompt: String,
    pub steps: u32,
    pub guidance_scale: f32,
    pub num_images: u32,
    pub width: u32,
    pub height: u32,
}

/// Diffusion inpainting model
#[async_trait]
pub trait InpaintModel: Send + Sync {
    /// Synthesize one image
    async fn inpaint(&self, request: &InpaintRequest) -> Result<DynamicImage>;
}

/// Text-to-image model with an image-prompt adapter
#[async_trait]
pub trait VariationModel: Send + Sync {
    /// Synthesize `request.num_images` images
    async fn generate_variations(&self, request: &VariationRequest) -> Result<Vec<DynamicImage>>;
}
