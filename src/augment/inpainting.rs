//! Background replacement by diffusion inpainting
//!
//! The foreground mask is inverted so the model repaints everything except
//! the pet. Each source yields one image per [`Scene`].

use super::{missing_raw_root, AugmentOutcome, AugmentReport, Scene, GUIDANCE_SCALE, TARGET_SIZE};
use crate::config::ensure_dir;
use crate::error::{PipelineError, Result};
use crate::inference::{InpaintModel, InpaintRequest};
use crate::naming::{mirrored_parent, mirrored_path, stem_str, variant_file_name};
use crate::scan::{find_image_files, JPEG_EXTENSIONS};
use crate::services::{ImageIOService, ProgressIndicator};
use crate::tracing_config::spans;
use std::path::Path;
use tracing::Instrument;

/// Negative prompt shared by every scene
pub const NEGATIVE_PROMPT: &str = "ugly, blurry, low quality, deformed, distorted, bad anatomy, bad proportions, watermark, text, signature, mutation, extra limbs";

/// Denoising steps per image
pub const INFERENCE_STEPS: u32 = 25;

/// Default inpainting checkpoint on the diffusion server
pub const DEFAULT_CHECKPOINT: &str = "sd-v1-5-inpainting";

/// Scene-prompted background inpainting over a raw tree
pub struct InpaintingAugmentor<M> {
    model: M,
    show_progress: bool,
}

impl<M: InpaintModel> InpaintingAugmentor<M> {
    pub fn new(model: M) -> Self {
        Self {
            model,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Augment every raw `*.jpg` that has a mask.
    ///
    /// Images without a mask are skipped silently.
    pub async fn run(
        &self,
        raw_root: &Path,
        mask_root: &Path,
        output_root: &Path,
    ) -> Result<AugmentOutcome> {
        if let Some(reason) = missing_raw_root(raw_root) {
            tracing::error!(dir = %raw_root.display(), "Raw directory not found");
            return Ok(AugmentOutcome::aborted(reason));
        }

        let images = find_image_files(raw_root, true, JPEG_EXTENSIONS)?;
        tracing::info!(count = images.len(), "Found raw images");

        let mut report = AugmentReport {
            sources: images.len(),
            output_root: output_root.to_path_buf(),
            ..AugmentReport::default()
        };

        let progress = ProgressIndicator::items("Inpainting", images.len(), self.show_progress);
        for image in &images {
            progress.inc(1);
            let Some(mask) = mirrored_path(image, raw_root, mask_root, Some("png")) else {
                continue;
            };
            if !mask.exists() {
                continue;
            }
            let Some(class_output_dir) = mirrored_parent(image, raw_root, output_root) else {
                continue;
            };
            ensure_dir(&class_output_dir)?;

            report.attempted += 1;
            report.generated += self.augment_image(image, &mask, &class_output_dir).await;
            progress.set_message(format!("New Images: {}", report.generated));
        }
        progress.finish_and_clear();

        tracing::info!(generated = report.generated, "✅ Task complete");
        Ok(AugmentOutcome::Completed(report))
    }

    /// Generate the missing scene variants of one image.
    ///
    /// Returns the number of new files. Any error is logged with the file
    /// name and yields 0.
    pub async fn augment_image(&self, image: &Path, mask: &Path, output_dir: &Path) -> usize {
        match self
            .try_augment_image(image, mask, output_dir)
            .instrument(spans::file_processing(image))
            .await
        {
            Ok(count) => count,
            Err(e) => {
                let name = image.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                tracing::error!(error = %e, "Error processing {name}");
                0
            },
        }
    }

    async fn try_augment_image(
        &self,
        image: &Path,
        mask: &Path,
        output_dir: &Path,
    ) -> Result<usize> {
        let stem = stem_str(image)
            .ok_or_else(|| {
                PipelineError::processing(format!("Invalid file name: {}", image.display()))
            })?;

        let init_image = ImageIOService::load_rgb_square(image, TARGET_SIZE)?;
        let mask_luma = ImageIOService::load_luma_square(mask, TARGET_SIZE)?;
        let mask_image = ImageIOService::invert_mask(&mask_luma);

        let mut generated = 0;
        for scene in Scene::ALL {
            let save_path = output_dir.join(variant_file_name(stem, scene.tag()));
            if save_path.exists() {
                continue;
            }

            let request = InpaintRequest {
                image: init_image.clone(),
                mask: mask_image.clone(),
                prompt: scene.prompt().to_string(),
                negative_prompt: NEGATIVE_PROMPT.to_string(),
                steps: INFERENCE_STEPS,
                guidance_scale: GUIDANCE_SCALE,
            };
            let result = self.model.inpaint(&request).await?;
            ImageIOService::save_jpeg(&result, &save_path)?;
            generated += 1;
        }

        Ok(generated)
    }
}
