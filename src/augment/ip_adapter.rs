//! Image-prompt variations (IP-Adapter)

use super::{missing_raw_root, AugmentOutcome, AugmentReport, GUIDANCE_SCALE, TARGET_SIZE};
use crate::config::ensure_dir;
use crate::error::{PipelineError, Result};
use crate::inference::{VariationModel, VariationRequest};
use crate::naming::{class_phrase, mirrored_parent, stem_str, variant_file_name};
use crate::scan::{find_image_files, JPEG_EXTENSIONS};
use crate::services::{ImageIOService, ProgressIndicator};
use crate::tracing_config::spans;
use std::path::Path;
use tracing::Instrument;

pub const NEGATIVE_PROMPT: &str = "deformed, distorted, disfigured, bad anatomy, bad eyes, extra limbs, blurry, low quality, watermark, text, ugly, mutation";

pub const INFERENCE_STEPS: u32 = 30;

/// Default base checkpoint on the diffusion server
pub const DEFAULT_CHECKPOINT: &str = "v1-5-pruned-emaonly";

pub const DEFAULT_NUM_VARIATIONS: u32 = 2;

pub const DEFAULT_ADAPTER_SCALE: f32 = 0.6;

/// Text prompt for a class phrase such as `basset hound`
#[must_use]
pub fn class_prompt(class_phrase: &str) -> String {
    format!("a photo of a {class_phrase}, high quality, realistic, detailed fur")
}

/// Tag of the `index`-th variant
#[must_use]
pub fn variation_tag(index: u32) -> String {
    format!("var{index}")
}

/// Image-conditioned variation generator over a raw tree
pub struct IpAdapterAugmentor<M> {
    model: M,
    num_variations: u32,
    show_progress: bool,
}

impl<M: VariationModel> IpAdapterAugmentor<M> {
    /// # Errors
    /// `num_variations` must be at least 1
    pub fn new(model: M, num_variations: u32) -> Result<Self> {
        if num_variations == 0 {
            return Err(PipelineError::config_value_error("num_vars", num_variations, ">= 1"));
        }
        Ok(Self {
            model,
            num_variations,
            show_progress: false,
        })
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    pub async fn run(&self, raw_root: &Path, output_root: &Path) -> Result<AugmentOutcome> {
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

        let progress =
            ProgressIndicator::items("IP-Adapter Variation", images.len(), self.show_progress);
        for image in &images {
            progress.inc(1);
            let Some(class_output_dir) = mirrored_parent(image, raw_root, output_root) else {
                continue;
            };
            ensure_dir(&class_output_dir)?;

            let done = stem_str(image).is_some_and(|stem| {
                class_output_dir.join(variant_file_name(stem, &variation_tag(0))).exists()
            });
            if done {
                continue;
            }

            report.attempted += 1;
            report.generated += self.augment_image(image, &class_output_dir).await;
            progress.set_message(format!("New Images: {}", report.generated));
        }
        progress.finish_and_clear();

        tracing::info!(generated = report.generated, "✅ Task complete");
        Ok(AugmentOutcome::Completed(report))
    }

    /// Generate the variants of one image; 0 when `<stem>_var0.jpg` exists
    /// or on any error (logged with the file name).
    pub async fn augment_image(&self, image: &Path, output_dir: &Path) -> usize {
        match self
            .try_augment_image(image, output_dir)
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

    async fn try_augment_image(&self, image: &Path, output_dir: &Path) -> Result<usize> {
        let stem = stem_str(image)
            .ok_or_else(|| {
                PipelineError::processing(format!("Invalid file name: {}", image.display()))
            })?;

        // only the first variant marks the source as done
        if output_dir.join(variant_file_name(stem, &variation_tag(0))).exists() {
            return Ok(0);
        }

        let class_name = image
            .parent()
            .and_then(Path::file_name)
            .and_then(|n| n.to_str())
            .unwrap_or_default();

        let request = VariationRequest {
            conditioning_image: ImageIOService::load_rgb_square(image, TARGET_SIZE)?,
            prompt: class_prompt(&class_phrase(class_name)),
            negative_prompt: NEGATIVE_PROMPT.to_string(),
            steps: INFERENCE_STEPS,
            guidance_scale: GUIDANCE_SCALE,
            num_images: self.num_variations,
            width: TARGET_SIZE,
            height: TARGET_SIZE,
        };

        let images = self.model.generate_variations(&request).await?;
        for (index, generated) in (0u32..).zip(&images) {
            let save_path = output_dir.join(variant_file_name(stem, &variation_tag(index)));
            ImageIOService::save_jpeg(generated, &save_path)?;
        }
        Ok(images.len())
    }
}
