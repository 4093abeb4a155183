//! Foreground mask generation for the raw tree
//!
//! Every raw image gets a greyscale PNG mask at the mirrored path under the
//! mask root. Existing masks are never regenerated.

use crate::config::ensure_dir;
use crate::error::{PipelineError, Result};
use crate::inference::MaskGenerator;
use crate::naming::mirrored_path;
use crate::outcome::Outcome;
use crate::scan::{find_image_files, IMAGE_EXTENSIONS};
use crate::services::ProgressIndicator;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

/// Per-run tallies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentationReport {
    pub found: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub failed: usize,
    /// Wall time including model loading
    pub elapsed: Duration,
    pub output_root: PathBuf,
}

/// Result of a segmentation run
pub type SegmentationOutcome = Outcome<SegmentationReport>;

/// Batch mask generation over a raw tree
#[derive(Debug, Clone)]
pub struct Segmenter {
    input_root: PathBuf,
    output_root: PathBuf,
    show_progress: bool,
}

impl Segmenter {
    pub fn new<I: Into<PathBuf>, O: Into<PathBuf>>(input_root: I, output_root: O) -> Self {
        Self {
            input_root: input_root.into(),
            output_root: output_root.into(),
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Mask path for a raw image: same relative path, `.png` extension
    #[must_use]
    pub fn mask_path_for(&self, image: &Path) -> Option<PathBuf> {
        mirrored_path(image, &self.input_root, &self.output_root, Some("png"))
    }

    /// Scan the input tree, load the mask model and process every image.
    ///
    /// The model is only loaded once there is work to do. Missing input,
    /// an empty tree or a failed model load end the run early.
    pub async fn run<G, F, Fut>(&self, load_model: F) -> Result<SegmentationOutcome>
    where
        G: MaskGenerator,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<G>>,
    {
        if !self.input_root.exists() {
            tracing::error!(dir = %self.input_root.display(), "Input directory not found");
            return Ok(SegmentationOutcome::Aborted {
                reason: format!("Input directory not found: {}", self.input_root.display()),
            });
        }

        tracing::info!(dir = %self.input_root.display(), "🔍 Scanning images...");
        let images = find_image_files(&self.input_root, true, IMAGE_EXTENSIONS)?;
        if images.is_empty() {
            tracing::warn!("No images found.");
            return Ok(SegmentationOutcome::Aborted {
                reason: "No images found".to_string(),
            });
        }
        tracing::info!(count = images.len(), "Found images");

        let started = Instant::now();
        let mut generator = match load_model().await {
            Ok(generator) => generator,
            Err(e) => {
                tracing::error!(
                    error = %e,
                    "Model load failed. Check the ONNX Runtime installation."
                );
                return Ok(SegmentationOutcome::Aborted {
                    reason: format!("Model load failed: {e}"),
                });
            },
        };
        tracing::info!(model = generator.name(), "Mask model ready");

        Ok(SegmentationOutcome::Completed(self.process(
            &mut generator,
            &images,
            started,
        )))
    }

    /// Generate masks for `images` with an already loaded model
    pub fn process<G: MaskGenerator + ?Sized>(
        &self,
        generator: &mut G,
        images: &[PathBuf],
        started: Instant,
    ) -> SegmentationReport {
        let mut report = SegmentationReport {
            found: images.len(),
            succeeded: 0,
            skipped: 0,
            failed: 0,
            elapsed: Duration::ZERO,
            output_root: self.output_root.clone(),
        };

        let progress = ProgressIndicator::items("Processing", images.len(), self.show_progress);
        for image in images {
            match self.segment_one(generator, image) {
                Ok(true) => report.succeeded += 1,
                Ok(false) => report.skipped += 1,
                Err(e) => {
                    report.failed += 1;
                    let name = image.file_name().map(|n| n.to_string_lossy()).unwrap_or_default();
                    progress.println(&format!("Error processing {name}: {e}"));
                    tracing::warn!(file = %image.display(), error = %e, "Mask generation failed");
                },
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        report.elapsed = started.elapsed();
        tracing::info!(
            succeeded = report.succeeded,
            skipped = report.skipped,
            failed = report.failed,
            elapsed_s = report.elapsed.as_secs_f64(),
            "✅ Segmentation complete"
        );
        report
    }

    /// Returns `Ok(false)` when the mask already exists
    fn segment_one<G: MaskGenerator + ?Sized>(
        &self,
        generator: &mut G,
        image: &Path,
    ) -> Result<bool> {
        let _span = crate::tracing_config::spans::file_processing(image).entered();
        let mask_path = self.mask_path_for(image).ok_or_else(|| {
            PipelineError::internal(format!("{} is outside the input root", image.display()))
        })?;
        if mask_path.exists() {
            return Ok(false);
        }
        if let Some(parent) = mask_path.parent() {
            ensure_dir(parent)?;
        }

        let bytes = std::fs::read(image)
            .map_err(|e| PipelineError::file_io_error("read image", image, &e))?;
        let mask = generator.generate_mask(&bytes)?;
        std::fs::write(&mask_path, mask)
            .map_err(|e| PipelineError::file_io_error("write mask", &mask_path, &e))?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::test_helpers::write_jpeg;
    use crate::backends::test_utils::MockMaskGenerator;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_masks_mirror_raw_tree() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw");
        let masks = temp_dir.path().join("masks");
        write_jpeg(&raw.join("Beagle/Beagle_01.jpg"), [200, 150, 100]);
        write_jpeg(&raw.join("Persian/Persian_3.jpg"), [90, 90, 90]);

        let segmenter = Segmenter::new(&raw, &masks);
        let generator = MockMaskGenerator::new();
        let calls = generator.clone();
        let outcome = segmenter.run(|| async { Ok(generator) }).await.unwrap();

        let SegmentationOutcome::Completed(report) = outcome else {
            panic!("segmentation aborted");
        };
        assert_eq!((report.succeeded, report.skipped, report.failed), (2, 0, 0));
        assert_eq!(calls.call_count(), 2);

        let mask = image::open(masks.join("Beagle/Beagle_01.png")).unwrap();
        assert_eq!(mask.color(), image::ColorType::L8);
        assert_eq!((mask.width(), mask.height()), (16, 12));
    }

    #[tokio::test]
    async fn test_existing_masks_are_skipped() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw");
        let masks = temp_dir.path().join("masks");
        write_jpeg(&raw.join("Beagle/Beagle_01.jpg"), [200, 150, 100]);
        std::fs::create_dir_all(masks.join("Beagle")).unwrap();
        std::fs::write(masks.join("Beagle/Beagle_01.png"), b"existing").unwrap();

        let outcome = Segmenter::new(&raw, &masks)
            .run(|| async { Ok(MockMaskGenerator::new()) })
            .await
            .unwrap();

        let SegmentationOutcome::Completed(report) = outcome else {
            panic!("segmentation aborted");
        };
        assert_eq!((report.succeeded, report.skipped), (0, 1));
        assert_eq!(std::fs::read(masks.join("Beagle/Beagle_01.png")).unwrap(), b"existing");
    }

    #[tokio::test]
    async fn test_per_image_failures_are_counted() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw");
        write_jpeg(&raw.join("Beagle/Beagle_01.jpg"), [1, 2, 3]);
        std::fs::write(raw.join("Beagle/broken.png"), b"not a png").unwrap();

        let outcome = Segmenter::new(&raw, temp_dir.path().join("masks"))
            .run(|| async { Ok(MockMaskGenerator::new()) })
            .await
            .unwrap();

        let SegmentationOutcome::Completed(report) = outcome else {
            panic!("segmentation aborted");
        };
        assert_eq!((report.succeeded, report.failed), (1, 1));
    }

    #[tokio::test]
    async fn test_early_returns() {
        let temp_dir = tempdir().unwrap();
        let masks = temp_dir.path().join("masks");

        let missing = Segmenter::new(temp_dir.path().join("absent"), &masks)
            .run(|| async { Ok(MockMaskGenerator::new()) })
            .await
            .unwrap();
        assert!(matches!(missing, SegmentationOutcome::Aborted { .. }));

        let empty_root = temp_dir.path().join("empty");
        std::fs::create_dir_all(&empty_root).unwrap();
        let empty = Segmenter::new(&empty_root, &masks)
            .run(|| async { Ok(MockMaskGenerator::new()) })
            .await
            .unwrap();
        assert!(matches!(empty, SegmentationOutcome::Aborted { .. }));

        let raw = temp_dir.path().join("raw");
        write_jpeg(&raw.join("Cat/Cat_1.jpg"), [0, 0, 0]);
        let failed_load = Segmenter::new(&raw, &masks)
            .run(|| async { Err::<MockMaskGenerator, _>(PipelineError::model("no weights")) })
            .await
            .unwrap();
        match failed_load {
            SegmentationOutcome::Aborted { reason } => assert!(reason.contains("no weights")),
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(!masks.exists());
    }
}
