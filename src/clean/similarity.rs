//! Fidelity audit of augmented images against their raw sources
//!
//! A variant whose embedding drifts too far from its source (cosine
//! similarity below [`THRESHOLD`]) is flagged as substandard.

use super::integrity::remove_logged;
use super::REPORT_LIMIT;
use crate::error::Result;
use crate::inference::ImageEmbedder;
use crate::naming::{mirrored_parent, source_stem, stem_str};
use crate::scan::{find_image_files, JPEG_EXTENSIONS};
use crate::services::{ImageIOService, ProgressIndicator};
use std::path::{Path, PathBuf};

/// Minimum acceptable source/variant similarity
pub const THRESHOLD: f32 = 0.8;

/// A variant scoring below the threshold
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityFinding {
    pub path: PathBuf,
    pub score: f32,
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityReport {
    pub root: PathBuf,
    pub threshold: f32,
    /// Augmented images found
    pub scanned: usize,
    /// Images with a located source and a computed score
    pub audited: usize,
    /// Images whose source could not be located
    pub skipped: usize,
    pub substandard: Vec<SimilarityFinding>,
    pub delete_mode: bool,
}

impl SimilarityReport {
    #[must_use]
    pub fn deleted(&self) -> usize {
        self.substandard.iter().filter(|f| f.deleted).count()
    }

    #[must_use]
    pub fn itemized(&self) -> &[SimilarityFinding] {
        self.substandard.get(..self.substandard.len().min(REPORT_LIMIT)).unwrap_or_default()
    }
}

/// Raw source of an augmented file: `<raw_root>/<rel parent>/<source_stem>.jpg`.
/// `None` when the stem carries no recoverable source or the file is absent.
#[must_use]
pub fn locate_source(augmented: &Path, aug_root: &Path, raw_root: &Path) -> Option<PathBuf> {
    let stem = source_stem(stem_str(augmented)?)?;
    let source = mirrored_parent(augmented, aug_root, raw_root)?.join(format!("{stem}.jpg"));
    source.is_file().then_some(source)
}

/// CLIP-based similarity audit
pub struct SimilarityCleaner<E> {
    embedder: E,
    threshold: f32,
    delete: bool,
    show_progress: bool,
}

impl<E: ImageEmbedder> SimilarityCleaner<E> {
    pub fn new(embedder: E, delete: bool) -> Self {
        Self {
            embedder,
            threshold: THRESHOLD,
            delete,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Cosine similarity of two image files; any read or model error scores 0.0
    pub fn calculate_similarity(&mut self, first: &Path, second: &Path) -> f32 {
        let score = (|| -> Result<f32> {
            let a = ImageIOService::load_image(first)?;
            let b = ImageIOService::load_image(second)?;
            self.embedder.similarity(&a, &b)
        })();

        score.unwrap_or_else(|e| {
            tracing::warn!(error = %e, "⚠️ Read Error");
            0.0
        })
    }

    pub fn run(&mut self, raw_root: &Path, aug_root: &Path) -> Result<SimilarityReport> {
        let _span =
            crate::tracing_config::spans::cleaning("similarity", aug_root, self.delete).entered();

        let files = if aug_root.exists() {
            find_image_files(aug_root, true, JPEG_EXTENSIONS)?
        } else {
            tracing::warn!(dir = %aug_root.display(), "Augmented directory not found");
            Vec::new()
        };
        tracing::info!(
            count = files.len(),
            threshold = self.threshold,
            "🔍 Starting CLIP audit"
        );

        let mut report = SimilarityReport {
            root: aug_root.to_path_buf(),
            threshold: self.threshold,
            scanned: files.len(),
            audited: 0,
            skipped: 0,
            substandard: Vec::new(),
            delete_mode: self.delete,
        };

        let progress = ProgressIndicator::items("Auditing", files.len(), self.show_progress);
        for augmented in &files {
            progress.inc(1);
            let Some(source) = locate_source(augmented, aug_root, raw_root) else {
                report.skipped += 1;
                continue;
            };

            report.audited += 1;
            let score = self.calculate_similarity(&source, augmented);
            if score < self.threshold {
                let deleted = self.delete && remove_logged(augmented);
                report.substandard.push(SimilarityFinding {
                    path: augmented.clone(),
                    score,
                    deleted,
                });
            }
        }
        progress.finish_and_clear();

        Ok(report)
    }
}
