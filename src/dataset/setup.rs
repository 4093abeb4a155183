//! Download the pet archive and organize it into per-class directories

use crate::config::{ensure_dir, DATASET_URL};
use crate::download::{extract_tar_gz, Downloader};
use crate::error::{PipelineError, Result};
use crate::naming::class_label_from_filename;
use crate::scan::{find_image_files, list_subdirectories, JPEG_EXTENSIONS};
use crate::services::ProgressIndicator;
use std::fs;
use std::path::{Path, PathBuf};

/// More class directories than this means the dataset is already in place
pub const PREPARED_CLASS_DIR_THRESHOLD: usize = 10;

/// Archive file name inside the raw root
pub const ARCHIVE_NAME: &str = "images.tar.gz";

/// Directory the archive extracts into
pub const EXTRACTED_DIR_NAME: &str = "images";

/// Result of a setup run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SetupOutcome {
    /// Raw root already holds the dataset; nothing was touched
    AlreadyPrepared { class_dirs: usize },
    /// Dataset downloaded and organized
    Completed {
        classes: usize,
        images: usize,
        raw_root: PathBuf,
    },
    /// Setup stopped early; the raw root holds no partial archive
    Aborted { reason: String },
}

/// Dataset setup step
#[derive(Debug, Clone)]
pub struct DatasetSetup {
    url: String,
    raw_root: PathBuf,
    show_progress: bool,
}

impl DatasetSetup {
    pub fn new<P: Into<PathBuf>>(raw_root: P) -> Self {
        Self {
            url: DATASET_URL.to_string(),
            raw_root: raw_root.into(),
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_url<S: Into<String>>(mut self, url: S) -> Self {
        self.url = url.into();
        self
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    #[must_use]
    pub fn archive_path(&self) -> PathBuf {
        self.raw_root.join(ARCHIVE_NAME)
    }

    #[must_use]
    pub fn extract_dir(&self) -> PathBuf {
        self.raw_root.join(EXTRACTED_DIR_NAME)
    }

    /// Run the setup step
    ///
    /// # Errors
    /// Filesystem failures while preparing directories or moving files.
    /// Download and extraction problems end the run early with
    /// [`SetupOutcome::Aborted`] instead.
    pub async fn run(&self) -> Result<SetupOutcome> {
        let existing = list_subdirectories(&self.raw_root)?.len();
        if existing > PREPARED_CLASS_DIR_THRESHOLD {
            tracing::info!(
                class_dirs = existing,
                "Dataset appears to be ready, skipping setup"
            );
            return Ok(SetupOutcome::AlreadyPrepared {
                class_dirs: existing,
            });
        }

        ensure_dir(&self.raw_root)?;
        let archive = self.archive_path();

        if archive.exists() {
            tracing::info!(archive = %archive.display(), "Archive found, skipping download");
        } else if let Some(reason) = self.download(&archive).await {
            return Ok(SetupOutcome::Aborted { reason });
        }

        let extract_dir = self.extract_dir();
        if extract_dir.exists() {
            fs::remove_dir_all(&extract_dir)
                .map_err(|e| {
                    PipelineError::file_io_error("remove stale extraction", &extract_dir, &e)
                })?;
        }

        tracing::info!("📦 Extracting...");
        let (archive_src, raw_root) = (archive.clone(), self.raw_root.clone());
        let extracted = tokio::task::spawn_blocking(move || extract_tar_gz(&archive_src, &raw_root))
            .await
            .map_err(|e| PipelineError::internal(format!("Extraction task failed: {e}")))?;
        if let Err(e) = extracted {
            tracing::error!(error = %e, "Extraction failed");
            return Ok(SetupOutcome::Aborted {
                reason: format!("Extraction failed: {e}"),
            });
        }

        if !extract_dir.is_dir() {
            tracing::error!(
                dir = %extract_dir.display(),
                "'{EXTRACTED_DIR_NAME}' folder not found after extraction"
            );
            return Ok(SetupOutcome::Aborted {
                reason: format!("'{EXTRACTED_DIR_NAME}' folder not found after extraction"),
            });
        }

        organize_by_class(&extract_dir, &self.raw_root, self.show_progress)?;

        tracing::info!("Removing archive...");
        fs::remove_file(&archive)
            .map_err(|e| PipelineError::file_io_error("remove archive", &archive, &e))?;

        let (classes, images) = count_dataset(&self.raw_root)?;
        tracing::info!(classes, images, path = %self.raw_root.display(), "✅ Setup complete");
        Ok(SetupOutcome::Completed {
            classes,
            images,
            raw_root: self.raw_root.clone(),
        })
    }

    /// Download the archive; returns the abort reason on failure or Ctrl-C
    async fn download(&self, archive: &Path) -> Option<String> {
        let downloader = match Downloader::new(self.show_progress) {
            Ok(downloader) => downloader,
            Err(e) => return Some(e.to_string()),
        };

        tracing::info!(url = %self.url, "⬇️ Downloading dataset");
        tokio::select! {
            result = downloader.download_file(&self.url, archive) => match result {
                Ok(_) => None,
                Err(e) => {
                    tracing::error!(error = %e, "Download error");
                    Some(format!("Download error: {e}"))
                },
            },
            Ok(()) = tokio::signal::ctrl_c() => {
                tracing::warn!("Download interrupted. Cleaning up...");
                remove_partial(archive);
                Some("Download interrupted".to_string())
            },
        }
    }
}

fn remove_partial(archive: &Path) {
    if archive.exists() {
        if let Err(e) = fs::remove_file(archive) {
            tracing::warn!(
                path = %archive.display(),
                error = %e,
                "Failed to remove partial archive"
            );
        }
    }
}

/// Move every `*.jpg` directly under `source_dir` into `raw_root/<class>/`,
/// then remove `source_dir` (failure to remove it is only logged).
pub fn organize_by_class(source_dir: &Path, raw_root: &Path, show_progress: bool) -> Result<usize> {
    tracing::info!("Organizing files by class...");
    let images = find_image_files(source_dir, false, JPEG_EXTENSIONS)?;
    if images.is_empty() {
        tracing::warn!(dir = %source_dir.display(), "No images found");
        return Ok(0);
    }

    let progress = ProgressIndicator::items("Organizing", images.len(), show_progress);
    for image in &images {
        let Some(file_name) = image.file_name().and_then(|n| n.to_str()) else {
            progress.inc(1);
            continue;
        };
        let class_dir = raw_root.join(class_label_from_filename(file_name));
        ensure_dir(&class_dir)?;
        move_file(image, &class_dir.join(file_name))?;
        progress.inc(1);
    }
    progress.finish_and_clear();

    match fs::remove_dir_all(source_dir) {
        Ok(()) => tracing::debug!(dir = %source_dir.display(), "Cleaned up temporary directory"),
        Err(e) => tracing::warn!(
            dir = %source_dir.display(),
            error = %e,
            "Failed to remove temporary directory"
        ),
    }

    Ok(images.len())
}

/// Rename, falling back to copy-and-delete across filesystems
fn move_file(from: &Path, to: &Path) -> Result<()> {
    if fs::rename(from, to).is_ok() {
        return Ok(());
    }
    fs::copy(from, to).map_err(|e| PipelineError::file_io_error("move file", from, &e))?;
    fs::remove_file(from).map_err(|e| PipelineError::file_io_error("remove moved file", from, &e))
}

/// Class directories and `*.jpg` files directly inside them
pub fn count_dataset(raw_root: &Path) -> Result<(usize, usize)> {
    let class_dirs = list_subdirectories(raw_root)?;
    let mut images = 0;
    for dir in &class_dirs {
        images += find_image_files(dir, false, JPEG_EXTENSIONS)?.len();
    }
    Ok((class_dirs.len(), images))
}
