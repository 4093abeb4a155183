//! Restore raw images that went missing after setup
//!
//! Re-fetches the archive into a scratch directory and copies back every
//! image absent from the raw tree. Files already present are never touched.

use crate::config::{ensure_dir, DATASET_URL};
use crate::dataset::setup::{ARCHIVE_NAME, EXTRACTED_DIR_NAME};
use crate::download::{extract_tar_gz, Downloader};
use crate::error::{PipelineError, Result};
use crate::naming::class_label_from_filename;
use crate::outcome::Outcome;
use crate::scan::{find_image_files, JPEG_EXTENSIONS};
use crate::services::ProgressIndicator;
use std::fs;
use std::path::PathBuf;

/// Verification tallies
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairReport {
    /// Images in the reference archive
    pub total: usize,
    /// Images already present in the raw tree
    pub matched: usize,
    /// Images copied back into the raw tree
    pub restored: usize,
}

/// Result of a repair run; aborted runs stopped before verification
pub type RepairOutcome = Outcome<RepairReport>;

/// Dataset repair step
#[derive(Debug, Clone)]
pub struct DatasetRepair {
    url: String,
    raw_root: PathBuf,
    temp_dir: PathBuf,
    show_progress: bool,
}

impl DatasetRepair {
    pub fn new<P: Into<PathBuf>, T: Into<PathBuf>>(raw_root: P, temp_dir: T) -> Self {
        Self {
            url: DATASET_URL.to_string(),
            raw_root: raw_root.into(),
            temp_dir: temp_dir.into(),
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

    fn archive_path(&self) -> PathBuf {
        self.temp_dir.join(ARCHIVE_NAME)
    }

    fn extract_dir(&self) -> PathBuf {
        self.temp_dir.join(EXTRACTED_DIR_NAME)
    }

    /// Run the repair step
    ///
    /// # Errors
    /// Archive extraction and copy failures. A failed download ends the run
    /// early with [`RepairOutcome::Aborted`].
    pub async fn run(&self) -> Result<RepairOutcome> {
        ensure_dir(&self.temp_dir)?;
        let archive = self.archive_path();

        if archive.exists() {
            tracing::info!(
                archive = %archive.display(),
                "Temporary archive exists, skipping download"
            );
        } else {
            let downloader = Downloader::new(self.show_progress)?;
            tracing::info!(url = %self.url, "⬇️ Downloading dataset");
            if let Err(e) = downloader.download_file(&self.url, &archive).await {
                tracing::error!(error = %e, "Download failed. Check network connection.");
                return Ok(RepairOutcome::Aborted {
                    reason: format!("Download failed: {e}"),
                });
            }
        }

        let extract_dir = self.extract_dir();
        if !extract_dir.exists() {
            tracing::info!("📦 Extracting dataset...");
            let (archive_src, temp_dir) = (archive.clone(), self.temp_dir.clone());
            tokio::task::spawn_blocking(move || extract_tar_gz(&archive_src, &temp_dir))
                .await
                .map_err(|e| PipelineError::internal(format!("Extraction task failed: {e}")))??;
        }

        if !extract_dir.is_dir() {
            tracing::error!(dir = %extract_dir.display(), "Extraction structure invalid");
            return Ok(RepairOutcome::Aborted {
                reason: format!(
                    "Extraction structure invalid, not found: {}",
                    extract_dir.display()
                ),
            });
        }

        let report = self.restore_missing();
        self.cleanup();
        report.map(RepairOutcome::Completed)
    }

    fn restore_missing(&self) -> Result<RepairReport> {
        let sources = find_image_files(&self.extract_dir(), false, JPEG_EXTENSIONS)?;
        tracing::info!(
            images = sources.len(),
            raw_root = %self.raw_root.display(),
            "Verifying against raw tree"
        );

        let mut report = RepairReport {
            total: sources.len(),
            ..RepairReport::default()
        };
        let progress =
            ProgressIndicator::items("Verifying & Fixing", sources.len(), self.show_progress);

        for source in &sources {
            progress.inc(1);
            let Some(file_name) = source.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            let class_dir = self.raw_root.join(class_label_from_filename(file_name));
            let target = class_dir.join(file_name);
            if target.exists() {
                report.matched += 1;
                continue;
            }

            ensure_dir(&class_dir)?;
            fs::copy(source, &target)
                .map_err(|e| PipelineError::file_io_error("restore image", &target, &e))?;
            tracing::debug!(file = %target.display(), "Restored missing image");
            report.restored += 1;
        }
        progress.finish_and_clear();

        tracing::info!(
            matched = report.matched,
            restored = report.restored,
            "✅ Verification complete"
        );
        Ok(report)
    }

    /// Remove the archive, the extraction and the scratch directory.
    /// Errors are logged only.
    fn cleanup(&self) {
        tracing::info!("Cleaning up temporary files...");
        let archive = self.archive_path();
        let extract_dir = self.extract_dir();

        let result = (|| -> std::io::Result<()> {
            if archive.exists() {
                fs::remove_file(&archive)?;
            }
            if extract_dir.exists() {
                fs::remove_dir_all(&extract_dir)?;
            }
            if self.temp_dir.exists() {
                fs::remove_dir(&self.temp_dir)?;
            }
            Ok(())
        })();

        match result {
            Ok(()) => tracing::debug!("Cleanup complete"),
            Err(e) => tracing::warn!(error = %e, "Error during cleanup"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::build_tar_gz;
    use tempfile::tempdir;

    fn reference_archive() -> Vec<u8> {
        build_tar_gz(&[
            ("images/Beagle_01.jpg", b"beagle-one".as_slice()),
            ("images/Beagle_02.jpg", b"beagle-two".as_slice()),
            ("images/Persian_5.jpg", b"persian".as_slice()),
        ])
    }

    #[tokio::test]
    async fn test_restores_missing_files_byte_identical() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/images.tar.gz")
            .with_status(200)
            .with_body(reference_archive())
            .create_async()
            .await;

        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw");
        let scratch = temp_dir.path().join("temp_fix");
        fs::create_dir_all(raw.join("Beagle")).unwrap();
        fs::write(raw.join("Beagle/Beagle_01.jpg"), b"locally-edited").unwrap();

        let outcome = DatasetRepair::new(&raw, &scratch)
            .with_url(format!("{}/images.tar.gz", server.url()))
            .run()
            .await
            .unwrap();

        assert_eq!(
            outcome,
            RepairOutcome::Completed(RepairReport {
                total: 3,
                matched: 1,
                restored: 2,
            })
        );
        assert_eq!(fs::read(raw.join("Beagle/Beagle_02.jpg")).unwrap(), b"beagle-two");
        assert_eq!(fs::read(raw.join("Persian/Persian_5.jpg")).unwrap(), b"persian");
        // existing files are left alone
        assert_eq!(fs::read(raw.join("Beagle/Beagle_01.jpg")).unwrap(), b"locally-edited");
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_reuses_existing_archive() {
        let temp_dir = tempdir().unwrap();
        let raw = temp_dir.path().join("raw");
        let scratch = temp_dir.path().join("temp_fix");
        fs::create_dir_all(&scratch).unwrap();
        fs::write(scratch.join(ARCHIVE_NAME), reference_archive()).unwrap();

        let outcome = DatasetRepair::new(&raw, &scratch)
            .with_url("http://127.0.0.1:9/unreachable")
            .run()
            .await
            .unwrap();

        assert!(matches!(outcome, RepairOutcome::Completed(RepairReport { restored: 3, .. })));
        assert!(!scratch.exists());
    }

    #[tokio::test]
    async fn test_download_failure_aborts() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/images.tar.gz")
            .with_status(404)
            .create_async()
            .await;

        let temp_dir = tempdir().unwrap();
        let scratch = temp_dir.path().join("temp_fix");
        let outcome = DatasetRepair::new(temp_dir.path().join("raw"), &scratch)
            .with_url(format!("{}/images.tar.gz", server.url()))
            .run()
            .await
            .unwrap();

        assert!(matches!(outcome, RepairOutcome::Aborted { .. }));
        assert!(!scratch.join(ARCHIVE_NAME).exists());
    }
}
