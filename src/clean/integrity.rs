//! Zero-byte and corrupt image detection
//!
//! Every file is fully decoded, so truncated images left behind by an
//! interrupted write fail the check as well as broken headers.

use super::REPORT_LIMIT;
use crate::error::Result;
use crate::outcome::Outcome;
use crate::scan::{find_image_files, IMAGE_EXTENSIONS};
use crate::services::ProgressIndicator;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

/// Why a file failed the integrity check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IntegrityIssue {
    Empty,
    Inaccessible,
    Corrupted(String),
}

impl fmt::Display for IntegrityIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => f.write_str("Empty file (0 bytes)"),
            Self::Inaccessible => f.write_str("File inaccessible"),
            Self::Corrupted(detail) => write!(f, "Corrupted ({detail})"),
        }
    }
}

/// One failed file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityFailure {
    pub path: PathBuf,
    pub issue: IntegrityIssue,
    /// Whether the file was removed
    pub deleted: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntegrityReport {
    pub root: PathBuf,
    pub scanned: usize,
    pub failures: Vec<IntegrityFailure>,
    pub delete_mode: bool,
}

impl IntegrityReport {
    #[must_use]
    pub fn valid(&self) -> usize {
        self.scanned - self.failures.len()
    }

    #[must_use]
    pub fn corrupt(&self) -> usize {
        self.failures.len()
    }

    #[must_use]
    pub fn deleted(&self) -> usize {
        self.failures.iter().filter(|f| f.deleted).count()
    }

    /// First failures for display
    #[must_use]
    pub fn itemized(&self) -> &[IntegrityFailure] {
        self.failures.get(..self.failures.len().min(REPORT_LIMIT)).unwrap_or_default()
    }
}

/// Check one file; `Ok(())` means it decodes cleanly
pub fn check_file_integrity(path: &Path) -> std::result::Result<(), IntegrityIssue> {
    match fs::metadata(path) {
        Ok(metadata) if metadata.len() == 0 => return Err(IntegrityIssue::Empty),
        Ok(_) => {},
        Err(_) => return Err(IntegrityIssue::Inaccessible),
    }

    decode_with_limits(path, image::Limits::no_limits())
}

/// Full decode under the given allocation and dimension limits.
/// The integrity check passes no limits: a large but valid image must not
/// be reported, and deleted, as corrupt.
fn decode_with_limits(
    path: &Path,
    limits: image::Limits,
) -> std::result::Result<(), IntegrityIssue> {
    let corrupted = |e: &dyn fmt::Display| IntegrityIssue::Corrupted(e.to_string());

    let mut reader = image::ImageReader::open(path)
        .map_err(|e| corrupted(&e))?
        .with_guessed_format()
        .map_err(|e| corrupted(&e))?;
    reader.limits(limits);
    reader.decode().map(|_| ()).map_err(|e| corrupted(&e))
}

/// Integrity scan over a directory tree
#[derive(Debug, Clone)]
pub struct IntegrityCleaner {
    root: PathBuf,
    delete: bool,
    show_progress: bool,
}

impl IntegrityCleaner {
    pub fn new<P: Into<PathBuf>>(root: P, delete: bool) -> Self {
        Self {
            root: root.into(),
            delete,
            show_progress: false,
        }
    }

    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Scan the tree; a missing root ends early
    pub fn run(&self) -> Result<Outcome<IntegrityReport>> {
        let _span =
            crate::tracing_config::spans::cleaning("integrity", &self.root, self.delete).entered();

        if !self.root.exists() {
            tracing::error!(dir = %self.root.display(), "❌ Directory not found");
            return Ok(Outcome::aborted(format!("Directory not found: {}", self.root.display())));
        }

        if self.delete {
            tracing::warn!("⚠️  DELETE MODE ENABLED! Corrupted files will be removed!");
        } else {
            tracing::info!("🛡️  DRY RUN MODE. No files will be deleted.");
        }

        let files = find_image_files(&self.root, true, IMAGE_EXTENSIONS)?;
        tracing::info!(count = files.len(), "📄 Found images, checking integrity...");

        let progress =
            ProgressIndicator::items("Checking integrity", files.len(), self.show_progress);
        let mut failures = Vec::new();
        for path in &files {
            progress.inc(1);
            let Err(issue) = check_file_integrity(path) else {
                continue;
            };

            let deleted = self.delete && remove_logged(path);
            failures.push(IntegrityFailure {
                path: path.clone(),
                issue,
                deleted,
            });
        }
        progress.finish_and_clear();

        Ok(Outcome::Completed(IntegrityReport {
            root: self.root.clone(),
            scanned: files.len(),
            failures,
            delete_mode: self.delete,
        }))
    }
}

/// Delete a file, logging instead of failing
pub(crate) fn remove_logged(path: &Path) -> bool {
    match fs::remove_file(path) {
        Ok(()) => true,
        Err(e) => {
            tracing::error!(path = %path.display(), error = %e, "❌ Delete failed");
            false
        },
    }
}
