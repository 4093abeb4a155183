//! Image file discovery

use crate::error::{PipelineError, Result};
use std::path::{Path, PathBuf};

/// Extensions treated as images by the segmentation step and the integrity cleaner
pub const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Extension of raw dataset images and generated variants
pub const JPEG_EXTENSIONS: &[&str] = &["jpg"];

/// Find image files below `dir`.
///
/// Results are sorted so batch runs process files in a stable order.
pub fn find_image_files(dir: &Path, recursive: bool, extensions: &[&str]) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    if recursive {
        for entry in walkdir::WalkDir::new(dir) {
            let entry = entry.map_err(|e| {
                PipelineError::Io(e.into_io_error().unwrap_or_else(|| {
                    std::io::Error::new(std::io::ErrorKind::Other, "directory walk failed")
                }))
            })?;
            if entry.file_type().is_file() && is_image_file(entry.path(), extensions) {
                files.push(entry.path().to_path_buf());
            }
        }
    } else {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| PipelineError::file_io_error("read directory", dir, &e))?;
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                let path = entry.path();
                if is_image_file(&path, extensions) {
                    files.push(path);
                }
            }
        }
    }

    files.sort();
    Ok(files)
}

/// Subdirectories directly below `dir` (empty if `dir` does not exist)
pub fn list_subdirectories(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut dirs = Vec::new();
    for entry in std::fs::read_dir(dir)
        .map_err(|e| PipelineError::file_io_error("read directory", dir, &e))?
    {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            dirs.push(entry.path());
        }
    }
    dirs.sort();
    Ok(dirs)
}

/// Check if file is an image based on extension
#[must_use]
pub fn is_image_file(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| extensions.contains(&ext.to_lowercase().as_str()))
}
