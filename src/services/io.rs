//! Image I/O operations service
//!
//! Keeps decoding, resizing and encoding out of the stage logic.

use crate::error::{PipelineError, Result};
use image::{imageops::FilterType, DynamicImage, GrayImage, ImageFormat, RgbImage};
use std::io::Cursor;
use std::path::Path;

/// Service for handling image file input/output operations
pub struct ImageIOService;

impl ImageIOService {
    /// Load an image from a file path
    ///
    /// Falls back to content-based format detection when the extension lies.
    pub fn load_image<P: AsRef<Path>>(path: P) -> Result<DynamicImage> {
        let path_ref = path.as_ref();

        if !path_ref.exists() {
            return Err(PipelineError::file_io_error(
                "read image file",
                path_ref,
                &std::io::Error::new(std::io::ErrorKind::NotFound, "file does not exist"),
            ));
        }

        match image::open(path_ref) {
            Ok(img) => Ok(img),
            Err(e) => {
                tracing::debug!(
                    path = %path_ref.display(),
                    error = %e,
                    "Extension-based loading failed, trying content-based detection"
                );
                let data = std::fs::read(path_ref).map_err(|io_err| {
                    PipelineError::file_io_error("read image data", path_ref, &io_err)
                })?;
                image::load_from_memory(&data).map_err(|content_err| {
                    PipelineError::processing(format!(
                        "Failed to load image '{}': {} / {}",
                        path_ref.display(),
                        e,
                        content_err
                    ))
                })
            },
        }
    }

    /// Load as RGB and resize to a `size`×`size` square
    pub fn load_rgb_square<P: AsRef<Path>>(path: P, size: u32) -> Result<RgbImage> {
        let image = Self::load_image(path)?;
        Ok(image::imageops::resize(
            &image.to_rgb8(),
            size,
            size,
            FilterType::CatmullRom,
        ))
    }

    /// Load as greyscale and resize to a `size`×`size` square
    pub fn load_luma_square<P: AsRef<Path>>(path: P, size: u32) -> Result<GrayImage> {
        let image = Self::load_image(path)?;
        Ok(image::imageops::resize(
            &image.to_luma8(),
            size,
            size,
            FilterType::CatmullRom,
        ))
    }

    /// Invert a greyscale mask so the background becomes the editable region
    #[must_use]
    pub fn invert_mask(mask: &GrayImage) -> GrayImage {
        let mut inverted = mask.clone();
        image::imageops::invert(&mut inverted);
        inverted
    }

    /// Encode any image as PNG bytes
    pub fn encode_png(image: &DynamicImage) -> Result<Vec<u8>> {
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png)?;
        Ok(buffer.into_inner())
    }

    /// Save an image as JPEG, converting to RGB first
    pub fn save_jpeg<P: AsRef<Path>>(image: &DynamicImage, path: P) -> Result<()> {
        let path_ref = path.as_ref();
        DynamicImage::ImageRgb8(image.to_rgb8())
            .save_with_format(path_ref, ImageFormat::Jpeg)
            .map_err(|e| {
                PipelineError::processing(format!("Failed to save '{}': {}", path_ref.display(), e))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Luma, Rgb};
    use tempfile::tempdir;

    #[test]
    fn test_load_missing_image() {
        let temp_dir = tempdir().unwrap();
        let result = ImageIOService::load_image(temp_dir.path().join("missing.jpg"));
        assert!(matches!(result, Err(PipelineError::Io(_))));
    }

    #[test]
    fn test_load_with_wrong_extension() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("actually_png.jpg");
        let image = DynamicImage::ImageRgb8(RgbImage::from_pixel(4, 4, Rgb([10, 20, 30])));
        std::fs::write(&path, ImageIOService::encode_png(&image).unwrap()).unwrap();

        let loaded = ImageIOService::load_image(&path).unwrap();
        assert_eq!(loaded.width(), 4);
    }

    #[test]
    fn test_square_resize_and_invert() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("mask.png");
        GrayImage::from_pixel(20, 10, Luma([255])).save(&path).unwrap();

        let mask = ImageIOService::load_luma_square(&path, 8).unwrap();
        assert_eq!(mask.dimensions(), (8, 8));

        let inverted = ImageIOService::invert_mask(&mask);
        assert!(inverted.pixels().all(|p| p.0[0] == 0));
    }

    #[test]
    fn test_save_jpeg_from_rgba() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("out.jpg");
        let image = DynamicImage::ImageRgba8(image::RgbaImage::new(6, 6));
        ImageIOService::save_jpeg(&image, &path).unwrap();

        let loaded = image::open(&path).unwrap();
        assert_eq!(loaded.width(), 6);
    }
}
