//! Shared fixtures for the integration tests

#![allow(dead_code)]

use base64::{engine::general_purpose::STANDARD, Engine as _};
use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};
use petaug::{ImageEmbedder, MaskGenerator, PipelineError, Result};
use std::io::Cursor;
use std::path::Path;

/// Mask model marking the left half of every image as foreground
#[derive(Debug, Default)]
pub struct HalfMaskGenerator {
    pub calls: usize,
}

impl MaskGenerator for HalfMaskGenerator {
    fn name(&self) -> &str {
        "half-mask"
    }

    fn generate_mask(&mut self, image_bytes: &[u8]) -> Result<Vec<u8>> {
        self.calls += 1;
        let image = image::load_from_memory(image_bytes)?;
        let (width, height) = (image.width(), image.height());
        let mask = GrayImage::from_fn(width, height, |x, _| {
            Luma([if x < width / 2 { 255 } else { 0 }])
        });
        encode(&DynamicImage::ImageLuma8(mask), image::ImageFormat::Png)
    }
}

/// Embedder using the mean color, enough to tell solid images apart
#[derive(Debug, Default)]
pub struct MeanColorEmbedder;

impl ImageEmbedder for MeanColorEmbedder {
    fn name(&self) -> &str {
        "mean-color"
    }

    fn embed(&mut self, image: &DynamicImage) -> Result<Vec<f32>> {
        let rgb = image.to_rgb8();
        if rgb.width() == 0 || rgb.height() == 0 {
            return Err(PipelineError::inference("empty image"));
        }
        let count = (rgb.width() * rgb.height()) as f32;
        let mut sums = vec![0.0_f32; 3];
        for pixel in rgb.pixels() {
            for (sum, value) in sums.iter_mut().zip(pixel.0) {
                *sum += f32::from(value);
            }
        }
        Ok(sums.into_iter().map(|s| s / count).collect())
    }
}

pub fn encode(image: &DynamicImage, format: image::ImageFormat) -> Result<Vec<u8>> {
    let mut buffer = Cursor::new(Vec::new());
    image.write_to(&mut buffer, format)?;
    Ok(buffer.into_inner())
}

pub fn solid_jpeg(color: [u8; 3]) -> Vec<u8> {
    encode(
        &DynamicImage::ImageRgb8(RgbImage::from_pixel(24, 16, Rgb(color))),
        image::ImageFormat::Jpeg,
    )
    .unwrap()
}

pub fn write_jpeg(path: &Path, color: [u8; 3]) {
    std::fs::create_dir_all(path.parent().unwrap()).unwrap();
    std::fs::write(path, solid_jpeg(color)).unwrap();
}

/// Base64 PNG as returned by the diffusion server
pub fn png_b64(color: [u8; 3]) -> String {
    let png = encode(
        &DynamicImage::ImageRgb8(RgbImage::from_pixel(8, 8, Rgb(color))),
        image::ImageFormat::Png,
    )
    .unwrap();
    STANDARD.encode(png)
}

/// In-memory `.tar.gz` with the given `(path, contents)` entries
pub fn tar_gz(entries: &[(&str, Vec<u8>)]) -> Vec<u8> {
    let encoder = flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::fast());
    let mut builder = tar::Builder::new(encoder);
    for (name, data) in entries {
        let mut header = tar::Header::new_gnu();
        header.set_size(data.len() as u64);
        header.set_mode(0o644);
        header.set_cksum();
        builder.append_data(&mut header, name, data.as_slice()).unwrap();
    }
    builder.into_inner().unwrap().finish().unwrap()
}

/// Files below `root`, relative and sorted
pub fn relative_files(root: &Path) -> Vec<String> {
    let mut files: Vec<String> = walkdir::WalkDir::new(root)
        .into_iter()
        .filter_map(std::result::Result::ok)
        .filter(|e| e.file_type().is_file())
        .map(|e| {
            e.path()
                .strip_prefix(root)
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect();
    files.sort();
    files
}
