//! Catalog of the pretrained ONNX models used by the pipeline

use crate::error::{PipelineError, Result};
use serde::{Deserialize, Serialize};

/// Location and file name of a downloadable model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    /// Short identifier used in logs
    pub name: &'static str,
    /// Download URL of the ONNX file
    pub url: &'static str,
    /// File name inside the model cache
    pub file_name: &'static str,
}

/// Background-removal networks from the U²-Net family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SegmentationModel {
    /// General-purpose U²-Net (176 MB)
    #[default]
    U2net,
    /// Lightweight U²-Net (4.7 MB)
    U2netp,
    /// U²-Net trained for human segmentation
    U2netHumanSeg,
}

impl SegmentationModel {
    /// Every supported variant
    pub const ALL: [Self; 3] = [Self::U2net, Self::U2netp, Self::U2netHumanSeg];

    /// Square input resolution expected by the network
    pub const INPUT_SIZE: u32 = 320;

    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::U2net => "u2net",
            Self::U2netp => "u2netp",
            Self::U2netHumanSeg => "u2net_human_seg",
        }
    }

    #[must_use]
    pub fn spec(self) -> ModelSpec {
        match self {
            Self::U2net => ModelSpec {
                name: "u2net",
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net.onnx",
                file_name: "u2net.onnx",
            },
            Self::U2netp => ModelSpec {
                name: "u2netp",
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2netp.onnx",
                file_name: "u2netp.onnx",
            },
            Self::U2netHumanSeg => ModelSpec {
                name: "u2net_human_seg",
                url: "https://github.com/danielgatis/rembg/releases/download/v0.0.0/u2net_human_seg.onnx",
                file_name: "u2net_human_seg.onnx",
            },
        }
    }
}

impl std::fmt::Display for SegmentationModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for SegmentationModel {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        Self::ALL
            .into_iter()
            .find(|model| model.name() == s)
            .ok_or_else(|| {
                PipelineError::invalid_config(format!(
                    "Unknown segmentation model '{s}' (expected u2net, u2netp or u2net_human_seg)"
                ))
            })
    }
}

/// CLIP ViT-B/32 image tower used by the similarity cleaner
pub const CLIP_VISION: ModelSpec = ModelSpec {
    name: "clip-vit-base-patch32",
    url: "https://huggingface.co/Xenova/clip-vit-base-patch32/resolve/main/onnx/vision_model.onnx",
    file_name: "clip-vit-base-patch32-vision.onnx",
};

/// CLIP preprocessing constants
pub mod clip {
    /// Crop size fed to the vision tower
    pub const INPUT_SIZE: u32 = 224;
    /// Per-channel normalization mean
    pub const MEAN: [f32; 3] = [0.481_454_66, 0.457_827_5, 0.408_210_73];
    /// Per-channel normalization standard deviation
    pub const STD: [f32; 3] = [0.268_629_54, 0.261_302_58, 0.275_777_11];
    /// Name of the pooled, projected embedding output
    pub const EMBEDDING_OUTPUT: &str = "image_embeds";
}

/// ImageNet normalization used by the U²-Net exports
pub mod imagenet {
    pub const MEAN: [f32; 3] = [0.485, 0.456, 0.406];
    pub const STD: [f32; 3] = [0.229, 0.224, 0.225];
}
