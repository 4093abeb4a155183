//! Diffusion-based augmentation of the raw tree
//!
//! Two methods write under `augmented/<method>/<class>/`:
//! - [`inpainting`]: keeps the pet, repaints the background per scene prompt
//! - [`ip_adapter`]: generates new images conditioned on the source image

pub mod inpainting;
pub mod ip_adapter;

pub use inpainting::InpaintingAugmentor;
pub use ip_adapter::IpAdapterAugmentor;

use crate::outcome::Outcome;
use std::path::{Path, PathBuf};

/// Side length of the square images fed to and produced by the diffusion models
pub const TARGET_SIZE: u32 = 512;

/// Classifier-free guidance scale for both methods
pub const GUIDANCE_SCALE: f32 = 7.5;

/// Output directory name of the inpainting method
pub const INPAINTING_METHOD: &str = "inpainting_bg";

/// Output directory name of the image-prompt method
pub const IP_ADAPTER_METHOD: &str = "ip_adapter_var";

/// Background scenes, in generation order
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scene {
    Snow,
    Beach,
    Jungle,
    City,
    Sunset,
}

impl Scene {
    pub const ALL: [Self; 5] = [Self::Snow, Self::Beach, Self::Jungle, Self::City, Self::Sunset];

    /// Tag appended to the source stem
    #[must_use]
    pub fn tag(self) -> &'static str {
        match self {
            Self::Snow => "snow",
            Self::Beach => "beach",
            Self::Jungle => "jungle",
            Self::City => "city",
            Self::Sunset => "sunset",
        }
    }

    #[must_use]
    pub fn prompt(self) -> &'static str {
        match self {
            Self::Snow => "a photo of a pet on a snowy mountain, winter, cold weather, snow covered ground, high resolution, 8k, realistic texture",
            Self::Beach => "a photo of a pet running on a sandy beach, ocean waves in background, sunny day, blue sky, summer vibes, high quality, 8k",
            Self::Jungle => "a photo of a pet in a tropical jungle, green leaves, rainforest, nature, sunlight filtering through trees, detailed background, 8k",
            Self::City => "a photo of a pet on a city street, urban environment, blurred city lights, bokeh, modern architecture, street photography, realistic",
            Self::Sunset => "a photo of a pet in a field during golden hour, sunset, warm lighting, lens flare, artistic composition, dreamy atmosphere, 8k",
        }
    }
}

/// Batch tallies of one augmentation run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AugmentReport {
    /// Raw images found
    pub sources: usize,
    /// Raw images eligible for augmentation (mask present, not already done)
    pub attempted: usize,
    /// New images written
    pub generated: usize,
    pub output_root: PathBuf,
}

/// Report of a run, or why it stopped before scanning
pub type AugmentOutcome = Outcome<AugmentReport>;

/// Early-return reason when the raw tree is absent
#[must_use]
pub fn missing_raw_root(raw_root: &Path) -> Option<String> {
    (!raw_root.is_dir()).then(|| format!("Raw directory not found: {}", raw_root.display()))
}
