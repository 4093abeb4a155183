#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # petaug
//!
//! Dataset preparation for the Oxford-IIIT Pet images: download and
//! organize the archive, generate foreground masks, augment every image
//! through diffusion inpainting and image-prompt variations, and clean out
//! corrupt or low-fidelity results.
//!
//! ## Stages
//!
//! - **Setup / Repair**: fetch `images.tar.gz`, sort files into
//!   `data/raw/<class>/`, and restore files that went missing later
//! - **Segmentation**: U²-Net masks under `data/masks`, mirrored from the raw tree
//! - **Augmentation**: five scene backgrounds per image via inpainting, and
//!   class-prompted variations conditioned on the source image
//! - **Cleaning**: integrity scan (empty, unreadable, truncated files) and a
//!   CLIP similarity audit against the source image
//! - **Pipeline**: runs the generating stages in order as child processes
//!
//! Every step skips outputs that already exist, so interrupted runs resume
//! where they stopped.
//!
//! ## Model boundaries
//!
//! Models sit behind small traits so each stage can be driven by any
//! implementation:
//!
//! - [`MaskGenerator`]: U²-Net through ONNX Runtime ([`U2NetMaskGenerator`])
//! - [`ImageEmbedder`]: CLIP vision tower through ONNX Runtime ([`ClipImageEmbedder`])
//! - [`InpaintModel`] / [`VariationModel`]: a Stable Diffusion WebUI compatible
//!   server ([`DiffusionClient`])
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use petaug::{DiffusionClient, DiffusionConfig, InpaintingAugmentor, IntegrityCleaner};
//! use std::path::Path;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = DiffusionConfig::for_gpu(0).with_checkpoint(Some("sd-v1-5-inpainting"));
//! let client = DiffusionClient::connect(config).await?;
//!
//! let outcome = InpaintingAugmentor::new(client)
//!     .run(
//!         Path::new("data/raw"),
//!         Path::new("data/masks"),
//!         Path::new("data/augmented/inpainting_bg"),
//!     )
//!     .await?;
//! if let Some(report) = outcome.completed() {
//!     println!("generated {} images", report.generated);
//! }
//!
//! if let Some(scan) = IntegrityCleaner::new("data/augmented", false).run()?.completed() {
//!     println!("{} corrupt files", scan.corrupt());
//! }
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `onnx` (default): U²-Net and CLIP backends on ONNX Runtime
//! - `cli` (default): the `petaug` binary, progress bars and the tracing subscriber

pub mod augment;
pub mod backends;
pub mod cache;
pub mod clean;
#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod dataset;
pub mod download;
pub mod error;
pub mod inference;
pub mod models;
pub mod naming;
pub mod outcome;
pub mod pipeline;
pub mod scan;
pub mod segment;
pub mod services;
pub mod tracing_config;
pub mod utils;

// Public API exports
pub use augment::{AugmentOutcome, AugmentReport, InpaintingAugmentor, IpAdapterAugmentor, Scene};
pub use backends::*;
pub use cache::ModelCache;
pub use clean::{
    IntegrityCleaner, IntegrityIssue, IntegrityReport, SimilarityCleaner, SimilarityReport,
};
pub use config::{DataLayout, DeviceConfig, DiffusionConfig, ExecutionProvider};
pub use dataset::{DatasetRepair, DatasetSetup, RepairOutcome, RepairReport, SetupOutcome};
pub use download::Downloader;
pub use error::{PipelineError, Result};
pub use inference::{
    ImageEmbedder, InpaintModel, InpaintRequest, MaskGenerator, VariationModel, VariationRequest,
};
pub use models::{ModelSpec, SegmentationModel};
pub use outcome::Outcome;
pub use pipeline::{PipelineController, PipelineReport, Stage, Step};
pub use segment::{SegmentationOutcome, SegmentationReport, Segmenter};
pub use services::{ImageIOService, ProgressIndicator};
pub use tracing_config::{events, spans, TracingConfig, TracingFormat};
pub use utils::ImagePreprocessor;

#[cfg(feature = "cli")]
pub use tracing_config::init_cli_tracing;
