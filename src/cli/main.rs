//! petaug command-line interface
//!
//! One subcommand per pipeline stage plus the cleaners, the stage
//! controller and model cache management.

use super::config::CliConfigBuilder;
use super::report;
use crate::{
    augment::{
        inpainting, ip_adapter, missing_raw_root, InpaintingAugmentor, IpAdapterAugmentor,
        INPAINTING_METHOD,
    },
    backends::{onnx, ClipImageEmbedder, DiffusionClient, U2NetMaskGenerator},
    cache::ModelCache,
    clean::{IntegrityCleaner, SimilarityCleaner},
    config::DataLayout,
    dataset::{DatasetRepair, DatasetSetup},
    download::Downloader,
    models::{SegmentationModel, CLIP_VISION},
    outcome::Outcome,
    pipeline::{PipelineController, Step},
    segment::Segmenter,
    tracing_config::spans,
};
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use tracing::Instrument;

/// Pet image dataset preparation and augmentation
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "petaug")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// ONNX execution provider (auto, cpu, cuda)
    #[arg(short, long, default_value = "auto", global = true)]
    pub execution_provider: String,

    /// Hide progress bars
    #[arg(long, global = true)]
    pub no_progress: bool,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Download the pet archive and organize it into class directories
    Setup {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        /// Archive URL
        #[arg(long, default_value = crate::config::DATASET_URL)]
        url: String,
    },

    /// Restore raw images that are missing compared to the archive
    Repair {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        /// Scratch directory, removed afterwards
        #[arg(long, default_value = "data/temp_fix")]
        temp_dir: PathBuf,
        #[arg(long, default_value = crate::config::DATASET_URL)]
        url: String,
    },

    /// Generate foreground masks for every raw image
    Segment {
        #[arg(long, default_value = "data/raw")]
        input_dir: PathBuf,
        #[arg(long, default_value = "data/masks")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 0)]
        gpu_id: u32,
        #[arg(long, default_value = "u2net", value_parser = ["u2net", "u2netp", "u2net_human_seg"])]
        model: String,
    },

    /// Replace backgrounds with five scene prompts through inpainting
    Inpaint {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        #[arg(long, default_value = "data/masks")]
        mask_dir: PathBuf,
        #[arg(long, default_value = "data/augmented/inpainting_bg")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 0, value_parser = diffusion_gpu_id())]
        gpu_id: u32,
        #[command(flatten)]
        diffusion: DiffusionArgs,
    },

    /// Generate image-prompted variations of every raw image
    IpAdapter {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        #[arg(long, default_value = "data/augmented/ip_adapter_var")]
        output_dir: PathBuf,
        #[arg(long, default_value_t = 0, value_parser = diffusion_gpu_id())]
        gpu_id: u32,
        /// Variations per source image
        #[arg(long, default_value_t = ip_adapter::DEFAULT_NUM_VARIATIONS)]
        num_vars: u32,
        /// Image prompt strength (0.0 - 1.0)
        #[arg(long, default_value_t = ip_adapter::DEFAULT_ADAPTER_SCALE)]
        scale: f32,
        #[command(flatten)]
        diffusion: DiffusionArgs,
    },

    /// Find empty or undecodable images, optionally deleting them
    CleanIntegrity {
        #[arg(long, default_value = "data/augmented")]
        target_dir: PathBuf,
        /// Delete failing files instead of reporting only
        #[arg(long)]
        delete: bool,
    },

    /// Flag augmented images that drifted too far from their source
    CleanSimilarity {
        #[arg(long, default_value = "data/raw")]
        raw_dir: PathBuf,
        #[arg(long, default_value = "data/augmented/inpainting_bg")]
        aug_dir: PathBuf,
        #[arg(long)]
        delete: bool,
        #[arg(long, default_value_t = 0)]
        gpu_id: u32,
    },

    /// Run setup, segment, inpaint and ip_adapter as child processes
    Pipeline {
        #[arg(long, value_enum, default_value_t = Step::All)]
        step: Step,
        /// Forwarded to segment, inpaint and ip-adapter
        #[arg(long, default_value_t = 0, value_parser = diffusion_gpu_id())]
        gpu_id: u32,
    },

    /// Show execution providers and the model cache, or pre-download weights
    Models {
        /// Download every ONNX model into the cache
        #[arg(long)]
        download: bool,
    },
}

/// Diffusion server connection flags
#[derive(Args, Debug, Clone)]
pub struct DiffusionArgs {
    /// Server URL [default: http://127.0.0.1:<7860 + gpu-id>]
    #[arg(long)]
    pub diffusion_url: Option<String>,
    /// Checkpoint to load on the server
    #[arg(long)]
    pub checkpoint: Option<String>,
    /// Per-request timeout in seconds
    #[arg(long = "timeout", default_value_t = 600)]
    pub timeout_secs: u64,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let session_id =
        crate::tracing_config::init_cli_tracing(cli.verbose)
            .context("Failed to initialize tracing")?;

    let session = spans::session(&session_id, cli.command.name());
    run(&cli, &session_id).instrument(session).await
}

/// GPU index for stages that talk to the per-GPU diffusion server
fn diffusion_gpu_id() -> clap::builder::RangedI64ValueParser<u32> {
    clap::value_parser!(u32).range(..=i64::from(crate::config::MAX_DIFFUSION_GPU_ID))
}

impl Command {
    /// Subcommand name as typed on the command line
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Setup { .. } => "setup",
            Self::Repair { .. } => "repair",
            Self::Segment { .. } => "segment",
            Self::Inpaint { .. } => "inpaint",
            Self::IpAdapter { .. } => "ip-adapter",
            Self::CleanIntegrity { .. } => "clean-integrity",
            Self::CleanSimilarity { .. } => "clean-similarity",
            Self::Pipeline { .. } => "pipeline",
            Self::Models { .. } => "models",
        }
    }
}

async fn run(cli: &Cli, session_id: &str) -> Result<()> {
    let show_progress = !cli.no_progress;

    match &cli.command {
        Command::Setup { raw_dir, url } => {
            let outcome = DatasetSetup::new(raw_dir)
                .with_url(url.as_str())
                .with_progress(show_progress)
                .run()
                .await
                .context("Dataset setup failed")?;
            report::print_setup(&outcome);
        },

        Command::Repair {
            raw_dir,
            temp_dir,
            url,
        } => {
            let outcome = DatasetRepair::new(raw_dir, temp_dir)
                .with_url(url.as_str())
                .with_progress(show_progress)
                .run()
                .await
                .context("Dataset repair failed")?;
            match outcome {
                Outcome::Completed(repair) => report::print_repair(&repair),
                Outcome::Aborted { reason } => report::print_aborted(&reason),
            }
        },

        Command::Segment {
            input_dir,
            output_dir,
            gpu_id,
            model,
        } => {
            let device = CliConfigBuilder::device(cli, *gpu_id)?;
            let model: SegmentationModel = model.parse().context("Invalid segmentation model")?;
            println!("Device: {}", device.describe());

            let cache = ModelCache::new().context("Failed to create model cache")?;
            let downloader = Downloader::new(show_progress).context("Failed to create downloader")?;
            let (cache, downloader) = (&cache, &downloader);

            let outcome = Segmenter::new(input_dir, output_dir)
                .with_progress(show_progress)
                .run(move || {
                    let span = spans::model_loading(model.name(), &device.describe());
                    async move {
                        let path = cache.ensure_model(&model.spec(), downloader).await?;
                        U2NetMaskGenerator::load(model, &path, device)
                    }
                    .instrument(span)
                })
                .await
                .context("Segmentation failed")?;
            match outcome {
                Outcome::Completed(segmentation) => report::print_segmentation(&segmentation),
                Outcome::Aborted { reason } => report::print_aborted(&reason),
            }
        },

        Command::Inpaint {
            raw_dir,
            mask_dir,
            output_dir,
            gpu_id,
            diffusion,
        } => {
            if let Some(reason) = missing_raw_root(raw_dir) {
                report::print_aborted(&reason);
                return Ok(());
            }
            let config =
                CliConfigBuilder::diffusion(diffusion, *gpu_id, inpainting::DEFAULT_CHECKPOINT)?;
            println!("Initializing inpainting model on {}...", config.base_url);
            let client = DiffusionClient::connect(config)
                .await
                .context("Failed to initialize the inpainting model")?;

            let outcome = InpaintingAugmentor::new(client)
                .with_progress(show_progress)
                .run(raw_dir, mask_dir, output_dir)
                .await
                .context("Inpainting augmentation failed")?;
            match outcome {
                Outcome::Completed(augment) => report::print_augment(&augment),
                Outcome::Aborted { reason } => report::print_aborted(&reason),
            }
        },

        Command::IpAdapter {
            raw_dir,
            output_dir,
            gpu_id,
            num_vars,
            scale,
            diffusion,
        } => {
            if let Some(reason) = missing_raw_root(raw_dir) {
                report::print_aborted(&reason);
                return Ok(());
            }
            let adapter = CliConfigBuilder::ip_adapter(*scale)?;
            let config =
                CliConfigBuilder::diffusion(diffusion, *gpu_id, ip_adapter::DEFAULT_CHECKPOINT)?;
            println!(
                "Initializing IP-Adapter model on {} (scale {scale})...",
                config.base_url
            );
            let client = DiffusionClient::connect(config)
                .await
                .context("Failed to initialize the IP-Adapter model")?
                .with_ip_adapter(adapter);

            let outcome = IpAdapterAugmentor::new(client, *num_vars)
                .context("Invalid --num-vars")?
                .with_progress(show_progress)
                .run(raw_dir, output_dir)
                .await
                .context("IP-Adapter augmentation failed")?;
            match outcome {
                Outcome::Completed(augment) => report::print_augment(&augment),
                Outcome::Aborted { reason } => report::print_aborted(&reason),
            }
        },

        Command::CleanIntegrity { target_dir, delete } => {
            println!("🔍 Scanning directory: {}", target_dir.display());
            let outcome = IntegrityCleaner::new(target_dir, *delete)
                .with_progress(show_progress)
                .run()
                .context("Integrity scan failed")?;
            match outcome {
                Outcome::Completed(integrity) => report::print_integrity(&integrity),
                Outcome::Aborted { reason } => report::print_aborted(&reason),
            }
        },

        Command::CleanSimilarity {
            raw_dir,
            aug_dir,
            delete,
            gpu_id,
        } => {
            let device = CliConfigBuilder::device(cli, *gpu_id)?;
            println!(
                "🚀 [{}] Initializing CLIP watchdog ({})...",
                device.describe(),
                CLIP_VISION.name
            );
            let cache = ModelCache::new().context("Failed to create model cache")?;
            let downloader = Downloader::new(show_progress).context("Failed to create downloader")?;
            let path = cache
                .ensure_model(&CLIP_VISION, &downloader)
                .await
                .context("Failed to fetch the CLIP model")?;
            let embedder =
                ClipImageEmbedder::load(&path, device).context("Failed to load the CLIP model")?;

            let similarity = SimilarityCleaner::new(embedder, *delete)
                .with_progress(show_progress)
                .run(raw_dir, aug_dir)
                .context("Similarity audit failed")?;
            report::print_similarity(&similarity);
        },

        Command::Pipeline { step, gpu_id } => {
            let controller = PipelineController::new(*gpu_id)
                .context("Failed to set up the pipeline controller")?
                .with_base_args(CliConfigBuilder::forwarded_args(cli))
                .with_session_id(session_id);
            let summary = controller.run(*step).await?;
            for (stage, elapsed) in &summary.stages {
                tracing::info!(
                    stage = stage.display_name(),
                    elapsed_s = elapsed.as_secs_f64(),
                    "Stage timing"
                );
            }
        },

        Command::Models { download } => {
            manage_models(*download, show_progress).await?;
        },
    }

    Ok(())
}

/// Provider diagnostics and cache status; optionally fill the cache
async fn manage_models(download: bool, show_progress: bool) -> Result<()> {
    println!("🚀 Execution Providers:");
    for (name, available, description) in onnx::list_providers() {
        let status = if available { "✅ Available" } else { "❌ Not Available" };
        println!("  • {name}: {status} - {description}");
    }

    let cache = ModelCache::new().context("Failed to create model cache")?;
    println!("\n📦 Model cache: {}", cache.cache_dir().display());

    let specs: Vec<_> = SegmentationModel::ALL
        .iter()
        .map(|model| model.spec())
        .chain(std::iter::once(CLIP_VISION))
        .collect();

    let downloader = if download {
        Some(Downloader::new(show_progress).context("Failed to create downloader")?)
    } else {
        None
    };

    for spec in &specs {
        if let Some(downloader) = &downloader {
            cache
                .ensure_model(spec, downloader)
                .await
                .with_context(|| format!("Failed to download model '{}'", spec.name))?;
        }
        let status = if cache.is_cached(spec) { "✅ cached" } else { "⬇️  not downloaded" };
        println!("  • {}: {status}", spec.name);
    }

    if !download {
        println!("\n💡 Run `petaug models --download` to fetch all models.");
    }
    println!("   Default segmentation model: {}", SegmentationModel::default());
    println!("   Similarity threshold: {}", crate::clean::THRESHOLD);
    println!(
        "   Inpainting output: {}",
        DataLayout::default().augmented_method(INPAINTING_METHOD).display()
    );
    Ok(())
}
