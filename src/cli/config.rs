//! Conversion of CLI arguments into library configuration

use crate::cli::main_impl::{Cli, DiffusionArgs};
use crate::backends::IpAdapterConfig;
use crate::config::{DeviceConfig, DiffusionConfig, ExecutionProvider};
use anyhow::{Context, Result};
use std::ffi::OsString;
use std::time::Duration;

pub(crate) struct CliConfigBuilder;

impl CliConfigBuilder {
    /// Device selection from the global provider flag and a stage's GPU index
    pub(crate) fn device(cli: &Cli, gpu_id: u32) -> Result<DeviceConfig> {
        let provider: ExecutionProvider = cli
            .execution_provider
            .parse()
            .context("Invalid execution provider")?;
        Ok(DeviceConfig::new(provider, gpu_id))
    }

    /// Diffusion server settings; the URL defaults to the per-GPU port
    pub(crate) fn diffusion(
        args: &DiffusionArgs,
        gpu_id: u32,
        default_checkpoint: &str,
    ) -> Result<DiffusionConfig> {
        let mut config = DiffusionConfig::for_gpu(gpu_id)
            .with_checkpoint(Some(args.checkpoint.as_deref().unwrap_or(default_checkpoint)))
            .with_timeout(Duration::from_secs(args.timeout_secs));
        if let Some(url) = &args.diffusion_url {
            config = config.with_base_url(url.as_str());
        }
        config.validate().context("Invalid diffusion server configuration")?;
        Ok(config)
    }

    /// Adapter unit from `--scale`
    pub(crate) fn ip_adapter(scale: f32) -> Result<IpAdapterConfig> {
        IpAdapterConfig::new(scale).context("Invalid --scale")
    }

    /// Global flags forwarded to pipeline children
    pub(crate) fn forwarded_args(cli: &Cli) -> Vec<OsString> {
        let mut args = Vec::new();
        if cli.verbose > 0 {
            args.push(format!("-{}", "v".repeat(usize::from(cli.verbose))).into());
        }
        args.push("--execution-provider".into());
        args.push(cli.execution_provider.clone().into());
        if cli.no_progress {
            args.push("--no-progress".into());
        }
        args
    }
}
