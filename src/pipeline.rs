//! Sequential stage controller
//!
//! Each stage runs as a child process of the current executable, one at a
//! time. The first failing stage stops the run.

use crate::error::{PipelineError, Result};
use crate::tracing_config::{TracingFormat, LOG_FORMAT_ENV, SESSION_ID_ENV};
use std::ffi::OsString;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use tokio::process::Command;

const BANNER_WIDTH: usize = 60;

/// Stages selectable with `--step`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "cli", derive(clap::ValueEnum))]
pub enum Step {
    #[default]
    All,
    Setup,
    Segment,
    Inpaint,
    #[cfg_attr(feature = "cli", value(name = "ip_adapter"))]
    IpAdapter,
}

/// One runnable stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Setup,
    Segment,
    Inpaint,
    IpAdapter,
}

impl Stage {
    pub const ORDER: [Self; 4] = [Self::Setup, Self::Segment, Self::Inpaint, Self::IpAdapter];

    /// Banner and error name
    #[must_use]
    pub fn display_name(self) -> &'static str {
        match self {
            Self::Setup => "Setup Data",
            Self::Segment => "Segmentation",
            Self::Inpaint => "Inpainting Augmentation",
            Self::IpAdapter => "IP-Adapter Variation",
        }
    }

    #[must_use]
    pub fn subcommand(self) -> &'static str {
        match self {
            Self::Setup => "setup",
            Self::Segment => "segment",
            Self::Inpaint => "inpaint",
            Self::IpAdapter => "ip-adapter",
        }
    }

    /// Setup runs on the CPU; every other stage takes a GPU index
    #[must_use]
    pub fn uses_gpu(self) -> bool {
        !matches!(self, Self::Setup)
    }
}

impl Step {
    /// Stages selected by this step, in execution order
    #[must_use]
    pub fn stages(self) -> Vec<Stage> {
        match self {
            Self::All => Stage::ORDER.to_vec(),
            Self::Setup => vec![Stage::Setup],
            Self::Segment => vec![Stage::Segment],
            Self::Inpaint => vec![Stage::Inpaint],
            Self::IpAdapter => vec![Stage::IpAdapter],
        }
    }
}

/// Wall time of each completed stage
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PipelineReport {
    pub stages: Vec<(Stage, Duration)>,
}

#[derive(Debug, Clone)]
pub struct PipelineController {
    program: PathBuf,
    base_args: Vec<OsString>,
    gpu_id: u32,
    session_id: Option<String>,
}

impl PipelineController {
    /// Controller that re-invokes the running executable
    pub fn new(gpu_id: u32) -> Result<Self> {
        let program = std::env::current_exe()
            .map_err(|e| {
                PipelineError::internal(format!("Cannot locate current executable: {e}"))
            })?;
        Ok(Self::with_program(program, gpu_id))
    }

    pub fn with_program<P: Into<PathBuf>>(program: P, gpu_id: u32) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            gpu_id,
            session_id: None,
        }
    }

    /// Arguments placed before the stage subcommand, such as global flags
    #[must_use]
    pub fn with_base_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<OsString>,
    {
        self.base_args = args.into_iter().map(Into::into).collect();
        self
    }

    /// Session id handed to every child for log correlation
    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Child arguments for `stage`
    #[must_use]
    pub fn stage_args(&self, stage: Stage) -> Vec<OsString> {
        let mut args = self.base_args.clone();
        args.push(stage.subcommand().into());
        if stage.uses_gpu() {
            args.push("--gpu-id".into());
            args.push(self.gpu_id.to_string().into());
        }
        args
    }

    /// Run the selected stages in order
    ///
    /// # Errors
    /// [`PipelineError::StageFailed`] for a non-zero exit and
    /// [`PipelineError::Interrupted`] on Ctrl-C. Later stages do not run.
    pub async fn run(&self, step: Step) -> Result<PipelineReport> {
        let mut report = PipelineReport::default();
        for stage in step.stages() {
            let elapsed = self.run_stage(stage).await?;
            report.stages.push((stage, elapsed));
        }

        println!("\n{}", "=".repeat(BANNER_WIDTH));
        println!("Pipeline finished successfully!");
        println!("{}", "=".repeat(BANNER_WIDTH));
        Ok(report)
    }

    fn print_banner(&self, name: &str, args: &[OsString]) {
        let _span = crate::tracing_config::spans::stage(name).entered();
        let rendered: Vec<String> = std::iter::once(self.program.as_os_str())
            .chain(args.iter().map(OsString::as_os_str))
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        tracing::info!(stage = name, "Starting step");
        println!("\n{}", "=".repeat(BANNER_WIDTH));
        println!("Executing step: [{name}]");
        println!("Command: {}", rendered.join(" "));
        println!("{}\n", "=".repeat(BANNER_WIDTH));
    }

    async fn run_stage(&self, stage: Stage) -> Result<Duration> {
        let name = stage.display_name();
        let args = self.stage_args(stage);
        self.print_banner(name, &args);

        let started = Instant::now();
        let mut command = Command::new(&self.program);
        command
            .args(&args)
            .env(LOG_FORMAT_ENV, TracingFormat::Compact.as_str())
            .kill_on_drop(true);
        if let Some(session_id) = &self.session_id {
            command.env(SESSION_ID_ENV, session_id);
        }
        let mut child = command
            .spawn()
            .map_err(|e| PipelineError::internal(format!("Failed to launch step [{name}]: {e}")))?;

        let status = tokio::select! {
            status = child.wait() => Some(status),
            Ok(()) = tokio::signal::ctrl_c() => None,
        };

        let Some(status) = status else {
            if let Err(e) = child.kill().await {
                tracing::warn!(stage = name, error = %e, "Failed to stop child process");
            }
            return Err(PipelineError::Interrupted {
                stage: name.to_string(),
            });
        };

        let status = status
            .map_err(|e| PipelineError::internal(format!("Waiting on step [{name}]: {e}")))?;
        if !status.success() {
            return Err(PipelineError::StageFailed {
                stage: name.to_string(),
                code: status.code().unwrap_or(-1),
            });
        }

        let elapsed = started.elapsed();
        println!("\nStep [{name}] completed! Duration: {:.2}s", elapsed.as_secs_f64());
        crate::tracing_config::events::performance_metric(name, elapsed);
        Ok(elapsed)
    }
}
