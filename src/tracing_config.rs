//! Structured logging setup
//!
//! The library only emits events and spans; the binary installs the
//! subscriber. `log` records from the ONNX backend and the downloader are
//! bridged into the same subscriber.
//!
//! Stages launched by the pipeline controller inherit the controller's
//! session id and switch to the plain compact format through the
//! [`SESSION_ID_ENV`] and [`LOG_FORMAT_ENV`] variables, so their output can
//! be correlated with the run that spawned them.

#[cfg(feature = "cli")]
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

/// Session id shared by a controller run and its child stages
pub const SESSION_ID_ENV: &str = "PETAUG_SESSION_ID";

/// Output format override (`console` or `compact`)
pub const LOG_FORMAT_ENV: &str = "PETAUG_LOG_FORMAT";

/// Log line layout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TracingFormat {
    /// Colored output for interactive use
    #[default]
    Console,
    /// No ANSI colors; used by child stages and CI logs
    Compact,
}

impl std::str::FromStr for TracingFormat {
    type Err = crate::error::PipelineError;

    fn from_str(s: &str) -> crate::error::Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" => Ok(Self::Console),
            "compact" => Ok(Self::Compact),
            other => Err(crate::error::PipelineError::invalid_config(format!(
                "Unknown log format '{other}' (expected console or compact)"
            ))),
        }
    }
}

impl TracingFormat {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Console => "console",
            Self::Compact => "compact",
        }
    }
}

/// Subscriber settings assembled by the CLI
#[derive(Debug, Default)]
pub struct TracingConfig {
    /// Number of `-v` flags
    pub verbosity: u8,
    pub format: TracingFormat,
    /// Explicit filter directives; wins over `verbosity`
    pub env_filter: Option<String>,
    /// Correlation id attached to the first event
    pub session_id: Option<String>,
}

impl TracingConfig {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_verbosity(mut self, verbosity: u8) -> Self {
        self.verbosity = verbosity;
        self
    }

    #[must_use]
    pub fn with_format(mut self, format: TracingFormat) -> Self {
        self.format = format;
        self
    }

    /// Filter directives such as `petaug=debug,ort=warn`
    #[must_use]
    pub fn with_env_filter<S: Into<String>>(mut self, filter: S) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    #[must_use]
    pub fn with_session_id<S: Into<String>>(mut self, session_id: S) -> Self {
        self.session_id = Some(session_id.into());
        self
    }

    /// Filter used when no explicit directives are given.
    /// ONNX Runtime is kept one level quieter than the pipeline itself.
    #[must_use]
    pub fn verbosity_to_filter(&self) -> &'static str {
        match self.verbosity {
            0 => "info,ort=warn",
            1 => "debug,ort=info",
            _ => "trace",
        }
    }

    /// Install the global subscriber
    ///
    /// # Errors
    /// - Invalid filter directive
    /// - A global subscriber is already installed
    #[cfg(feature = "cli")]
    pub fn init(self) -> anyhow::Result<()> {
        use tracing_subscriber::fmt;

        let directives = self
            .env_filter
            .as_deref()
            .unwrap_or_else(|| self.verbosity_to_filter());
        let registry = Registry::default().with(EnvFilter::try_new(directives)?);

        let layer = fmt::layer().with_target(false).compact();
        match self.format {
            TracingFormat::Console => registry.with(layer.with_ansi(true)).try_init()?,
            TracingFormat::Compact => registry.with(layer.with_ansi(false)).try_init()?,
        }

        if let Some(session_id) = &self.session_id {
            tracing::debug!(
                session_id = %session_id,
                format = self.format.as_str(),
                "Logging initialized"
            );
        }
        Ok(())
    }
}

/// Install the CLI subscriber and return the session id.
///
/// `RUST_LOG` takes precedence over the verbosity count. A session id and
/// format inherited from a controlling pipeline run are reused.
#[cfg(feature = "cli")]
pub fn init_cli_tracing(verbosity: u8) -> anyhow::Result<String> {
    let session_id = std::env::var(SESSION_ID_ENV)
        .ok()
        .filter(|id| !id.trim().is_empty())
        .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
    let format = match std::env::var(LOG_FORMAT_ENV) {
        Ok(value) => value.parse()?,
        Err(_) => TracingFormat::Console,
    };

    let mut config = TracingConfig::new()
        .with_verbosity(verbosity)
        .with_format(format)
        .with_session_id(session_id.as_str());
    if let Ok(filter) = std::env::var("RUST_LOG") {
        if !filter.trim().is_empty() {
            config = config.with_env_filter(filter);
        }
    }

    config.init()?;
    Ok(session_id)
}

/// Span constructors, one per unit of work
pub mod spans {
    use std::path::Path;
    use tracing::{Level, Span};

    /// One CLI invocation
    pub fn session(session_id: &str, command: &str) -> Span {
        tracing::span!(Level::INFO, "session", session_id = %session_id, command = %command)
    }

    /// One stage run by the pipeline controller
    pub fn stage(name: &str) -> Span {
        tracing::span!(Level::INFO, "stage", name = %name)
    }

    pub fn model_loading(model_name: &str, device: &str) -> Span {
        tracing::span!(Level::INFO, "model_loading", model = %model_name, device = %device)
    }

    /// One source image inside a batch loop
    pub fn file_processing(file_path: &Path) -> Span {
        tracing::span!(Level::DEBUG, "file", path = %file_path.display())
    }

    /// One cleaner pass over a directory tree
    pub fn cleaning(kind: &str, root: &Path, delete_mode: bool) -> Span {
        tracing::span!(
            Level::INFO,
            "cleaning",
            kind = %kind,
            root = %root.display(),
            delete_mode
        )
    }

    pub fn download(url: &str, destination: &Path) -> Span {
        tracing::span!(Level::INFO, "download", url = %url, dest = %destination.display())
    }
}

/// Event helpers
pub mod events {
    use std::time::Duration;

    /// Wall time of a finished operation
    pub fn performance_metric(operation: &str, duration: Duration) {
        tracing::debug!(
            operation = %operation,
            duration_ms = duration.as_millis() as u64,
            "⏱️  Timing"
        );
    }
}
