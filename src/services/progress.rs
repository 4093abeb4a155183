//! Progress reporting service
//!
//! Batch loops and downloads report through [`ProgressIndicator`], which
//! renders an `indicatif` bar when the `cli` feature is enabled and does
//! nothing otherwise.

#[cfg(feature = "cli")]
use indicatif::{ProgressBar, ProgressStyle};

#[cfg(feature = "cli")]
const BYTES_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({bytes_per_sec}) {msg}";

#[cfg(feature = "cli")]
const ITEMS_TEMPLATE: &str =
    "{spinner:.green} {prefix} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}";

/// A terminal bar, or nothing when output is hidden
#[derive(Debug)]
pub enum ProgressIndicator {
    #[cfg(feature = "cli")]
    Indicatif(ProgressBar),
    NoOp,
}

#[cfg(feature = "cli")]
fn styled(len: u64, template: &str) -> ProgressBar {
    let style = ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("#>-");
    let pb = ProgressBar::new(len);
    pb.set_style(style);
    pb
}

impl ProgressIndicator {
    /// Byte-counting bar for downloads
    #[must_use]
    pub fn bytes(label: &str, visible: bool) -> Self {
        #[cfg(feature = "cli")]
        if visible {
            let pb = styled(0, BYTES_TEMPLATE);
            pb.set_message(label.to_string());
            return Self::Indicatif(pb);
        }
        let _ = (label, visible);
        Self::NoOp
    }

    /// Item-counting bar for batch loops
    #[must_use]
    pub fn items(label: &str, total: usize, visible: bool) -> Self {
        #[cfg(feature = "cli")]
        if visible {
            let pb = styled(total as u64, ITEMS_TEMPLATE);
            pb.set_prefix(label.to_string());
            return Self::Indicatif(pb);
        }
        let _ = (label, total, visible);
        Self::NoOp
    }

    #[cfg(feature = "cli")]
    fn bar(&self) -> Option<&ProgressBar> {
        match self {
            Self::Indicatif(pb) => Some(pb),
            Self::NoOp => None,
        }
    }

    #[cfg(not(feature = "cli"))]
    #[allow(clippy::unused_self)]
    fn bar(&self) -> Option<&NoBar> {
        None
    }

    pub fn set_message(&self, msg: String) {
        if let Some(pb) = self.bar() {
            pb.set_message(msg);
        }
    }

    /// Total once the server reports a content length
    pub fn set_length(&self, len: u64) {
        if let Some(pb) = self.bar() {
            pb.set_length(len);
        }
    }

    pub fn set_position(&self, pos: u64) {
        if let Some(pb) = self.bar() {
            pb.set_position(pos);
        }
    }

    pub fn inc(&self, delta: u64) {
        if let Some(pb) = self.bar() {
            pb.inc(delta);
        }
    }

    /// Print a line above the bar without breaking its rendering.
    /// Hidden indicators drop the line; callers log it separately.
    pub fn println(&self, line: &str) {
        if let Some(pb) = self.bar() {
            pb.println(line);
        }
    }

    pub fn finish_and_clear(&self) {
        if let Some(pb) = self.bar() {
            pb.finish_and_clear();
        }
    }
}

/// Stand-in bar type for builds without terminal output
#[cfg(not(feature = "cli"))]
#[derive(Debug)]
#[allow(dead_code)]
struct NoBar;

#[cfg(not(feature = "cli"))]
impl NoBar {
    fn set_message(&self, _msg: String) {}
    fn set_length(&self, _len: u64) {}
    fn set_position(&self, _pos: u64) {}
    fn inc(&self, _delta: u64) {}
    fn println(&self, _line: &str) {}
    fn finish_and_clear(&self) {}
}
