//! Services separating I/O and progress reporting from stage logic

pub mod io;
pub mod progress;

pub use io::ImageIOService;
pub use progress::ProgressIndicator;
