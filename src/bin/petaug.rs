//! petaug CLI
//!
//! Command-line entry point for the pet image dataset pipeline.

#[cfg(feature = "cli")]
use petaug::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("CLI feature not enabled. Please rebuild with --features cli");
    std::process::exit(1);
}
