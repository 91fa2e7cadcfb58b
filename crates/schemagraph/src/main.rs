//! Schemagraph CLI binary.

use anyhow::Result;
use schemagraph::cli::Cli;
use tracing_subscriber::EnvFilter;

/// Main entry point for the schemagraph CLI.
///
/// Runs on tokio's current_thread runtime: every command is a short
/// sequence of I/O-bound service calls.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Example: RUST_LOG=schemagraph=debug schemagraph show 42
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("schemagraph=info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    tracing::debug!("Starting schemagraph CLI");

    let cli = Cli::parse_args();
    cli.execute().await?;

    tracing::debug!("Schemagraph CLI completed successfully");
    Ok(())
}
