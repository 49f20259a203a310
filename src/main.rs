//! media-digest CLI entrypoint

use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use media_digest::cli::Cli;

#[tokio::main]
async fn main() -> Result<ExitCode> {
    // Logs go to stderr so stage reports on stdout stay parseable
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let cli = Cli::parse();
    let code = cli.execute().await?;
    Ok(ExitCode::from(code))
}
