use anyhow::Result;
use clap::Parser;
use s3scope::cli::{self, args::Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn main() -> Result<()> {
    // Pick up S3_* variables from a local .env before clap reads the environment
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| cli.log_level.clone().into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    // One command per process; sequential I/O needs no worker threads
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;

    runtime.block_on(cli::run(cli))
}
