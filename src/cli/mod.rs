//! CLI for s3scope
//!
//! A thin front end over [`Client`]: one subcommand per client operation.
//!
//! # Usage
//!
//! ```bash
//! # List objects under a scope
//! s3scope --s3-endpoint localhost:9000 --s3-bucket artifacts ls logs --filter 2024/
//!
//! # Upload and download
//! s3scope put logs 2024/01/a.txt ./a.txt --content-type text/plain
//! s3scope get logs 2024/01/a.txt -o ./copy.txt
//!
//! # Presigned URL valid for ten minutes
//! s3scope presign logs 2024/01/a.txt --expires 600
//! ```

pub mod args;
pub mod commands;

use crate::config::load_config;
use crate::s3::{Client, ClientError};
use anyhow::{Context, Result};
use tracing::info;

use args::{Cli, Commands};
use commands::*;

/// Name of the logging scope the CLI's client emits under
pub const LOG_NAME: &str = "s3scope";

/// Load and validate configuration, build the client, run one command
pub async fn run(cli: Cli) -> Result<()> {
    cli.validate()?;

    let config = load_config(cli.config.as_deref(), &cli.s3).context("Failed to load configuration")?;
    config.validate().context("Invalid configuration")?;

    let client = match Client::new(config.to_client_options(LOG_NAME)) {
        Ok(client) => client,
        Err(ClientError::Disabled) => {
            println!("S3 is disabled; nothing to do");
            return Ok(());
        }
        Err(e) => return Err(e).context("Failed to create S3 client"),
    };

    info!("Using endpoint {} (namespace {:?})", config.endpoint, client.namespace());

    let result = dispatch(&client, cli.command).await;
    client.close().await?;
    result
}

async fn dispatch(client: &Client, command: Commands) -> Result<()> {
    match command {
        Commands::Ls { scope, filter } => cmd_ls(client, &scope, &filter).await,
        Commands::Get { scope, key, output } => {
            cmd_get(client, &scope, &key, output.as_deref()).await
        }
        Commands::Put {
            scope,
            key,
            file,
            content_type,
        } => cmd_put(client, &scope, &key, &file, content_type.as_deref()).await,
        Commands::Rm { scope, key } => cmd_rm(client, &scope, &key).await,
        Commands::Presign { scope, key, expires } => {
            cmd_presign(client, &scope, &key, expires).await
        }
        Commands::Mb { name } => cmd_mb(client, &name).await,
        Commands::Rb { name } => cmd_rb(client, &name).await,
    }
}
