//! Command-line argument definitions

use crate::config::S3Args;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Default lifetime of a presigned URL, in seconds
pub const DEFAULT_PRESIGN_EXPIRY_SECS: u64 = 3600;

#[derive(Parser, Debug)]
#[command(name = "s3scope")]
#[command(version, about = "Namespace-scoped S3 client", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// YAML config file; replaces the --s3-* flags when given
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    pub log_level: String,

    #[command(flatten)]
    pub s3: S3Args,
}

#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// List objects in a scope
    Ls {
        /// Scope to list
        scope: String,

        /// Key filter within the scope
        #[arg(long, default_value = "")]
        filter: String,
    },

    /// Download an object
    Get {
        scope: String,
        key: String,

        /// Write to this file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Upload a local file
    Put {
        scope: String,
        key: String,

        /// Local file to upload
        file: PathBuf,

        /// Content type (defaults to application/octet-stream)
        #[arg(long)]
        content_type: Option<String>,
    },

    /// Remove an object
    Rm { scope: String, key: String },

    /// Print a presigned download URL
    Presign {
        scope: String,
        key: String,

        /// URL lifetime in seconds
        #[arg(long, default_value_t = DEFAULT_PRESIGN_EXPIRY_SECS)]
        expires: u64,
    },

    /// Make bucket
    Mb { name: String },

    /// Remove bucket
    Rb { name: String },
}

impl Cli {
    /// Validate arguments that clap cannot check on its own
    pub fn validate(&self) -> anyhow::Result<()> {
        if let Commands::Presign { expires, .. } = &self.command {
            if *expires == 0 {
                anyhow::bail!("Presign expiry must be greater than 0");
            }
        }

        Ok(())
    }
}
