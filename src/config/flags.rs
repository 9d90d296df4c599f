//! Command-line flags for the S3 configuration
//!
//! [`S3Args`] can be flattened into any clap parser, or registered on a
//! builder-style [`Command`] with [`register_flags`]. Every flag falls back
//! to an `S3_*` environment variable.

use super::{Config, ConfigError, DEFAULT_DISABLED, DEFAULT_REGION, DEFAULT_SECURE};
use crate::s3::NamespaceKind;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, ArgMatches, Args, Command, FromArgMatches};

pub const FLAG_DISABLED: &str = "s3-disabled";
pub const FLAG_ENDPOINT: &str = "s3-endpoint";
pub const FLAG_SECURE: &str = "s3-secure";
pub const FLAG_REGION: &str = "s3-region";
pub const FLAG_BUCKET: &str = "s3-bucket";
pub const FLAG_ACCESS_KEY: &str = "s3-access-key";
pub const FLAG_SECRET_KEY: &str = "s3-secret-key";
pub const FLAG_NAMESPACE: &str = "s3-namespace";

/// Flags marked required by [`mark_required_flags`], in order
pub const REQUIRED_FLAGS: [&str; 4] = [FLAG_ENDPOINT, FLAG_BUCKET, FLAG_ACCESS_KEY, FLAG_SECRET_KEY];

/// S3 connection flags
#[derive(Args, Debug, Clone, PartialEq, Eq)]
pub struct S3Args {
    /// Disable s3
    #[arg(
        id = "s3-disabled",
        long = "s3-disabled",
        env = "S3_DISABLED",
        global = true,
        default_value_t = DEFAULT_DISABLED,
        action = ArgAction::SetTrue,
        value_parser = BoolishValueParser::new()
    )]
    pub disabled: bool,

    /// The s3 endpoint (host[:port])
    #[arg(id = "s3-endpoint", long = "s3-endpoint", env = "S3_ENDPOINT", global = true)]
    pub endpoint: Option<String>,

    /// The s3 secure flag
    #[arg(
        id = "s3-secure",
        long = "s3-secure",
        env = "S3_SECURE",
        global = true,
        default_value_t = DEFAULT_SECURE,
        action = ArgAction::Set,
        value_parser = BoolishValueParser::new()
    )]
    pub secure: bool,

    /// The s3 region
    #[arg(
        id = "s3-region",
        long = "s3-region",
        env = "S3_REGION",
        global = true,
        default_value = DEFAULT_REGION
    )]
    pub region: String,

    /// The s3 bucket to use (or bucket-name prefix with --s3-namespace prefix)
    #[arg(id = "s3-bucket", long = "s3-bucket", env = "S3_BUCKET", global = true)]
    pub bucket: Option<String>,

    /// The s3 access key
    #[arg(id = "s3-access-key", long = "s3-access-key", env = "S3_ACCESS_KEY", global = true)]
    pub access_key: Option<String>,

    /// The s3 secret key
    #[arg(
        id = "s3-secret-key",
        long = "s3-secret-key",
        env = "S3_SECRET_KEY",
        global = true,
        hide_env_values = true
    )]
    pub secret_key: Option<String>,

    /// How the bucket flag namespaces each call
    #[arg(
        id = "s3-namespace",
        long = "s3-namespace",
        env = "S3_NAMESPACE",
        global = true,
        value_enum,
        default_value_t = NamespaceKind::Bucket
    )]
    pub namespace: NamespaceKind,
}

impl S3Args {
    /// Convert parsed flags into a [`Config`]
    pub fn to_config(&self) -> Config {
        Config {
            disabled: self.disabled,
            endpoint: self.endpoint.clone().unwrap_or_default(),
            secure: self.secure,
            region: self.region.clone(),
            bucket: self.bucket.clone().unwrap_or_default(),
            access_key: self.access_key.clone().unwrap_or_default(),
            secret_key: self.secret_key.clone().unwrap_or_default(),
            namespace: self.namespace,
        }
    }
}

/// Register the S3 flags on a command
pub fn register_flags(cmd: Command) -> Command {
    S3Args::augment_args(cmd)
}

/// Mark endpoint, bucket and credential flags as required
///
/// Meant for front ends that do not expose `--s3-disabled`. Fails on the
/// first flag that was never registered on `cmd`. Clap rejects required
/// global arguments, so the marked flags stop propagating to subcommands.
pub fn mark_required_flags(mut cmd: Command) -> Result<Command, ConfigError> {
    for id in REQUIRED_FLAGS {
        if !cmd.get_arguments().any(|arg| arg.get_id().as_str() == id) {
            return Err(ConfigError::FlagNotRegistered(id.to_string()));
        }
        cmd = cmd.mut_arg(id, |arg| arg.required(true).global(false));
    }

    Ok(cmd)
}

impl Config {
    /// Read a [`Config`] back from matches of a command built with [`register_flags`]
    pub fn from_arg_matches(matches: &ArgMatches) -> Result<Config, clap::Error> {
        S3Args::from_arg_matches(matches).map(|args| args.to_config())
    }
}
