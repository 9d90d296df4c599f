//! s3scope - namespace-scoped S3 client

pub mod cli;
pub mod config;
pub mod s3;

pub use config::Config;
pub use s3::{Client, ClientError, ClientOptions};
