//! Client and backend error types

use thiserror::Error;

/// Failure reported by an [`ObjectStore`](super::ObjectStore)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    AccessDenied(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("service error: {0}")]
    Service(String),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Errors returned by [`Client`](super::Client)
#[derive(Error, Debug)]
pub enum ClientError {
    /// The client was configured off; not a failure
    #[error("s3 is disabled")]
    Disabled,

    #[error("failed to create s3 client: {0}")]
    Construction(#[source] BackendError),

    #[error("{op} failed for bucket '{bucket}' key '{key}': {source}")]
    Operation {
        op: &'static str,
        bucket: String,
        key: String,
        #[source]
        source: BackendError,
    },

    #[error("body for '{key}' ended after {read} of {expected} bytes")]
    ShortBody { key: String, expected: u64, read: u64 },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("operation cancelled")]
    Cancelled,

    #[error("no tokio runtime to run the operation on")]
    NoRuntime,
}

impl ClientError {
    pub fn is_disabled(&self) -> bool {
        matches!(self, ClientError::Disabled)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClientError::Cancelled)
    }

    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            ClientError::Operation {
                source: BackendError::NotFound(_),
                ..
            }
        )
    }

    /// Backend failure behind an operation or construction error
    pub fn backend(&self) -> Option<&BackendError> {
        match self {
            ClientError::Operation { source, .. } => Some(source),
            ClientError::Construction(source) => Some(source),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, ClientError>;
