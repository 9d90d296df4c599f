//! Namespace-scoped S3 client
//!
//! This module provides:
//! - [`Client`], the prefix/bucket-scoped facade over an object store
//! - [`Namespace`] strategies mapping logical addresses to backend ones
//! - [`ObjectStore`], the backend seam, with an AWS SDK and an in-memory
//!   implementation

pub mod aws;
pub mod client;
pub mod error;
pub mod lifecycle;
pub mod memory;
pub mod namespace;
pub mod store;
pub mod types;

// Re-export main types for convenience
pub use aws::S3Store;
pub use client::{Client, ClientOptions, ObjectStream};
pub use error::{BackendError, ClientError, Result};
pub use lifecycle::Lifecycle;
pub use memory::MemoryStore;
pub use namespace::{BucketPath, Location, Namespace, NamespaceKind, PrefixedBucket};
pub use store::ObjectStore;
pub use types::{
    BodyProgress, BodyReader, ListPage, ObjectBody, ObjectInfo, ObjectReader, UploadInfo,
    DEFAULT_CONTENT_TYPE,
};
