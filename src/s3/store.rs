//! Backend call surface
//!
//! The client talks to storage only through [`ObjectStore`], addressed by
//! already-resolved backend bucket and key. Implementations own their
//! connections and must be safe to call concurrently.

use super::error::BackendError;
use super::types::{ListPage, ObjectBody, ObjectReader, UploadInfo};
use async_trait::async_trait;
use std::time::Duration;
use url::Url;

#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Signed, time-limited download URL; transfers no data
    async fn presign_get(&self, bucket: &str, key: &str, expires: Duration)
        -> Result<Url, BackendError>;

    /// Open an object for streaming reads
    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, BackendError>;

    /// Stream `body` under `key`; its length is known up front
    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<UploadInfo, BackendError>;

    /// Delete `key`; a missing key is not an error
    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError>;

    /// One page of objects whose keys start with `prefix`
    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage, BackendError>;

    async fn make_bucket(&self, bucket: &str) -> Result<(), BackendError>;

    /// Remove an empty bucket
    async fn remove_bucket(&self, bucket: &str) -> Result<(), BackendError>;
}
