//! In-memory [`ObjectStore`]
//!
//! Behaves like an S3-compatible backend for the operations the client uses:
//! buckets must exist before objects are written, deleting a missing key
//! succeeds, non-empty buckets cannot be removed, and listings come back in
//! key order, one page at a time.

use super::error::BackendError;
use super::store::ObjectStore;
use super::types::{ListPage, ObjectBody, ObjectInfo, ObjectReader, UploadInfo};
use async_trait::async_trait;
use bytes::Bytes;
use std::collections::{BTreeMap, HashMap};
use std::io::Cursor;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use url::Url;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Bytes,
    content_type: String,
    etag: String,
}

type Buckets = HashMap<String, BTreeMap<String, StoredObject>>;

/// Object store held entirely in memory
///
/// Clone is cheap - clones share the same buckets.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    buckets: Arc<RwLock<Buckets>>,
    page_size: usize,
    version: Arc<AtomicU64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            page_size: DEFAULT_PAGE_SIZE,
            version: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Create a store with the given buckets already present
    pub fn with_buckets<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let buckets = names
            .into_iter()
            .map(|name| (name.into(), BTreeMap::new()))
            .collect();

        Self {
            buckets: Arc::new(RwLock::new(buckets)),
            ..Self::new()
        }
    }

    /// Set the number of objects returned per listing page
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Content type an object was stored with
    pub async fn content_type(&self, bucket: &str, key: &str) -> Option<String> {
        let buckets = self.buckets.read().await;
        buckets
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.content_type.clone())
    }

    pub async fn bucket_exists(&self, bucket: &str) -> bool {
        self.buckets.read().await.contains_key(bucket)
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

fn no_such_bucket(bucket: &str) -> BackendError {
    BackendError::NotFound(format!("bucket '{}' does not exist", bucket))
}

#[async_trait]
impl ObjectStore for MemoryStore {
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> Result<Url, BackendError> {
        let mut url = Url::parse("memory://localhost/")
            .map_err(|e| BackendError::Service(e.to_string()))?;
        url.path_segments_mut()
            .map_err(|_| BackendError::Service("memory URL cannot be a base".to_string()))?
            .pop_if_empty()
            .push(bucket)
            .extend(key.split('/'));
        url.query_pairs_mut()
            .append_pair("X-Amz-Expires", &expires.as_secs().to_string());
        Ok(url)
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, BackendError> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        let object = objects
            .get(key)
            .ok_or_else(|| BackendError::NotFound(format!("key '{}' does not exist", key)))?;

        Ok(Box::pin(Cursor::new(object.data.clone())))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<UploadInfo, BackendError> {
        if !self.bucket_exists(bucket).await {
            return Err(no_such_bucket(bucket));
        }

        let body = body
            .collect()
            .await
            .map_err(|e| BackendError::Transport(format!("failed to read body: {}", e)))?;

        let mut buckets = self.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        let version = self.version.fetch_add(1, Ordering::Relaxed) + 1;
        let etag = format!("{:016x}", version);
        let size = body.len() as u64;

        objects.insert(
            key.to_string(),
            StoredObject {
                data: body,
                content_type: content_type.to_string(),
                etag: etag.clone(),
            },
        );

        Ok(UploadInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            etag: Some(etag),
            version_id: Some(version.to_string()),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets.get_mut(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        objects.remove(key);
        Ok(())
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage, BackendError> {
        let buckets = self.buckets.read().await;
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;

        let start = match &continuation_token {
            Some(after) => Bound::Excluded(after.clone()),
            None => Bound::Included(prefix.to_string()),
        };

        let mut matching = objects
            .range((start, Bound::Unbounded))
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, object)| ObjectInfo {
                key: key.clone(),
                size: object.data.len() as u64,
                etag: Some(object.etag.clone()),
                last_modified: None,
            });

        let page: Vec<ObjectInfo> = matching.by_ref().take(self.page_size).collect();
        let next_continuation_token = match matching.next() {
            Some(_) => page.last().map(|object| object.key.clone()),
            None => None,
        };

        Ok(ListPage {
            objects: page,
            next_continuation_token,
        })
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let mut buckets = self.buckets.write().await;
        if buckets.contains_key(bucket) {
            return Err(BackendError::Conflict(format!("bucket '{}' already exists", bucket)));
        }
        buckets.insert(bucket.to_string(), BTreeMap::new());
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let mut buckets = self.buckets.write().await;
        let objects = buckets.get(bucket).ok_or_else(|| no_such_bucket(bucket))?;
        if !objects.is_empty() {
            return Err(BackendError::Conflict(format!("bucket '{}' is not empty", bucket)));
        }
        buckets.remove(bucket);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncReadExt;

    #[tokio::test]
    async fn test_put_get_roundtrip() {
        let store = MemoryStore::with_buckets(["b"]);
        let info = store
            .put_object("b", "k", ObjectBody::from_bytes(Bytes::from_static(b"hello")), "text/plain")
            .await
            .unwrap();
        assert_eq!(info.size, 5);
        assert!(info.etag.is_some());

        let mut reader = store.get_object("b", "k").await.unwrap();
        let mut out = String::new();
        reader.read_to_string(&mut out).await.unwrap();
        assert_eq!(out, "hello");
        assert_eq!(store.content_type("b", "k").await.as_deref(), Some("text/plain"));
    }

    #[tokio::test]
    async fn test_missing_bucket_and_key() {
        let store = MemoryStore::with_buckets(["b"]);
        assert!(matches!(
            store.get_object("b", "missing").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(matches!(
            store.put_object("nope", "k", ObjectBody::from_bytes(Bytes::new()), "x").await,
            Err(BackendError::NotFound(_))
        ));
        assert!(store.delete_object("b", "missing").await.is_ok());
    }

    #[tokio::test]
    async fn test_list_pages() {
        let store = MemoryStore::with_buckets(["b"]).with_page_size(2);
        for key in ["p/1", "p/2", "p/3", "q/1"] {
            store.put_object("b", key, ObjectBody::from_bytes(Bytes::new()), "x").await.unwrap();
        }

        let first = store.list_objects("b", "p/", None).await.unwrap();
        assert_eq!(first.objects.len(), 2);
        assert_eq!(first.next_continuation_token.as_deref(), Some("p/2"));

        let second = store
            .list_objects("b", "p/", first.next_continuation_token)
            .await
            .unwrap();
        assert_eq!(second.objects.len(), 1);
        assert_eq!(second.objects[0].key, "p/3");
        assert!(second.next_continuation_token.is_none());
    }

    #[tokio::test]
    async fn test_bucket_lifecycle() {
        let store = MemoryStore::new();
        store.make_bucket("b").await.unwrap();
        assert!(matches!(store.make_bucket("b").await, Err(BackendError::Conflict(_))));

        store.put_object("b", "k", ObjectBody::from_bytes(Bytes::new()), "x").await.unwrap();
        assert!(matches!(store.remove_bucket("b").await, Err(BackendError::Conflict(_))));

        store.delete_object("b", "k").await.unwrap();
        store.remove_bucket("b").await.unwrap();
        assert!(!store.bucket_exists("b").await);
    }

    #[tokio::test]
    async fn test_presign_url() {
        let store = MemoryStore::new();
        let url = store
            .presign_get("b", "logs/a.txt", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(url.as_str(), "memory://localhost/b/logs/a.txt?X-Amz-Expires=60");
    }
}
