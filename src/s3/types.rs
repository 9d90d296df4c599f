//! Value types returned by object store operations

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::io;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncReadExt, ReadBuf, Take};

/// Content type used when a caller does not supply one
pub const DEFAULT_CONTENT_TYPE: &str = "application/octet-stream";

/// Lazy, single-pass object body; the caller owns it and drops it when done
pub type ObjectReader = Pin<Box<dyn AsyncRead + Send>>;

/// Upper bound on the buffer reserved up front when collecting a body
const MAX_COLLECT_PREALLOC: u64 = 8 * 1024 * 1024;

/// Reader behind an [`ObjectBody`]
pub type BodyReader = Pin<Box<dyn AsyncRead + Send + Sync>>;

/// Upload body: a reader that must yield exactly `len` bytes
///
/// The reader is consumed lazily by the store. Bytes past `len` are never
/// read, and a reader that ends early fails with
/// [`io::ErrorKind::UnexpectedEof`]; [`ObjectBody::progress`] tells the two
/// apart after the fact.
pub struct ObjectBody {
    reader: ExactReader,
    len: u64,
}

impl ObjectBody {
    pub fn new<R>(reader: R, len: u64) -> Self
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let inner: BodyReader = Box::pin(reader);
        Self {
            reader: ExactReader {
                inner: inner.take(len),
                expected: len,
                progress: Arc::new(BodyProgress::default()),
            },
            len,
        }
    }

    pub fn from_bytes(bytes: Bytes) -> Self {
        let len = bytes.len() as u64;
        Self::new(io::Cursor::new(bytes), len)
    }

    /// Number of bytes the body will yield
    pub fn len(&self) -> u64 {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Shared view of how far the reader got
    pub fn progress(&self) -> Arc<BodyProgress> {
        self.reader.progress.clone()
    }

    /// The size-checked reader, for stores that stream
    pub fn into_reader(self) -> BodyReader {
        Box::pin(self.reader)
    }

    /// Read the whole body into memory, for stores that need it at once
    pub async fn collect(self) -> io::Result<Bytes> {
        let mut buf = Vec::with_capacity(self.len.min(MAX_COLLECT_PREALLOC) as usize);
        let mut reader = self.reader;
        reader.read_to_end(&mut buf).await?;
        Ok(buf.into())
    }
}

impl std::fmt::Debug for ObjectBody {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ObjectBody").field("len", &self.len).finish()
    }
}

/// Bytes read so far from an [`ObjectBody`], and whether it ended early
#[derive(Debug, Default)]
pub struct BodyProgress {
    read: AtomicU64,
    short: AtomicBool,
}

impl BodyProgress {
    pub fn read(&self) -> u64 {
        self.read.load(Ordering::SeqCst)
    }

    /// Bytes read before the reader ended, if it ended early
    pub fn short_read(&self) -> Option<u64> {
        self.short.load(Ordering::SeqCst).then(|| self.read())
    }
}

struct ExactReader {
    inner: Take<BodyReader>,
    expected: u64,
    progress: Arc<BodyProgress>,
}

impl AsyncRead for ExactReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        let before = buf.filled().len();
        match Pin::new(&mut this.inner).poll_read(cx, buf) {
            Poll::Ready(Ok(())) => {}
            other => return other,
        }

        let n = (buf.filled().len() - before) as u64;
        let read = this.progress.read.fetch_add(n, Ordering::SeqCst) + n;
        if n == 0 && read < this.expected {
            this.progress.short.store(true, Ordering::SeqCst);
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("body ended after {} of {} bytes", read, this.expected),
            )));
        }

        Poll::Ready(Ok(()))
    }
}

/// Object metadata from a listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObjectInfo {
    /// Backend object key
    pub key: String,
    /// Object size in bytes
    pub size: u64,
    /// ETag, without surrounding quotes
    pub etag: Option<String>,
    /// Last modified timestamp
    pub last_modified: Option<String>,
}

impl ObjectInfo {
    pub fn new(key: String, size: u64) -> Self {
        Self {
            key,
            size,
            etag: None,
            last_modified: None,
        }
    }
}

/// One page of a listing
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    pub objects: Vec<ObjectInfo>,
    /// Token for the next page; `None` once the listing is exhausted
    pub next_continuation_token: Option<String>,
}

/// Result of a successful upload
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadInfo {
    pub bucket: String,
    pub key: String,
    pub size: u64,
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

/// Strip the quotes S3 puts around ETags
pub(crate) fn sanitize_etag(etag: Option<&str>) -> Option<String> {
    etag.map(|value| value.trim_matches('"').to_string())
}
