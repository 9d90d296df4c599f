//! Namespace-scoped S3 client
//!
//! [`Client`] wraps one backend session, one [`Namespace`] strategy and one
//! [`Lifecycle`]. Operations take a logical `(scope, key)` pair, resolve it
//! through the namespace and call the backend, racing every call against
//! the lifecycle so that [`Client::close`] aborts in-flight work.
//!
//! Callers that want a per-call deadline wrap the operation in
//! `tokio::time::timeout`; dropping an operation future aborts its backend
//! request.

use super::aws::S3Store;
use super::error::{BackendError, ClientError, Result};
use super::lifecycle::Lifecycle;
use super::namespace::{BucketPath, Location, Namespace, NamespaceKind, PrefixedBucket};
use super::store::ObjectStore;
use super::types::{ObjectBody, ObjectInfo, ObjectReader, UploadInfo, DEFAULT_CONTENT_TYPE};
use futures::Stream;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;
use tokio::io::AsyncRead;
use tokio::sync::mpsc;
use tracing::{debug, info_span, warn, Instrument, Span};
use url::Url;

/// Objects buffered between the listing task and the consumer
const LIST_CHANNEL_CAPACITY: usize = 256;

/// Options a [`Client`] is built from
///
/// Usually produced by [`Config::to_client_options`](crate::config::Config::to_client_options).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Name of the logging scope the client emits under
    pub log_name: String,
    pub disabled: bool,
    pub endpoint: String,
    pub secure: bool,
    pub region: String,
    pub bucket: String,
    pub access_key: String,
    pub secret_key: String,
    pub namespace: NamespaceKind,
}

impl ClientOptions {
    /// Namespace strategy selected by `namespace`, rooted at `bucket`
    pub fn build_namespace(&self) -> Arc<dyn Namespace> {
        match self.namespace {
            NamespaceKind::Bucket => Arc::new(BucketPath::new(self.bucket.clone())),
            NamespaceKind::Prefix => Arc::new(PrefixedBucket::new(self.bucket.clone())),
        }
    }
}

/// S3 client bound to one namespace
///
/// Clone is cheap - clones share the backend session and the lifecycle, so
/// closing any clone closes them all.
#[derive(Clone)]
pub struct Client {
    options: Arc<ClientOptions>,
    store: Arc<dyn ObjectStore>,
    namespace: Arc<dyn Namespace>,
    lifecycle: Lifecycle,
    span: Span,
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("log_name", &self.options.log_name)
            .field("endpoint", &self.options.endpoint)
            .field("namespace", &self.namespace)
            .field("closed", &self.lifecycle.is_cancelled())
            .finish()
    }
}

impl Client {
    /// Connect to the configured S3 endpoint
    ///
    /// Returns [`ClientError::Disabled`] without building anything when the
    /// options are disabled.
    pub fn new(options: ClientOptions) -> Result<Self> {
        let span = client_span(&options);
        if options.disabled {
            span.in_scope(|| warn!("disabled"));
            return Err(ClientError::Disabled);
        }

        span.in_scope(|| {
            debug!(
                "connecting to s3 endpoint {} with bucket '{}'",
                options.endpoint, options.bucket
            )
        });

        let store = S3Store::new(&options).map_err(ClientError::Construction)?;
        let namespace = options.build_namespace();

        Ok(Self::assemble(options, Arc::new(store), namespace, span))
    }

    /// Build a client over any object store and namespace strategy
    ///
    /// Honors `disabled` the same way [`Client::new`] does.
    pub fn with_store(
        options: ClientOptions,
        store: Arc<dyn ObjectStore>,
        namespace: Arc<dyn Namespace>,
    ) -> Result<Self> {
        let span = client_span(&options);
        if options.disabled {
            span.in_scope(|| warn!("disabled"));
            return Err(ClientError::Disabled);
        }

        Ok(Self::assemble(options, store, namespace, span))
    }

    fn assemble(
        options: ClientOptions,
        store: Arc<dyn ObjectStore>,
        namespace: Arc<dyn Namespace>,
        span: Span,
    ) -> Self {
        Self {
            options: Arc::new(options),
            store,
            namespace,
            lifecycle: Lifecycle::new(),
            span,
        }
    }

    pub fn options(&self) -> &ClientOptions {
        &self.options
    }

    pub fn namespace(&self) -> &dyn Namespace {
        self.namespace.as_ref()
    }

    /// Whether [`Client::close`] has been called
    pub fn is_closed(&self) -> bool {
        self.lifecycle.is_cancelled()
    }

    /// Signed download URL for `key`, valid for `expires`
    pub async fn presigned_get_object(
        &self,
        scope: &str,
        key: &str,
        expires: Duration,
    ) -> Result<Url> {
        let loc = self.namespace.resolve(scope, key);
        debug!(
            parent: &self.span,
            "presigning object '{}' from bucket '{}' with expiry {:?}",
            loc.key, loc.bucket, expires
        );
        self.run(
            "presigned_get_object",
            &loc,
            self.store.presign_get(&loc.bucket, &loc.key, expires),
        )
        .await
    }

    /// Open `key` for reading; the returned reader is lazy and single-pass
    pub async fn get_object(&self, scope: &str, key: &str) -> Result<ObjectReader> {
        let loc = self.namespace.resolve(scope, key);
        debug!(parent: &self.span, "getting object '{}' from bucket '{}'", loc.key, loc.bucket);
        self.run("get_object", &loc, self.store.get_object(&loc.bucket, &loc.key))
            .await
    }

    /// Upload exactly `size` bytes streamed from `reader`
    ///
    /// `content_type` defaults to `application/octet-stream`. Bytes past
    /// `size` are left unread. A reader that ends early fails with
    /// [`ClientError::ShortBody`].
    pub async fn put_object<R>(
        &self,
        scope: &str,
        key: &str,
        reader: R,
        size: u64,
        content_type: Option<&str>,
    ) -> Result<UploadInfo>
    where
        R: AsyncRead + Send + Sync + 'static,
    {
        let loc = self.namespace.resolve(scope, key);
        let content_type = content_type.unwrap_or(DEFAULT_CONTENT_TYPE);
        debug!(
            parent: &self.span,
            "putting object '{}' ({} bytes) into bucket '{}'", loc.key, size, loc.bucket
        );

        let body = ObjectBody::new(reader, size);
        let progress = body.progress();

        let result = self
            .run(
                "put_object",
                &loc,
                self.store.put_object(&loc.bucket, &loc.key, body, content_type),
            )
            .await;

        if let (Err(ClientError::Operation { .. }), Some(read)) = (&result, progress.short_read()) {
            return Err(ClientError::ShortBody {
                key: loc.key,
                expected: size,
                read,
            });
        }

        result
    }

    /// Delete `key`; deleting a key that does not exist succeeds
    pub async fn delete_object(&self, scope: &str, key: &str) -> Result<()> {
        let loc = self.namespace.resolve(scope, key);
        debug!(parent: &self.span, "deleting object '{}' from bucket '{}'", loc.key, loc.bucket);
        self.run("delete_object", &loc, self.store.delete_object(&loc.bucket, &loc.key))
            .await
    }

    /// Stream every object under `filter` within `scope`
    ///
    /// Pages are fetched by a background task registered with the client's
    /// lifecycle. The stream ends at the end of the listing, or with a single
    /// [`ClientError::Cancelled`] once the client is closed. Dropping the
    /// stream stops the task. Outside a Tokio runtime the stream yields a
    /// single [`ClientError::NoRuntime`].
    pub fn list_objects(&self, scope: &str, filter: &str) -> ObjectStream {
        let loc = self.namespace.list_prefix(scope, filter);
        debug!(
            parent: &self.span,
            "listing objects with prefix '{}' in bucket '{}'", loc.key, loc.bucket
        );

        let (tx, rx) = mpsc::channel(LIST_CHANNEL_CAPACITY);
        let finished = Arc::new(AtomicBool::new(false));

        let pager = list_pages(
            self.store.clone(),
            self.lifecycle.clone(),
            loc,
            tx.clone(),
            finished.clone(),
        );
        if self.lifecycle.spawn(pager.instrument(self.span.clone())).is_err() {
            warn!(parent: &self.span, "list_objects called outside a tokio runtime");
            // Fresh channel, so the error always fits
            let _ = tx.try_send(Err(ClientError::NoRuntime));
            finished.store(true, Ordering::SeqCst);
        }

        ObjectStream {
            rx,
            finished,
            done: false,
        }
    }

    /// Create a bucket; the name goes through the namespace strategy
    pub async fn make_bucket(&self, name: &str) -> Result<()> {
        let loc = Location::new(self.namespace.bucket_name(name), "");
        debug!(parent: &self.span, "making bucket '{}'", loc.bucket);
        self.run("make_bucket", &loc, self.store.make_bucket(&loc.bucket))
            .await
    }

    /// Remove an empty bucket; the name goes through the namespace strategy
    pub async fn remove_bucket(&self, name: &str) -> Result<()> {
        let loc = Location::new(self.namespace.bucket_name(name), "");
        debug!(parent: &self.span, "removing bucket '{}'", loc.bucket);
        self.run("remove_bucket", &loc, self.store.remove_bucket(&loc.bucket))
            .await
    }

    /// Cancel in-flight operations and wait for background work to finish
    ///
    /// Operations issued afterwards fail with [`ClientError::Cancelled`].
    pub async fn close(&self) -> Result<()> {
        debug!(parent: &self.span, "closing s3 client");
        self.lifecycle.shutdown().await;
        Ok(())
    }

    async fn until_cancelled<F: Future>(&self, fut: F) -> Result<F::Output> {
        tokio::select! {
            biased;
            _ = self.lifecycle.cancelled() => Err(ClientError::Cancelled),
            output = fut => Ok(output),
        }
    }

    async fn run<T, F>(&self, op: &'static str, loc: &Location, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, BackendError>>,
    {
        self.until_cancelled(fut)
            .instrument(self.span.clone())
            .await?
            .map_err(|source| operation_error(op, loc, source))
    }
}

fn client_span(options: &ClientOptions) -> Span {
    info_span!("s3", name = %options.log_name)
}

fn operation_error(op: &'static str, loc: &Location, source: BackendError) -> ClientError {
    ClientError::Operation {
        op,
        bucket: loc.bucket.clone(),
        key: loc.key.clone(),
        source,
    }
}

/// Page through a listing, forwarding objects until the end, an error,
/// cancellation, or the consumer going away
async fn list_pages(
    store: Arc<dyn ObjectStore>,
    lifecycle: Lifecycle,
    loc: Location,
    tx: mpsc::Sender<Result<ObjectInfo>>,
    finished: Arc<AtomicBool>,
) {
    let mut continuation = None;

    loop {
        let page = tokio::select! {
            biased;
            _ = lifecycle.cancelled() => return,
            _ = tx.closed() => return,
            page = store.list_objects(&loc.bucket, &loc.key, continuation.take()) => page,
        };

        let page = match page {
            Ok(page) => page,
            Err(source) => {
                let err = operation_error("list_objects", &loc, source);
                if deliver(&tx, &lifecycle, Err(err)).await {
                    finished.store(true, Ordering::SeqCst);
                }
                return;
            }
        };

        for object in page.objects {
            if !deliver(&tx, &lifecycle, Ok(object)).await {
                return;
            }
        }

        match page.next_continuation_token {
            Some(next) => continuation = Some(next),
            None => {
                finished.store(true, Ordering::SeqCst);
                return;
            }
        }
    }
}

/// Send one item unless the lifecycle is cancelled first; false means stop
async fn deliver(
    tx: &mpsc::Sender<Result<ObjectInfo>>,
    lifecycle: &Lifecycle,
    item: Result<ObjectInfo>,
) -> bool {
    tokio::select! {
        biased;
        _ = lifecycle.cancelled() => false,
        sent = tx.send(item) => sent.is_ok(),
    }
}

/// Pull-based listing returned by [`Client::list_objects`]
///
/// Yields objects in the backend's order. If the listing is cut short by
/// [`Client::close`], the last item is [`ClientError::Cancelled`]; items
/// already yielded remain valid.
#[derive(Debug)]
pub struct ObjectStream {
    rx: mpsc::Receiver<Result<ObjectInfo>>,
    finished: Arc<AtomicBool>,
    done: bool,
}

impl Stream for ObjectStream {
    type Item = Result<ObjectInfo>;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        if this.done {
            return Poll::Ready(None);
        }

        match this.rx.poll_recv(cx) {
            Poll::Ready(Some(item)) => Poll::Ready(Some(item)),
            Poll::Ready(None) => {
                this.done = true;
                if this.finished.load(Ordering::SeqCst) {
                    Poll::Ready(None)
                } else {
                    Poll::Ready(Some(Err(ClientError::Cancelled)))
                }
            }
            Poll::Pending => Poll::Pending,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> ClientOptions {
        crate::config::Config {
            endpoint: "localhost:9000".to_string(),
            bucket: "artifacts".to_string(),
            access_key: "key".to_string(),
            secret_key: "secret".to_string(),
            ..crate::config::Config::new()
        }
        .to_client_options("test")
    }

    #[test]
    fn test_build_namespace() {
        let mut opts = options();
        assert_eq!(
            opts.build_namespace().resolve("logs", "a"),
            Location::new("artifacts", "logs/a")
        );

        opts.namespace = NamespaceKind::Prefix;
        assert_eq!(
            opts.build_namespace().resolve("logs", "a"),
            Location::new("artifactslogs", "a")
        );
    }

    #[test]
    fn test_new_disabled() {
        let opts = ClientOptions {
            disabled: true,
            endpoint: "not an endpoint://".to_string(),
            ..options()
        };
        let err = Client::new(opts).unwrap_err();
        assert!(err.is_disabled());
    }

    #[test]
    fn test_new_wraps_construction_failure() {
        let opts = ClientOptions {
            endpoint: "https://localhost:9000".to_string(),
            ..options()
        };
        let err = Client::new(opts).unwrap_err();
        assert!(matches!(
            err,
            ClientError::Construction(BackendError::InvalidConfig(_))
        ));
        assert!(!err.is_disabled());
    }

    #[tokio::test]
    async fn test_new_does_not_connect() {
        let client = Client::new(options()).unwrap();
        assert!(!client.is_closed());
        assert_eq!(client.options().bucket, "artifacts");
    }

    #[test]
    fn test_list_outside_runtime_yields_error() {
        use futures::StreamExt;

        let store: Arc<dyn ObjectStore> = Arc::new(crate::s3::MemoryStore::new());
        let opts = options();
        let namespace = opts.build_namespace();
        let client = Client::with_store(opts, store, namespace).unwrap();

        let items: Vec<_> = futures::executor::block_on(client.list_objects("logs", "").collect());
        assert_eq!(items.len(), 1);
        assert!(matches!(items[0], Err(ClientError::NoRuntime)));
    }
}
