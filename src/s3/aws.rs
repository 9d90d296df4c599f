//! [`ObjectStore`] backed by the AWS SDK
//!
//! Request signing, the wire protocol and response parsing all stay inside
//! `aws-sdk-s3`. This module only builds the SDK client once from
//! [`ClientOptions`] and maps SDK errors onto [`BackendError`].

use super::client::ClientOptions;
use super::error::BackendError;
use super::store::ObjectStore;
use super::types::{sanitize_etag, ListPage, ObjectBody, ObjectInfo, ObjectReader, UploadInfo};
use async_trait::async_trait;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::operation::delete_object::{DeleteObjectError, DeleteObjectOutput};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::primitives::{ByteStream, DateTimeFormat};
use aws_sdk_s3::types::{BucketLocationConstraint, CreateBucketConfiguration};
use aws_smithy_types::body::SdkBody;
use futures::TryStreamExt;
use http_body::Frame;
use http_body_util::StreamBody;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use url::Url;

const CREDENTIALS_PROVIDER: &str = "s3scope-static";

/// Regions that must not be sent as a bucket location constraint
const IMPLICIT_REGIONS: [&str; 2] = ["auto", "us-east-1"];

/// S3-compatible backend session
///
/// Clone is cheap; clones share the SDK's connection pool.
#[derive(Clone, Debug)]
pub struct S3Store {
    client: aws_sdk_s3::Client,
    region: String,
}

impl S3Store {
    /// Build the SDK client with static credentials and path-style addressing
    ///
    /// Only the shape of the options is checked; no request is sent.
    pub fn new(options: &ClientOptions) -> Result<Self, BackendError> {
        let endpoint = endpoint_url(&options.endpoint, options.secure)?;

        if options.access_key.is_empty() || options.secret_key.is_empty() {
            return Err(BackendError::InvalidConfig(
                "static credentials need both an access key and a secret key".to_string(),
            ));
        }

        let credentials = Credentials::new(
            options.access_key.clone(),
            options.secret_key.clone(),
            None,
            None,
            CREDENTIALS_PROVIDER,
        );

        let config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .credentials_provider(credentials)
            .region(Region::new(options.region.clone()))
            .endpoint_url(endpoint)
            .force_path_style(true)
            .build();

        Ok(Self {
            client: aws_sdk_s3::Client::from_conf(config),
            region: options.region.clone(),
        })
    }
}

/// Turn `host[:port]` into a base URL, rejecting schemes and paths
fn endpoint_url(endpoint: &str, secure: bool) -> Result<String, BackendError> {
    if endpoint.is_empty() {
        return Err(BackendError::InvalidConfig("endpoint is empty".to_string()));
    }

    if endpoint.contains("://") {
        return Err(BackendError::InvalidConfig(format!(
            "endpoint '{}' must not include a scheme; use the secure flag instead",
            endpoint
        )));
    }

    let scheme = if secure { "https" } else { "http" };
    let raw = format!("{}://{}", scheme, endpoint);
    let url = Url::parse(&raw)
        .map_err(|e| BackendError::InvalidConfig(format!("invalid endpoint '{}': {}", endpoint, e)))?;

    let bare = url.host_str().is_some()
        && url.path() == "/"
        && url.query().is_none()
        && url.fragment().is_none()
        && url.username().is_empty();
    if !bare {
        return Err(BackendError::InvalidConfig(format!(
            "endpoint '{}' must be host[:port]",
            endpoint
        )));
    }

    Ok(raw)
}

/// Map an SDK failure onto the backend error kinds
///
/// Service errors are sorted by error code, falling back to the HTTP status
/// when the backend sent no code (HEAD responses carry no body).
fn classify<E>(err: SdkError<E, HttpResponse>) -> BackendError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) | SdkError::ResponseError(_) => {
            BackendError::Transport(message)
        }
        SdkError::ConstructionFailure(_) => BackendError::InvalidConfig(message),
        SdkError::ServiceError(context) => match context.err().code() {
            Some("NoSuchKey") | Some("NoSuchBucket") | Some("NotFound") => {
                BackendError::NotFound(message)
            }
            Some("AccessDenied") | Some("InvalidAccessKeyId") | Some("SignatureDoesNotMatch") => {
                BackendError::AccessDenied(message)
            }
            Some("BucketNotEmpty") | Some("BucketAlreadyExists") | Some("BucketAlreadyOwnedByYou") => {
                BackendError::Conflict(message)
            }
            Some(_) => BackendError::Service(message),
            None => match context.raw().status().as_u16() {
                404 => BackendError::NotFound(message),
                401 | 403 => BackendError::AccessDenied(message),
                409 => BackendError::Conflict(message),
                _ => BackendError::Service(message),
            },
        },
        _ => BackendError::Service(message),
    }
}

/// Deleting a missing key succeeds
///
/// Most backends answer 204 for missing keys; some report NoSuchKey.
fn delete_outcome(
    result: Result<DeleteObjectOutput, SdkError<DeleteObjectError, HttpResponse>>,
) -> Result<(), BackendError> {
    match result {
        Ok(_) => Ok(()),
        Err(err) if err.code() == Some("NoSuchKey") => Ok(()),
        Err(err) => Err(classify(err)),
    }
}

/// Wrap an upload body for the SDK without buffering it
fn streaming_body(body: ObjectBody) -> ByteStream {
    let frames = ReaderStream::new(body.into_reader()).map_ok(Frame::data);
    ByteStream::new(SdkBody::from_body_1_x(StreamBody::new(frames)))
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn presign_get(
        &self,
        bucket: &str,
        key: &str,
        expires: Duration,
    ) -> Result<Url, BackendError> {
        let config = PresigningConfig::expires_in(expires)
            .map_err(|e| BackendError::InvalidConfig(format!("invalid presign expiry: {}", e)))?;

        let request = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(config)
            .await
            .map_err(classify)?;

        Url::parse(request.uri())
            .map_err(|e| BackendError::Service(format!("presigned URL is not valid: {}", e)))
    }

    async fn get_object(&self, bucket: &str, key: &str) -> Result<ObjectReader, BackendError> {
        let output = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;

        Ok(Box::pin(output.body.into_async_read()))
    }

    async fn put_object(
        &self,
        bucket: &str,
        key: &str,
        body: ObjectBody,
        content_type: &str,
    ) -> Result<UploadInfo, BackendError> {
        let size = body.len();
        let output = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .content_type(content_type)
            .content_length(size as i64)
            .body(streaming_body(body))
            .send()
            .await
            .map_err(classify)?;

        Ok(UploadInfo {
            bucket: bucket.to_string(),
            key: key.to_string(),
            size,
            etag: sanitize_etag(output.e_tag()),
            version_id: output.version_id().map(str::to_string),
        })
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> Result<(), BackendError> {
        let result = self
            .client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await;

        delete_outcome(result)
    }

    async fn list_objects(
        &self,
        bucket: &str,
        prefix: &str,
        continuation_token: Option<String>,
    ) -> Result<ListPage, BackendError> {
        let output = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation_token)
            .send()
            .await
            .map_err(classify)?;

        let objects = output
            .contents()
            .iter()
            .map(|object| ObjectInfo {
                key: object.key().unwrap_or_default().to_string(),
                size: object.size().unwrap_or_default().max(0) as u64,
                etag: sanitize_etag(object.e_tag()),
                last_modified: object
                    .last_modified()
                    .and_then(|t| t.fmt(DateTimeFormat::DateTime).ok()),
            })
            .collect();

        let next_continuation_token = if output.is_truncated().unwrap_or(false) {
            output.next_continuation_token().map(str::to_string)
        } else {
            None
        };

        Ok(ListPage {
            objects,
            next_continuation_token,
        })
    }

    async fn make_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if !IMPLICIT_REGIONS.contains(&self.region.as_str()) {
            let location = CreateBucketConfiguration::builder()
                .location_constraint(BucketLocationConstraint::from(self.region.as_str()))
                .build();
            request = request.create_bucket_configuration(location);
        }

        request.send().await.map_err(classify)?;
        Ok(())
    }

    async fn remove_bucket(&self, bucket: &str) -> Result<(), BackendError> {
        self.client
            .delete_bucket()
            .bucket(bucket)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
