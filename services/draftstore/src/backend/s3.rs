use super::sweep::{deleted_count, sweep_listing, BatchDeleter, BatchFailure, ListedObject};
use super::{presign_expiry, ObjectStore, PresignedUrl, SweepSummary};
use crate::config::S3Config;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use aws_config::BehaviorVersion;
use aws_sdk_s3::config::http::HttpResponse;
use aws_sdk_s3::config::Builder as S3ConfigBuilder;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::presigning::PresigningConfig;
use aws_sdk_s3::types::{
    BucketLocationConstraint, CreateBucketConfiguration, Delete, Object, ObjectIdentifier,
};
use aws_sdk_s3::Client as S3Client;
use aws_types::region::Region;
use chrono::{DateTime, Utc};
use futures::stream::{self, StreamExt};
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Characters left unescaped in the `x-amz-copy-source` header.
/// Slashes stay literal so nested keys keep their path shape.
const COPY_SOURCE_ENCODE_SET: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~')
    .remove(b'/');

/// AWS S3 adapter
///
/// Also serves any endpoint that speaks the S3 API closely enough to accept
/// the SDK's requests (LocalStack, Ceph RGW); [`MinioBackend`](super::MinioBackend)
/// reuses it for MinIO.
pub struct S3Backend {
    client: S3Client,
    location_constraint: Option<BucketLocationConstraint>,
}

impl S3Backend {
    /// Create an adapter using the default AWS credential chain
    pub async fn new(config: &S3Config) -> Self {
        let aws_config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .load()
            .await;

        let mut s3_config_builder = S3ConfigBuilder::from(&aws_config);

        // Custom endpoint for LocalStack and other S3 look-alikes
        if let Some(ref endpoint_url) = config.endpoint_url {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint_url);
        }

        if config.force_path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let client = S3Client::from_conf(s3_config_builder.build());

        info!(
            region = %config.region,
            endpoint = config.endpoint_url.as_deref().unwrap_or("aws"),
            "S3 backend initialized"
        );

        Self::from_client(client, location_constraint_for(&config.region))
    }

    /// Wrap an already configured client
    pub fn from_client(
        client: S3Client,
        location_constraint: Option<BucketLocationConstraint>,
    ) -> Self {
        Self {
            client,
            location_constraint,
        }
    }

    fn presigning_config(ttl: Duration) -> StorageResult<PresigningConfig> {
        PresigningConfig::expires_in(ttl)
            .map_err(|e| StorageError::PresignFailed(format!("Invalid presigning config: {e}")))
    }
}

#[async_trait]
impl BatchDeleter for S3Backend {
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> StorageResult<usize> {
        let objects = keys
            .iter()
            .map(|key| ObjectIdentifier::builder().key(key).build())
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let delete = Delete::builder()
            .set_objects(Some(objects))
            .quiet(true)
            .build()
            .map_err(|e| StorageError::Backend(e.to_string()))?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .map_err(|e| classify(e, bucket, None, StorageError::DeleteFailed))?;

        let failures: Vec<BatchFailure<'_>> = output
            .errors()
            .iter()
            .map(|e| BatchFailure {
                key: e.key().unwrap_or_default(),
                code: e.code().unwrap_or_default(),
                message: e.message().unwrap_or_default(),
            })
            .collect();

        let deleted = deleted_count(bucket, keys.len(), &failures)?;
        debug!(bucket = %bucket, count = deleted, "Deleted object batch");

        Ok(deleted)
    }
}

#[async_trait]
impl ObjectStore for S3Backend {
    fn name(&self) -> &'static str {
        "s3"
    }

    #[instrument(skip(self))]
    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        let mut request = self.client.create_bucket().bucket(bucket);

        if let Some(ref constraint) = self.location_constraint {
            request = request.create_bucket_configuration(
                CreateBucketConfiguration::builder()
                    .location_constraint(constraint.clone())
                    .build(),
            );
        }

        request
            .send()
            .await
            .map_err(|e| classify(e, bucket, None, StorageError::Backend))?;

        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        match self.client.head_bucket().bucket(bucket).send().await {
            Ok(_) => Ok(true),
            Err(e) => match classify(e, bucket, None, StorageError::Backend) {
                StorageError::BucketNotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    async fn issue_upload_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        let expires_at = presign_expiry(ttl, Utc::now())?;

        let presigned = self
            .client
            .put_object()
            .bucket(bucket)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|e| classify(e, bucket, Some(key), StorageError::PresignFailed))?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            expires_at,
        })
    }

    async fn issue_download_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        let expires_at = presign_expiry(ttl, Utc::now())?;

        let presigned = self
            .client
            .get_object()
            .bucket(bucket)
            .key(key)
            .presigned(Self::presigning_config(ttl)?)
            .await
            .map_err(|e| classify(e, bucket, Some(key), StorageError::PresignFailed))?;

        Ok(PresignedUrl {
            url: presigned.uri().to_string(),
            expires_at,
        })
    }

    #[instrument(skip(self))]
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        let copy_source = format!(
            "{}/{}",
            src_bucket,
            utf8_percent_encode(src_key, COPY_SOURCE_ENCODE_SET)
        );

        let result = self
            .client
            .copy_object()
            .copy_source(copy_source)
            .bucket(dst_bucket)
            .key(dst_key)
            .send()
            .await;

        match result {
            Ok(_) => Ok(()),
            Err(e) => match classify(e, src_bucket, Some(src_key), StorageError::CopyFailed) {
                // NoSuchBucket does not say which side is missing
                err @ StorageError::BucketNotFound { .. } => {
                    let src_exists = self.bucket_exists(src_bucket).await.ok();
                    Err(missing_copy_bucket(src_exists, dst_bucket, err))
                }
                other => Err(other),
            },
        }
    }

    #[instrument(skip(self))]
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        match self.client.delete_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(()),
            Err(e) => match classify(e, bucket, Some(key), StorageError::DeleteFailed) {
                StorageError::ObjectNotFound { .. } => {
                    debug!(bucket = %bucket, key = %key, "Delete of absent object treated as success");
                    Ok(())
                }
                other => Err(other),
            },
        }
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        match self.client.head_object().bucket(bucket).key(key).send().await {
            Ok(_) => Ok(true),
            Err(e) => match classify(e, bucket, Some(key), StorageError::Backend) {
                StorageError::ObjectNotFound { .. } => Ok(false),
                other => Err(other),
            },
        }
    }

    #[instrument(skip(self))]
    async fn sweep_expired(
        &self,
        bucket: &str,
        max_age: Duration,
    ) -> StorageResult<SweepSummary> {
        let paginator = self
            .client
            .list_objects_v2()
            .bucket(bucket)
            .into_paginator()
            .send();

        let pages = stream::unfold(paginator, |mut paginator| async move {
            paginator.next().await.map(|page| (page, paginator))
        })
        .map(|page| {
            page.map(|output| output.contents().iter().map(listed).collect::<Vec<_>>())
                .map_err(|e| classify(e, bucket, None, StorageError::Backend))
        });

        sweep_listing(bucket, pages, self, Utc::now(), max_age).await
    }
}

/// Pick the location constraint for bucket creation.
/// `us-east-1` is the default location and must not be sent explicitly.
pub(crate) fn location_constraint_for(region: &str) -> Option<BucketLocationConstraint> {
    if region.is_empty() || region == "us-east-1" {
        None
    } else {
        Some(BucketLocationConstraint::from(region))
    }
}

/// Attribute a copy's `NoSuchBucket` to the destination once the source is
/// known to exist. An unknown source keeps the classified error.
fn missing_copy_bucket(
    src_exists: Option<bool>,
    dst_bucket: &str,
    err: StorageError,
) -> StorageError {
    match src_exists {
        Some(true) => StorageError::bucket_not_found(dst_bucket),
        _ => err,
    }
}

fn listed(object: &Object) -> ListedObject {
    ListedObject {
        key: object.key().map(str::to_string),
        last_modified: object
            .last_modified()
            .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos())),
    }
}

/// Map an SDK failure onto the storage taxonomy.
///
/// `fallback` builds the error for anything the taxonomy has no better
/// name for, so callers can say "copy failed" rather than "internal".
pub(crate) fn classify<E>(
    err: SdkError<E, HttpResponse>,
    bucket: &str,
    key: Option<&str>,
    fallback: fn(String) -> StorageError,
) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
{
    let message = DisplayErrorContext(&err).to_string();

    if matches!(
        err,
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_)
    ) {
        return StorageError::Network(message);
    }

    let code = err.as_service_error().and_then(|e| e.code());
    let status = err.raw_response().map(|r| r.status().as_u16());

    classify_code(code, status, bucket, key, message, fallback)
}

fn classify_code(
    code: Option<&str>,
    status: Option<u16>,
    bucket: &str,
    key: Option<&str>,
    message: String,
    fallback: fn(String) -> StorageError,
) -> StorageError {
    match (code, status) {
        (Some("NoSuchBucket"), _) => StorageError::bucket_not_found(bucket),
        (Some("NoSuchKey" | "NotFound"), _) | (None, Some(404)) => match key {
            Some(key) => StorageError::object_not_found(bucket, key),
            None => StorageError::bucket_not_found(bucket),
        },
        (Some("BucketAlreadyOwnedByYou"), _) => StorageError::BucketAlreadyExists {
            bucket: bucket.to_string(),
            owned_by_caller: true,
        },
        (Some("BucketAlreadyExists"), _) => StorageError::BucketAlreadyExists {
            bucket: bucket.to_string(),
            owned_by_caller: false,
        },
        (
            Some(
                "AccessDenied" | "AllAccessDisabled" | "InvalidAccessKeyId"
                | "SignatureDoesNotMatch" | "ExpiredToken",
            ),
            _,
        )
        | (_, Some(403)) => StorageError::AccessDenied(message),
        (Some("InvalidBucketName" | "KeyTooLongError" | "XMinioInvalidObjectName"), _) => {
            StorageError::InvalidObjectName(message)
        }
        (
            Some("QuotaExceeded" | "XMinioAdminBucketQuotaExceeded" | "XMinioStorageFull"),
            _,
        )
        | (_, Some(507)) => StorageError::QuotaExceeded(message),
        (Some("RequestTimeout" | "SlowDown" | "ServiceUnavailable"), _) => {
            StorageError::Network(message)
        }
        _ => fallback(message),
    }
}
