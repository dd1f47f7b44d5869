use super::{ObjectStore, PresignedUrl, S3Backend, SweepSummary};
use crate::config::MinioConfig;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::Client as S3Client;
use std::time::Duration;
use tracing::info;

/// MinIO adapter
///
/// MinIO speaks the S3 API, so the object operations run through
/// [`S3Backend`]. What differs is the connection: an explicit endpoint,
/// static credentials, path-style addressing and no bucket location
/// constraint.
pub struct MinioBackend {
    inner: S3Backend,
    endpoint: String,
}

impl MinioBackend {
    pub fn new(config: &MinioConfig) -> StorageResult<Self> {
        let endpoint = endpoint_url(&config.endpoint, config.use_ssl)?;

        if config.access_key.is_empty() || config.secret_key.is_empty() {
            return Err(StorageError::AccessDenied(
                "MinIO access key and secret key must be set".to_string(),
            ));
        }

        let credentials = Credentials::new(
            config.access_key.clone(),
            config.secret_key.clone(),
            None,
            None,
            "draftstore-minio",
        );

        let s3_config = aws_sdk_s3::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()))
            .credentials_provider(credentials)
            .endpoint_url(&endpoint)
            .force_path_style(true)
            .build();

        info!(
            endpoint = %endpoint,
            region = %config.region,
            use_ssl = config.use_ssl,
            "MinIO backend initialized"
        );

        Ok(Self {
            inner: S3Backend::from_client(S3Client::from_conf(s3_config), None),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

#[async_trait]
impl ObjectStore for MinioBackend {
    fn name(&self) -> &'static str {
        "minio"
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        self.inner.create_bucket(bucket).await
    }

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        self.inner.bucket_exists(bucket).await
    }

    async fn issue_upload_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        self.inner.issue_upload_url(bucket, key, ttl).await
    }

    async fn issue_download_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        self.inner.issue_download_url(bucket, key, ttl).await
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        self.inner
            .copy_object(src_bucket, src_key, dst_bucket, dst_key)
            .await
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        self.inner.delete_object(bucket, key).await
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        self.inner.object_exists(bucket, key).await
    }

    async fn sweep_expired(
        &self,
        bucket: &str,
        max_age: Duration,
    ) -> StorageResult<SweepSummary> {
        self.inner.sweep_expired(bucket, max_age).await
    }
}

/// Turn a MinIO `host:port` endpoint into a URL.
/// An endpoint that already carries a scheme is used as given.
fn endpoint_url(endpoint: &str, use_ssl: bool) -> StorageResult<String> {
    let endpoint = endpoint.trim().trim_end_matches('/');

    if endpoint.is_empty() {
        return Err(StorageError::Backend("MinIO endpoint is empty".to_string()));
    }

    if endpoint.starts_with("http://") || endpoint.starts_with("https://") {
        return Ok(endpoint.to_string());
    }

    let scheme = if use_ssl { "https" } else { "http" };
    Ok(format!("{scheme}://{endpoint}"))
}
