//! Storage backend capability interface and its adapters
//!
//! Every backend implements [`ObjectStore`]; the draft service and the
//! retention sweeper only ever see `Arc<dyn ObjectStore>`.

pub mod memory;
pub mod minio;
pub mod s3;
pub(crate) mod sweep;

use crate::clock::SystemClock;
use crate::config::{BackendKind, StorageConfig};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

pub use memory::MemoryBackend;
pub use minio::MinioBackend;
pub use s3::S3Backend;

/// Maximum number of keys in a single multi-object delete request
pub const DELETE_BATCH_LIMIT: usize = 1000;

/// Longest validity a SigV4 presigned URL may carry (7 days)
pub const MAX_PRESIGN_TTL: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// A backend-signed, time-limited URL for one operation on one object
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PresignedUrl {
    pub url: String,
    pub expires_at: DateTime<Utc>,
}

/// Outcome of one retention sweep over a bucket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SweepSummary {
    /// Objects enumerated
    pub scanned: usize,
    /// Objects removed because they outlived `max_age`
    pub deleted: usize,
    /// Listed objects left alone because they carried no key or no usable
    /// timestamp
    pub skipped: usize,
}

/// Capability set every object-storage backend provides
///
/// All operations are single-shot; cancel one by dropping its future or
/// wrapping it in `tokio::time::timeout`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()>;

    /// Absence is `Ok(false)`, not an error.
    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool>;

    /// Sign a PUT for `bucket/key`. No request is sent for the object itself.
    async fn issue_upload_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl>;

    /// Sign a GET for `bucket/key`.
    async fn issue_download_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl>;

    /// Server-side copy. The source is left in place.
    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()>;

    /// Deleting an absent key succeeds.
    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()>;

    /// Absence is `Ok(false)`, not an error.
    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool>;

    /// Delete every object in `bucket` for which [`is_expired`] holds.
    ///
    /// Stops at the first listing or delete error; deletions already made
    /// are kept and objects not yet listed are left alone.
    async fn sweep_expired(&self, bucket: &str, max_age: Duration)
        -> StorageResult<SweepSummary>;
}

/// Eviction predicate: strictly older than `max_age` as of `now`
pub fn is_expired(last_modified: DateTime<Utc>, now: DateTime<Utc>, max_age: Duration) -> bool {
    match chrono::Duration::from_std(max_age) {
        Ok(max_age) => now.signed_duration_since(last_modified) > max_age,
        // A lifetime too large to represent never elapses
        Err(_) => false,
    }
}

/// Validate a credential lifetime and compute its expiry
pub(crate) fn presign_expiry(ttl: Duration, now: DateTime<Utc>) -> StorageResult<DateTime<Utc>> {
    if ttl.is_zero() || ttl > MAX_PRESIGN_TTL {
        return Err(StorageError::PresignFailed(format!(
            "TTL must be between 1s and {}s, got {}s",
            MAX_PRESIGN_TTL.as_secs(),
            ttl.as_secs()
        )));
    }

    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| now.checked_add_signed(ttl))
        .ok_or_else(|| StorageError::PresignFailed("TTL out of range".to_string()))
}

/// Build the backend selected in configuration
pub async fn connect(config: &StorageConfig) -> StorageResult<Arc<dyn ObjectStore>> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        BackendKind::S3 => Arc::new(S3Backend::new(&config.s3).await),
        BackendKind::Minio => Arc::new(MinioBackend::new(&config.minio)?),
        BackendKind::Memory => Arc::new(MemoryBackend::new(Arc::new(SystemClock))),
    };

    info!(backend = store.name(), bucket = %config.bucket, "Storage backend ready");

    Ok(store)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
    }

    #[test]
    fn test_is_expired_boundary() {
        let lifetime = Duration::from_secs(7 * 24 * 3600);
        let epsilon = chrono::Duration::seconds(1);
        let exactly = t0() + chrono::Duration::days(7);

        assert!(!is_expired(t0(), exactly - epsilon, lifetime));
        // Strictly greater: exactly one lifetime old is not yet expired
        assert!(!is_expired(t0(), exactly, lifetime));
        assert!(is_expired(t0(), exactly + epsilon, lifetime));
    }

    #[test]
    fn test_is_expired_future_timestamp() {
        // Clock skew can put last-modified ahead of now
        let now = t0();
        let modified = now + chrono::Duration::minutes(5);
        assert!(!is_expired(modified, now, Duration::from_secs(0)));
    }

    #[test]
    fn test_presign_expiry_bounds() {
        let now = t0();
        let expiry = presign_expiry(Duration::from_secs(3600), now).unwrap();
        assert_eq!(expiry, now + chrono::Duration::hours(1));

        assert!(matches!(
            presign_expiry(Duration::ZERO, now),
            Err(StorageError::PresignFailed(_))
        ));
        assert!(matches!(
            presign_expiry(MAX_PRESIGN_TTL + Duration::from_secs(1), now),
            Err(StorageError::PresignFailed(_))
        ));
        assert!(presign_expiry(MAX_PRESIGN_TTL, now).is_ok());
    }
}
