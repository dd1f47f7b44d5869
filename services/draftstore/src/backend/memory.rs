use super::{is_expired, presign_expiry, ObjectStore, PresignedUrl, SweepSummary};
use crate::clock::Clock;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    last_modified: DateTime<Utc>,
}

type Bucket = BTreeMap<String, StoredObject>;

/// In-process object store
///
/// Single-tenant: every bucket belongs to the caller. Timestamps come from
/// the injected [`Clock`], which lets tests age objects without sleeping.
pub struct MemoryBackend {
    buckets: RwLock<HashMap<String, Bucket>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBackend {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            buckets: RwLock::new(HashMap::new()),
            clock,
        }
    }

    /// Store an object as a client holding an upload URL would
    pub fn put_object(&self, bucket: &str, key: &str, data: impl Into<Vec<u8>>) -> StorageResult<()> {
        let now = self.clock.now();
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;

        objects.insert(
            key.to_string(),
            StoredObject {
                data: data.into(),
                last_modified: now,
            },
        );

        Ok(())
    }

    /// Contents of `bucket/key`, if present
    pub fn object_bytes(&self, bucket: &str, key: &str) -> Option<Vec<u8>> {
        self.buckets
            .read()
            .get(bucket)
            .and_then(|objects| objects.get(key))
            .map(|object| object.data.clone())
    }

    /// Keys held in `bucket`, sorted; empty if the bucket is missing
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        self.buckets
            .read()
            .get(bucket)
            .map(|objects| objects.keys().cloned().collect())
            .unwrap_or_default()
    }

    fn presign(&self, method: &str, bucket: &str, key: &str, ttl: Duration) -> StorageResult<PresignedUrl> {
        let expires_at = presign_expiry(ttl, self.clock.now())?;

        Ok(PresignedUrl {
            url: format!(
                "memory://{bucket}/{key}?method={method}&expires={}",
                expires_at.timestamp()
            ),
            expires_at,
        })
    }
}

#[async_trait]
impl ObjectStore for MemoryBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn create_bucket(&self, bucket: &str) -> StorageResult<()> {
        if bucket.is_empty() {
            return Err(StorageError::InvalidObjectName(
                "bucket name must not be empty".to_string(),
            ));
        }

        let mut buckets = self.buckets.write();
        if buckets.contains_key(bucket) {
            return Err(StorageError::BucketAlreadyExists {
                bucket: bucket.to_string(),
                owned_by_caller: true,
            });
        }

        buckets.insert(bucket.to_string(), Bucket::new());
        Ok(())
    }

    async fn bucket_exists(&self, bucket: &str) -> StorageResult<bool> {
        Ok(self.buckets.read().contains_key(bucket))
    }

    async fn issue_upload_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        self.presign("PUT", bucket, key, ttl)
    }

    async fn issue_download_url(
        &self,
        bucket: &str,
        key: &str,
        ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        self.presign("GET", bucket, key, ttl)
    }

    async fn copy_object(
        &self,
        src_bucket: &str,
        src_key: &str,
        dst_bucket: &str,
        dst_key: &str,
    ) -> StorageResult<()> {
        let now = self.clock.now();
        let mut buckets = self.buckets.write();

        let data = buckets
            .get(src_bucket)
            .ok_or_else(|| StorageError::bucket_not_found(src_bucket))?
            .get(src_key)
            .ok_or_else(|| StorageError::object_not_found(src_bucket, src_key))?
            .data
            .clone();

        buckets
            .get_mut(dst_bucket)
            .ok_or_else(|| StorageError::bucket_not_found(dst_bucket))?
            .insert(
                dst_key.to_string(),
                StoredObject {
                    data,
                    last_modified: now,
                },
            );

        Ok(())
    }

    async fn delete_object(&self, bucket: &str, key: &str) -> StorageResult<()> {
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;

        if objects.remove(key).is_none() {
            debug!(bucket = %bucket, key = %key, "Delete of absent object treated as success");
        }

        Ok(())
    }

    async fn object_exists(&self, bucket: &str, key: &str) -> StorageResult<bool> {
        Ok(self
            .buckets
            .read()
            .get(bucket)
            .map(|objects| objects.contains_key(key))
            .unwrap_or(false))
    }

    async fn sweep_expired(
        &self,
        bucket: &str,
        max_age: Duration,
    ) -> StorageResult<SweepSummary> {
        let now = self.clock.now();
        let mut buckets = self.buckets.write();
        let objects = buckets
            .get_mut(bucket)
            .ok_or_else(|| StorageError::bucket_not_found(bucket))?;

        let scanned = objects.len();
        objects.retain(|_, object| !is_expired(object.last_modified, now, max_age));

        Ok(SweepSummary {
            scanned,
            deleted: scanned - objects.len(),
            skipped: 0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use chrono::TimeZone;
    use tokio_test::{assert_err, assert_ok};

    fn backend() -> (MemoryBackend, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
        ));
        (MemoryBackend::new(clock.clone()), clock)
    }

    #[tokio::test]
    async fn test_create_bucket_twice() {
        let (store, _) = backend();

        store.create_bucket("main").await.unwrap();
        assert!(store.bucket_exists("main").await.unwrap());
        assert!(!store.bucket_exists("other").await.unwrap());

        assert!(matches!(
            store.create_bucket("main").await,
            Err(StorageError::BucketAlreadyExists {
                owned_by_caller: true,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn test_copy_keeps_source() {
        let (store, _) = backend();
        store.create_bucket("a").await.unwrap();
        store.create_bucket("b").await.unwrap();
        store.put_object("a", "k", b"payload".to_vec()).unwrap();

        store.copy_object("a", "k", "b", "k").await.unwrap();

        assert_eq!(store.object_bytes("a", "k").as_deref(), Some(&b"payload"[..]));
        assert_eq!(store.object_bytes("b", "k").as_deref(), Some(&b"payload"[..]));
    }

    #[tokio::test]
    async fn test_copy_missing_source() {
        let (store, _) = backend();
        store.create_bucket("a").await.unwrap();
        store.create_bucket("b").await.unwrap();

        assert!(matches!(
            store.copy_object("a", "nope", "b", "nope").await,
            Err(StorageError::ObjectNotFound { .. })
        ));
        assert!(matches!(
            store.copy_object("missing", "k", "b", "k").await,
            Err(StorageError::BucketNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_delete_is_idempotent() {
        let (store, _) = backend();
        store.create_bucket("a").await.unwrap();
        store.put_object("a", "k", b"x".to_vec()).unwrap();

        assert_ok!(store.delete_object("a", "k").await);
        assert_ok!(store.delete_object("a", "k").await);
        assert!(!store.object_exists("a", "k").await.unwrap());
        assert_err!(store.delete_object("missing", "k").await);
    }

    #[tokio::test]
    async fn test_presign_does_not_touch_objects() {
        let (store, clock) = backend();

        let url = store
            .issue_upload_url("a", "k", Duration::from_secs(60))
            .await
            .unwrap();

        assert!(url.url.starts_with("memory://a/k?method=PUT"));
        assert_eq!(url.expires_at, clock.now() + chrono::Duration::seconds(60));
        assert!(store.keys("a").is_empty());
    }

    #[tokio::test]
    async fn test_sweep_missing_bucket() {
        let (store, _) = backend();

        assert!(matches!(
            store.sweep_expired("missing", Duration::from_secs(1)).await,
            Err(StorageError::BucketNotFound { .. })
        ));
    }
}
