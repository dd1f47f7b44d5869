mod common;

use async_trait::async_trait;
use common::harness;
use draftstore::backend::{ObjectStore, PresignedUrl, SweepSummary};
use draftstore::{RetentionSweeper, StorageResult, SweepError};
use std::sync::Arc;
use std::time::Duration;

const HOUR: Duration = Duration::from_secs(3600);
const DAY: Duration = Duration::from_secs(24 * 3600);

#[tokio::test]
async fn test_sweep_boundary() {
    let h = harness("b");
    h.drafts.ensure_buckets().await.unwrap();
    h.store.put_object("b-draft", "staged", b"x".to_vec()).unwrap();

    let lifetime = 7 * DAY;
    let sweeper = RetentionSweeper::new(h.store.clone(), "b-draft", lifetime);

    // One second short of the lifetime
    h.clock.advance(lifetime - Duration::from_secs(1));
    let summary = sweeper.cleanup_draft_bucket().await.unwrap();
    assert_eq!(summary, SweepSummary { scanned: 1, deleted: 0, skipped: 0 });

    // Exactly at the lifetime: not strictly older yet
    h.clock.advance(Duration::from_secs(1));
    sweeper.cleanup_draft_bucket().await.unwrap();
    assert_eq!(h.store.keys("b-draft"), vec!["staged".to_string()]);

    h.clock.advance(Duration::from_secs(1));
    let summary = sweeper.cleanup_draft_bucket().await.unwrap();
    assert_eq!(summary, SweepSummary { scanned: 1, deleted: 1, skipped: 0 });
    assert!(h.store.keys("b-draft").is_empty());
}

#[tokio::test]
async fn test_sweep_deletes_only_expired() {
    let h = harness("b");
    h.drafts.ensure_buckets().await.unwrap();

    h.store.put_object("b-draft", "b", b"old".to_vec()).unwrap();
    h.clock.advance(30 * DAY - 2 * HOUR);
    h.store.put_object("b-draft", "a", b"new".to_vec()).unwrap();
    h.clock.advance(2 * HOUR);

    let sweeper = RetentionSweeper::new(h.store.clone(), "b-draft", 7 * DAY);
    let summary = sweeper.cleanup_draft_bucket().await.unwrap();

    assert_eq!(summary.deleted, 1);
    assert_eq!(h.store.keys("b-draft"), vec!["a".to_string()]);
}

#[tokio::test]
async fn test_sweep_leaves_main_bucket_alone() {
    let h = harness("main");
    h.drafts.ensure_buckets().await.unwrap();
    h.store.put_object("main-draft", "k", b"v".to_vec()).unwrap();
    h.drafts.confirm("k").await.unwrap();

    h.clock.advance(365 * DAY);
    let sweeper = RetentionSweeper::new(h.store.clone(), h.drafts.draft_bucket(), DAY);
    let summary = sweeper.cleanup_draft_bucket().await.unwrap();

    assert_eq!(summary, SweepSummary::default());
    assert_eq!(h.store.keys("main"), vec!["k".to_string()]);
}

#[tokio::test]
async fn test_sweep_is_repeatable() {
    let h = harness("main");
    h.drafts.ensure_buckets().await.unwrap();
    for key in ["x", "y", "z"] {
        h.store.put_object("main-draft", key, b"v".to_vec()).unwrap();
    }
    h.clock.advance(2 * DAY);

    let sweeper = RetentionSweeper::new(h.store.clone(), "main-draft", DAY);
    assert_eq!(sweeper.cleanup_draft_bucket().await.unwrap().deleted, 3);
    assert_eq!(sweeper.cleanup_draft_bucket().await.unwrap(), SweepSummary::default());
}

#[tokio::test]
async fn test_sweep_missing_bucket_fails() {
    let h = harness("main");
    let sweeper = RetentionSweeper::new(h.store.clone(), "main-draft", DAY);

    assert!(matches!(
        sweeper.run_with_timeout(Duration::from_secs(5)).await,
        Err(SweepError::Storage(_))
    ));
}

/// Store whose sweep never finishes in time
struct StalledStore;

#[async_trait]
impl ObjectStore for StalledStore {
    fn name(&self) -> &'static str {
        "stalled"
    }

    async fn create_bucket(&self, _bucket: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn bucket_exists(&self, _bucket: &str) -> StorageResult<bool> {
        Ok(true)
    }

    async fn issue_upload_url(
        &self,
        _bucket: &str,
        _key: &str,
        _ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        unreachable!("not used by the sweeper")
    }

    async fn issue_download_url(
        &self,
        _bucket: &str,
        _key: &str,
        _ttl: Duration,
    ) -> StorageResult<PresignedUrl> {
        unreachable!("not used by the sweeper")
    }

    async fn copy_object(
        &self,
        _src_bucket: &str,
        _src_key: &str,
        _dst_bucket: &str,
        _dst_key: &str,
    ) -> StorageResult<()> {
        Ok(())
    }

    async fn delete_object(&self, _bucket: &str, _key: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn object_exists(&self, _bucket: &str, _key: &str) -> StorageResult<bool> {
        Ok(false)
    }

    async fn sweep_expired(
        &self,
        _bucket: &str,
        _max_age: Duration,
    ) -> StorageResult<SweepSummary> {
        tokio::time::sleep(Duration::from_secs(30)).await;
        Ok(SweepSummary::default())
    }
}

#[tokio::test]
async fn test_run_with_timeout_gives_up() {
    let sweeper = RetentionSweeper::new(Arc::new(StalledStore), "main-draft", DAY);

    let result = sweeper.run_with_timeout(Duration::from_millis(20)).await;

    assert!(matches!(result, Err(SweepError::TimedOut(d)) if d == Duration::from_millis(20)));
}
