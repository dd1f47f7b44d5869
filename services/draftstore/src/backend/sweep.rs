//! Listing walk and batched deletion shared by the SDK-backed adapters

use super::{is_expired, SweepSummary, DELETE_BATCH_LIMIT};
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::{pin_mut, Stream, StreamExt};
use std::time::Duration;
use tracing::{debug, warn};

/// One entry of a bucket listing
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct ListedObject {
    pub key: Option<String>,
    /// `None` when the backend sent no timestamp or one chrono cannot hold
    pub last_modified: Option<DateTime<Utc>>,
}

/// Per-key failure reported inside a multi-object delete response
#[derive(Debug, Clone, Copy)]
pub(crate) struct BatchFailure<'a> {
    pub key: &'a str,
    pub code: &'a str,
    pub message: &'a str,
}

/// Removes up to [`DELETE_BATCH_LIMIT`] keys in one request
#[async_trait]
pub(crate) trait BatchDeleter: Send + Sync {
    /// Returns how many of `keys` were removed.
    async fn delete_batch(&self, bucket: &str, keys: &[String]) -> StorageResult<usize>;
}

/// Count the keys a batch delete removed.
///
/// `NoSuchKey` entries were already gone and count as removed. Any other
/// entry fails the batch.
pub(crate) fn deleted_count(
    bucket: &str,
    requested: usize,
    failures: &[BatchFailure<'_>],
) -> StorageResult<usize> {
    if let Some(failure) = failures.iter().find(|f| f.code != "NoSuchKey") {
        return Err(StorageError::DeleteFailed(format!(
            "{}/{}: {} ({})",
            bucket, failure.key, failure.message, failure.code
        )));
    }

    Ok(requested)
}

/// Walk `pages`, deleting every expired key.
///
/// Expired keys are flushed whenever [`DELETE_BATCH_LIMIT`] is reached and
/// at the end of every page, so a listing error on a later page keeps what
/// earlier pages deleted and leaves unlisted objects untouched.
pub(crate) async fn sweep_listing<S, D>(
    bucket: &str,
    pages: S,
    deleter: &D,
    now: DateTime<Utc>,
    max_age: Duration,
) -> StorageResult<SweepSummary>
where
    S: Stream<Item = StorageResult<Vec<ListedObject>>>,
    D: BatchDeleter + ?Sized,
{
    pin_mut!(pages);

    let mut summary = SweepSummary::default();
    let mut pending: Vec<String> = Vec::with_capacity(DELETE_BATCH_LIMIT);

    while let Some(page) = pages.next().await {
        for object in page? {
            summary.scanned += 1;

            let (Some(key), Some(modified)) = (object.key.as_deref(), object.last_modified) else {
                summary.skipped += 1;
                warn!(
                    bucket = %bucket,
                    key = object.key.as_deref().unwrap_or("<none>"),
                    "Skipping listed object without key or usable timestamp"
                );
                continue;
            };

            if is_expired(modified, now, max_age) {
                pending.push(key.to_string());
            }

            if pending.len() == DELETE_BATCH_LIMIT {
                summary.deleted += deleter.delete_batch(bucket, &pending).await?;
                pending.clear();
            }
        }

        if !pending.is_empty() {
            summary.deleted += deleter.delete_batch(bucket, &pending).await?;
            pending.clear();
        }

        debug!(bucket = %bucket, scanned = summary.scanned, deleted = summary.deleted, "Swept listing page");
    }

    Ok(summary)
}
