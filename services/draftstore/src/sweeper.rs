use crate::backend::{ObjectStore, SweepSummary};
use crate::error::StorageError;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

/// Failure of a bounded cleanup run
#[derive(Error, Debug)]
pub enum SweepError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The run was abandoned; objects already deleted stay deleted.
    #[error("Cleanup did not finish within {0:?}")]
    TimedOut(Duration),
}

/// Removes draft objects that were never confirmed
///
/// Scheduling is left to the caller (cron, a k8s CronJob, a loop in the
/// server); each call does one pass over the draft bucket.
pub struct RetentionSweeper {
    store: Arc<dyn ObjectStore>,
    draft_bucket: String,
    object_lifetime: Duration,
}

impl RetentionSweeper {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        draft_bucket: impl Into<String>,
        object_lifetime: Duration,
    ) -> Self {
        Self {
            store,
            draft_bucket: draft_bucket.into(),
            object_lifetime,
        }
    }

    pub fn draft_bucket(&self) -> &str {
        &self.draft_bucket
    }

    pub fn object_lifetime(&self) -> Duration {
        self.object_lifetime
    }

    /// Delete every draft object older than the configured lifetime
    #[instrument(skip(self), fields(bucket = %self.draft_bucket))]
    pub async fn cleanup_draft_bucket(&self) -> Result<SweepSummary, StorageError> {
        let cutoff = chrono::Duration::from_std(self.object_lifetime)
            .ok()
            .and_then(|lifetime| Utc::now().checked_sub_signed(lifetime));

        info!(
            lifetime_secs = self.object_lifetime.as_secs(),
            cutoff = ?cutoff,
            "Starting draft cleanup"
        );

        match self
            .store
            .sweep_expired(&self.draft_bucket, self.object_lifetime)
            .await
        {
            Ok(summary) => {
                metrics::counter!("draftstore_swept_objects_total").increment(summary.deleted as u64);
                metrics::counter!("draftstore_sweep_runs_total", "outcome" => "success").increment(1);
                if summary.skipped > 0 {
                    warn!(skipped = summary.skipped, "Some draft objects could not be aged");
                }
                info!(
                    scanned = summary.scanned,
                    deleted = summary.deleted,
                    "Draft cleanup finished"
                );
                Ok(summary)
            }
            Err(e) => {
                metrics::counter!("draftstore_sweep_runs_total", "outcome" => "failure").increment(1);
                error!(error = %e, "Draft cleanup failed");
                Err(e)
            }
        }
    }

    /// [`cleanup_draft_bucket`](Self::cleanup_draft_bucket) bounded by `limit`
    pub async fn run_with_timeout(&self, limit: Duration) -> Result<SweepSummary, SweepError> {
        match tokio::time::timeout(limit, self.cleanup_draft_bucket()).await {
            Ok(result) => result.map_err(SweepError::from),
            Err(_) => {
                metrics::counter!("draftstore_sweep_runs_total", "outcome" => "timeout").increment(1);
                warn!(
                    bucket = %self.draft_bucket,
                    limit_secs = limit.as_secs(),
                    "Draft cleanup timed out"
                );
                Err(SweepError::TimedOut(limit))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MockObjectStore;
    use mockall::predicate::eq;

    #[tokio::test]
    async fn test_sweeps_draft_bucket_with_lifetime() {
        let mut store = MockObjectStore::new();
        store
            .expect_sweep_expired()
            .with(eq("main-draft"), eq(Duration::from_secs(3600)))
            .times(1)
            .returning(|_, _| {
                Ok(SweepSummary {
                    scanned: 5,
                    deleted: 2,
                    skipped: 0,
                })
            });

        let sweeper = RetentionSweeper::new(Arc::new(store), "main-draft", Duration::from_secs(3600));
        let summary = sweeper.cleanup_draft_bucket().await.unwrap();

        assert_eq!(summary.scanned, 5);
        assert_eq!(summary.deleted, 2);
    }

    #[tokio::test]
    async fn test_propagates_storage_error() {
        let mut store = MockObjectStore::new();
        store
            .expect_sweep_expired()
            .returning(|bucket, _| Err(StorageError::bucket_not_found(bucket)));

        let sweeper = RetentionSweeper::new(Arc::new(store), "main-draft", Duration::from_secs(60));

        assert!(matches!(
            sweeper.run_with_timeout(Duration::from_secs(5)).await,
            Err(SweepError::Storage(StorageError::BucketNotFound { .. }))
        ));
    }
}
