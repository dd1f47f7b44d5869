//! Draft lifecycle: bucket provisioning, presigned URLs and promotion
//!
//! An object's state is never stored; it is read off which bucket holds the
//! key:
//!
//! ```text
//!            upload URL (client PUT)          confirm
//!  Absent ─────────────────────────▶ Staged ───────────▶ Committed
//!                                   (draft)    copy,     (main)
//!                                      │       delete
//!                                      │ sweep (age > lifetime)
//!                                      ▼
//!                                   Absent
//! ```
//!
//! Between the copy and the delete of a confirm the key sits in both
//! buckets. If the delete fails it stays that way until confirm is retried
//! or the sweeper ages the draft copy out.

use crate::backend::{ObjectStore, PresignedUrl};
use crate::error::{StorageError, StorageResult};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// Suffix appended to the main bucket name to form the draft bucket
pub const DRAFT_BUCKET_SUFFIX: &str = "-draft";

/// Name of the staging bucket paired with `main_bucket`
pub fn draft_bucket_name(main_bucket: &str) -> String {
    format!("{main_bucket}{DRAFT_BUCKET_SUFFIX}")
}

/// Construction options for [`DraftService`]
#[derive(Debug, Clone)]
pub struct DraftOptions {
    /// Main bucket name
    pub bucket: String,
    /// Lifetime of issued upload URLs
    pub upload_ttl: Duration,
    /// Lifetime of issued download URLs
    pub download_ttl: Duration,
}

/// Orchestrates the staged-object lifecycle over an [`ObjectStore`]
pub struct DraftService {
    store: Arc<dyn ObjectStore>,
    main_bucket: String,
    draft_bucket: String,
    upload_ttl: Duration,
    download_ttl: Duration,
}

impl DraftService {
    pub fn new(store: Arc<dyn ObjectStore>, options: DraftOptions) -> Self {
        let draft_bucket = draft_bucket_name(&options.bucket);

        info!(
            backend = store.name(),
            main_bucket = %options.bucket,
            draft_bucket = %draft_bucket,
            upload_ttl_secs = options.upload_ttl.as_secs(),
            download_ttl_secs = options.download_ttl.as_secs(),
            "Draft service initialized"
        );

        Self {
            store,
            main_bucket: options.bucket,
            draft_bucket,
            upload_ttl: options.upload_ttl,
            download_ttl: options.download_ttl,
        }
    }

    pub fn main_bucket(&self) -> &str {
        &self.main_bucket
    }

    pub fn draft_bucket(&self) -> &str {
        &self.draft_bucket
    }

    /// Create the draft bucket, then the main bucket, if missing.
    ///
    /// Fails on the first unrecoverable error without undoing a bucket that
    /// was already created.
    #[instrument(skip(self), fields(main_bucket = %self.main_bucket, draft_bucket = %self.draft_bucket))]
    pub async fn ensure_buckets(&self) -> StorageResult<()> {
        self.ensure_bucket(&self.draft_bucket, "draft").await?;
        self.ensure_bucket(&self.main_bucket, "main").await?;

        info!("Buckets ready");
        Ok(())
    }

    async fn ensure_bucket(&self, bucket: &str, role: &'static str) -> StorageResult<()> {
        if self.store.bucket_exists(bucket).await? {
            info!(bucket = %bucket, role, "Bucket already exists");
            return Ok(());
        }

        match self.store.create_bucket(bucket).await {
            Ok(()) => {
                info!(
                    bucket = %bucket,
                    role,
                    before = "absent",
                    after = "created",
                    "Bucket created"
                );
                Ok(())
            }
            // Another caller created it between our check and create
            Err(StorageError::BucketAlreadyExists {
                owned_by_caller: true,
                ..
            }) => {
                info!(bucket = %bucket, role, "Bucket created concurrently");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    /// Presigned PUT into the draft bucket
    #[instrument(skip(self))]
    pub async fn issue_upload_url(&self, key: &str) -> StorageResult<PresignedUrl> {
        let url = self
            .store
            .issue_upload_url(&self.draft_bucket, key, self.upload_ttl)
            .await?;

        metrics::counter!("draftstore_upload_urls_issued_total").increment(1);
        info!(expires_at = %url.expires_at, "Upload URL issued");

        Ok(url)
    }

    /// Presigned GET from the main bucket
    #[instrument(skip(self))]
    pub async fn issue_download_url(&self, key: &str) -> StorageResult<PresignedUrl> {
        let url = self
            .store
            .issue_download_url(&self.main_bucket, key, self.download_ttl)
            .await?;

        metrics::counter!("draftstore_download_urls_issued_total").increment(1);
        info!(expires_at = %url.expires_at, "Download URL issued");

        Ok(url)
    }

    /// Promote `key` from the draft bucket into the main bucket.
    ///
    /// Copy, then delete the draft. Not atomic: a failed delete leaves the
    /// object committed with a stale draft duplicate, and the error is
    /// returned so the caller can retry. Confirming a key that is already
    /// committed (and no longer staged) succeeds without changes.
    ///
    /// The already-committed check only looks at presence in the main
    /// bucket. If a committed key is uploaded again and that draft is swept
    /// before it is confirmed, the confirm still succeeds and the main
    /// bucket keeps the earlier content. Callers that re-upload under an
    /// existing key must confirm within the object lifetime or use a fresh
    /// key.
    #[instrument(skip(self))]
    pub async fn confirm(&self, key: &str) -> StorageResult<()> {
        if let Err(err) = self
            .store
            .copy_object(&self.draft_bucket, key, &self.main_bucket, key)
            .await
        {
            if matches!(err, StorageError::ObjectNotFound { .. }) {
                match self.store.object_exists(&self.main_bucket, key).await {
                    Ok(true) => {
                        metrics::counter!("draftstore_confirms_total", "outcome" => "already_committed")
                            .increment(1);
                        info!("Object already committed");
                        return Ok(());
                    }
                    Ok(false) => {}
                    // The copy error is the one the caller can act on
                    Err(check_err) => {
                        warn!(error = %check_err, "Could not check main bucket after failed copy");
                    }
                }
            }

            metrics::counter!("draftstore_confirms_total", "outcome" => "copy_failed").increment(1);
            return Err(err);
        }

        if let Err(err) = self.store.delete_object(&self.draft_bucket, key).await {
            metrics::counter!("draftstore_confirms_total", "outcome" => "draft_left_behind")
                .increment(1);
            warn!(
                error = %err,
                "Object committed but draft copy could not be removed"
            );
            return Err(err);
        }

        metrics::counter!("draftstore_confirms_total", "outcome" => "promoted").increment(1);
        info!(
            before = %self.draft_bucket,
            after = %self.main_bucket,
            "Object promoted"
        );

        Ok(())
    }
}
