//! One-shot draft bucket cleanup, meant for cron or a scheduled job.
//!
//! Exits non-zero if the sweep fails or runs past `cleanup.timeout_secs`.

use anyhow::{Context, Result};
use draftstore::telemetry::init_tracing;
use draftstore::{connect, draft_bucket_name, Config, RetentionSweeper};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    init_tracing(&config.service.log_level);

    let store = connect(&config.storage)
        .await
        .context("Failed to initialize storage backend")?;

    let sweeper = RetentionSweeper::new(
        store,
        draft_bucket_name(&config.storage.bucket),
        config.object_lifetime(),
    );

    info!(
        bucket = %sweeper.draft_bucket(),
        lifetime_secs = config.draft.object_lifetime_secs,
        timeout_secs = config.cleanup.timeout_secs,
        "Running draft cleanup"
    );

    let summary = sweeper
        .run_with_timeout(config.cleanup_timeout())
        .await
        .map_err(|e| {
            error!(error = %e, "Draft cleanup failed");
            e
        })
        .context("Draft cleanup failed")?;

    info!(
        scanned = summary.scanned,
        deleted = summary.deleted,
        skipped = summary.skipped,
        "Draft cleanup complete"
    );

    Ok(())
}
