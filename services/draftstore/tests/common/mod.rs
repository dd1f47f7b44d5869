#![allow(dead_code)]

use chrono::{DateTime, TimeZone, Utc};
use draftstore::backend::MemoryBackend;
use draftstore::{DraftOptions, DraftService, ManualClock};
use std::sync::Arc;
use std::time::Duration;

pub struct Harness {
    pub clock: Arc<ManualClock>,
    pub store: Arc<MemoryBackend>,
    pub drafts: DraftService,
}

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap()
}

pub fn harness(bucket: &str) -> Harness {
    let clock = Arc::new(ManualClock::new(t0()));
    let store = Arc::new(MemoryBackend::new(clock.clone()));
    let drafts = DraftService::new(
        store.clone(),
        DraftOptions {
            bucket: bucket.to_string(),
            upload_ttl: Duration::from_secs(900),
            download_ttl: Duration::from_secs(300),
        },
    );

    Harness {
        clock,
        store,
        drafts,
    }
}
