//! Draftstore
//!
//! Two-bucket staged-object lifecycle over S3-compatible storage. Clients
//! upload into a draft bucket with a presigned URL, the application confirms
//! the objects it wants to keep, and a retention sweeper deletes whatever
//! was never confirmed.
//!
//! ## Features
//!
//! - **Pluggable Backends**: AWS S3, MinIO and an in-process store behind one
//!   [`ObjectStore`] trait
//! - **Presigned URLs**: Time-limited upload (draft bucket) and download
//!   (main bucket) URLs; bytes never pass through this service
//! - **Promotion**: Copy-then-delete confirm, safe to retry
//! - **Retention**: Age-based sweep of the draft bucket with batched deletes
//! - **Transports**: JSON over HTTP and gRPC, both reporting failures in a
//!   `result` block
//!
//! ## Architecture
//!
//! ```text
//!  Client                 HTTP / gRPC              Draft Service
//! ┌──────────────┐       ┌──────────────┐         ┌──────────────┐
//! │ PUT / GET    │       │ /api/v1/     │────────▶│ ensure       │
//! │ presigned    │       │   draft/*    │         │ upload URL   │
//! │              │       │ DraftService │         │              │
//! └──────────────┘       └──────────────┘         │ download URL │
//!        │                                        │ confirm      │
//!        │                                        └──────────────┘
//!        │                                               │
//!        ▼                                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │ ObjectStore  (S3 │ MinIO │ Memory)                          │
//! │   {bucket}-draft ──── confirm (copy, delete) ────▶ {bucket} │
//! └─────────────────────────────────────────────────────────────┘
//!        ▲
//!        │ sweep (age > object lifetime)
//! ┌──────────────┐
//! │ Retention    │
//! │ Sweeper      │
//! └──────────────┘
//! ```

pub mod api;
pub mod backend;
pub mod clock;
pub mod config;
pub mod error;
pub mod grpc;
pub mod lifecycle;
pub mod sweeper;
pub mod telemetry;

pub use api::{create_router, start_api_server, AppState};
pub use backend::{connect, ObjectStore, PresignedUrl, SweepSummary};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::Config;
pub use error::{ErrorKind, StorageError, StorageResult};
pub use grpc::{start_grpc_server, DraftGrpc};
pub use lifecycle::{draft_bucket_name, DraftOptions, DraftService};
pub use sweeper::{RetentionSweeper, SweepError};
