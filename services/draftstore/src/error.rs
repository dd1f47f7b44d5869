//! Error taxonomy shared by the storage adapters, the draft service and the
//! HTTP layer.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Errors surfaced by an [`ObjectStore`](crate::backend::ObjectStore) and
/// propagated unchanged through the draft service.
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Bucket not found: {bucket}")]
    BucketNotFound { bucket: String },

    #[error("Object not found: {bucket}/{key}")]
    ObjectNotFound { bucket: String, key: String },

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Storage quota exceeded: {0}")]
    QuotaExceeded(String),

    #[error("Invalid object name: {0}")]
    InvalidObjectName(String),

    /// `owned_by_caller` is false when the name is taken by another account.
    #[error("Bucket already exists: {bucket}")]
    BucketAlreadyExists {
        bucket: String,
        owned_by_caller: bool,
    },

    #[error("Copy failed: {0}")]
    CopyFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Presigned URL generation failed: {0}")]
    PresignFailed(String),

    #[error("Storage backend error: {0}")]
    Backend(String),
}

/// Wire-level error codes exposed by the transport layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    BucketNotFound,
    ObjectNotFound,
    AccessDenied,
    NetworkError,
    StorageQuotaExceeded,
    InvalidObjectName,
    BucketAlreadyExists,
    CopyFailed,
    DeleteFailed,
    #[serde(rename = "PRESIGNED_URL_FAILED")]
    PresignFailed,
    InternalError,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::BucketNotFound => "BUCKET_NOT_FOUND",
            ErrorKind::ObjectNotFound => "OBJECT_NOT_FOUND",
            ErrorKind::AccessDenied => "ACCESS_DENIED",
            ErrorKind::NetworkError => "NETWORK_ERROR",
            ErrorKind::StorageQuotaExceeded => "STORAGE_QUOTA_EXCEEDED",
            ErrorKind::InvalidObjectName => "INVALID_OBJECT_NAME",
            ErrorKind::BucketAlreadyExists => "BUCKET_ALREADY_EXISTS",
            ErrorKind::CopyFailed => "COPY_FAILED",
            ErrorKind::DeleteFailed => "DELETE_FAILED",
            ErrorKind::PresignFailed => "PRESIGNED_URL_FAILED",
            ErrorKind::InternalError => "INTERNAL_ERROR",
        }
    }
}

impl StorageError {
    /// Classify this error into the wire taxonomy
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageError::BucketNotFound { .. } => ErrorKind::BucketNotFound,
            StorageError::ObjectNotFound { .. } => ErrorKind::ObjectNotFound,
            StorageError::AccessDenied(_) => ErrorKind::AccessDenied,
            StorageError::Network(_) => ErrorKind::NetworkError,
            StorageError::QuotaExceeded(_) => ErrorKind::StorageQuotaExceeded,
            StorageError::InvalidObjectName(_) => ErrorKind::InvalidObjectName,
            StorageError::BucketAlreadyExists { .. } => ErrorKind::BucketAlreadyExists,
            StorageError::CopyFailed(_) => ErrorKind::CopyFailed,
            StorageError::DeleteFailed(_) => ErrorKind::DeleteFailed,
            StorageError::PresignFailed(_) => ErrorKind::PresignFailed,
            StorageError::Backend(_) => ErrorKind::InternalError,
        }
    }

    /// Absence and "already exists (ours)" are expected conditions that the
    /// draft service may swallow; everything else is fatal.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            StorageError::BucketNotFound { .. }
                | StorageError::ObjectNotFound { .. }
                | StorageError::BucketAlreadyExists {
                    owned_by_caller: true,
                    ..
                }
        )
    }

    pub(crate) fn object_not_found(bucket: &str, key: &str) -> Self {
        StorageError::ObjectNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        }
    }

    pub(crate) fn bucket_not_found(bucket: &str) -> Self {
        StorageError::BucketNotFound {
            bucket: bucket.to_string(),
        }
    }
}
