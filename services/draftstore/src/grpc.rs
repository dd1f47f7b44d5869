use crate::backend::PresignedUrl;
use crate::config::ApiConfig;
use crate::error::{ErrorKind, StorageError};
use crate::lifecycle::DraftService;
use anyhow::{Context, Result};
use proto::draft_service_server::{DraftService as DraftRpc, DraftServiceServer};
use proto::{
    ConfirmUploadRequest, ConfirmUploadResponse, CreateDraftBucketRequest,
    CreateDraftBucketResponse, ErrorType, GetDownloadUrlRequest, GetDownloadUrlResponse,
    GetUploadUrlRequest, GetUploadUrlResponse, OperationResult,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tonic::{Request, Response, Status};
use tracing::{error, info, instrument};

pub mod proto {
    tonic::include_proto!("draftstore.v1");
}

impl From<ErrorKind> for ErrorType {
    fn from(kind: ErrorKind) -> Self {
        match kind {
            ErrorKind::BucketNotFound => ErrorType::BucketNotFound,
            ErrorKind::ObjectNotFound => ErrorType::ObjectNotFound,
            ErrorKind::AccessDenied => ErrorType::AccessDenied,
            ErrorKind::NetworkError => ErrorType::NetworkError,
            ErrorKind::StorageQuotaExceeded => ErrorType::StorageQuotaExceeded,
            ErrorKind::InvalidObjectName => ErrorType::InvalidObjectName,
            ErrorKind::BucketAlreadyExists => ErrorType::BucketAlreadyExists,
            ErrorKind::CopyFailed => ErrorType::CopyFailed,
            ErrorKind::DeleteFailed => ErrorType::DeleteFailed,
            ErrorKind::PresignFailed => ErrorType::PresignedUrlFailed,
            ErrorKind::InternalError => ErrorType::InternalError,
        }
    }
}

impl OperationResult {
    fn ok() -> Self {
        Self {
            success: true,
            ..Default::default()
        }
    }

    fn failed(kind: ErrorKind, message: String) -> Self {
        Self {
            success: false,
            error_message: message,
            error_type: ErrorType::from(kind) as i32,
        }
    }
}

impl From<StorageError> for OperationResult {
    fn from(err: StorageError) -> Self {
        Self::failed(err.kind(), err.to_string())
    }
}

/// Outcome and presigned URL fields shared by the two URL responses
fn url_fields(result: Result<PresignedUrl, StorageError>) -> (OperationResult, String, i64) {
    match result {
        Ok(presigned) => (
            OperationResult::ok(),
            presigned.url,
            presigned.expires_at.timestamp(),
        ),
        Err(err) => (err.into(), String::new(), 0),
    }
}

fn require_name(object_name: &str) -> Result<(), StorageError> {
    if object_name.is_empty() {
        return Err(StorageError::InvalidObjectName(
            "object_name must not be empty".to_string(),
        ));
    }
    Ok(())
}

fn log_outcome<T>(operation: &'static str, result: &Result<T, StorageError>) {
    match result {
        Ok(_) => info!(operation, "Draft operation completed"),
        Err(e) => error!(operation, error = %e, "Draft operation failed"),
    }
}

/// gRPC front for [`DraftService`]
///
/// Storage failures travel in-band as an [`OperationResult`] with
/// `success = false`. A non-OK status means the transport itself failed.
#[derive(Clone)]
pub struct DraftGrpc {
    drafts: Arc<DraftService>,
}

impl DraftGrpc {
    pub fn new(drafts: Arc<DraftService>) -> Self {
        Self { drafts }
    }
}

#[tonic::async_trait]
impl DraftRpc for DraftGrpc {
    #[instrument(skip_all)]
    async fn create_draft_bucket(
        &self,
        _request: Request<CreateDraftBucketRequest>,
    ) -> Result<Response<CreateDraftBucketResponse>, Status> {
        let result = self.drafts.ensure_buckets().await;
        log_outcome("create_draft_bucket", &result);

        Ok(Response::new(CreateDraftBucketResponse {
            result: Some(result.map_or_else(Into::into, |_| OperationResult::ok())),
        }))
    }

    #[instrument(skip_all, fields(object_name = %request.get_ref().object_name))]
    async fn get_upload_url(
        &self,
        request: Request<GetUploadUrlRequest>,
    ) -> Result<Response<GetUploadUrlResponse>, Status> {
        let key = request.into_inner().object_name;

        let result = match require_name(&key) {
            Ok(()) => self.drafts.issue_upload_url(&key).await,
            Err(e) => Err(e),
        };
        log_outcome("get_upload_url", &result);

        let (result, url, expires_at) = url_fields(result);
        Ok(Response::new(GetUploadUrlResponse {
            result: Some(result),
            url,
            expires_at,
        }))
    }

    #[instrument(skip_all, fields(object_name = %request.get_ref().object_name))]
    async fn get_download_url(
        &self,
        request: Request<GetDownloadUrlRequest>,
    ) -> Result<Response<GetDownloadUrlResponse>, Status> {
        let key = request.into_inner().object_name;

        let result = match require_name(&key) {
            Ok(()) => self.drafts.issue_download_url(&key).await,
            Err(e) => Err(e),
        };
        log_outcome("get_download_url", &result);

        let (result, url, expires_at) = url_fields(result);
        Ok(Response::new(GetDownloadUrlResponse {
            result: Some(result),
            url,
            expires_at,
        }))
    }

    #[instrument(skip_all, fields(object_name = %request.get_ref().object_name))]
    async fn confirm_upload(
        &self,
        request: Request<ConfirmUploadRequest>,
    ) -> Result<Response<ConfirmUploadResponse>, Status> {
        let key = request.into_inner().object_name;

        let result = match require_name(&key) {
            Ok(()) => self.drafts.confirm(&key).await,
            Err(e) => Err(e),
        };
        log_outcome("confirm_upload", &result);

        Ok(Response::new(ConfirmUploadResponse {
            result: Some(result.map_or_else(Into::into, |_| OperationResult::ok())),
        }))
    }
}

/// Serve the gRPC API until `shutdown` is cancelled
pub async fn start_grpc_server(
    drafts: Arc<DraftService>,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let addr: SocketAddr = format!("{}:{}", config.host, config.grpc_port)
        .parse()
        .context("Invalid gRPC listen address")?;

    info!(address = %addr, "Starting draft gRPC server");

    tonic::transport::Server::builder()
        .add_service(DraftServiceServer::new(DraftGrpc::new(drafts)))
        .serve_with_shutdown(addr, async move { shutdown.cancelled().await })
        .await
        .context("gRPC server error")?;

    info!("Draft gRPC server stopped");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::MemoryBackend;
    use crate::clock::ManualClock;
    use crate::lifecycle::DraftOptions;
    use chrono::{TimeZone, Utc};
    use std::time::Duration;

    fn grpc() -> (DraftGrpc, Arc<MemoryBackend>) {
        let clock = Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 30, 0).unwrap(),
        ));
        let store = Arc::new(MemoryBackend::new(clock));
        let drafts = DraftService::new(
            store.clone(),
            DraftOptions {
                bucket: "main".to_string(),
                upload_ttl: Duration::from_secs(3600),
                download_ttl: Duration::from_secs(3600),
            },
        );
        (DraftGrpc::new(Arc::new(drafts)), store)
    }

    fn confirm_request(name: &str) -> Request<ConfirmUploadRequest> {
        Request::new(ConfirmUploadRequest {
            object_name: name.to_string(),
        })
    }

    #[test]
    fn test_error_type_mapping() {
        assert_eq!(ErrorType::from(ErrorKind::ObjectNotFound), ErrorType::ObjectNotFound);
        assert_eq!(
            ErrorType::from(ErrorKind::PresignFailed),
            ErrorType::PresignedUrlFailed
        );
        assert_eq!(
            ErrorType::from(ErrorKind::StorageQuotaExceeded),
            ErrorType::StorageQuotaExceeded
        );
        assert_eq!(ErrorType::from(ErrorKind::InternalError), ErrorType::InternalError);
    }

    #[test]
    fn test_failure_result_carries_kind() {
        let result = OperationResult::from(StorageError::AccessDenied("403".to_string()));

        assert!(!result.success);
        assert_eq!(result.error_type(), ErrorType::AccessDenied);
        assert!(result.error_message.contains("403"));
    }

    #[tokio::test]
    async fn test_full_draft_flow() {
        let (service, store) = grpc();

        let response = service
            .create_draft_bucket(Request::new(CreateDraftBucketRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.result, Some(OperationResult::ok()));

        let upload = service
            .get_upload_url(Request::new(GetUploadUrlRequest {
                object_name: "img/cat.png".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(upload.result.unwrap().success);
        assert!(upload.url.starts_with("memory://main-draft/img/cat.png?method=PUT"));
        assert!(upload.expires_at > 0);

        store.put_object("main-draft", "img/cat.png", b"meow".to_vec()).unwrap();

        let confirmed = service
            .confirm_upload(confirm_request("img/cat.png"))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(confirmed.result, Some(OperationResult::ok()));
        assert_eq!(store.keys("main"), vec!["img/cat.png".to_string()]);

        let download = service
            .get_download_url(Request::new(GetDownloadUrlRequest {
                object_name: "img/cat.png".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(download.url.starts_with("memory://main/img/cat.png?method=GET"));
    }

    #[tokio::test]
    async fn test_confirm_unknown_object_is_reported_in_band() {
        let (service, _) = grpc();
        service
            .create_draft_bucket(Request::new(CreateDraftBucketRequest {}))
            .await
            .unwrap();

        let result = service
            .confirm_upload(confirm_request("report.pdf"))
            .await
            .unwrap()
            .into_inner()
            .result
            .unwrap();

        assert!(!result.success);
        assert_eq!(result.error_type(), ErrorType::ObjectNotFound);
        assert!(result.error_message.contains("report.pdf"));
    }

    #[tokio::test]
    async fn test_empty_object_name_rejected() {
        let (service, _) = grpc();

        let upload = service
            .get_upload_url(Request::new(GetUploadUrlRequest {
                object_name: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();

        let result = upload.result.unwrap();
        assert!(!result.success);
        assert_eq!(result.error_type(), ErrorType::InvalidObjectName);
        assert!(upload.url.is_empty());
    }

    #[tokio::test]
    async fn test_missing_buckets_reported() {
        let (service, _) = grpc();

        let result = service
            .confirm_upload(confirm_request("k"))
            .await
            .unwrap()
            .into_inner()
            .result
            .unwrap();

        assert_eq!(result.error_type(), ErrorType::BucketNotFound);
    }
}
