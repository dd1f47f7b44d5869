use crate::backend::PresignedUrl;
use crate::config::ApiConfig;
use crate::error::{ErrorKind, StorageError};
use crate::lifecycle::DraftService;
use anyhow::{Context, Result};
use axum::{
    extract::{rejection::JsonRejection, State},
    http::{HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{error, info, instrument, warn};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub drafts: Arc<DraftService>,
}

/// Request naming a single object
#[derive(Debug, Deserialize)]
pub struct ObjectRequest {
    pub object_name: String,
}

/// Outcome block carried by every draft response
#[derive(Debug, Serialize)]
pub struct OperationResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_type: Option<ErrorKind>,
}

impl OperationResult {
    fn ok() -> Self {
        Self {
            success: true,
            error_message: None,
            error_type: None,
        }
    }
}

/// Response for operations without a payload
#[derive(Debug, Serialize)]
pub struct ResultResponse {
    pub result: OperationResult,
}

/// Presigned URL response
#[derive(Debug, Serialize)]
pub struct PresignedUrlResponse {
    pub result: OperationResult,
    /// The presigned URL
    pub url: String,
    /// URL expiration time
    pub expires_at: DateTime<Utc>,
}

impl From<PresignedUrl> for PresignedUrlResponse {
    fn from(presigned: PresignedUrl) -> Self {
        Self {
            result: OperationResult::ok(),
            url: presigned.url,
            expires_at: presigned.expires_at,
        }
    }
}

/// Error response
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    kind: ErrorKind,
    message: String,
}

impl ApiError {
    fn invalid_object_name() -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorKind::InvalidObjectName,
            message: "object_name must not be empty".to_string(),
        }
    }
}

/// HTTP status for a wire error code
pub fn status_for(kind: ErrorKind) -> StatusCode {
    match kind {
        ErrorKind::BucketNotFound | ErrorKind::ObjectNotFound => StatusCode::NOT_FOUND,
        ErrorKind::AccessDenied => StatusCode::FORBIDDEN,
        ErrorKind::InvalidObjectName => StatusCode::BAD_REQUEST,
        ErrorKind::BucketAlreadyExists => StatusCode::CONFLICT,
        ErrorKind::StorageQuotaExceeded => StatusCode::INSUFFICIENT_STORAGE,
        ErrorKind::NetworkError => StatusCode::BAD_GATEWAY,
        ErrorKind::CopyFailed
        | ErrorKind::DeleteFailed
        | ErrorKind::PresignFailed
        | ErrorKind::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let kind = err.kind();
        Self {
            status: status_for(kind),
            kind,
            message: err.to_string(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            kind: ErrorKind::InternalError,
            message: rejection.body_text(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ResultResponse {
            result: OperationResult {
                success: false,
                error_message: Some(self.message),
                error_type: Some(self.kind),
            },
        };

        (self.status, Json(body)).into_response()
    }
}

/// Create the API router
pub fn create_router(state: AppState, config: &ApiConfig) -> Router {
    let cors = if config.cors_enabled {
        if config.cors_origins.is_empty() {
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> = config
                .cors_origins
                .iter()
                .filter_map(|o| o.parse().ok())
                .collect();
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any)
        }
    } else {
        CorsLayer::new()
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/api/v1/draft/bucket", post(ensure_buckets))
        .route("/api/v1/draft/upload-url", post(upload_url))
        .route("/api/v1/draft/download-url", post(download_url))
        .route("/api/v1/draft/confirm", post(confirm))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

/// Health check endpoint
async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "healthy" }))
}

fn object_name(payload: Result<Json<ObjectRequest>, JsonRejection>) -> Result<String, ApiError> {
    let Json(request) = payload.map_err(|rejection| {
        warn!(error = %rejection.body_text(), "Rejected request body");
        ApiError::from(rejection)
    })?;

    if request.object_name.is_empty() {
        return Err(ApiError::invalid_object_name());
    }

    Ok(request.object_name)
}

fn log_failure(operation: &'static str, err: StorageError) -> ApiError {
    error!(operation, error = %err, "Draft operation failed");
    ApiError::from(err)
}

/// Create both buckets if missing
#[instrument(skip(state))]
async fn ensure_buckets(State(state): State<AppState>) -> Result<Json<ResultResponse>, ApiError> {
    state
        .drafts
        .ensure_buckets()
        .await
        .map_err(|e| log_failure("ensure_buckets", e))?;

    Ok(Json(ResultResponse {
        result: OperationResult::ok(),
    }))
}

/// Presigned PUT URL into the draft bucket
#[instrument(skip_all)]
async fn upload_url(
    State(state): State<AppState>,
    payload: Result<Json<ObjectRequest>, JsonRejection>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    let key = object_name(payload)?;

    let presigned = state
        .drafts
        .issue_upload_url(&key)
        .await
        .map_err(|e| log_failure("upload_url", e))?;

    Ok(Json(presigned.into()))
}

/// Presigned GET URL from the main bucket
#[instrument(skip_all)]
async fn download_url(
    State(state): State<AppState>,
    payload: Result<Json<ObjectRequest>, JsonRejection>,
) -> Result<Json<PresignedUrlResponse>, ApiError> {
    let key = object_name(payload)?;

    let presigned = state
        .drafts
        .issue_download_url(&key)
        .await
        .map_err(|e| log_failure("download_url", e))?;

    Ok(Json(presigned.into()))
}

/// Promote a staged object into the main bucket
#[instrument(skip_all)]
async fn confirm(
    State(state): State<AppState>,
    payload: Result<Json<ObjectRequest>, JsonRejection>,
) -> Result<Json<ResultResponse>, ApiError> {
    let key = object_name(payload)?;

    state
        .drafts
        .confirm(&key)
        .await
        .map_err(|e| log_failure("confirm", e))?;

    Ok(Json(ResultResponse {
        result: OperationResult::ok(),
    }))
}

/// Serve the API until `shutdown` is cancelled
pub async fn start_api_server(
    state: AppState,
    config: &ApiConfig,
    shutdown: CancellationToken,
) -> Result<()> {
    let router = create_router(state, config);
    let addr = format!("{}:{}", config.host, config.port);

    info!(address = %addr, "Starting draft API server");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, router)
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .context("API server error")?;

    info!("Draft API server stopped");

    Ok(())
}
