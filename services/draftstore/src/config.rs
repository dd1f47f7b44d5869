use serde::Deserialize;
use std::time::Duration;

/// Main configuration for the draft store
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Service configuration
    #[serde(default)]
    pub service: ServiceConfig,
    /// Storage backend configuration
    #[serde(default)]
    pub storage: StorageConfig,
    /// Draft lifecycle configuration
    #[serde(default)]
    pub draft: DraftConfig,
    /// API configuration
    #[serde(default)]
    pub api: ApiConfig,
    /// Cleanup job configuration
    #[serde(default)]
    pub cleanup: CleanupConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    /// Service name for logging/metrics
    #[serde(default = "default_service_name")]
    pub name: String,
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Metrics port (0 disables the exporter)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,
}

/// Which object-storage backend to talk to
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    #[default]
    S3,
    Minio,
    /// In-process store; data is lost on exit
    Memory,
}

/// Storage backend configuration
#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Backend selection
    #[serde(default)]
    pub backend: BackendKind,
    /// Main bucket name; the draft bucket is derived from it
    #[serde(default = "default_bucket")]
    pub bucket: String,
    /// AWS S3 settings
    #[serde(default)]
    pub s3: S3Config,
    /// MinIO settings
    #[serde(default)]
    pub minio: MinioConfig,
}

/// AWS S3 configuration
#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint URL (LocalStack, etc.)
    pub endpoint_url: Option<String>,
    /// Force path-style access
    #[serde(default)]
    pub force_path_style: bool,
}

/// MinIO configuration
#[derive(Debug, Clone, Deserialize)]
pub struct MinioConfig {
    /// host:port of the MinIO server
    #[serde(default = "default_minio_endpoint")]
    pub endpoint: String,
    /// Access key ID
    #[serde(default = "default_minio_credential")]
    pub access_key: String,
    /// Secret access key
    #[serde(default = "default_minio_credential")]
    pub secret_key: String,
    /// Use HTTPS
    #[serde(default)]
    pub use_ssl: bool,
    /// Region reported to MinIO
    #[serde(default = "default_region")]
    pub region: String,
}

/// Draft lifecycle configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    /// Upload URL lifetime in seconds
    #[serde(default = "default_url_ttl_secs")]
    pub upload_ttl_secs: u64,
    /// Download URL lifetime in seconds
    #[serde(default = "default_url_ttl_secs")]
    pub download_ttl_secs: u64,
    /// How long an unconfirmed draft survives, in seconds
    #[serde(default = "default_object_lifetime_secs")]
    pub object_lifetime_secs: u64,
}

/// API configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// API listen address
    #[serde(default = "default_api_host")]
    pub host: String,
    /// API listen port
    #[serde(default = "default_api_port")]
    pub port: u16,
    /// gRPC listen port on the same host (0 disables the gRPC server)
    #[serde(default = "default_grpc_port")]
    pub grpc_port: u16,
    /// Enable CORS
    #[serde(default = "default_true")]
    pub cors_enabled: bool,
    /// Allowed CORS origins (empty = any)
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

/// Cleanup job configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CleanupConfig {
    /// Upper bound on one cleanup run, in seconds
    #[serde(default = "default_cleanup_timeout_secs")]
    pub timeout_secs: u64,
}

// Default value functions
fn default_service_name() -> String {
    "draftstore".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_metrics_port() -> u16 {
    9090
}

fn default_bucket() -> String {
    "main".to_string()
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_minio_endpoint() -> String {
    "localhost:9000".to_string()
}

fn default_minio_credential() -> String {
    "minioadmin".to_string()
}

fn default_url_ttl_secs() -> u64 {
    3600
}

fn default_object_lifetime_secs() -> u64 {
    86400 // 1 day
}

fn default_api_host() -> String {
    "0.0.0.0".to_string()
}

fn default_api_port() -> u16 {
    8080
}

fn default_grpc_port() -> u16 {
    50051
}

fn default_true() -> bool {
    true
}

fn default_cleanup_timeout_secs() -> u64 {
    600 // 10 minutes
}

impl Config {
    /// Load configuration from config files and environment
    pub fn load() -> anyhow::Result<Self> {
        let config = config::Config::builder()
            .add_source(config::File::with_name("config/draftstore").required(false))
            .add_source(config::File::with_name("/etc/draftstore/draftstore").required(false))
            // Override with environment variables
            // DRAFTSTORE__STORAGE__BACKEND -> storage.backend
            .add_source(
                config::Environment::with_prefix("DRAFTSTORE")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        config.try_deserialize().map_err(Into::into)
    }

    /// Upload URL lifetime as Duration
    pub fn upload_ttl(&self) -> Duration {
        Duration::from_secs(self.draft.upload_ttl_secs)
    }

    /// Download URL lifetime as Duration
    pub fn download_ttl(&self) -> Duration {
        Duration::from_secs(self.draft.download_ttl_secs)
    }

    /// Draft object lifetime as Duration
    pub fn object_lifetime(&self) -> Duration {
        Duration::from_secs(self.draft.object_lifetime_secs)
    }

    /// Cleanup run bound as Duration
    pub fn cleanup_timeout(&self) -> Duration {
        Duration::from_secs(self.cleanup.timeout_secs)
    }
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: default_service_name(),
            log_level: default_log_level(),
            metrics_port: default_metrics_port(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::default(),
            bucket: default_bucket(),
            s3: S3Config::default(),
            minio: MinioConfig::default(),
        }
    }
}

impl Default for S3Config {
    fn default() -> Self {
        Self {
            region: default_region(),
            endpoint_url: None,
            force_path_style: false,
        }
    }
}

impl Default for MinioConfig {
    fn default() -> Self {
        Self {
            endpoint: default_minio_endpoint(),
            access_key: default_minio_credential(),
            secret_key: default_minio_credential(),
            use_ssl: false,
            region: default_region(),
        }
    }
}

impl Default for DraftConfig {
    fn default() -> Self {
        Self {
            upload_ttl_secs: default_url_ttl_secs(),
            download_ttl_secs: default_url_ttl_secs(),
            object_lifetime_secs: default_object_lifetime_secs(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            host: default_api_host(),
            port: default_api_port(),
            grpc_port: default_grpc_port(),
            cors_enabled: default_true(),
            cors_origins: Vec::new(),
        }
    }
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_cleanup_timeout_secs(),
        }
    }
}
