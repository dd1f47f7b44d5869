use anyhow::{Context, Result};
use draftstore::telemetry::{init_metrics, init_tracing};
use draftstore::{
    connect, start_api_server, start_grpc_server, AppState, Config, DraftOptions, DraftService,
};
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration
    let config = Config::load().context("Failed to load configuration")?;

    // Initialize logging
    init_tracing(&config.service.log_level);

    info!(
        service = %config.service.name,
        backend = ?config.storage.backend,
        "Starting draftstore"
    );

    // Initialize metrics
    init_metrics(config.service.metrics_port)?;

    let store = connect(&config.storage)
        .await
        .context("Failed to initialize storage backend")?;

    let drafts = Arc::new(DraftService::new(
        store,
        DraftOptions {
            bucket: config.storage.bucket.clone(),
            upload_ttl: config.upload_ttl(),
            download_ttl: config.download_ttl(),
        },
    ));

    // Buckets can also be created later through the API
    if let Err(e) = drafts.ensure_buckets().await {
        warn!(error = %e, "Failed to ensure buckets at startup");
    }

    let shutdown = CancellationToken::new();

    // Spawn API server task
    let api_state = AppState {
        drafts: drafts.clone(),
    };
    let api_config = config.api.clone();
    let api_shutdown = shutdown.clone();
    let api_handle = tokio::spawn(async move {
        if let Err(e) = start_api_server(api_state, &api_config, api_shutdown).await {
            error!(error = %e, "API server error");
        }
    });

    // Spawn gRPC server task
    let grpc_handle = if config.api.grpc_port != 0 {
        let grpc_drafts = drafts.clone();
        let grpc_config = config.api.clone();
        let grpc_shutdown = shutdown.clone();
        Some(tokio::spawn(async move {
            if let Err(e) = start_grpc_server(grpc_drafts, &grpc_config, grpc_shutdown).await {
                error!(error = %e, "gRPC server error");
            }
        }))
    } else {
        info!("gRPC server disabled");
        None
    };

    info!("Draftstore started successfully");

    // Wait for shutdown signal
    shutdown_signal().await;

    info!("Shutting down draftstore");

    shutdown.cancel();
    if let Err(e) = api_handle.await {
        error!(error = %e, "API server task failed");
    }
    if let Some(handle) = grpc_handle {
        if let Err(e) = handle.await {
            error!(error = %e, "gRPC server task failed");
        }
    }

    info!("Draftstore stopped");

    Ok(())
}

/// Wait for shutdown signal (SIGINT or SIGTERM)
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received SIGTERM signal");
        }
    }
}
