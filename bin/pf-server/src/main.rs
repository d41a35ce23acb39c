//! PushFan Notification Dispatch Server
//!
//! Accepts notification dispatch jobs over HTTP, pushes them to FCM in
//! batches with retries, and serves job progress while jobs run.
//!
//! ## Configuration
//!
//! All settings come from environment variables (a local `.env` file is
//! loaded when present):
//!
//! - `API_PORT`: HTTP listen port (default 8080)
//! - `PUSHFAN_GATEWAY_URL`: push gateway endpoint (default FCM legacy send API)
//! - `PUSHFAN_GATEWAY_TIMEOUT_SECS`: per-request gateway timeout (default 20)
//! - `PUSHFAN_GATEWAY_CONNECT_TIMEOUT_SECS`: gateway connect timeout (default 10)
//! - `PUSHFAN_BATCH_SIZE`: tokens per gateway request (default 150)
//! - `PUSHFAN_RETRY_MAX_ATTEMPTS`: attempts per batch (default 4)
//! - `PUSHFAN_RETRY_BASE_DELAY_MS`: first backoff delay (default 2000)
//! - `PUSHFAN_JOB_RETENTION_SECS`: how long finished jobs stay queryable (default 3600)
//! - `PUSHFAN_JOB_SWEEP_INTERVAL_SECS`: retention sweep cadence (default 60)
//! - `PUSHFAN_MAX_TRACKED_JOBS`: progress store capacity (default 10000)

use std::num::NonZeroUsize;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use pf_dispatch::{
    api::create_router, spawn_retention_sweeper, JobExecutor, JobExecutorConfig, JobSubmitter,
    ProgressStore, ProgressStoreConfig, RetryConfig, RetryPolicy,
};
use pf_gateway::{FcmClient, FcmClientConfig, DEFAULT_FCM_ENDPOINT};
use tokio::sync::broadcast;
use tokio::{net::TcpListener, signal};
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (for local development)
    let _ = dotenvy::dotenv();

    pf_common::logging::init_logging("pf-server");

    info!("Starting PushFan Dispatch Server");

    // 1. Load configuration from environment
    let gateway_config = load_gateway_config();
    let executor_config = load_executor_config()?;
    let retry_config = load_retry_config();
    let store_config = load_store_config();

    info!(
        gateway = %gateway_config.endpoint,
        batch_size = executor_config.batch_size.get(),
        max_attempts = retry_config.max_attempts,
        base_delay_ms = retry_config.base_delay.as_millis() as u64,
        retention_secs = store_config.retention.as_secs(),
        "Configuration loaded"
    );

    // 2. Wire the dispatch engine
    let store = Arc::new(ProgressStore::new(store_config));
    let client = Arc::new(FcmClient::with_config(gateway_config));
    let executor = Arc::new(JobExecutor::new(
        store.clone(),
        client,
        RetryPolicy::new(retry_config),
        executor_config,
    ));
    let submitter = Arc::new(JobSubmitter::new(store.clone(), executor));

    // 3. Start the retention sweeper
    let (shutdown_tx, _) = broadcast::channel(1);
    let sweeper_handle = spawn_retention_sweeper(store.clone(), shutdown_tx.subscribe());

    // 4. Setup HTTP API server
    let api_port: u16 = std::env::var("API_PORT")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(8080);

    let app = create_router(submitter, store.clone())
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let addr = format!("0.0.0.0:{}", api_port);
    info!(port = api_port, "Starting HTTP API server");

    let listener = TcpListener::bind(&addr).await?;
    let server_task = tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    info!("PushFan Dispatch Server started. Press Ctrl+C to shutdown.");

    // Wait for shutdown signal
    shutdown_signal().await;
    info!("Shutdown signal received...");

    // Graceful shutdown
    let _ = shutdown_tx.send(());
    server_task.abort();

    match tokio::time::timeout(Duration::from_secs(5), sweeper_handle).await {
        Ok(_) => info!("Retention sweeper stopped gracefully"),
        Err(_) => warn!("Retention sweeper did not stop within 5s timeout"),
    }

    info!("PushFan Dispatch Server shutdown complete");
    Ok(())
}

/// Load gateway client configuration from environment variables
fn load_gateway_config() -> FcmClientConfig {
    let endpoint = std::env::var("PUSHFAN_GATEWAY_URL")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_FCM_ENDPOINT.to_string());

    let timeout_secs = std::env::var("PUSHFAN_GATEWAY_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(20);

    let connect_timeout_secs = std::env::var("PUSHFAN_GATEWAY_CONNECT_TIMEOUT_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10);

    FcmClientConfig {
        endpoint,
        timeout: Duration::from_secs(timeout_secs),
        connect_timeout: Duration::from_secs(connect_timeout_secs),
    }
}

/// Load executor configuration from environment variables
///
/// A present but unusable batch size is a hard startup error rather than a
/// silent fallback, since a misconfigured batch size changes gateway load.
fn load_executor_config() -> Result<JobExecutorConfig> {
    let mut config = JobExecutorConfig::default();

    if let Ok(raw) = std::env::var("PUSHFAN_BATCH_SIZE") {
        let parsed = raw
            .parse::<usize>()
            .ok()
            .and_then(NonZeroUsize::new)
            .ok_or_else(|| anyhow::anyhow!("PUSHFAN_BATCH_SIZE must be a positive integer"))?;
        config.batch_size = parsed;
    }

    Ok(config)
}

/// Load retry configuration from environment variables
fn load_retry_config() -> RetryConfig {
    let max_attempts = std::env::var("PUSHFAN_RETRY_MAX_ATTEMPTS")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(4)
        .max(1);

    let base_delay_ms = std::env::var("PUSHFAN_RETRY_BASE_DELAY_MS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(2000);

    RetryConfig {
        max_attempts,
        base_delay: Duration::from_millis(base_delay_ms),
    }
}

/// Load progress store configuration from environment variables
fn load_store_config() -> ProgressStoreConfig {
    let retention_secs = std::env::var("PUSHFAN_JOB_RETENTION_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(3600);

    let sweep_interval_secs = std::env::var("PUSHFAN_JOB_SWEEP_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(60);

    let max_jobs = std::env::var("PUSHFAN_MAX_TRACKED_JOBS")
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(10_000);

    ProgressStoreConfig {
        retention: Duration::from_secs(retention_secs),
        max_jobs,
        sweep_interval: Duration::from_secs(sweep_interval_secs),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
