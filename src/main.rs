//! Offline Cache - an offline asset cache worker
//!
//! Hosts the worker in front of an origin and serves it cache-first.

use std::net::SocketAddr;
use std::path::PathBuf;

use anyhow::Context;
use tokio::signal;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use offline_cache::api::{create_router, AppState};
use offline_cache::cache::{snapshot, CacheStorage};
use offline_cache::config::Config;
use offline_cache::tasks::spawn_eviction_task;

/// Main entry point for the offline cache host.
///
/// # Startup Sequence
/// 1. Initialize tracing subscriber for logging
/// 2. Load configuration from environment variables
/// 3. Restore cache storage and the saved worker from the data directory
/// 4. Register the worker (install + activate, or unchanged)
/// 5. Start the periodic eviction task, if enabled
/// 6. Start HTTP server on configured port
/// 7. Handle graceful shutdown on SIGINT/SIGTERM, then save the snapshot
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Defaults to "info" level, can be overridden with RUST_LOG env var
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "offline_cache=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting offline cache host");

    let config = Config::from_env();
    info!(
        "Configuration loaded: origin={}, version={}, port={}, eviction_interval={}s",
        config.worker.origin,
        config.worker.version_tag(),
        config.server_port,
        config.eviction_interval
    );

    let snapshot_path = config
        .data_dir
        .as_ref()
        .map(|dir| dir.join(snapshot::SNAPSHOT_FILE));
    let restored = match &snapshot_path {
        Some(path) => snapshot::load(path, config.quota_bytes)
            .await
            .with_context(|| format!("failed to load snapshot {}", path.display()))?,
        None => snapshot::Restored {
            storage: CacheStorage::with_quota(config.quota_bytes),
            active: None,
        },
    };

    let state = AppState::from_config(&config, restored.storage);
    let registration = state.registration.clone();

    // Serve the saved version right away; the network may be down
    if let Some(active) = restored.active {
        if let Err(err) = registration.restore(active).await {
            warn!("Could not resume saved worker: {}", err);
        }
    }

    // A failed install keeps the restored worker, or plain proxying
    match registration.register(config.worker.clone()).await {
        Ok(outcome) => info!("Worker registered: {:?}", outcome),
        Err(err) => warn!("Worker registration failed: {}", err),
    }

    let eviction_handle = (config.eviction_interval > 0)
        .then(|| spawn_eviction_task(registration.clone(), config.eviction_interval));

    let app = create_router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.server_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Server listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(eviction_handle))
        .await
        .context("server error")?;

    if let Some(path) = snapshot_path {
        save_snapshot(&registration, path).await;
    }

    info!("Server shutdown complete");
    Ok(())
}

async fn save_snapshot(registration: &offline_cache::Registration, path: PathBuf) {
    let active = registration.active().await.map(|worker| worker.config().clone());
    let storage = registration.storage().read().await;
    if let Err(err) = snapshot::save(&storage, active.as_ref(), &path).await {
        warn!("Failed to save snapshot to {}: {}", path.display(), err);
    }
}

/// Waits for shutdown signal (Ctrl+C or SIGTERM).
///
/// On shutdown signal, aborts the eviction task and allows graceful shutdown.
async fn shutdown_signal(eviction_handle: Option<JoinHandle<()>>) {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", err);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                warn!("Failed to install SIGTERM handler: {}", err);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, initiating shutdown...");
        }
        _ = terminate => {
            info!("Received SIGTERM, initiating shutdown...");
        }
    }

    if let Some(handle) = eviction_handle {
        handle.abort();
        warn!("Eviction task aborted");
    }
}
