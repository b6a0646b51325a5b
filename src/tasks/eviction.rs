//! Periodic Eviction Task
//!
//! Background task that triggers the dynamic cache eviction sweep.
//!
//! Eviction never runs on cache writes; this task is one of the explicit
//! triggers, alongside the `CLEAN_CACHE` message.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::error::WorkerError;
use crate::worker::{ClientMessage, Registration};

/// Spawns a background task that posts `CLEAN_CACHE` every `interval_secs`.
///
/// # Arguments
/// * `registration` - Registration whose active worker receives the message
/// * `interval_secs` - Interval in seconds between sweeps, must be non-zero
///
/// # Returns
/// A JoinHandle for the spawned task, which can be used to abort the task
/// during graceful shutdown.
///
/// # Example
/// ```ignore
/// let handle = spawn_eviction_task(registration.clone(), 60);
/// // Later, during shutdown:
/// handle.abort();
/// ```
pub fn spawn_eviction_task(registration: Arc<Registration>, interval_secs: u64) -> JoinHandle<()> {
    let interval = Duration::from_secs(interval_secs.max(1));

    tokio::spawn(async move {
        info!(
            "Starting eviction task with interval of {} seconds",
            interval.as_secs()
        );

        loop {
            tokio::time::sleep(interval).await;

            match registration.post_message(ClientMessage::CleanCache).await {
                Ok(_) => debug!("Eviction sweep requested"),
                Err(WorkerError::NoActiveWorker) => debug!("Eviction skipped: no active worker"),
                Err(err) => info!("Eviction sweep failed: {}", err),
            }
        }
    })
}
