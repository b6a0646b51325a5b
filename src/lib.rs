//! Offline Cache - an offline asset cache worker
//!
//! Serves an origin cache-first with a versioned static manifest, a
//! FIFO-bounded dynamic cache and generation cleanup on activation.

pub mod api;
pub mod cache;
pub mod config;
pub mod error;
pub mod models;
pub mod tasks;
pub mod worker;

pub use api::AppState;
pub use config::{Config, WorkerConfig};
pub use tasks::spawn_eviction_task;
pub use worker::Registration;
