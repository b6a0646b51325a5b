//! Background Tasks Module
//!
//! Contains background tasks that run periodically while the host is up.
//!
//! # Tasks
//! - Eviction: posts `CLEAN_CACHE` to the active worker at a fixed interval

mod eviction;

pub use eviction::spawn_eviction_task;
