//! Error types for the cache worker
//!
//! Provides unified error handling using thiserror.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

// == Fetch Error Enum ==
/// Failure of a single network fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    /// The network could not be reached at all
    #[error("network unreachable: {0}")]
    Offline(String),

    /// The request was sent but the exchange failed
    #[error("transport error: {0}")]
    Transport(String),

    /// The request could not be built from its parts
    #[error("invalid request: {0}")]
    InvalidRequest(String),
}

impl From<reqwest::Error> for FetchError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() || err.is_timeout() {
            FetchError::Offline(err.to_string())
        } else if err.is_builder() {
            FetchError::InvalidRequest(err.to_string())
        } else {
            FetchError::Transport(err.to_string())
        }
    }
}

// == Worker Error Enum ==
/// Unified error type for the cache worker.
#[derive(Error, Debug)]
pub enum WorkerError {
    /// A manifest asset could not be fetched or stored during install
    #[error("install failed on {url}: {reason}")]
    InstallFailed { url: String, reason: String },

    /// A fetch failed and no fallback could mask it
    #[error("fetch failed: {0}")]
    Network(#[from] FetchError),

    /// A cache write would exceed the storage quota
    #[error("quota exceeded: {needed} bytes needed, {available} available")]
    QuotaExceeded { needed: usize, available: usize },

    /// Only retrieval requests can be stored
    #[error("not cacheable: {0}")]
    NotCacheable(String),

    /// Named cache does not exist
    #[error("cache not found: {0}")]
    CacheNotFound(String),

    /// Invalid request data
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// No worker is active for the operation
    #[error("no active worker")]
    NoActiveWorker,

    /// Snapshot read/write failure
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Snapshot encoding failure
    #[error("snapshot encoding error: {0}")]
    Snapshot(#[from] serde_json::Error),

    /// Internal error
    #[error("internal error: {0}")]
    Internal(String),
}

// == IntoResponse Implementation ==
impl IntoResponse for WorkerError {
    fn into_response(self) -> Response {
        let status = match &self {
            WorkerError::InstallFailed { .. } => StatusCode::SERVICE_UNAVAILABLE,
            WorkerError::Network(_) => StatusCode::BAD_GATEWAY,
            WorkerError::QuotaExceeded { .. } => StatusCode::INSUFFICIENT_STORAGE,
            WorkerError::NotCacheable(_) | WorkerError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            WorkerError::CacheNotFound(_) => StatusCode::NOT_FOUND,
            WorkerError::NoActiveWorker => StatusCode::CONFLICT,
            WorkerError::Io(_) | WorkerError::Snapshot(_) | WorkerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = Json(json!({
            "error": self.to_string()
        }));

        (status, body).into_response()
    }
}

// == Result Type Alias ==
/// Convenience Result type for the cache worker.
pub type Result<T> = std::result::Result<T, WorkerError>;
