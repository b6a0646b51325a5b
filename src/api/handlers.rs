//! API Handlers
//!
//! HTTP handlers for the control endpoints and the intercepting fetch route.

use std::sync::Arc;

use axum::{
    body::{to_bytes, Body},
    extract::{Request, State},
    http::HeaderValue,
    response::Response,
    Json,
};
use tracing::debug;

use crate::cache::{CacheStorage, Destination, FetchRequest, FetchResponse};
use crate::config::{Config, WorkerConfig};
use crate::error::{Result, WorkerError};
use crate::models::{HealthResponse, MessageResponse, UpdateResponse};
use crate::worker::{
    ClientMessage, FetchOutcome, HttpNetwork, Registration, RegistrationStatus, ResponseSource,
};

/// Path the worker script is registered under.
pub const SCRIPT_PATH: &str = "/sw.js";

/// Largest request body forwarded upstream.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

/// Response header naming where a response came from.
pub const SOURCE_HEADER: &str = "x-sw-source";

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    /// Worker registration
    pub registration: Arc<Registration>,
    /// Configuration used for (re-)registration
    pub worker_config: Arc<WorkerConfig>,
}

impl AppState {
    /// Creates a new AppState around an existing registration.
    pub fn new(registration: Arc<Registration>, worker_config: WorkerConfig) -> Self {
        Self {
            registration,
            worker_config: Arc::new(worker_config),
        }
    }

    /// Creates a new AppState from configuration.
    ///
    /// Wires a reqwest-backed network and the given storage into a fresh
    /// registration. No worker is registered yet.
    pub fn from_config(config: &Config, storage: CacheStorage) -> Self {
        let network = HttpNetwork::new(reqwest::Client::new(), &config.worker.origin);
        let registration = Registration::new(SCRIPT_PATH, storage.shared(), Arc::new(network));
        Self::new(Arc::new(registration), config.worker.clone())
    }
}

/// Handler for GET /__sw/health
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse::healthy())
}

/// Handler for GET /__sw/status
pub async fn status_handler(State(state): State<AppState>) -> Json<RegistrationStatus> {
    Json(state.registration.status().await)
}

/// Handler for POST /__sw/message
///
/// Delivers a control message; replies carry the worker's answer.
pub async fn message_handler(
    State(state): State<AppState>,
    Json(message): Json<ClientMessage>,
) -> Result<Json<MessageResponse>> {
    let reply = state.registration.post_message(message).await?;
    Ok(Json(MessageResponse::from_reply(reply)))
}

/// Handler for POST /__sw/update
///
/// Re-runs registration with the loaded worker configuration.
pub async fn update_handler(State(state): State<AppState>) -> Result<Json<UpdateResponse>> {
    let outcome = state
        .registration
        .update(state.worker_config.as_ref().clone())
        .await?;
    Ok(Json(outcome.into()))
}

/// Fallback handler: every other request goes through the worker.
///
/// Requests the worker declines are forwarded to the origin unchanged.
pub async fn fetch_handler(State(state): State<AppState>, req: Request) -> Result<Response> {
    let (parts, body) = req.into_parts();
    let body = to_bytes(body, MAX_BODY_BYTES)
        .await
        .map_err(|e| WorkerError::InvalidRequest(format!("unreadable body: {e}")))?;

    let mut url = state.worker_config.origin.clone();
    url.set_path(parts.uri.path());
    url.set_query(parts.uri.query());

    let request = FetchRequest {
        method: parts.method,
        url,
        destination: Destination::from_headers(&parts.headers),
        headers: parts.headers,
        body,
    };

    let (response, source) = match state.registration.handle_fetch(&request).await? {
        FetchOutcome::Respond { response, source } => {
            let source = match source {
                ResponseSource::Cache => "cache",
                ResponseSource::Network => "network",
                ResponseSource::Fallback => "fallback",
            };
            (response, source)
        }
        FetchOutcome::Passthrough => {
            let response = state.registration.network().fetch(&request).await?;
            (response, "passthrough")
        }
    };

    debug!("{} {} -> {} ({})", request.method, request.url, response.status, source);
    Ok(into_http(response, source))
}

fn into_http(response: FetchResponse, source: &'static str) -> Response {
    let mut http = Response::new(Body::from(response.body));
    *http.status_mut() = response.status;
    *http.headers_mut() = response.headers;
    http.headers_mut()
        .insert(SOURCE_HEADER, HeaderValue::from_static(source));
    http
}
