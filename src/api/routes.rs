//! API Routes
//!
//! Configures the Axum router: control endpoints plus the intercepting
//! fallback route.

use axum::{
    routing::{get, post},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use super::handlers::{
    fetch_handler, health_handler, message_handler, status_handler, update_handler, AppState,
};

/// Creates the main router with all endpoints configured.
///
/// # Endpoints
/// - `GET /__sw/health` - Health check endpoint
/// - `GET /__sw/status` - Registration and cache status
/// - `POST /__sw/message` - Control channel message
/// - `POST /__sw/update` - Re-run registration
/// - anything else - Fetch through the worker
///
/// # Middleware
/// - CORS: Allows any origin
/// - Tracing: Logs all requests for debugging
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/__sw/health", get(health_handler))
        .route("/__sw/status", get(status_handler))
        .route("/__sw/message", post(message_handler))
        .route("/__sw/update", post(update_handler))
        .fallback(fetch_handler)
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
