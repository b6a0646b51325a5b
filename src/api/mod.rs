//! API Module
//!
//! HTTP front end hosting the worker in front of the origin.
//!
//! # Endpoints
//! - `GET /__sw/health` - Health check endpoint
//! - `GET /__sw/status` - Registration and cache status
//! - `POST /__sw/message` - Control channel message
//! - `POST /__sw/update` - Re-run registration
//! - everything else - Intercepted by the worker

pub mod handlers;
pub mod routes;

pub use handlers::*;
pub use routes::create_router;
