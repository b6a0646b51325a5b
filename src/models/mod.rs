//! Response models for the host API
//!
//! This module defines the DTOs (Data Transfer Objects) serialized into
//! control endpoint responses.

pub mod responses;

// Re-export commonly used types
pub use responses::{HealthResponse, MessageResponse, UpdateResponse};
