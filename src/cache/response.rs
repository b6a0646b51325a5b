//! Response Module
//!
//! Response snapshots returned by the network and stored in caches.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

// == Response Kind ==
/// Origin classification of a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResponseKind {
    /// Same-origin response
    Basic,
    /// Cross-origin response the origin allowed us to read
    Cors,
    /// Cross-origin response with an unreadable body
    Opaque,
}

// == Fetch Response ==
/// A complete response: status, headers and a fully buffered body.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    pub kind: ResponseKind,
}

impl FetchResponse {
    /// Creates a same-origin response with no headers.
    pub fn new(status: StatusCode, body: impl Into<Bytes>) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: body.into(),
            kind: ResponseKind::Basic,
        }
    }

    /// Creates a 200 same-origin response.
    pub fn ok(body: impl Into<Bytes>) -> Self {
        Self::new(StatusCode::OK, body)
    }

    /// Sets the content type.
    pub fn with_content_type(mut self, content_type: &'static str) -> Self {
        self.headers
            .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
        self
    }

    pub fn with_kind(mut self, kind: ResponseKind) -> Self {
        self.kind = kind;
        self
    }

    /// Returns the content type header, if readable.
    pub fn content_type(&self) -> Option<&str> {
        self.headers
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
    }

    /// Returns true if this response may be written to a cache.
    ///
    /// Only complete 200 responses whose body is readable qualify.
    pub fn is_storable(&self) -> bool {
        self.status == StatusCode::OK && self.kind != ResponseKind::Opaque
    }

    /// Approximate storage footprint in bytes.
    pub fn size_bytes(&self) -> usize {
        let headers: usize = self
            .headers
            .iter()
            .map(|(name, value)| name.as_str().len() + value.len())
            .sum();
        self.body.len() + headers
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_storable_requires_ok_status() {
        assert!(FetchResponse::ok("x").is_storable());
        assert!(!FetchResponse::new(StatusCode::NOT_FOUND, "x").is_storable());
        assert!(!FetchResponse::new(StatusCode::PARTIAL_CONTENT, "x").is_storable());
    }

    #[test]
    fn test_opaque_is_not_storable() {
        assert!(FetchResponse::ok("x").with_kind(ResponseKind::Cors).is_storable());
        assert!(!FetchResponse::ok("x")
            .with_kind(ResponseKind::Opaque)
            .is_storable());
    }

    #[test]
    fn test_size_counts_headers_and_body() {
        let response = FetchResponse::ok("hello").with_content_type("text/plain");
        assert_eq!(
            response.size_bytes(),
            5 + "content-type".len() + "text/plain".len()
        );
        assert_eq!(response.content_type(), Some("text/plain"));
    }
}
