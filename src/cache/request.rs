//! Request Module
//!
//! Describes intercepted requests and the identity used to key cache entries.

use std::fmt;

use axum::http::{HeaderMap, Method};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{Result, WorkerError};

// == Destination ==
/// What the requesting page intends to do with the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Destination {
    /// Top-level navigation
    Document,
    Image,
    Font,
    Style,
    Script,
    #[default]
    Other,
}

impl Destination {
    /// Derives the destination from request headers.
    ///
    /// `Sec-Fetch-Dest` wins when present; otherwise the `Accept` header is
    /// used as a hint.
    pub fn from_headers(headers: &HeaderMap) -> Self {
        if let Some(dest) = headers.get("sec-fetch-dest").and_then(|v| v.to_str().ok()) {
            return match dest.to_ascii_lowercase().as_str() {
                "document" | "iframe" | "frame" => Destination::Document,
                "image" => Destination::Image,
                "font" => Destination::Font,
                "style" => Destination::Style,
                "script" => Destination::Script,
                _ => Destination::Other,
            };
        }

        let accept = headers
            .get("accept")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default();
        if accept.contains("text/html") {
            Destination::Document
        } else if accept.starts_with("image/") {
            Destination::Image
        } else {
            Destination::Other
        }
    }
}

// == Fetch Request ==
/// A request seen by the worker.
#[derive(Debug, Clone)]
pub struct FetchRequest {
    pub method: Method,
    pub url: Url,
    pub destination: Destination,
    pub headers: HeaderMap,
    /// Request body, forwarded untouched on passthrough
    pub body: Bytes,
}

impl FetchRequest {
    /// Creates a bodiless GET request.
    pub fn get(url: Url) -> Self {
        Self {
            method: Method::GET,
            url,
            destination: Destination::Other,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }

    /// Parses `url` and creates a GET request for it.
    pub fn get_str(url: &str) -> Result<Self> {
        let url = Url::parse(url).map_err(|e| WorkerError::InvalidRequest(format!("{url}: {e}")))?;
        Ok(Self::get(url))
    }

    /// Sets the destination.
    pub fn with_destination(mut self, destination: Destination) -> Self {
        self.destination = destination;
        self
    }

    /// Sets method and body.
    pub fn with_method(mut self, method: Method, body: impl Into<Bytes>) -> Self {
        self.method = method;
        self.body = body.into();
        self
    }

    /// Returns true if the request uses the retrieval method.
    pub fn is_retrieval(&self) -> bool {
        self.method == Method::GET
    }

    /// Returns true if the URL scheme is addressable over the network.
    pub fn is_addressable(&self) -> bool {
        matches!(self.url.scheme(), "http" | "https")
    }

    /// Identity of this request in the cache.
    pub fn key(&self) -> RequestKey {
        RequestKey::new(self.method.clone(), &self.url)
    }
}

// == Request Key ==
/// Cache key: method plus absolute URL with the fragment removed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestKey {
    method: String,
    url: String,
}

impl RequestKey {
    pub fn new(method: Method, url: &Url) -> Self {
        let mut url = url.clone();
        url.set_fragment(None);
        Self {
            method: method.as_str().to_string(),
            url: url.into(),
        }
    }

    /// Shorthand for a GET key.
    pub fn get(url: &Url) -> Self {
        Self::new(Method::GET, url)
    }

    pub fn method(&self) -> &str {
        &self.method
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns true if the key belongs to a retrieval request.
    pub fn is_retrieval(&self) -> bool {
        self.method == Method::GET.as_str()
    }
}

impl fmt::Display for RequestKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.method, self.url)
    }
}
