//! Network abstraction used by the worker for every outbound fetch.

use async_trait::async_trait;
use axum::http::{header, HeaderMap};
use tracing::debug;
use url::{Origin, Url};

use crate::cache::{FetchRequest, FetchResponse, ResponseKind};
use crate::error::FetchError;

/// Performs network fetches on behalf of the worker.
#[async_trait]
pub trait Network: Send + Sync {
    /// Fetches `request`, returning the complete response.
    ///
    /// Any HTTP status is a successful fetch; only transport failures are
    /// errors.
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// [`Network`] backed by a reqwest client.
#[derive(Debug, Clone)]
pub struct HttpNetwork {
    client: reqwest::Client,
    origin: Origin,
}

impl HttpNetwork {
    /// Creates a network whose same-origin classification uses `origin`.
    pub fn new(client: reqwest::Client, origin: &Url) -> Self {
        Self {
            client,
            origin: origin.origin(),
        }
    }

    fn classify(&self, url: &Url, headers: &HeaderMap) -> ResponseKind {
        if url.origin() == self.origin {
            ResponseKind::Basic
        } else if headers.contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN) {
            ResponseKind::Cors
        } else {
            ResponseKind::Opaque
        }
    }
}

#[async_trait]
impl Network for HttpNetwork {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        // Inbound hop headers are not forwarded.
        let mut headers = request.headers.clone();
        for name in [
            header::HOST,
            header::CONNECTION,
            header::CONTENT_LENGTH,
            header::TRANSFER_ENCODING,
            header::UPGRADE,
        ] {
            headers.remove(name);
        }

        debug!("Network fetch {} {}", request.method, request.url);
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .headers(headers)
            .body(request.body.clone())
            .send()
            .await?;

        let status = response.status();
        let mut headers = response.headers().clone();
        let body = response.bytes().await?;
        // The body is fully buffered; framing headers from upstream no longer apply.
        headers.remove(header::TRANSFER_ENCODING);
        headers.remove(header::CONTENT_LENGTH);
        headers.remove(header::CONNECTION);

        Ok(FetchResponse {
            status,
            kind: self.classify(&request.url, &headers),
            headers,
            body,
        })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_classify_same_origin() {
        let origin = Url::parse("https://ghioastral.com/").unwrap();
        let network = HttpNetwork::new(reqwest::Client::new(), &origin);

        let url = Url::parse("https://ghioastral.com/img/logo_1.png").unwrap();
        assert_eq!(network.classify(&url, &HeaderMap::new()), ResponseKind::Basic);
    }

    #[test]
    fn test_classify_cross_origin() {
        let origin = Url::parse("https://ghioastral.com/").unwrap();
        let network = HttpNetwork::new(reqwest::Client::new(), &origin);
        let url = Url::parse("https://fonts.gstatic.com/s/inter.woff2").unwrap();

        assert_eq!(network.classify(&url, &HeaderMap::new()), ResponseKind::Opaque);

        let mut headers = HeaderMap::new();
        headers.insert(
            header::ACCESS_CONTROL_ALLOW_ORIGIN,
            HeaderValue::from_static("*"),
        );
        assert_eq!(network.classify(&url, &headers), ResponseKind::Cors);
    }

    #[tokio::test]
    async fn test_fetch_unreachable_host_is_error() {
        let origin = Url::parse("http://127.0.0.1:9/").unwrap();
        let network = HttpNetwork::new(reqwest::Client::new(), &origin);
        let request = FetchRequest::get(origin.join("/index.html").unwrap());

        assert!(network.fetch(&request).await.is_err());
    }
}
