//! Shared test fixtures: an in-memory origin and a wired-up app.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::{body::Body, http::StatusCode, Router};
use serde_json::Value;
use url::Url;

use offline_cache::api::{create_router, AppState};
use offline_cache::cache::{CacheStorage, FetchRequest, FetchResponse};
use offline_cache::error::FetchError;
use offline_cache::worker::{Network, Registration};
use offline_cache::WorkerConfig;

pub const ORIGIN: &str = "https://ghioastral.test/";
pub const INDEX_HTML: &str = "<html><body>ghioastral</body></html>";

/// Origin that serves canned responses and can be taken offline.
#[derive(Default)]
pub struct FakeOrigin {
    routes: Mutex<HashMap<String, FetchResponse>>,
    failing: Mutex<Vec<String>>,
    offline: AtomicBool,
    calls: Mutex<Vec<String>>,
}

impl FakeOrigin {
    pub fn new() -> Self {
        let origin = Self::default();
        origin.route("/", FetchResponse::ok(INDEX_HTML).with_content_type("text/html"));
        origin.route("/index.html", FetchResponse::ok(INDEX_HTML).with_content_type("text/html"));
        origin.route("/css/style.css", FetchResponse::ok("body{}").with_content_type("text/css"));
        origin.route("/img/logo_1.png", FetchResponse::ok("png").with_content_type("image/png"));
        origin
    }

    pub fn route(&self, path: &str, response: FetchResponse) {
        self.routes.lock().unwrap().insert(absolute(path), response);
    }

    pub fn fail(&self, path: &str) {
        self.failing.lock().unwrap().push(absolute(path));
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Network for FakeOrigin {
    async fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
        let url = request.url.to_string();
        self.calls.lock().unwrap().push(url.clone());

        if self.offline.load(Ordering::SeqCst) || self.failing.lock().unwrap().contains(&url) {
            return Err(FetchError::Offline(url));
        }
        Ok(self
            .routes
            .lock()
            .unwrap()
            .get(&url)
            .cloned()
            .unwrap_or_else(|| FetchResponse::new(StatusCode::NOT_FOUND, "not found")))
    }
}

pub fn absolute(path: &str) -> String {
    Url::parse(ORIGIN).unwrap().join(path).unwrap().to_string()
}

pub fn worker_config() -> WorkerConfig {
    WorkerConfig {
        origin: Url::parse(ORIGIN).unwrap(),
        manifest: vec![
            "/".into(),
            "/index.html".into(),
            "/css/style.css".into(),
            "/img/logo_1.png".into(),
        ],
        ..WorkerConfig::default()
    }
}

/// Router plus handles to its registration and origin.
pub struct TestApp {
    pub router: Router,
    pub registration: Arc<Registration>,
    pub origin: Arc<FakeOrigin>,
}

impl TestApp {
    /// Builds the app without registering a worker.
    pub fn unregistered(origin: FakeOrigin, config: WorkerConfig) -> Self {
        Self::with_storage(origin, config, CacheStorage::new())
    }

    /// Builds the app on top of existing storage, e.g. a loaded snapshot.
    pub fn with_storage(origin: FakeOrigin, config: WorkerConfig, storage: CacheStorage) -> Self {
        let origin = Arc::new(origin);
        let registration = Arc::new(Registration::new("/sw.js", storage.shared(), origin.clone()));
        let router = create_router(AppState::new(registration.clone(), config));
        Self {
            router,
            registration,
            origin,
        }
    }

    /// Builds the app with an activated worker.
    pub async fn registered() -> Self {
        let app = Self::unregistered(FakeOrigin::new(), worker_config());
        app.registration.register(worker_config()).await.unwrap();
        app
    }
}

pub async fn body_to_bytes(body: Body) -> Vec<u8> {
    axum::body::to_bytes(body, usize::MAX).await.unwrap().to_vec()
}

pub async fn body_to_json(body: Body) -> Value {
    serde_json::from_slice(&body_to_bytes(body).await).unwrap()
}
