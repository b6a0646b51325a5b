//! A single worker version: install, activate, fetch handling and messages.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use axum::http::StatusCode;
use futures::future::join_all;
use tracing::{debug, error, info, warn};

use crate::cache::{Destination, FetchRequest, FetchResponse, NamedCache, RequestKey, SharedStorage};
use crate::config::WorkerConfig;
use crate::error::{FetchError, Result, WorkerError};
use crate::worker::fallback::placeholder_image;
use crate::worker::{ClientMessage, Network, WorkerMessage, WorkerState};

/// Identifier of a worker version within a registration.
pub type WorkerId = u64;

// == Fetch Outcome ==
/// Where an intercepted response came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseSource {
    Cache,
    Network,
    Fallback,
}

/// Result of offering a request to the worker.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// The worker declined; the host performs the default network fetch
    Passthrough,
    /// The worker answered the request
    Respond {
        response: FetchResponse,
        source: ResponseSource,
    },
}

// == Worker ==
/// One installed version of the cache worker.
pub struct Worker {
    id: WorkerId,
    config: WorkerConfig,
    storage: SharedStorage,
    network: Arc<dyn Network>,
    state: Mutex<WorkerState>,
    skip_waiting: AtomicBool,
}

impl Worker {
    // == Constructor ==
    /// Creates a worker in the `Parsed` state.
    pub fn new(
        id: WorkerId,
        config: WorkerConfig,
        storage: SharedStorage,
        network: Arc<dyn Network>,
    ) -> Self {
        Self {
            id,
            config,
            storage,
            network,
            state: Mutex::new(WorkerState::Parsed),
            skip_waiting: AtomicBool::new(false),
        }
    }

    pub fn id(&self) -> WorkerId {
        self.id
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.config
    }

    pub fn version_tag(&self) -> String {
        self.config.version_tag()
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Requests activation without waiting for controlled pages to close.
    pub fn skip_waiting(&self) {
        self.skip_waiting.store(true, Ordering::SeqCst);
    }

    pub fn skip_waiting_requested(&self) -> bool {
        self.skip_waiting.load(Ordering::SeqCst)
    }

    /// Moves the worker to `Redundant`; it will never handle fetches again.
    pub fn mark_redundant(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != WorkerState::Redundant {
            info!(worker = self.id, "Worker {} is now redundant", self.version_tag());
            *state = WorkerState::Redundant;
        }
    }

    fn transition(&self, next: WorkerState) -> Result<()> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if !state.can_transition_to(next) {
            return Err(WorkerError::Internal(format!(
                "worker {} cannot move from {} to {}",
                self.id, *state, next
            )));
        }
        *state = next;
        Ok(())
    }

    // == Install ==
    /// Fetches every manifest asset and commits them to the static cache.
    ///
    /// All-or-nothing: if any asset fails, nothing is written and the worker
    /// becomes redundant. On success the worker asks to skip waiting unless
    /// configured otherwise.
    ///
    /// # Returns
    /// The number of assets stored.
    pub async fn install(&self) -> Result<usize> {
        self.transition(WorkerState::Installing)?;
        info!(worker = self.id, "Installing {}", self.version_tag());

        match self.precache().await {
            Ok(count) => {
                self.transition(WorkerState::Installed)?;
                if self.config.skip_waiting_on_install {
                    self.skip_waiting();
                }
                info!(
                    worker = self.id,
                    "Installation complete, {} assets in {}",
                    count,
                    self.config.static_cache_name()
                );
                Ok(count)
            }
            Err(err) => {
                error!(worker = self.id, "Installation failed: {}", err);
                self.mark_redundant();
                Err(err)
            }
        }
    }

    async fn precache(&self) -> Result<usize> {
        let urls = self.config.resolve_manifest()?;
        let network = &self.network;
        let fetches = urls.into_iter().map(|url| async move {
            let request = FetchRequest::get(url);
            let result = network.fetch(&request).await;
            (request, result)
        });

        // Staged privately so fetches never observe a half-populated cache.
        let mut staged = NamedCache::new(self.config.static_cache_name());
        for (request, result) in join_all(fetches).await {
            let response = result.map_err(|e| WorkerError::InstallFailed {
                url: request.url.to_string(),
                reason: e.to_string(),
            })?;
            if response.status != StatusCode::OK {
                return Err(WorkerError::InstallFailed {
                    url: request.url.to_string(),
                    reason: format!("unexpected status {}", response.status),
                });
            }
            staged.put(request.key(), response)?;
        }

        let mut storage = self.storage.write().await;
        storage
            .commit(staged)
            .map_err(|e| WorkerError::InstallFailed {
                url: self.config.static_cache_name(),
                reason: e.to_string(),
            })
    }

    // == Activate ==
    /// Deletes every cache generation other than the current static and
    /// dynamic ones, then marks the worker activated.
    ///
    /// # Returns
    /// Names of the deleted caches.
    pub async fn activate(&self) -> Result<Vec<String>> {
        self.transition(WorkerState::Activating)?;
        info!(worker = self.id, "Activating {}", self.version_tag());

        let current = [
            self.config.static_cache_name(),
            self.config.dynamic_cache_name(),
        ];
        let deleted = {
            let mut storage = self.storage.write().await;
            let stale: Vec<String> = storage
                .keys()
                .into_iter()
                .filter(|name| !current.contains(name))
                .collect();
            for name in &stale {
                info!(worker = self.id, "Deleting old cache {}", name);
                storage.delete(name);
            }
            stale
        };

        self.transition(WorkerState::Activated)?;
        info!(worker = self.id, "Activation complete");
        Ok(deleted)
    }

    // == Resume ==
    /// Puts a worker restored from a snapshot straight into `Activated`.
    ///
    /// Its static cache must already be in storage; nothing is fetched.
    pub async fn resume(&self) -> Result<()> {
        let name = self.config.static_cache_name();
        if !self.storage.read().await.has(&name) {
            return Err(WorkerError::CacheNotFound(name));
        }

        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state != WorkerState::Parsed {
            return Err(WorkerError::Internal(format!(
                "worker {} cannot resume from {}",
                self.id, *state
            )));
        }
        *state = WorkerState::Activated;
        info!(worker = self.id, "Resumed {} from {}", self.version_tag(), name);
        Ok(())
    }

    // == Fetch ==
    /// Returns true if `request` is eligible for interception.
    pub fn intercepts(request: &FetchRequest) -> bool {
        request.is_retrieval() && request.is_addressable()
    }

    /// Handles one intercepted request, cache first.
    ///
    /// Network failures are masked for documents (cached root page) and
    /// images (placeholder); other failures are returned as errors.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        if !self.state().handles_fetches() || !Self::intercepts(request) {
            return Ok(FetchOutcome::Passthrough);
        }

        let key = request.key();
        let cached = self.storage.write().await.match_any(&key);
        if let Some(response) = cached {
            debug!("Serving from cache {}", key);
            return Ok(FetchOutcome::Respond {
                response,
                source: ResponseSource::Cache,
            });
        }

        match self.network.fetch(request).await {
            Ok(response) => {
                self.admit(request, key, &response).await;
                Ok(FetchOutcome::Respond {
                    response,
                    source: ResponseSource::Network,
                })
            }
            Err(err) => {
                warn!("Fetch failed {}: {}", request.url, err);
                self.fallback(request, err).await
            }
        }
    }

    async fn admit(&self, request: &FetchRequest, key: RequestKey, response: &FetchResponse) {
        if !response.is_storable() || !self.config.admission.admits(&request.url) {
            return;
        }

        // One copy goes back to the page, the clone is persisted.
        let copy = response.clone();
        let name = self.config.dynamic_cache_name();
        let mut storage = self.storage.write().await;
        // Activation of a newer version sweeps under this lock, so a worker
        // still activated here cannot outlive the sweep with its write.
        if !self.state().handles_fetches() {
            debug!("Dropping write for {}, worker {} was replaced", request.url, self.id);
            return;
        }
        match storage.put(&name, key, copy) {
            Ok(()) => debug!("Caching dynamically {}", request.url),
            Err(err) => warn!("Dynamic cache write skipped for {}: {}", request.url, err),
        }
    }

    async fn fallback(&self, request: &FetchRequest, err: FetchError) -> Result<FetchOutcome> {
        match request.destination {
            Destination::Document => {
                let index = RequestKey::get(&self.config.index_url()?);
                let cached = self
                    .storage
                    .read()
                    .await
                    .match_in(&self.config.static_cache_name(), &index);
                match cached {
                    Some(response) => Ok(FetchOutcome::Respond {
                        response,
                        source: ResponseSource::Fallback,
                    }),
                    None => Err(err.into()),
                }
            }
            Destination::Image => Ok(FetchOutcome::Respond {
                response: placeholder_image(),
                source: ResponseSource::Fallback,
            }),
            _ => Err(err.into()),
        }
    }

    // == Eviction ==
    /// Trims the dynamic cache to the configured bound, oldest entries first.
    ///
    /// # Returns
    /// The number of evicted entries.
    pub async fn evict_dynamic(&self) -> usize {
        let name = self.config.dynamic_cache_name();
        let evicted = self
            .storage
            .write()
            .await
            .trim(&name, self.config.max_dynamic_entries);

        for key in &evicted {
            debug!("Cleaning old cache entry {}", key);
        }
        if !evicted.is_empty() {
            info!(
                worker = self.id,
                "Eviction removed {} entries from {}",
                evicted.len(),
                name
            );
        }
        evicted.len()
    }

    // == Messages ==
    /// Handles a control message, returning the reply if it has one.
    pub async fn handle_message(&self, message: &ClientMessage) -> Option<WorkerMessage> {
        match message {
            ClientMessage::SkipWaiting => {
                self.skip_waiting();
                None
            }
            ClientMessage::CleanCache => {
                self.evict_dynamic().await;
                None
            }
            ClientMessage::CheckUpdate => Some(WorkerMessage::UpdateAvailable {
                version: self.version_tag(),
            }),
        }
    }
}

impl std::fmt::Debug for Worker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.id)
            .field("version", &self.version_tag())
            .field("state", &self.state())
            .finish()
    }
}
