//! Registration: the host-side container that owns worker versions.
//!
//! Installs new versions, promotes the waiting worker once it may activate,
//! tracks controlled clients and routes fetches and control messages to the
//! right worker.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{broadcast, Mutex, RwLock};
use tracing::{info, warn};

use crate::cache::{CacheStats, FetchRequest, SharedStorage};
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};
use crate::worker::{
    ClientMessage, FetchOutcome, Network, Worker, WorkerId, WorkerMessage, WorkerState,
};

/// Identifier of a connected page.
pub type ClientId = u64;

const UPDATE_CHANNEL_CAPACITY: usize = 16;

/// Result of a register/update call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// The newest worker already runs this configuration
    Unchanged,
    /// Installed, waiting for controlled clients to go away
    Waiting(WorkerId),
    /// Installed and activated
    Activated(WorkerId),
}

#[derive(Default)]
struct Slots {
    active: Option<Arc<Worker>>,
    waiting: Option<Arc<Worker>>,
    /// Client id -> controlling worker
    clients: BTreeMap<ClientId, Option<WorkerId>>,
}

// == Status ==
#[derive(Debug, Clone, Serialize)]
pub struct WorkerSummary {
    pub id: WorkerId,
    pub version: String,
    pub state: WorkerState,
}

impl WorkerSummary {
    fn of(worker: &Worker) -> Self {
        Self {
            id: worker.id(),
            version: worker.version_tag(),
            state: worker.state(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct CacheSummary {
    pub name: String,
    pub entries: usize,
    pub size_bytes: usize,
}

/// Snapshot of a registration for status reporting.
#[derive(Debug, Clone, Serialize)]
pub struct RegistrationStatus {
    pub script_path: String,
    pub active: Option<WorkerSummary>,
    pub waiting: Option<WorkerSummary>,
    pub clients: usize,
    pub caches: Vec<CacheSummary>,
    pub stats: CacheStats,
}

// == Registration ==
pub struct Registration {
    script_path: String,
    storage: SharedStorage,
    network: Arc<dyn Network>,
    slots: RwLock<Slots>,
    /// Serialises lifecycle jobs (install, activation, client changes)
    jobs: Mutex<()>,
    updates: broadcast::Sender<WorkerMessage>,
    next_worker_id: AtomicU64,
    next_client_id: AtomicU64,
}

impl Registration {
    /// Creates an empty registration for the worker script at `script_path`.
    pub fn new(
        script_path: impl Into<String>,
        storage: SharedStorage,
        network: Arc<dyn Network>,
    ) -> Self {
        let (updates, _) = broadcast::channel(UPDATE_CHANNEL_CAPACITY);
        Self {
            script_path: script_path.into(),
            storage,
            network,
            slots: RwLock::new(Slots::default()),
            jobs: Mutex::new(()),
            updates,
            next_worker_id: AtomicU64::new(1),
            next_client_id: AtomicU64::new(1),
        }
    }

    pub fn script_path(&self) -> &str {
        &self.script_path
    }

    pub fn storage(&self) -> &SharedStorage {
        &self.storage
    }

    /// Network used for passthrough requests.
    pub fn network(&self) -> &Arc<dyn Network> {
        &self.network
    }

    /// Subscribes to unsolicited worker notifications.
    pub fn subscribe(&self) -> broadcast::Receiver<WorkerMessage> {
        self.updates.subscribe()
    }

    pub async fn active(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.active.clone()
    }

    pub async fn waiting(&self) -> Option<Arc<Worker>> {
        self.slots.read().await.waiting.clone()
    }

    // == Register / Update ==
    /// Registers the worker script. Same as [`Registration::update`].
    pub async fn register(&self, config: WorkerConfig) -> Result<UpdateOutcome> {
        self.update(config).await
    }

    /// Resumes the worker that was active when storage was saved.
    ///
    /// The worker goes straight to `Activated` on its restored static cache,
    /// without touching the network. A later [`Registration::update`] replaces
    /// it once a newer version installs.
    pub async fn restore(&self, config: WorkerConfig) -> Result<WorkerId> {
        let _job = self.jobs.lock().await;
        if self.slots.read().await.active.is_some() {
            return Err(WorkerError::Internal(
                "cannot restore over an active worker".to_string(),
            ));
        }

        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let worker = Arc::new(Worker::new(
            id,
            config,
            self.storage.clone(),
            self.network.clone(),
        ));
        worker.resume().await?;

        info!("Version {} restored from storage", worker.version_tag());
        self.slots.write().await.active = Some(worker);
        Ok(id)
    }

    /// Installs `config` as a new worker version unless the newest worker
    /// already runs it.
    ///
    /// Install failure leaves the current active worker in place and is
    /// returned as an error.
    pub async fn update(&self, config: WorkerConfig) -> Result<UpdateOutcome> {
        let _job = self.jobs.lock().await;

        {
            let slots = self.slots.read().await;
            let newest = slots.waiting.as_ref().or(slots.active.as_ref());
            if newest.is_some_and(|w| w.config() == &config) {
                return Ok(UpdateOutcome::Unchanged);
            }
        }

        let id = self.next_worker_id.fetch_add(1, Ordering::SeqCst);
        let worker = Arc::new(Worker::new(
            id,
            config,
            self.storage.clone(),
            self.network.clone(),
        ));
        worker.install().await?;

        let has_active = {
            let mut slots = self.slots.write().await;
            if let Some(previous) = slots.waiting.replace(worker.clone()) {
                previous.mark_redundant();
            }
            slots.active.is_some()
        };

        if has_active {
            info!("New version {} installed, notifying pages", worker.version_tag());
            // No subscribers is fine.
            let _ = self.updates.send(WorkerMessage::UpdateAvailable {
                version: worker.version_tag(),
            });
        }

        match self.try_activate().await? {
            Some(id) => Ok(UpdateOutcome::Activated(id)),
            None => Ok(UpdateOutcome::Waiting(id)),
        }
    }

    /// Promotes the waiting worker if nothing holds it back.
    ///
    /// Must be called with the job lock held.
    async fn try_activate(&self) -> Result<Option<WorkerId>> {
        let candidate = {
            let mut slots = self.slots.write().await;
            let Some(waiting) = slots.waiting.clone() else {
                return Ok(None);
            };
            let blocked = match &slots.active {
                Some(active) => {
                    !waiting.skip_waiting_requested()
                        && slots.clients.values().any(|c| *c == Some(active.id()))
                }
                None => false,
            };
            if blocked {
                info!(
                    "Version {} waiting for controlled pages to close",
                    waiting.version_tag()
                );
                return Ok(None);
            }

            slots.waiting = None;
            if let Some(previous) = slots.active.replace(waiting.clone()) {
                previous.mark_redundant();
            }
            waiting
        };

        if let Err(err) = candidate.activate().await {
            warn!("Activation of {} failed: {}", candidate.version_tag(), err);
            candidate.mark_redundant();
            let mut slots = self.slots.write().await;
            if slots.active.as_ref().is_some_and(|w| w.id() == candidate.id()) {
                slots.active = None;
            }
            return Err(err);
        }

        // Claim only after the old generations are gone.
        let claimed = {
            let mut slots = self.slots.write().await;
            for controller in slots.clients.values_mut() {
                *controller = Some(candidate.id());
            }
            slots.clients.len()
        };
        info!(
            "Version {} active, controlling {} pages",
            candidate.version_tag(),
            claimed
        );
        Ok(Some(candidate.id()))
    }

    // == Clients ==
    /// Connects a page; it is controlled by the active worker, if any.
    pub async fn connect_client(&self) -> ClientId {
        let id = self.next_client_id.fetch_add(1, Ordering::SeqCst);
        let mut slots = self.slots.write().await;
        let controller = slots
            .active
            .as_ref()
            .filter(|w| w.state() == WorkerState::Activated)
            .map(|w| w.id());
        slots.clients.insert(id, controller);
        id
    }

    /// Disconnects a page, which may let a waiting worker activate.
    pub async fn disconnect_client(&self, id: ClientId) -> Result<()> {
        let _job = self.jobs.lock().await;
        self.slots.write().await.clients.remove(&id);
        self.try_activate().await?;
        Ok(())
    }

    /// Returns the worker controlling the client.
    pub async fn controller_of(&self, id: ClientId) -> Option<WorkerId> {
        self.slots.read().await.clients.get(&id).copied().flatten()
    }

    // == Fetch ==
    /// Offers a request to the active worker.
    pub async fn handle_fetch(&self, request: &FetchRequest) -> Result<FetchOutcome> {
        match self.active().await {
            Some(worker) => worker.handle_fetch(request).await,
            None => Ok(FetchOutcome::Passthrough),
        }
    }

    // == Messages ==
    /// Delivers a control message and returns the worker's reply, if any.
    ///
    /// `SKIP_WAITING` goes to the waiting worker and may activate it; the
    /// other messages go to the active worker.
    pub async fn post_message(&self, message: ClientMessage) -> Result<Option<WorkerMessage>> {
        match message {
            ClientMessage::SkipWaiting => {
                let _job = self.jobs.lock().await;
                if let Some(waiting) = self.waiting().await {
                    waiting.handle_message(&message).await;
                    self.try_activate().await?;
                }
                Ok(None)
            }
            ClientMessage::CleanCache | ClientMessage::CheckUpdate => {
                let active = self.active().await.ok_or(WorkerError::NoActiveWorker)?;
                Ok(active.handle_message(&message).await)
            }
        }
    }

    // == Status ==
    pub async fn status(&self) -> RegistrationStatus {
        let (active, waiting, clients) = {
            let slots = self.slots.read().await;
            (
                slots.active.as_deref().map(WorkerSummary::of),
                slots.waiting.as_deref().map(WorkerSummary::of),
                slots.clients.len(),
            )
        };

        let storage = self.storage.read().await;
        let caches = storage
            .caches()
            .map(|cache| CacheSummary {
                name: cache.name().to_string(),
                entries: cache.len(),
                size_bytes: cache.size_bytes(),
            })
            .collect();

        RegistrationStatus {
            script_path: self.script_path.clone(),
            active,
            waiting,
            clients,
            caches,
            stats: storage.stats(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{CacheStorage, FetchResponse};
    use crate::worker::network::mock::MockNetwork;
    use crate::worker::ResponseSource;
    use url::Url;

    fn config(generation: &str) -> WorkerConfig {
        WorkerConfig {
            origin: Url::parse("https://ghioastral.test/").unwrap(),
            manifest: vec!["/index.html".into()],
            generation: generation.into(),
            version: format!("{generation}.0.0"),
            ..WorkerConfig::default()
        }
    }

    fn registration() -> (Registration, Arc<MockNetwork>) {
        let network = Arc::new(MockNetwork::new());
        network.route(
            "https://ghioastral.test/index.html",
            FetchResponse::ok("<html></html>"),
        );
        let storage = CacheStorage::new().shared();
        (
            Registration::new("/sw.js", storage, network.clone()),
            network,
        )
    }

    #[tokio::test]
    async fn test_first_registration_activates() {
        let (reg, _) = registration();

        let outcome = reg.register(config("v1")).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Activated(1));
        let active = reg.active().await.unwrap();
        assert_eq!(active.state(), WorkerState::Activated);
        assert!(reg.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_same_config_is_unchanged() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();

        assert_eq!(
            reg.update(config("v1")).await.unwrap(),
            UpdateOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_failed_update_keeps_active() {
        let (reg, network) = registration();
        reg.register(config("v1")).await.unwrap();
        network.fail("https://ghioastral.test/index.html");

        assert!(reg.update(config("v2")).await.is_err());

        let active = reg.active().await.unwrap();
        assert_eq!(active.version_tag(), "ghioastral-v1.0.0");
        assert_eq!(active.state(), WorkerState::Activated);
        assert_eq!(reg.storage().read().await.keys(), vec!["ghioastral-static-v1"]);
    }

    #[tokio::test]
    async fn test_in_flight_fetch_cannot_recreate_swept_generation() {
        let slow = "https://ghioastral.test/img/slow.png";
        let (reg, network) = registration();
        let reg = Arc::new(reg);
        network.route(slow, FetchResponse::ok("slow"));
        let release = network.gate(slow);
        reg.register(config("v1")).await.unwrap();

        let pending = {
            let reg = reg.clone();
            tokio::spawn(async move {
                let request = FetchRequest::get_str(slow).unwrap();
                reg.handle_fetch(&request).await
            })
        };
        while !network.calls().iter().any(|call| call == slow) {
            tokio::task::yield_now().await;
        }

        reg.update(config("v2")).await.unwrap();
        assert_eq!(reg.storage().read().await.keys(), vec!["ghioastral-static-v2"]);

        release.notify_one();
        let outcome = pending.await.unwrap().unwrap();
        assert!(matches!(
            outcome,
            FetchOutcome::Respond {
                source: ResponseSource::Network,
                ..
            }
        ));
        assert_eq!(reg.storage().read().await.keys(), vec!["ghioastral-static-v2"]);
    }

    #[tokio::test]
    async fn test_restored_worker_serves_when_update_fails() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();

        let offline = Arc::new(MockNetwork::new());
        offline.set_offline(true);
        let restarted = Registration::new("/sw.js", reg.storage().clone(), offline);
        let id = restarted.restore(config("v1")).await.unwrap();

        assert!(restarted.update(config("v2")).await.is_err());
        assert_eq!(restarted.active().await.unwrap().id(), id);

        let request = FetchRequest::get_str("https://ghioastral.test/index.html").unwrap();
        let outcome = restarted.handle_fetch(&request).await.unwrap();
        assert!(matches!(
            outcome,
            FetchOutcome::Respond {
                source: ResponseSource::Cache,
                ..
            }
        ));
        assert_eq!(
            restarted.update(config("v1")).await.unwrap(),
            UpdateOutcome::Unchanged
        );
    }

    #[tokio::test]
    async fn test_restore_over_active_worker_fails() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();

        assert!(reg.restore(config("v1")).await.is_err());
        assert_eq!(reg.active().await.unwrap().id(), 1);
    }

    #[tokio::test]
    async fn test_update_replaces_active_and_notifies() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();
        let old = reg.active().await.unwrap();
        let client = reg.connect_client().await;
        let mut updates = reg.subscribe();

        let outcome = reg.update(config("v2")).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Activated(2));
        assert_eq!(old.state(), WorkerState::Redundant);
        assert_eq!(reg.controller_of(client).await, Some(2));
        assert_eq!(
            updates.try_recv().unwrap(),
            WorkerMessage::UpdateAvailable {
                version: "ghioastral-v2.0.0".to_string()
            }
        );
        assert_eq!(reg.storage().read().await.keys(), vec!["ghioastral-static-v2"]);
    }

    fn patient(generation: &str) -> WorkerConfig {
        WorkerConfig {
            skip_waiting_on_install: false,
            ..config(generation)
        }
    }

    #[tokio::test]
    async fn test_update_waits_for_controlled_clients() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();
        let client = reg.connect_client().await;

        let outcome = reg.update(patient("v2")).await.unwrap();

        assert_eq!(outcome, UpdateOutcome::Waiting(2));
        assert_eq!(reg.active().await.unwrap().id(), 1);
        assert_eq!(reg.waiting().await.unwrap().state(), WorkerState::Installed);
        assert_eq!(reg.controller_of(client).await, Some(1));

        reg.disconnect_client(client).await.unwrap();

        assert_eq!(reg.active().await.unwrap().id(), 2);
        assert!(reg.waiting().await.is_none());
    }

    #[tokio::test]
    async fn test_skip_waiting_message_activates_waiting_worker() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();
        let client = reg.connect_client().await;
        reg.update(patient("v2")).await.unwrap();

        let reply = reg.post_message(ClientMessage::SkipWaiting).await.unwrap();

        assert!(reply.is_none());
        assert_eq!(reg.active().await.unwrap().id(), 2);
        assert_eq!(reg.controller_of(client).await, Some(2));
    }

    #[tokio::test]
    async fn test_newer_waiting_worker_replaces_older_one() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();
        reg.connect_client().await;
        reg.update(patient("v2")).await.unwrap();
        let stale = reg.waiting().await.unwrap();

        assert_eq!(reg.update(patient("v3")).await.unwrap(), UpdateOutcome::Waiting(3));
        assert_eq!(stale.state(), WorkerState::Redundant);
    }

    #[tokio::test]
    async fn test_check_update_without_active_worker() {
        let (reg, _) = registration();

        assert!(matches!(
            reg.post_message(ClientMessage::CheckUpdate).await,
            Err(WorkerError::NoActiveWorker)
        ));
    }

    #[tokio::test]
    async fn test_status_reports_caches() {
        let (reg, _) = registration();
        reg.register(config("v1")).await.unwrap();

        let status = reg.status().await;
        assert_eq!(status.script_path, "/sw.js");
        assert_eq!(status.active.unwrap().state, WorkerState::Activated);
        assert_eq!(status.caches.len(), 1);
        assert_eq!(status.caches[0].entries, 1);
    }
}
