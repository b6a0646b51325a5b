//! Cache Storage Module
//!
//! Origin-scoped collection of named caches, shared by every worker version.

use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::debug;

use crate::cache::{CacheStats, FetchResponse, NamedCache, RequestKey};
use crate::error::{Result, WorkerError};

/// Storage handle shared between the registration and its workers.
pub type SharedStorage = Arc<RwLock<CacheStorage>>;

// == Cache Storage ==
/// All named caches of one origin, in creation order.
#[derive(Debug, Default)]
pub struct CacheStorage {
    /// Named caches, oldest first
    caches: Vec<NamedCache>,
    /// Optional byte quota across all caches
    quota_bytes: Option<usize>,
    /// Performance statistics
    stats: CacheStats,
}

impl CacheStorage {
    // == Constructor ==
    /// Creates an empty storage with no quota.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty storage limited to `quota_bytes`.
    pub fn with_quota(quota_bytes: Option<usize>) -> Self {
        Self {
            quota_bytes,
            ..Self::default()
        }
    }

    /// Wraps the storage for sharing.
    pub fn shared(self) -> SharedStorage {
        Arc::new(RwLock::new(self))
    }

    pub fn quota_bytes(&self) -> Option<usize> {
        self.quota_bytes
    }

    pub fn set_quota(&mut self, quota_bytes: Option<usize>) {
        self.quota_bytes = quota_bytes;
    }

    // == Open ==
    /// Returns the cache named `name`, creating it if needed.
    pub fn open(&mut self, name: &str) -> &mut NamedCache {
        let index = match self.position(name) {
            Some(index) => index,
            None => {
                debug!("Creating cache {}", name);
                self.caches.push(NamedCache::new(name));
                self.caches.len() - 1
            }
        };
        &mut self.caches[index]
    }

    /// Returns the cache named `name` if it exists.
    pub fn get(&self, name: &str) -> Option<&NamedCache> {
        self.caches.iter().find(|c| c.name() == name)
    }

    pub fn has(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    // == Delete ==
    /// Deletes a whole cache generation, returning true if it existed.
    pub fn delete(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.caches.remove(index);
                self.refresh_total();
                true
            }
            None => false,
        }
    }

    // == Keys ==
    /// Returns cache names in creation order.
    pub fn keys(&self) -> Vec<String> {
        self.caches.iter().map(|c| c.name().to_string()).collect()
    }

    // == Match ==
    /// Looks `key` up in every cache, oldest cache first.
    ///
    /// Records a hit or a miss.
    pub fn match_any(&mut self, key: &RequestKey) -> Option<FetchResponse> {
        let found = self
            .caches
            .iter()
            .find_map(|cache| cache.get(key))
            .map(|entry| entry.response.clone());

        match found {
            Some(_) => self.stats.record_hit(),
            None => self.stats.record_miss(),
        }
        found
    }

    /// Looks `key` up in a single cache without touching statistics.
    pub fn match_in(&self, name: &str, key: &RequestKey) -> Option<FetchResponse> {
        self.get(name)
            .and_then(|cache| cache.get(key))
            .map(|entry| entry.response.clone())
    }

    // == Put ==
    /// Stores a response in the named cache, creating the cache if needed.
    ///
    /// Fails without modifying anything when the key is not a retrieval
    /// request or when the write would exceed the quota.
    pub fn put(&mut self, name: &str, key: RequestKey, response: FetchResponse) -> Result<()> {
        if let Err(err) = self.check_put(name, &key, &response) {
            self.stats.record_failed_write();
            return Err(err);
        }

        self.open(name).put(key, response)?;
        self.stats.record_write();
        self.refresh_total();
        Ok(())
    }

    // == Commit ==
    /// Replaces the cache of the same name with `staged` in a single step.
    ///
    /// Entries of the previous cache that `staged` does not hold are dropped.
    /// Nothing changes if the result would exceed the quota.
    pub fn commit(&mut self, staged: NamedCache) -> Result<usize> {
        let replaced = self.get(staged.name()).map_or(0, NamedCache::size_bytes);
        self.ensure_within_quota(self.total_bytes() - replaced + staged.size_bytes())?;

        let count = staged.len();
        match self.position(staged.name()) {
            Some(index) => self.caches[index] = staged,
            None => {
                debug!("Creating cache {}", staged.name());
                self.caches.push(staged);
            }
        }
        for _ in 0..count {
            self.stats.record_write();
        }
        self.refresh_total();
        Ok(count)
    }

    // == Trim ==
    /// FIFO-trims the named cache to `max_entries`, returning evicted keys.
    pub fn trim(&mut self, name: &str, max_entries: usize) -> Vec<RequestKey> {
        let evicted = match self.position(name) {
            Some(index) => self.caches[index].trim_to(max_entries),
            None => Vec::new(),
        };
        self.stats.record_evictions(evicted.len());
        self.refresh_total();
        evicted
    }

    // == Stats ==
    /// Returns current statistics.
    pub fn stats(&self) -> CacheStats {
        let mut stats = self.stats.clone();
        stats.set_total_entries(self.total_entries());
        stats
    }

    pub fn total_entries(&self) -> usize {
        self.caches.iter().map(NamedCache::len).sum()
    }

    pub fn total_bytes(&self) -> usize {
        self.caches.iter().map(NamedCache::size_bytes).sum()
    }

    /// Iterates caches in creation order.
    pub fn caches(&self) -> impl Iterator<Item = &NamedCache> {
        self.caches.iter()
    }

    /// Replaces the cache list wholesale, used when loading a snapshot.
    pub(crate) fn replace_caches(&mut self, caches: Vec<NamedCache>) {
        self.caches = caches;
        self.refresh_total();
    }

    fn check_put(&self, name: &str, key: &RequestKey, response: &FetchResponse) -> Result<()> {
        if !key.is_retrieval() {
            return Err(WorkerError::NotCacheable(format!(
                "{} requests cannot be stored",
                key.method()
            )));
        }
        let current = self.get(name).map_or(0, NamedCache::size_bytes);
        let after = self.get(name).map_or(response.size_bytes(), |cache| {
            cache.size_after_put(key, response)
        });
        self.ensure_within_quota(self.total_bytes() - current + after)
    }

    fn ensure_within_quota(&self, projected: usize) -> Result<()> {
        match self.quota_bytes {
            Some(quota) if projected > quota => Err(WorkerError::QuotaExceeded {
                needed: projected,
                available: quota,
            }),
            _ => Ok(()),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.caches.iter().position(|c| c.name() == name)
    }

    fn refresh_total(&mut self) {
        let total = self.total_entries();
        self.stats.set_total_entries(total);
    }
}
