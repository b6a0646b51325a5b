//! Named Cache Module
//!
//! A single cache generation: keyed response storage with insertion-order tracking.

use std::collections::HashMap;

use crate::cache::{CacheEntry, FetchResponse, InsertionOrder, RequestKey};
use crate::error::{Result, WorkerError};

// == Named Cache ==
/// One named cache generation.
#[derive(Debug, Clone)]
pub struct NamedCache {
    /// Generation identifier
    name: String,
    /// Key-response storage
    entries: HashMap<RequestKey, CacheEntry>,
    /// Insertion order tracker
    order: InsertionOrder,
    /// Next insertion number
    next_sequence: u64,
    /// Sum of entry sizes
    size_bytes: usize,
}

impl NamedCache {
    // == Constructor ==
    /// Creates an empty cache named `name`.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: HashMap::new(),
            order: InsertionOrder::new(),
            next_sequence: 0,
            size_bytes: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    // == Put ==
    /// Stores a response under `key`.
    ///
    /// Overwriting an existing key deletes the old entry first, so the key
    /// becomes the newest insertion.
    ///
    /// # Arguments
    /// * `key` - Request identity, must be a retrieval request
    /// * `response` - Response snapshot to store
    pub fn put(&mut self, key: RequestKey, response: FetchResponse) -> Result<()> {
        if !key.is_retrieval() {
            return Err(WorkerError::NotCacheable(format!(
                "{} requests cannot be stored",
                key.method()
            )));
        }

        self.delete(&key);

        let entry = CacheEntry::new(response, self.next_sequence);
        self.next_sequence += 1;
        self.size_bytes += entry.size_bytes();
        self.order.record(&key);
        self.entries.insert(key, entry);

        Ok(())
    }

    // == Get ==
    /// Looks up an entry. Reads do not affect eviction order.
    pub fn get(&self, key: &RequestKey) -> Option<&CacheEntry> {
        self.entries.get(key)
    }

    pub fn contains(&self, key: &RequestKey) -> bool {
        self.entries.contains_key(key)
    }

    // == Delete ==
    /// Removes an entry, returning true if it existed.
    pub fn delete(&mut self, key: &RequestKey) -> bool {
        match self.entries.remove(key) {
            Some(entry) => {
                self.size_bytes = self.size_bytes.saturating_sub(entry.size_bytes());
                self.order.remove(key);
                true
            }
            None => false,
        }
    }

    // == Keys ==
    /// Returns all keys from oldest to newest insertion.
    pub fn keys(&self) -> Vec<RequestKey> {
        self.order.iter().cloned().collect()
    }

    /// Iterates entries from oldest to newest insertion.
    pub fn iter(&self) -> impl Iterator<Item = (&RequestKey, &CacheEntry)> {
        self.order
            .iter()
            .filter_map(move |key| self.entries.get(key).map(|entry| (key, entry)))
    }

    // == Trim ==
    /// Evicts the oldest entries until at most `max_entries` remain.
    ///
    /// Returns the evicted keys, oldest first.
    pub fn trim_to(&mut self, max_entries: usize) -> Vec<RequestKey> {
        let mut evicted = Vec::new();
        while self.entries.len() > max_entries {
            let Some(oldest) = self.order.peek_oldest().cloned() else {
                break;
            };
            self.delete(&oldest);
            evicted.push(oldest);
        }
        evicted
    }

    /// Appends a previously stored entry, keeping its metadata.
    pub(crate) fn restore(&mut self, key: RequestKey, entry: CacheEntry) {
        self.delete(&key);
        self.next_sequence = self.next_sequence.max(entry.sequence + 1);
        self.size_bytes += entry.size_bytes();
        self.order.record(&key);
        self.entries.insert(key, entry);
    }

    /// Size the cache would have after storing `response` under `key`.
    pub(crate) fn size_after_put(&self, key: &RequestKey, response: &FetchResponse) -> usize {
        let replaced = self.entries.get(key).map_or(0, CacheEntry::size_bytes);
        self.size_bytes - replaced + response.size_bytes()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn size_bytes(&self) -> usize {
        self.size_bytes
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::Method;
    use url::Url;

    fn key(path: &str) -> RequestKey {
        RequestKey::get(&Url::parse(&format!("https://example.com{path}")).unwrap())
    }

    #[test]
    fn test_cache_new() {
        let cache = NamedCache::new("ghioastral-dynamic-v1");
        assert_eq!(cache.name(), "ghioastral-dynamic-v1");
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_put_and_get() {
        let mut cache = NamedCache::new("c");
        cache.put(key("/a"), FetchResponse::ok("alpha")).unwrap();

        let entry = cache.get(&key("/a")).unwrap();
        assert_eq!(entry.response.body, "alpha");
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.size_bytes(), 5);
    }

    #[test]
    fn test_put_rejects_non_retrieval_key() {
        let mut cache = NamedCache::new("c");
        let url = Url::parse("https://example.com/contact").unwrap();

        let result = cache.put(RequestKey::new(Method::POST, &url), FetchResponse::ok("x"));
        assert!(matches!(result, Err(WorkerError::NotCacheable(_))));
        assert!(cache.is_empty());
    }

    #[test]
    fn test_overwrite_is_delete_then_insert() {
        let mut cache = NamedCache::new("c");
        cache.put(key("/a"), FetchResponse::ok("one")).unwrap();
        cache.put(key("/b"), FetchResponse::ok("two")).unwrap();
        cache.put(key("/a"), FetchResponse::ok("three!")).unwrap();

        assert_eq!(cache.len(), 2);
        assert_eq!(cache.keys(), vec![key("/b"), key("/a")]);
        assert_eq!(cache.get(&key("/a")).unwrap().response.body, "three!");
        assert_eq!(cache.size_bytes(), 3 + 6);
    }

    #[test]
    fn test_delete() {
        let mut cache = NamedCache::new("c");
        cache.put(key("/a"), FetchResponse::ok("alpha")).unwrap();

        assert!(cache.delete(&key("/a")));
        assert!(!cache.delete(&key("/a")));
        assert!(cache.is_empty());
        assert_eq!(cache.size_bytes(), 0);
    }

    #[test]
    fn test_reads_do_not_reorder() {
        let mut cache = NamedCache::new("c");
        cache.put(key("/a"), FetchResponse::ok("a")).unwrap();
        cache.put(key("/b"), FetchResponse::ok("b")).unwrap();

        let _ = cache.get(&key("/a"));
        let evicted = cache.trim_to(1);

        assert_eq!(evicted, vec![key("/a")]);
        assert!(cache.contains(&key("/b")));
    }

    #[test]
    fn test_trim_sixty_to_fifty() {
        let mut cache = NamedCache::new("c");
        for i in 0..60 {
            cache.put(key(&format!("/img/{i}.png")), FetchResponse::ok("x")).unwrap();
        }

        let evicted = cache.trim_to(50);

        assert_eq!(evicted.len(), 10);
        assert_eq!(cache.len(), 50);
        for i in 0..10 {
            assert_eq!(evicted[i], key(&format!("/img/{i}.png")));
            assert!(!cache.contains(&key(&format!("/img/{i}.png"))));
        }
        for i in 10..60 {
            assert!(cache.contains(&key(&format!("/img/{i}.png"))));
        }
    }

    #[test]
    fn test_trim_under_bound_is_noop() {
        let mut cache = NamedCache::new("c");
        cache.put(key("/a"), FetchResponse::ok("a")).unwrap();

        assert!(cache.trim_to(50).is_empty());
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_iter_in_insertion_order() {
        let mut cache = NamedCache::new("c");
        cache.put(key("/a"), FetchResponse::ok("a")).unwrap();
        cache.put(key("/b"), FetchResponse::ok("b")).unwrap();

        let sequences: Vec<u64> = cache.iter().map(|(_, e)| e.sequence).collect();
        assert_eq!(sequences, vec![0, 1]);
    }
}
