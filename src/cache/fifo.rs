//! FIFO Order Module
//!
//! Tracks insertion order of cache keys for first-in first-out eviction.

use std::collections::VecDeque;

use crate::cache::RequestKey;

// == Insertion Order ==
/// Tracks the order in which keys were inserted.
///
/// Keys are stored in a VecDeque where:
/// - Front = Oldest insertion
/// - Back = Newest insertion
///
/// Reads never reorder keys; only re-insertion moves a key to the back.
#[derive(Debug, Default, Clone)]
pub struct InsertionOrder {
    order: VecDeque<RequestKey>,
}

impl InsertionOrder {
    // == Constructor ==
    /// Creates a new empty tracker.
    pub fn new() -> Self {
        Self {
            order: VecDeque::new(),
        }
    }

    // == Record ==
    /// Records an insertion of `key` as the newest entry.
    ///
    /// An existing occurrence is dropped first, so an overwrite counts as a
    /// fresh insertion.
    pub fn record(&mut self, key: &RequestKey) {
        self.remove(key);
        self.order.push_back(key.clone());
    }

    // == Remove ==
    /// Removes a key from the tracker.
    pub fn remove(&mut self, key: &RequestKey) {
        self.order.retain(|k| k != key);
    }

    // == Peek Oldest ==
    /// Returns the oldest key without removing it.
    pub fn peek_oldest(&self) -> Option<&RequestKey> {
        self.order.front()
    }

    /// Iterates keys from oldest to newest.
    pub fn iter(&self) -> impl Iterator<Item = &RequestKey> {
        self.order.iter()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}
