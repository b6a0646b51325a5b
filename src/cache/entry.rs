//! Cache Entry Module
//!
//! Defines the structure for individual cache entries.

use chrono::{DateTime, Utc};

use crate::cache::FetchResponse;

// == Cache Entry ==
/// Represents a single stored response with insertion metadata.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// The stored response snapshot
    pub response: FetchResponse,
    /// Monotonic insertion number within the owning cache
    pub sequence: u64,
    /// Wall-clock insertion time
    pub inserted_at: DateTime<Utc>,
}

impl CacheEntry {
    // == Constructor ==
    /// Creates a new entry stamped with the current time.
    ///
    /// # Arguments
    /// * `response` - The response to store
    /// * `sequence` - Insertion number assigned by the owning cache
    pub fn new(response: FetchResponse, sequence: u64) -> Self {
        Self {
            response,
            sequence,
            inserted_at: Utc::now(),
        }
    }

    // == Size ==
    /// Returns the storage footprint of the entry in bytes.
    pub fn size_bytes(&self) -> usize {
        self.response.size_bytes()
    }
}
