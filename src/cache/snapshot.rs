//! Snapshot Module
//!
//! Durable JSON snapshots of the cache storage so caches survive restarts.

use std::path::Path;

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::{CacheEntry, CacheStorage, FetchResponse, NamedCache, RequestKey, ResponseKind};
use crate::config::WorkerConfig;
use crate::error::{Result, WorkerError};

/// File name used inside the data directory.
pub const SNAPSHOT_FILE: &str = "cache-storage.json";

// == Snapshot Types ==
#[derive(Debug, Serialize, Deserialize)]
pub struct StorageSnapshot {
    pub saved_at: DateTime<Utc>,
    /// Configuration of the worker that was active when saved
    #[serde(default)]
    pub active: Option<WorkerConfig>,
    pub caches: Vec<CacheSnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CacheSnapshot {
    pub name: String,
    /// Entries from oldest to newest insertion
    pub entries: Vec<EntrySnapshot>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EntrySnapshot {
    pub key: RequestKey,
    pub status: u16,
    /// Header values as raw bytes; they need not be UTF-8
    pub headers: Vec<(String, Vec<u8>)>,
    pub body: Vec<u8>,
    pub kind: ResponseKind,
    pub sequence: u64,
    pub inserted_at: DateTime<Utc>,
}

impl StorageSnapshot {
    // == Capture ==
    /// Captures every cache of `storage`, preserving insertion order.
    pub fn capture(storage: &CacheStorage, active: Option<&WorkerConfig>) -> Self {
        let caches = storage
            .caches()
            .map(|cache| CacheSnapshot {
                name: cache.name().to_string(),
                entries: cache
                    .iter()
                    .map(|(key, entry)| EntrySnapshot::from_entry(key, entry))
                    .collect(),
            })
            .collect();

        Self {
            saved_at: Utc::now(),
            active: active.cloned(),
            caches,
        }
    }

    // == Restore ==
    /// Rebuilds the named caches described by the snapshot.
    pub fn into_caches(self) -> Result<Vec<NamedCache>> {
        self.caches
            .into_iter()
            .map(|snapshot| {
                let mut cache = NamedCache::new(snapshot.name);
                for entry in snapshot.entries {
                    let (key, entry) = entry.into_entry()?;
                    cache.restore(key, entry);
                }
                Ok(cache)
            })
            .collect()
    }
}

impl EntrySnapshot {
    fn from_entry(key: &RequestKey, entry: &CacheEntry) -> Self {
        let headers = entry
            .response
            .headers
            .iter()
            .map(|(name, value)| (name.as_str().to_string(), value.as_bytes().to_vec()))
            .collect();

        Self {
            key: key.clone(),
            status: entry.response.status.as_u16(),
            headers,
            body: entry.response.body.to_vec(),
            kind: entry.response.kind,
            sequence: entry.sequence,
            inserted_at: entry.inserted_at,
        }
    }

    fn into_entry(self) -> Result<(RequestKey, CacheEntry)> {
        let status = StatusCode::from_u16(self.status)
            .map_err(|e| WorkerError::Internal(format!("corrupt snapshot status: {e}")))?;

        let mut headers = HeaderMap::new();
        for (name, value) in self.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|e| WorkerError::Internal(format!("corrupt snapshot header: {e}")))?;
            let value = HeaderValue::from_bytes(&value)
                .map_err(|e| WorkerError::Internal(format!("corrupt snapshot header: {e}")))?;
            headers.append(name, value);
        }

        let response = FetchResponse {
            status,
            headers,
            body: self.body.into(),
            kind: self.kind,
        };

        Ok((
            self.key,
            CacheEntry {
                response,
                sequence: self.sequence,
                inserted_at: self.inserted_at,
            },
        ))
    }
}

// == Save ==
/// Writes a snapshot of `storage` to `path` atomically (temp file + rename).
///
/// `active` is the configuration of the worker serving at save time, so a
/// restart can resume it without reinstalling.
pub async fn save(
    storage: &CacheStorage,
    active: Option<&WorkerConfig>,
    path: &Path,
) -> Result<()> {
    let snapshot = StorageSnapshot::capture(storage, active);
    let bytes = serde_json::to_vec(&snapshot)?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    let tmp = path.with_extension("json.tmp");
    tokio::fs::write(&tmp, &bytes).await?;
    tokio::fs::rename(&tmp, path).await?;

    info!(
        "Saved {} caches ({} bytes) to {}",
        snapshot.caches.len(),
        bytes.len(),
        path.display()
    );
    Ok(())
}

// == Load ==
/// Storage and worker state read back from a snapshot.
#[derive(Debug)]
pub struct Restored {
    pub storage: CacheStorage,
    /// Worker that was active when the snapshot was taken
    pub active: Option<WorkerConfig>,
}

/// Loads storage from `path`. A missing file yields empty storage.
pub async fn load(path: &Path, quota_bytes: Option<usize>) -> Result<Restored> {
    let mut storage = CacheStorage::with_quota(quota_bytes);

    let bytes = match tokio::fs::read(path).await {
        Ok(bytes) => bytes,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            debug!("No snapshot at {}, starting empty", path.display());
            return Ok(Restored {
                storage,
                active: None,
            });
        }
        Err(err) => return Err(err.into()),
    };

    let snapshot: StorageSnapshot = serde_json::from_slice(&bytes)?;
    let active = snapshot.active.clone();
    storage.replace_caches(snapshot.into_caches()?);
    info!(
        "Loaded {} cache entries from {}",
        storage.total_entries(),
        path.display()
    );
    Ok(Restored { storage, active })
}
