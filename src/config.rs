//! Configuration Module
//!
//! Handles loading host and worker configuration from environment variables.

use std::env;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use tracing::warn;
use url::Url;

use crate::cache::DEFAULT_MAX_DYNAMIC_ENTRIES;
use crate::error::{Result, WorkerError};
use crate::worker::AdmissionRules;

const DEFAULT_ORIGIN: &str = "http://127.0.0.1:8080/";

/// Assets required for offline use, installed into the static cache.
pub const DEFAULT_MANIFEST: &[&str] = &[
    "/",
    "/index.html",
    "/css/style.css",
    "/js/main.js",
    "/img/logo_1.png",
    "/img/logo_2.png",
    "/img/logo_3.png",
    "https://fonts.googleapis.com/css2?family=Inter:wght@400;500;600;700&family=Playfair+Display:wght@400;500;600;700&display=swap",
    "https://unpkg.com/lucide@latest/dist/umd/lucide.js",
];

/// Host configuration parameters.
///
/// All values can be configured via environment variables with sensible defaults.
#[derive(Debug, Clone)]
pub struct Config {
    /// HTTP server port
    pub server_port: u16,
    /// Directory for the durable cache snapshot, None = memory only
    pub data_dir: Option<PathBuf>,
    /// Seconds between periodic eviction sweeps, 0 = only on request
    pub eviction_interval: u64,
    /// Storage quota in bytes across all caches
    pub quota_bytes: Option<usize>,
    /// Worker script configuration
    pub worker: WorkerConfig,
}

impl Config {
    /// Creates a new Config by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `DATA_DIR` - Snapshot directory (default: unset, no persistence)
    /// - `EVICTION_INTERVAL` - Sweep frequency in seconds (default: 0, disabled)
    /// - `CACHE_QUOTA_BYTES` - Storage quota (default: unset, unlimited)
    ///
    /// Worker variables are documented on [`WorkerConfig::from_env`].
    pub fn from_env() -> Self {
        Self {
            server_port: parse_var("SERVER_PORT").unwrap_or(3000),
            data_dir: env::var("DATA_DIR").ok().filter(|v| !v.is_empty()).map(PathBuf::from),
            eviction_interval: parse_var("EVICTION_INTERVAL").unwrap_or(0),
            quota_bytes: parse_var("CACHE_QUOTA_BYTES"),
            worker: WorkerConfig::from_env(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_port: 3000,
            data_dir: None,
            eviction_interval: 0,
            quota_bytes: None,
            worker: WorkerConfig::default(),
        }
    }
}

/// Configuration baked into one worker version.
///
/// Two workers with equal configuration are the same script; changing any
/// field makes the next registration install a new version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkerConfig {
    /// Origin the worker serves; relative manifest paths resolve against it
    pub origin: Url,
    /// Prefix of every cache name
    pub cache_prefix: String,
    /// Reported version, e.g. `v1.0.0`
    pub version: String,
    /// Cache generation, e.g. `v1`; bumping it invalidates old caches
    pub generation: String,
    /// Ordered install manifest
    pub manifest: Vec<String>,
    /// Dynamic cache admission predicate
    pub admission: AdmissionRules,
    /// Upper bound enforced by the eviction sweep
    pub max_dynamic_entries: usize,
    /// Take over immediately after install instead of waiting for pages to close
    pub skip_waiting_on_install: bool,
}

impl WorkerConfig {
    /// Creates a WorkerConfig from environment variables.
    ///
    /// # Environment Variables
    /// - `ORIGIN` - Upstream origin (default: http://127.0.0.1:8080/)
    /// - `CACHE_PREFIX` - Cache name prefix (default: ghioastral)
    /// - `CACHE_VERSION` - Version tag (default: v1.0.0)
    /// - `CACHE_GENERATION` - Cache generation (default: v1)
    /// - `MANIFEST` - Comma-separated asset list (default: built-in list)
    /// - `MAX_DYNAMIC_ENTRIES` - Dynamic cache bound (default: 50)
    /// - `SKIP_WAITING` - Activate right after install (default: true)
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            origin: origin_or(env::var("ORIGIN").ok(), defaults.origin),
            cache_prefix: env::var("CACHE_PREFIX").unwrap_or(defaults.cache_prefix),
            version: env::var("CACHE_VERSION").unwrap_or(defaults.version),
            generation: env::var("CACHE_GENERATION").unwrap_or(defaults.generation),
            manifest: env::var("MANIFEST")
                .ok()
                .map(|v| {
                    v.split(',')
                        .map(str::trim)
                        .filter(|s| !s.is_empty())
                        .map(String::from)
                        .collect()
                })
                .unwrap_or(defaults.manifest),
            admission: defaults.admission,
            max_dynamic_entries: parse_var("MAX_DYNAMIC_ENTRIES")
                .unwrap_or(defaults.max_dynamic_entries),
            skip_waiting_on_install: parse_var("SKIP_WAITING")
                .unwrap_or(defaults.skip_waiting_on_install),
        }
    }

    /// Name of the static cache generation.
    pub fn static_cache_name(&self) -> String {
        format!("{}-static-{}", self.cache_prefix, self.generation)
    }

    /// Name of the dynamic cache generation.
    pub fn dynamic_cache_name(&self) -> String {
        format!("{}-dynamic-{}", self.cache_prefix, self.generation)
    }

    /// Version identifier reported to pages.
    pub fn version_tag(&self) -> String {
        format!("{}-{}", self.cache_prefix, self.version)
    }

    /// Resolves manifest entries to absolute URLs, keeping order.
    pub fn resolve_manifest(&self) -> Result<Vec<Url>> {
        self.manifest.iter().map(|entry| self.resolve(entry)).collect()
    }

    /// URL of the root document used as the offline navigation fallback.
    pub fn index_url(&self) -> Result<Url> {
        self.resolve("/index.html")
    }

    fn resolve(&self, entry: &str) -> Result<Url> {
        self.origin
            .join(entry)
            .map_err(|e| WorkerError::InvalidRequest(format!("bad manifest entry {entry}: {e}")))
    }
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            origin: Url::parse(DEFAULT_ORIGIN).expect("default origin is a valid URL"),
            cache_prefix: "ghioastral".to_string(),
            version: "v1.0.0".to_string(),
            generation: "v1".to_string(),
            manifest: DEFAULT_MANIFEST.iter().map(|s| s.to_string()).collect(),
            admission: AdmissionRules::default(),
            max_dynamic_entries: DEFAULT_MAX_DYNAMIC_ENTRIES,
            skip_waiting_on_install: true,
        }
    }
}

/// Parses `value` as the origin URL, keeping `fallback` when it is unset.
///
/// An unparsable value is logged, never silently replaced.
fn origin_or(value: Option<String>, fallback: Url) -> Url {
    let Some(value) = value.filter(|v| !v.is_empty()) else {
        return fallback;
    };
    match Url::parse(&value) {
        Ok(url) => url,
        Err(err) => {
            warn!(
                "ORIGIN {:?} is not a valid URL ({}), falling back to {}",
                value, err, fallback
            );
            fallback
        }
    }
}

fn parse_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    env::var(name).ok().and_then(|v| v.parse().ok())
}
