//! Result cache backends.
//!
//! The orchestrators only see [`ResultCache`]: a string-keyed store of JSON
//! bodies with per-entry TTL. Reads never fail (a broken backend reads as a
//! miss) and write failures come back as [`CacheError`] for the caller to log.

pub mod file;
pub mod memory;

use crate::config::{CacheBackend, CacheConfig};
use crate::error::CacheError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error};

pub use file::FileCache;
pub use memory::MemoryCache;

/// TTL applied when an entry is written without one (3 hours).
pub const DEFAULT_TTL: Duration = Duration::from_secs(60 * 60 * 3);

/// An entry to be written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheEntry {
    pub key: String,
    /// Serialized JSON document.
    pub body: String,
    pub ttl: Option<Duration>,
}

impl CacheEntry {
    pub fn new(key: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            body: body.into(),
            ttl: None,
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = Some(ttl);
        self
    }
}

/// Async key/value store with TTL.
#[async_trait]
pub trait ResultCache: Send + Sync {
    /// The stored body, or `None` on miss, expiry, or any backend error.
    async fn get(&self, key: &str) -> Option<String>;

    /// Store an entry. Failures are reported, never retried.
    async fn set(&self, entry: CacheEntry) -> Result<(), CacheError>;
}

/// Cache that never holds anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledCache;

#[async_trait]
impl ResultCache for DisabledCache {
    async fn get(&self, _key: &str) -> Option<String> {
        None
    }

    async fn set(&self, _entry: CacheEntry) -> Result<(), CacheError> {
        Ok(())
    }
}

/// Build the configured backend.
pub fn from_config(config: &CacheConfig) -> Arc<dyn ResultCache> {
    match config.backend {
        CacheBackend::File => Arc::new(FileCache::new(config.path.clone())),
        CacheBackend::Memory => Arc::new(MemoryCache::new()),
        CacheBackend::None => Arc::new(DisabledCache),
    }
}

/// A body together with the moment it stops being served.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StoredEntry {
    pub body: String,
    pub expires_at: DateTime<Utc>,
}

impl StoredEntry {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.expires_at > now
    }
}

/// Check an entry before writing and resolve its expiry time.
pub(crate) fn prepare(entry: CacheEntry) -> Result<(String, StoredEntry), CacheError> {
    if entry.key.is_empty() {
        return Err(CacheError::MissingKey);
    }
    if entry.body.is_empty() {
        return Err(CacheError::MissingBody);
    }

    let ttl = entry.ttl.unwrap_or_else(|| {
        debug!("No TTL for {}, falling back to {}s", entry.key, DEFAULT_TTL.as_secs());
        DEFAULT_TTL
    });
    let ttl = chrono::Duration::from_std(ttl)
        .map_err(|e| CacheError::Backend(format!("TTL out of range: {}", e)))?;

    Ok((
        entry.key,
        StoredEntry {
            body: entry.body,
            expires_at: Utc::now() + ttl,
        },
    ))
}

/// Only bodies that are valid JSON are served, and a falsy document
/// (`null`, `false`, `0` or `""`) counts as a miss.
pub(crate) fn parse_body(key: &str, body: String) -> Option<String> {
    match serde_json::from_str::<serde_json::Value>(&body) {
        Ok(value) if is_falsy(&value) => {
            debug!("Cached key {} holds {}, treating as a miss", key, value);
            None
        }
        Ok(_) => Some(body),
        Err(e) => {
            error!("Parsing error for cached key {}: {}", key, e);
            None
        }
    }
}

fn is_falsy(value: &serde_json::Value) -> bool {
    use serde_json::Value;

    match value {
        Value::Null | Value::Bool(false) => true,
        Value::Number(n) => n.as_f64() == Some(0.0),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
