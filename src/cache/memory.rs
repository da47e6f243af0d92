//! Process-local cache.

use super::{parse_body, prepare, CacheEntry, ResultCache, StoredEntry};
use crate::error::CacheError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

/// In-memory cache. Expired entries are evicted when read and pruned on
/// every write.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: RwLock<HashMap<String, StoredEntry>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries held, expired or not.
    #[cfg(test)]
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }
}

#[async_trait]
impl ResultCache for MemoryCache {
    async fn get(&self, key: &str) -> Option<String> {
        let now = Utc::now();
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => return None,
                Some(entry) if entry.is_live(now) => {
                    return parse_body(key, entry.body.clone());
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(|entry| !entry.is_live(now)) {
            entries.remove(key);
            debug!("Evicted expired entry {}", key);
        }
        None
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let (key, stored) = prepare(entry)?;
        let now = Utc::now();

        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| entry.is_live(now));
        if entries.len() < before {
            debug!("Pruned {} expired entries", before - entries.len());
        }
        entries.insert(key, stored);
        Ok(())
    }
}
