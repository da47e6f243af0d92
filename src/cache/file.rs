//! JSON-file cache that survives between invocations.

use super::{parse_body, prepare, CacheEntry, ResultCache, StoredEntry};
use crate::error::CacheError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::BTreeMap;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, error, warn};

type Entries = BTreeMap<String, StoredEntry>;

/// Cache persisted as a single JSON object of key → entry.
///
/// Writes replace the whole file atomically. Concurrent writers in other
/// processes race with last-write-wins semantics.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl FileCache {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            write_lock: Mutex::new(()),
        }
    }

    async fn read_entries(&self) -> Result<Entries, CacheError> {
        match tokio::fs::read_to_string(&self.path).await {
            Ok(content) if content.trim().is_empty() => Ok(Entries::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(Entries::new()),
            Err(e) => Err(e.into()),
        }
    }

    async fn write_entries(&self, entries: &Entries) -> Result<(), CacheError> {
        let content = serde_json::to_vec(entries)?;
        let path = self.path.clone();

        tokio::task::spawn_blocking(move || persist_atomically(&path, &content))
            .await
            .map_err(|e| CacheError::Backend(e.to_string()))?
    }
}

fn persist_atomically(path: &Path, content: &[u8]) -> Result<(), CacheError> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| CacheError::Io(e.error))?;
    Ok(())
}

#[async_trait]
impl ResultCache for FileCache {
    async fn get(&self, key: &str) -> Option<String> {
        let entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(e) => {
                error!("Returned error from cache file {}: {}", self.path.display(), e);
                return None;
            }
        };

        match entries.get(key) {
            Some(entry) if entry.is_live(Utc::now()) => parse_body(key, entry.body.clone()),
            Some(_) => {
                debug!("Cached entry {} has expired", key);
                None
            }
            None => None,
        }
    }

    async fn set(&self, entry: CacheEntry) -> Result<(), CacheError> {
        let (key, stored) = prepare(entry)?;
        let _guard = self.write_lock.lock().await;

        let mut entries = match self.read_entries().await {
            Ok(entries) => entries,
            Err(CacheError::Serialize(e)) => {
                warn!("Cache file {} is corrupt, starting over: {}", self.path.display(), e);
                Entries::new()
            }
            Err(e) => return Err(e),
        };

        let now = Utc::now();
        entries.retain(|_, entry| entry.is_live(now));
        entries.insert(key, stored);

        self.write_entries(&entries).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_persists_between_instances() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");

        FileCache::new(path.clone())
            .set(CacheEntry::new("CA-hr2-6", r#"{"population":4100}"#))
            .await
            .unwrap();

        let reopened = FileCache::new(path);
        assert_eq!(
            reopened.get("CA-hr2-6").await.as_deref(),
            Some(r#"{"population":4100}"#)
        );
    }

    #[tokio::test]
    async fn test_missing_file_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("absent.json"));
        assert_eq!(cache.get("k").await, None);
    }

    #[tokio::test]
    async fn test_corrupt_file_is_a_miss_and_is_replaced_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        std::fs::write(&path, "not json").unwrap();

        let cache = FileCache::new(path);
        assert_eq!(cache.get("k").await, None);

        cache.set(CacheEntry::new("k", "[1]")).await.unwrap();
        assert_eq!(cache.get("k").await.as_deref(), Some("[1]"));
    }

    #[tokio::test]
    async fn test_expired_entries_are_pruned_on_write() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        let cache = FileCache::new(path.clone());

        cache
            .set(CacheEntry::new("old", "{}").with_ttl(Duration::ZERO))
            .await
            .unwrap();
        assert_eq!(cache.get("old").await, None);

        cache.set(CacheEntry::new("new", "{}")).await.unwrap();
        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(!raw.contains("\"old\""));
        assert!(raw.contains("\"new\""));
    }

    #[tokio::test]
    async fn test_write_into_missing_directory() {
        let dir = TempDir::new().unwrap();
        let cache = FileCache::new(dir.path().join("nested").join("cache.json"));
        tokio_test::assert_ok!(cache.set(CacheEntry::new("k", "{}")).await);
    }
}
