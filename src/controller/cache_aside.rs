//! Read-through caching shared by the controllers.

use crate::cache::{CacheEntry, ResultCache};
use crate::error::{CensusError, SourceError};
use crate::models::Served;
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

/// Serves a document from the cache or computes and stores it.
#[derive(Clone)]
pub struct CacheAside {
    cache: Arc<dyn ResultCache>,
    ttl: Duration,
}

impl CacheAside {
    pub fn new(cache: Arc<dyn ResultCache>, ttl: Duration) -> Self {
        Self { cache, ttl }
    }

    /// A hit is returned verbatim and `compute` is never polled. On a miss
    /// the computed document is serialized once; that same body is both
    /// cached and returned. A failed cache write does not fail the call.
    pub async fn serve<T, F>(&self, key: String, compute: F) -> Result<Served<T>, CensusError>
    where
        T: Serialize,
        F: Future<Output = Result<T, SourceError>>,
    {
        if let Some(body) = self.cache.get(&key).await {
            info!("Cache hit for {}", key);
            return Ok(Served::Cached(body));
        }
        info!("Cache miss for {}, aggregating", key);

        let document = compute.await.map_err(|e| {
            error!("Could not build {}: {}", key, e);
            CensusError::from(e)
        })?;
        let body = serde_json::to_string(&document)?;

        let entry = CacheEntry::new(key.clone(), body.clone()).with_ttl(self.ttl);
        if let Err(e) = self.cache.set(entry).await {
            warn!("Error caching object for key {}: {}", key, e);
        }

        Ok(Served::Computed { document, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::MemoryCache;
    use crate::testing::RecordingCache;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[tokio::test]
    async fn test_hit_skips_computation() {
        let cache = Arc::new(RecordingCache::with_entry("k", r#"{"a": 1}"#));
        let computed = AtomicBool::new(false);

        let served = CacheAside::new(cache.clone(), Duration::from_secs(60))
            .serve("k".to_string(), async {
                computed.store(true, Ordering::SeqCst);
                Ok::<_, SourceError>(0u64)
            })
            .await
            .unwrap();

        assert_eq!(served, Served::Cached(r#"{"a": 1}"#.to_string()));
        assert!(!computed.load(Ordering::SeqCst));
        assert!(cache.writes().is_empty());
    }

    #[tokio::test]
    async fn test_miss_caches_the_returned_body() {
        let cache = Arc::new(RecordingCache::default());

        let served = CacheAside::new(cache.clone(), Duration::from_secs(60))
            .serve("k".to_string(), async { Ok::<_, SourceError>(vec![1u64, 2]) })
            .await
            .unwrap();

        assert_eq!(served.body(), "[1,2]");
        let writes = cache.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].key, "k");
        assert_eq!(writes[0].body, "[1,2]");
        assert_eq!(writes[0].ttl, Some(Duration::from_secs(60)));
    }

    #[tokio::test]
    async fn test_stored_null_is_recomputed_and_replaced() {
        let cache = Arc::new(MemoryCache::new());
        cache.set(CacheEntry::new("k", "null")).await.unwrap();

        let served = CacheAside::new(cache.clone(), Duration::from_secs(60))
            .serve("k".to_string(), async { Ok::<_, SourceError>(vec![1u64, 2]) })
            .await
            .unwrap();

        assert!(!served.is_cached());
        assert_eq!(served.body(), "[1,2]");
        assert_eq!(cache.get("k").await.as_deref(), Some("[1,2]"));
    }

    #[tokio::test]
    async fn test_failed_computation_is_not_cached() {
        let cache = Arc::new(RecordingCache::default());

        let err = CacheAside::new(cache.clone(), Duration::from_secs(60))
            .serve("k".to_string(), async {
                Err::<u64, _>(SourceError::unavailable("votes", "down"))
            })
            .await
            .unwrap_err();

        assert_eq!(err.status_code(), 500);
        assert!(cache.writes().is_empty());
    }
}
