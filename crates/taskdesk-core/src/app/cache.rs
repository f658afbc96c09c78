//! Read-through cache over a [`CacheStore`].
//!
//! Keys are `{namespace}:{id}`. Writes invalidate a whole namespace by
//! prefix. Failures on the cache side never fail the caller: reads fall back
//! to the loader, invalidations are logged and counted.

use std::future::Future;
use std::sync::Arc;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::observability::{CacheCounters, CacheCounts};
use crate::ports::CacheStore;

/// Entity classes with their own key prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CacheNamespace {
    Tasks,
    Comments,
}

impl CacheNamespace {
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheNamespace::Tasks => "tasks",
            CacheNamespace::Comments => "comments",
        }
    }

    /// Prefix matching every key of this namespace, separator included.
    pub fn prefix(&self) -> String {
        format!("{}:", self.as_str())
    }

    pub fn key(&self, id: impl std::fmt::Display) -> String {
        format!("{}:{id}", self.as_str())
    }
}

pub struct ReadThroughCache {
    store: Arc<dyn CacheStore>,
    counters: CacheCounters,
}

impl ReadThroughCache {
    pub fn new(store: Arc<dyn CacheStore>) -> Self {
        Self {
            store,
            counters: CacheCounters::default(),
        }
    }

    pub fn counts(&self) -> CacheCounts {
        self.counters.snapshot()
    }

    /// Return the cached value for `key`, or run `load` and cache what it
    /// finds. `Ok(None)` from the loader is passed through and not cached.
    pub async fn get_or_load<T, F, Fut>(&self, key: &str, load: F) -> Result<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Option<T>>>,
    {
        match self.store.get(key).await {
            Ok(Some(raw)) => match serde_json::from_value::<T>(raw) {
                Ok(value) => {
                    self.counters.hit();
                    tracing::trace!(key, "cache hit");
                    return Ok(Some(value));
                }
                Err(e) => tracing::warn!(key, error = %e, "cached entry undecodable; refetching"),
            },
            Ok(None) => {}
            Err(e) => tracing::warn!(key, error = %e, "cache read failed; refetching"),
        }
        self.counters.miss();

        let Some(value) = load().await? else {
            return Ok(None);
        };

        match serde_json::to_value(&value) {
            Ok(raw) => {
                if let Err(e) = self.store.set(key, raw).await {
                    tracing::warn!(key, error = %e, "cache populate failed");
                }
            }
            Err(e) => tracing::warn!(key, error = %e, "value not cacheable"),
        }
        Ok(Some(value))
    }

    /// Drop every entry of `namespace`. Never fails.
    pub async fn invalidate(&self, namespace: CacheNamespace) {
        let prefix = namespace.prefix();
        match self.store.invalidate_prefix(&prefix).await {
            Ok(removed) => {
                self.counters.invalidated();
                tracing::debug!(prefix = %prefix, removed, "cache invalidated");
            }
            Err(e) => {
                self.counters.invalidation_failed();
                tracing::warn!(prefix = %prefix, error = %e, "cache invalidation failed");
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::error::TaskdeskError;
    use crate::impls::InMemoryCacheStore;
    use crate::ports::CacheError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Cache that refuses every operation.
    pub(crate) struct DownCache;

    #[async_trait]
    impl CacheStore for DownCache {
        async fn get(
            &self,
            _key: &str,
        ) -> std::result::Result<Option<serde_json::Value>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn set(
            &self,
            _key: &str,
            _v: serde_json::Value,
        ) -> std::result::Result<(), CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn keys(&self) -> std::result::Result<Vec<String>, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
        async fn delete(&self, _keys: &[String]) -> std::result::Result<usize, CacheError> {
            Err(CacheError::Unavailable("down".into()))
        }
    }

    #[test]
    fn keys_and_prefixes() {
        assert_eq!(CacheNamespace::Tasks.key("task-1"), "tasks:task-1");
        assert_eq!(CacheNamespace::Comments.prefix(), "comments:");
        assert!(CacheNamespace::Comments.key(7).starts_with(&CacheNamespace::Comments.prefix()));
    }

    #[tokio::test]
    async fn second_read_is_a_hit() {
        let cache = ReadThroughCache::new(Arc::new(InMemoryCacheStore::new()));
        let loads = AtomicUsize::new(0);
        let loads = &loads;

        for _ in 0..2 {
            let v: Option<String> = cache
                .get_or_load("tasks:1", || async move {
                    loads.fetch_add(1, Ordering::SeqCst);
                    Ok(Some("value".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(v.as_deref(), Some("value"));
        }

        assert_eq!(loads.load(Ordering::SeqCst), 1);
        let counts = cache.counts();
        assert_eq!((counts.hits, counts.misses), (1, 1));
    }

    #[tokio::test]
    async fn absent_values_are_not_cached() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = ReadThroughCache::new(store.clone());

        let v: Option<String> = cache
            .get_or_load("tasks:404", || async { Ok(None) })
            .await
            .unwrap();
        assert!(v.is_none());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn loader_errors_propagate() {
        let cache = ReadThroughCache::new(Arc::new(InMemoryCacheStore::new()));
        let err = cache
            .get_or_load::<String, _, _>("tasks:1", || async {
                Err(TaskdeskError::invalid("boom"))
            })
            .await
            .unwrap_err();
        assert!(matches!(err, TaskdeskError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn undecodable_entry_is_a_miss() {
        let store = Arc::new(InMemoryCacheStore::new());
        store.set("tasks:1", json!({"not": "a number"})).await.unwrap();
        let cache = ReadThroughCache::new(store.clone());

        let v: Option<u32> = cache.get_or_load("tasks:1", || async { Ok(Some(5)) }).await.unwrap();
        assert_eq!(v, Some(5));
        assert_eq!(store.get("tasks:1").await.unwrap(), Some(json!(5)));
    }

    #[tokio::test]
    async fn invalidation_forces_refetch() {
        let store = Arc::new(InMemoryCacheStore::new());
        let cache = ReadThroughCache::new(store.clone());
        store.set("comments:1", json!("kept")).await.unwrap();

        let _: Option<u32> = cache.get_or_load("tasks:1", || async { Ok(Some(1)) }).await.unwrap();
        cache.invalidate(CacheNamespace::Tasks).await;
        let v: Option<u32> = cache.get_or_load("tasks:1", || async { Ok(Some(2)) }).await.unwrap();

        assert_eq!(v, Some(2));
        assert_eq!(store.get("comments:1").await.unwrap(), Some(json!("kept")));
    }

    #[tokio::test]
    async fn cache_outage_is_invisible_to_callers() {
        let cache = ReadThroughCache::new(Arc::new(DownCache));

        let v: Option<u32> = cache.get_or_load("tasks:1", || async { Ok(Some(3)) }).await.unwrap();
        assert_eq!(v, Some(3));

        cache.invalidate(CacheNamespace::Tasks).await;
        assert_eq!(cache.counts().invalidation_failures, 1);
    }
}
