//! InMemoryCacheStore - 開発用のキャッシュ
//!
//! # 実装詳細
//! - HashMap<String, serde_json::Value> を std Mutex で保護（await を跨がない）
//! - TTL なし。消えるのは delete / invalidate_prefix のみ

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use async_trait::async_trait;

use crate::ports::{CacheError, CacheStore};

#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: Mutex<HashMap<String, serde_json::Value>>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.lock().map(|e| e.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<MutexGuard<'_, HashMap<String, serde_json::Value>>, CacheError> {
        self.entries
            .lock()
            .map_err(|_| CacheError::Unavailable("cache lock poisoned".into()))
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), CacheError> {
        self.lock()?.insert(key.to_string(), value);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, CacheError> {
        Ok(self.lock()?.keys().cloned().collect())
    }

    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError> {
        let mut entries = self.lock()?;
        Ok(keys.iter().filter(|k| entries.remove(*k).is_some()).count())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn set_overwrites() {
        let cache = InMemoryCacheStore::new();
        cache.set("tasks:1", json!({"v": 1})).await.unwrap();
        cache.set("tasks:1", json!({"v": 2})).await.unwrap();
        assert_eq!(cache.get("tasks:1").await.unwrap(), Some(json!({"v": 2})));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn prefix_invalidation_leaves_other_namespaces() {
        let cache = InMemoryCacheStore::new();
        for key in ["tasks:1", "tasks:2", "comments:1", "tasksummary"] {
            cache.set(key, json!(key)).await.unwrap();
        }

        let removed = cache.invalidate_prefix("tasks:").await.unwrap();
        assert_eq!(removed, 2);

        let mut left = cache.keys().await.unwrap();
        left.sort();
        assert_eq!(left, vec!["comments:1", "tasksummary"]);
    }

    #[tokio::test]
    async fn invalidating_nothing_is_fine() {
        let cache = InMemoryCacheStore::new();
        assert_eq!(cache.invalidate_prefix("tasks:").await.unwrap(), 0);
        assert!(cache.is_empty());
    }
}
