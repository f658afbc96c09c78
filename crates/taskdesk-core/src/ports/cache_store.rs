//! CacheStore port - key/value キャッシュ（TTL なし）
//!
//! # 設計原則
//! - エントリは明示的な無効化でのみ消える
//! - 無効化はプレフィックス単位（エンティティ種別ごと）で粗く行う
//! - 失敗しても書き込み自体は止めない（呼び出し側でログに落とす）

use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CacheError {
    #[error("cache unavailable: {0}")]
    Unavailable(String),
}

#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<serde_json::Value>, CacheError>;

    /// Insert or overwrite.
    async fn set(&self, key: &str, value: serde_json::Value) -> Result<(), CacheError>;

    /// Enumerate every key currently stored.
    async fn keys(&self) -> Result<Vec<String>, CacheError>;

    /// Remove the given keys. Returns how many were present.
    async fn delete(&self, keys: &[String]) -> Result<usize, CacheError>;

    /// Remove every key starting with `prefix`. Returns how many were removed.
    async fn invalidate_prefix(&self, prefix: &str) -> Result<usize, CacheError> {
        let matching: Vec<String> = self
            .keys()
            .await?
            .into_iter()
            .filter(|k| k.starts_with(prefix))
            .collect();
        if matching.is_empty() {
            return Ok(0);
        }
        self.delete(&matching).await
    }
}
