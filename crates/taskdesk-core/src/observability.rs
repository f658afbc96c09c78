//! Observability - tracing の初期化とキャッシュのカウンタ

use std::sync::atomic::{AtomicU64, Ordering};

use serde::{Deserialize, Serialize};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// `default_filter` when it is unset or unparsable.
///
/// A second call is a no-op.
pub fn init_tracing(default_filter: &str) {
    let filter = std::env::var("RUST_LOG")
        .ok()
        .and_then(|raw| {
            let raw = raw.trim();
            if raw.is_empty() {
                return None;
            }
            EnvFilter::try_new(raw).ok()
        })
        .unwrap_or_else(|| EnvFilter::new(default_filter));

    // ignore: a subscriber may already be installed (tests, embedding binaries)
    let _ = tracing_subscriber::registry()
        .with(fmt::layer().with_target(true))
        .with(filter)
        .try_init();
}

/// Snapshot of the read-through cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CacheCounts {
    pub hits: u64,
    pub misses: u64,
    pub invalidations: u64,
    pub invalidation_failures: u64,
}

#[derive(Debug, Default)]
pub(crate) struct CacheCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
    invalidation_failures: AtomicU64,
}

impl CacheCounters {
    pub(crate) fn hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invalidated(&self) {
        self.invalidations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn invalidation_failed(&self) {
        self.invalidation_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn snapshot(&self) -> CacheCounts {
        CacheCounts {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            invalidations: self.invalidations.load(Ordering::Relaxed),
            invalidation_failures: self.invalidation_failures.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counters_snapshot() {
        let counters = CacheCounters::default();
        counters.hit();
        counters.miss();
        counters.miss();
        counters.invalidation_failed();

        let v = serde_json::to_value(counters.snapshot()).unwrap();
        assert_eq!(v["hits"], 1);
        assert_eq!(v["misses"], 2);
        assert_eq!(v["invalidations"], 0);
        assert_eq!(v["invalidationFailures"], 1);
    }

    #[test]
    fn init_twice_is_harmless() {
        init_tracing("warn");
        init_tracing("warn");
    }
}
