// src/cache/memory_backend.rs
use anyhow::Result;
use futures::future::BoxFuture;
use log::info;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use crate::cache::backend::CacheBackend;

struct Entry {
    value: String,
    expires_at: Instant,
}

/// In-process backend: a bounded LRU map with per-entry expiry.
/// Expired entries are dropped lazily when they are next touched.
pub struct MemoryCacheBackend {
    entries: Mutex<LruCache<String, Entry>>,
}

impl MemoryCacheBackend {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        info!("Initializing MemoryCacheBackend with capacity: {}", capacity);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl CacheBackend for MemoryCacheBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async { Ok(()) })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let expired = match entries.get(key) {
                Some(entry) if entry.expires_at > Instant::now() => return Ok(Some(entry.value.clone())),
                Some(_) => true,
                None => false,
            };
            if expired {
                entries.pop(key);
            }
            Ok(None)
        })
    }

    fn setex<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let entry = Entry {
                value,
                expires_at: Instant::now() + ttl,
            };
            self.entries.lock().await.put(key.to_string(), entry);
            Ok(())
        })
    }

    fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<usize>> {
        Box::pin(async move {
            let mut entries = self.entries.lock().await;
            let now = Instant::now();
            let removed = keys
                .iter()
                .filter_map(|k| entries.pop(k))
                .filter(|entry| entry.expires_at > now)
                .count();
            Ok(removed)
        })
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let entries = self.entries.lock().await;
            let now = Instant::now();
            let keys = entries
                .iter()
                .filter(|(k, entry)| k.starts_with(prefix) && entry.expires_at > now)
                .map(|(k, _)| k.clone())
                .collect();
            Ok(keys)
        })
    }
}
