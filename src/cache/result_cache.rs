// src/cache/result_cache.rs
use anyhow::Result;
use chrono::{DateTime, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::future::Future;
use std::sync::atomic::{AtomicU8, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;

use crate::cache::backend::CacheBackend;
use crate::cache::memory_backend::MemoryCacheBackend;
use crate::cache::postgres_backend::PostgresCacheBackend;
use crate::models::{PredictionResult, PredictionType};
use crate::utils::constants::CACHE_STATS_LOG_INTERVAL;
use crate::utils::db_connect;
use crate::utils::serving_config::{CacheBackendKind, ServingConfig};

const UNVERIFIED: u8 = 0;
const AVAILABLE: u8 = 1;
const DISABLED: u8 = 2;

/// What gets stored per key: the finished predictions and when they were made.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedBundle {
    pub generated_at: DateTime<Utc>,
    pub predictions: Vec<PredictionResult>,
}

/// `<prefix>:<subject>:<sha256 hex>` over subject, window and the sorted type list.
/// The subject stays readable in the key so a subject's entries can be found by prefix.
pub fn cache_key(prefix: &str, subject_id: &str, window_days: u32, types: &[PredictionType]) -> String {
    let mut names: Vec<&str> = types.iter().map(PredictionType::as_str).collect();
    names.sort_unstable();

    let mut hasher = Sha256::new();
    hasher.update(subject_id.as_bytes());
    hasher.update(b"|");
    hasher.update(window_days.to_string().as_bytes());
    hasher.update(b"|");
    hasher.update(names.join(",").as_bytes());
    format!("{}:{}:{}", prefix, subject_id, hex::encode(hasher.finalize()))
}

/// Prediction bundle cache over an optional, possibly unreachable backend.
///
/// Availability is a capability flag: unverified until the first round trip, then
/// either available or disabled for the life of the process. While disabled, `get`
/// always misses and `set` always returns `false`. Every backend call is bounded by
/// `op_timeout`; a timeout counts as a failure.
pub struct ResultCache {
    backend: Option<Arc<dyn CacheBackend>>,
    key_prefix: String,
    ttl: Duration,
    op_timeout: Duration,
    state: AtomicU8,
    hits: AtomicUsize,
    misses: AtomicUsize,
}

impl ResultCache {
    /// Wraps `backend` without contacting it; the first operation decides availability.
    pub fn new(
        backend: Arc<dyn CacheBackend>,
        key_prefix: impl Into<String>,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Self {
        Self {
            backend: Some(backend),
            key_prefix: key_prefix.into(),
            ttl,
            op_timeout,
            state: AtomicU8::new(UNVERIFIED),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Like `new`, but pings the backend immediately.
    pub async fn connect(
        backend: Arc<dyn CacheBackend>,
        key_prefix: impl Into<String>,
        ttl: Duration,
        op_timeout: Duration,
    ) -> Self {
        let cache = Self::new(backend, key_prefix, ttl, op_timeout);
        if let Some(backend) = cache.backend.clone() {
            if cache.guarded("ping", backend.ping()).await.is_some() {
                info!("ResultCache enabled on {} backend", backend.name());
            }
        }
        cache
    }

    /// A cache with no backend at all.
    pub fn disabled() -> Self {
        Self {
            backend: None,
            key_prefix: String::new(),
            ttl: Duration::ZERO,
            op_timeout: Duration::ZERO,
            state: AtomicU8::new(DISABLED),
            hits: AtomicUsize::new(0),
            misses: AtomicUsize::new(0),
        }
    }

    /// Builds the backend named in `config`. Never fails: an unusable backend yields
    /// a disabled cache.
    pub async fn from_config(config: &ServingConfig) -> Self {
        let backend: Arc<dyn CacheBackend> = match config.cache_backend {
            CacheBackendKind::Disabled => {
                info!("ResultCache disabled by configuration");
                return Self::disabled();
            }
            CacheBackendKind::Memory => Arc::new(MemoryCacheBackend::new(config.cache_memory_capacity)),
            CacheBackendKind::Postgres => Arc::new(PostgresCacheBackend::new(db_connect::connect_lazy(
                config.cache_timeout,
            ))),
        };
        Self::connect(backend, config.cache_key_prefix.clone(), config.cache_ttl, config.cache_timeout).await
    }

    pub fn is_enabled(&self) -> bool {
        self.state.load(Ordering::Acquire) != DISABLED
    }

    pub fn default_ttl(&self) -> Duration {
        self.ttl
    }

    pub fn key(&self, subject_id: &str, window_days: u32, types: &[PredictionType]) -> String {
        cache_key(&self.key_prefix, subject_id, window_days, types)
    }

    fn active_backend(&self) -> Option<&Arc<dyn CacheBackend>> {
        if self.is_enabled() {
            self.backend.as_ref()
        } else {
            None
        }
    }

    /// Runs one backend call under the timeout and settles the capability flag.
    async fn guarded<T, F>(&self, op: &'static str, fut: F) -> Option<T>
    where
        F: Future<Output = Result<T>>,
    {
        let failure = match timeout(self.op_timeout, fut).await {
            Ok(Ok(value)) => {
                let _ = self
                    .state
                    .compare_exchange(UNVERIFIED, AVAILABLE, Ordering::AcqRel, Ordering::Acquire);
                return Some(value);
            }
            Ok(Err(e)) => format!("{:#}", e),
            Err(_) => format!("timed out after {:?}", self.op_timeout),
        };

        match self
            .state
            .compare_exchange(UNVERIFIED, DISABLED, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => warn!(
                "ResultCache: backend unreachable on first {} ({}). Caching disabled; predictions are unaffected.",
                op, failure
            ),
            Err(_) => debug!("ResultCache: {} failed ({}), treated as a miss", op, failure),
        }
        None
    }

    fn record_lookup(&self, hit: bool) {
        let (hits, misses) = if hit {
            (self.hits.fetch_add(1, Ordering::Relaxed) + 1, self.misses.load(Ordering::Relaxed))
        } else {
            (self.hits.load(Ordering::Relaxed), self.misses.fetch_add(1, Ordering::Relaxed) + 1)
        };
        let total = hits + misses;
        if total % CACHE_STATS_LOG_INTERVAL == 0 {
            info!(
                "ResultCache stats - hits: {}, misses: {}, hit rate: {:.2}%",
                hits,
                misses,
                (hits as f64 / total as f64) * 100.0
            );
        }
    }

    /// (hits, misses) since construction.
    pub fn stats(&self) -> (usize, usize) {
        (self.hits.load(Ordering::Relaxed), self.misses.load(Ordering::Relaxed))
    }

    pub async fn get(
        &self,
        subject_id: &str,
        window_days: u32,
        types: &[PredictionType],
    ) -> Option<CachedBundle> {
        let backend = self.active_backend()?;
        let key = self.key(subject_id, window_days, types);

        let bundle = self
            .guarded("get", backend.get(&key))
            .await
            .flatten()
            .and_then(|raw| match serde_json::from_str::<CachedBundle>(&raw) {
                Ok(bundle) => Some(bundle),
                Err(e) => {
                    debug!("ResultCache: discarding unreadable entry {}: {}", key, e);
                    None
                }
            });
        self.record_lookup(bundle.is_some());
        bundle
    }

    /// Stores `bundle` for `ttl`. Returns whether the write reached the backend.
    pub async fn set(
        &self,
        subject_id: &str,
        window_days: u32,
        types: &[PredictionType],
        bundle: &CachedBundle,
        ttl: Duration,
    ) -> bool {
        let Some(backend) = self.active_backend() else {
            return false;
        };
        let payload = match serde_json::to_string(bundle) {
            Ok(payload) => payload,
            Err(e) => {
                warn!("ResultCache: could not serialize bundle for {}: {}", subject_id, e);
                return false;
            }
        };
        let key = self.key(subject_id, window_days, types);
        self.guarded("set", backend.setex(&key, payload, ttl)).await.is_some()
    }

    /// Removes every entry for `subject_id`. Must be called whenever the subject's
    /// observations are erased. Returns how many entries were removed.
    pub async fn invalidate(&self, subject_id: &str) -> usize {
        let Some(backend) = self.active_backend() else {
            return 0;
        };
        let prefix = format!("{}:{}:", self.key_prefix, subject_id);
        let Some(found) = self.guarded("scan", backend.scan_prefix(&prefix)).await else {
            return 0;
        };
        // a subject containing ':' must not sweep up another subject's keys
        let keys: Vec<String> = found
            .into_iter()
            .filter(|k| k.get(prefix.len()..).is_some_and(|rest| !rest.contains(':')))
            .collect();
        if keys.is_empty() {
            return 0;
        }
        let removed = self.guarded("delete", backend.delete(&keys)).await.unwrap_or(0);
        info!("ResultCache: invalidated {} entries for subject {}", removed, subject_id);
        removed
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use futures::future::BoxFuture;

    /// Memory backend that counts writes, or fails every call when `reachable` is false.
    pub struct CountingBackend {
        inner: MemoryCacheBackend,
        reachable: bool,
        pub writes: AtomicUsize,
        pub reads: AtomicUsize,
    }

    impl CountingBackend {
        pub fn new(reachable: bool) -> Arc<Self> {
            Arc::new(Self {
                inner: MemoryCacheBackend::new(64),
                reachable,
                writes: AtomicUsize::new(0),
                reads: AtomicUsize::new(0),
            })
        }

        pub fn writes(&self) -> usize {
            self.writes.load(Ordering::SeqCst)
        }

        fn check(&self) -> Result<()> {
            if self.reachable {
                Ok(())
            } else {
                Err(anyhow::anyhow!("connection refused"))
            }
        }
    }

    impl CacheBackend for CountingBackend {
        fn name(&self) -> &'static str {
            "counting"
        }

        fn ping(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(async move { self.check() })
        }

        fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
            Box::pin(async move {
                self.check()?;
                self.reads.fetch_add(1, Ordering::SeqCst);
                self.inner.get(key).await
            })
        }

        fn setex<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
            Box::pin(async move {
                self.check()?;
                self.writes.fetch_add(1, Ordering::SeqCst);
                self.inner.setex(key, value, ttl).await
            })
        }

        fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<usize>> {
            Box::pin(async move {
                self.check()?;
                self.inner.delete(keys).await
            })
        }

        fn scan_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
            Box::pin(async move {
                self.check()?;
                self.inner.scan_prefix(prefix).await
            })
        }
    }

    /// Never answers; every call runs into the cache timeout.
    pub struct HangingBackend;

    impl CacheBackend for HangingBackend {
        fn name(&self) -> &'static str {
            "hanging"
        }

        fn ping(&self) -> BoxFuture<'_, Result<()>> {
            Box::pin(futures::future::pending())
        }

        fn get<'a>(&'a self, _key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
            Box::pin(futures::future::pending())
        }

        fn setex<'a>(&'a self, _key: &'a str, _value: String, _ttl: Duration) -> BoxFuture<'a, Result<()>> {
            Box::pin(futures::future::pending())
        }

        fn delete<'a>(&'a self, _keys: &'a [String]) -> BoxFuture<'a, Result<usize>> {
            Box::pin(futures::future::pending())
        }

        fn scan_prefix<'a>(&'a self, _prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
            Box::pin(futures::future::pending())
        }
    }
}
