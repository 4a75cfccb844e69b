// src/cache/backend.rs
use anyhow::Result;
use futures::future::BoxFuture;
use std::time::Duration;

/// Key/value store with expiry, as seen by the result cache.
///
/// Every call may fail or hang; `ResultCache` bounds each one with a timeout and
/// treats any failure as a miss.
pub trait CacheBackend: Send + Sync {
    /// Short name for logs.
    fn name(&self) -> &'static str;

    /// Confirms the store is reachable and ready for use.
    fn ping(&self) -> BoxFuture<'_, Result<()>>;

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>>;

    /// Stores `value` under `key`, replacing any previous value, for `ttl`.
    fn setex<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>>;

    /// Removes `keys`, returning how many existed.
    fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<usize>>;

    /// Live keys starting with `prefix`.
    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>>>;
}
