// src/cache/mod.rs
//! Best-effort storage of finished prediction bundles.
//!
//! The backing store is optional. When it cannot be reached the cache turns itself
//! off and every lookup is a miss, so callers never see a cache error.

pub mod backend;
pub mod memory_backend;
pub mod postgres_backend;
pub mod result_cache;

pub use backend::CacheBackend;
pub use memory_backend::MemoryCacheBackend;
pub use postgres_backend::PostgresCacheBackend;
pub use result_cache::{cache_key, CachedBundle, ResultCache};
