// src/cache/postgres_backend.rs
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::{debug, info};
use std::time::Duration;

use crate::cache::backend::CacheBackend;
use crate::utils::db_connect::PgPool;

const CREATE_TABLE_SQL: &str = "
    CREATE UNLOGGED TABLE IF NOT EXISTS prediction_cache (
        cache_key TEXT PRIMARY KEY,
        payload TEXT NOT NULL,
        expires_at TIMESTAMPTZ NOT NULL
    )";

/// Shared backend on an UNLOGGED Postgres table. Entries past `expires_at` are
/// invisible to reads and are swept whenever a new entry is written.
pub struct PostgresCacheBackend {
    pool: PgPool,
}

impl PostgresCacheBackend {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl CacheBackend for PostgresCacheBackend {
    fn name(&self) -> &'static str {
        "postgres"
    }

    /// Also creates the cache table on first contact.
    fn ping(&self) -> BoxFuture<'_, Result<()>> {
        Box::pin(async move {
            let conn = self
                .pool
                .get()
                .await
                .context("Failed to get connection for cache ping")?;
            conn.batch_execute(CREATE_TABLE_SQL)
                .await
                .context("Failed to ensure prediction_cache table")?;
            info!("PostgresCacheBackend ready (prediction_cache table ensured)");
            Ok(())
        })
    }

    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, Result<Option<String>>> {
        Box::pin(async move {
            let conn = self.pool.get().await.context("Failed to get connection for cache get")?;
            let row = conn
                .query_opt(
                    "SELECT payload FROM prediction_cache WHERE cache_key = $1 AND expires_at > NOW()",
                    &[&key],
                )
                .await
                .context("Cache lookup failed")?;
            Ok(row.map(|r| r.get::<_, String>(0)))
        })
    }

    fn setex<'a>(&'a self, key: &'a str, value: String, ttl: Duration) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let conn = self.pool.get().await.context("Failed to get connection for cache set")?;
            let ttl_secs = ttl.as_secs_f64();
            conn.execute(
                "INSERT INTO prediction_cache (cache_key, payload, expires_at)
                 VALUES ($1, $2, NOW() + make_interval(secs => $3))
                 ON CONFLICT (cache_key) DO UPDATE
                 SET payload = EXCLUDED.payload, expires_at = EXCLUDED.expires_at",
                &[&key, &value, &ttl_secs],
            )
            .await
            .context("Cache write failed")?;

            let swept = conn
                .execute("DELETE FROM prediction_cache WHERE expires_at <= NOW()", &[])
                .await
                .context("Cache sweep failed")?;
            if swept > 0 {
                debug!("PostgresCacheBackend swept {} expired entries", swept);
            }
            Ok(())
        })
    }

    fn delete<'a>(&'a self, keys: &'a [String]) -> BoxFuture<'a, Result<usize>> {
        Box::pin(async move {
            if keys.is_empty() {
                return Ok(0);
            }
            let conn = self.pool.get().await.context("Failed to get connection for cache delete")?;
            let removed = conn
                .execute(
                    "DELETE FROM prediction_cache WHERE cache_key = ANY($1) AND expires_at > NOW()",
                    &[&keys],
                )
                .await
                .context("Cache delete failed")?;
            Ok(removed as usize)
        })
    }

    fn scan_prefix<'a>(&'a self, prefix: &'a str) -> BoxFuture<'a, Result<Vec<String>>> {
        Box::pin(async move {
            let conn = self.pool.get().await.context("Failed to get connection for cache scan")?;
            let rows = conn
                .query(
                    "SELECT cache_key FROM prediction_cache
                     WHERE left(cache_key, length($1)) = $1 AND expires_at > NOW()",
                    &[&prefix],
                )
                .await
                .context("Cache scan failed")?;
            Ok(rows.iter().map(|r| r.get::<_, String>(0)).collect())
        })
    }
}
