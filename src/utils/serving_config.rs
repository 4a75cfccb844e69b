// src/utils/serving_config.rs
use anyhow::{bail, Result};
use log::{info, warn};
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Which store backs the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheBackendKind {
    Postgres,
    Memory,
    Disabled,
}

impl CacheBackendKind {
    fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "postgres" | "pg" => Some(CacheBackendKind::Postgres),
            "memory" | "lru" => Some(CacheBackendKind::Memory),
            "none" | "off" | "disabled" => Some(CacheBackendKind::Disabled),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CacheBackendKind::Postgres => "postgres",
            CacheBackendKind::Memory => "memory",
            CacheBackendKind::Disabled => "disabled",
        }
    }

    /// Whether entries written by one process are visible to another.
    pub fn is_shared(&self) -> bool {
        matches!(self, CacheBackendKind::Postgres)
    }
}

#[derive(Debug, Clone)]
pub struct ServingConfig {
    /// Directory holding `<name>.json` model artifacts
    pub model_dir: PathBuf,
    pub cache_backend: CacheBackendKind,
    /// Lifetime of a cached prediction bundle
    pub cache_ttl: Duration,
    /// Upper bound on any single cache backend round trip
    pub cache_timeout: Duration,
    pub cache_key_prefix: String,
    /// Capacity of the in-process cache backend
    pub cache_memory_capacity: usize,
    /// How many recent observations are fetched per subject
    pub history_limit: usize,
    pub max_window_days: u32,
    pub explain_enabled: bool,
    pub explain_top_n: usize,
}

impl Default for ServingConfig {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from("models"),
            cache_backend: CacheBackendKind::Memory,
            cache_ttl: Duration::from_secs(300),
            cache_timeout: Duration::from_millis(2000),
            cache_key_prefix: "predictions".to_string(),
            cache_memory_capacity: 10_000,
            history_limit: 30,
            max_window_days: 90,
            explain_enabled: true,
            explain_top_n: 5,
        }
    }
}

impl ServingConfig {
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let cache_backend = match env::var("CACHE_BACKEND") {
            Ok(raw) => CacheBackendKind::parse(&raw).unwrap_or_else(|| {
                warn!("Unrecognised CACHE_BACKEND '{}', falling back to memory", raw);
                CacheBackendKind::Memory
            }),
            Err(_) => defaults.cache_backend,
        };

        Self {
            model_dir: env::var("MODEL_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.model_dir),
            cache_backend,
            cache_ttl: Duration::from_secs(
                env::var("CACHE_TTL_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.cache_ttl.as_secs()),
            ),
            cache_timeout: Duration::from_millis(
                env::var("CACHE_TIMEOUT_MS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(defaults.cache_timeout.as_millis() as u64),
            ),
            cache_key_prefix: env::var("CACHE_KEY_PREFIX").unwrap_or(defaults.cache_key_prefix),
            cache_memory_capacity: env::var("CACHE_MEMORY_CAPACITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.cache_memory_capacity),
            history_limit: env::var("HISTORY_LIMIT")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.history_limit),
            max_window_days: env::var("MAX_WINDOW_DAYS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_window_days),
            explain_enabled: env::var("EXPLAIN_ENABLED")
                .unwrap_or_else(|_| "true".to_string())
                .parse::<bool>()
                .unwrap_or(true),
            explain_top_n: env::var("EXPLAIN_TOP_N")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.explain_top_n),
        }
    }

    /// Rejects settings that would make the whole process unusable.
    pub fn validate(&self) -> Result<()> {
        if self.model_dir.exists() && !self.model_dir.is_dir() {
            bail!(
                "MODEL_DIR '{}' exists but is not a directory",
                self.model_dir.display()
            );
        }
        if self.cache_ttl.is_zero() {
            bail!("CACHE_TTL_SECS must be greater than zero");
        }
        if self.history_limit == 0 {
            bail!("HISTORY_LIMIT must be greater than zero");
        }
        if self.max_window_days == 0 {
            bail!("MAX_WINDOW_DAYS must be greater than zero");
        }
        Ok(())
    }

    pub fn log_config(&self) {
        info!("Model directory: {}", self.model_dir.display());
        if !self.model_dir.exists() {
            warn!("   Model directory does not exist; every type will use its heuristic scorer");
        }
        info!(
            "Result cache: backend={}, ttl={}s, timeout={}ms, prefix='{}'",
            self.cache_backend.as_str(),
            self.cache_ttl.as_secs(),
            self.cache_timeout.as_millis(),
            self.cache_key_prefix
        );
        info!(
            "Observations: history_limit={}, max_window_days={}",
            self.history_limit, self.max_window_days
        );
        if self.explain_enabled {
            info!("Explanations ENABLED (top {} features)", self.explain_top_n);
        } else {
            info!("Explanations DISABLED");
        }
    }
}
