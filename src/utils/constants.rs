// src/utils/constants.rs

/// Version marker carried by every heuristic result's methodology tag.
pub const HEURISTIC_VERSION: &str = "v1";

pub const INSUFFICIENT_DATA_LABEL: &str = "insufficient data";
pub const FAILED_LABEL: &str = "prediction failed";

/// Artifact files in the model directory are `<name>.json`.
pub const ARTIFACT_EXTENSION: &str = "json";

/// Cache hit/miss statistics are logged every this many lookups.
pub const CACHE_STATS_LOG_INTERVAL: usize = 100;
