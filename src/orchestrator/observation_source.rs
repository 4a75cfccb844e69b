// src/orchestrator/observation_source.rs
use anyhow::{Context, Result};
use futures::future::BoxFuture;
use log::{debug, info};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::path::Path;
use std::sync::{PoisonError, RwLock};

use crate::models::ObservationRecord;
use crate::utils::db_connect::PgPool;

/// Where a subject's observations come from.
pub trait ObservationSource: Send + Sync {
    /// Up to `limit` records for `subject_id`, most recent first. An unknown subject
    /// yields an empty list, not an error.
    fn fetch_recent<'a>(
        &'a self,
        subject_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ObservationRecord>>>;
}

/// Reads `observations(subject_id TEXT, recorded_at TIMESTAMPTZ, payload JSONB)`.
pub struct PgObservationSource {
    pool: PgPool,
}

impl PgObservationSource {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Deletes every stored observation for `subject_id`. Cached predictions for the
    /// subject must be invalidated alongside.
    pub async fn erase(&self, subject_id: &str) -> Result<u64> {
        let conn = self
            .pool
            .get()
            .await
            .context("Failed to get DB connection for observation erase")?;
        let removed = conn
            .execute("DELETE FROM observations WHERE subject_id = $1", &[&subject_id])
            .await
            .context(format!("Failed to erase observations for subject {}", subject_id))?;
        info!("Erased {} observations for subject {}", removed, subject_id);
        Ok(removed)
    }
}

impl ObservationSource for PgObservationSource {
    fn fetch_recent<'a>(
        &'a self,
        subject_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ObservationRecord>>> {
        Box::pin(async move {
            let conn = self
                .pool
                .get()
                .await
                .context("Failed to get DB connection for observations")?;
            let rows = conn
                .query(
                    "SELECT payload FROM observations
                     WHERE subject_id = $1
                     ORDER BY recorded_at DESC
                     LIMIT $2",
                    &[&subject_id, &(limit as i64)],
                )
                .await
                .context(format!("Failed to query observations for subject {}", subject_id))?;

            let records: Vec<ObservationRecord> = rows
                .iter()
                .map(|row| ObservationRecord::from_json(row.get::<_, JsonValue>("payload")))
                .collect();
            debug!("Fetched {} observations for subject {}", records.len(), subject_id);
            Ok(records)
        })
    }
}

/// In-process source keyed by subject. Records are kept most recent first.
#[derive(Default)]
pub struct MemoryObservationSource {
    subjects: RwLock<HashMap<String, Vec<ObservationRecord>>>,
}

impl MemoryObservationSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads `{ "<subject>": [ {..most recent..}, {..}, ... ], ... }`.
    pub fn from_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .context(format!("Failed to read observations file {}", path.display()))?;
        let parsed: HashMap<String, Vec<ObservationRecord>> = serde_json::from_str(&raw)
            .context(format!("Failed to parse observations file {}", path.display()))?;
        info!(
            "Loaded observations for {} subjects from {}",
            parsed.len(),
            path.display()
        );
        Ok(Self {
            subjects: RwLock::new(parsed),
        })
    }

    /// Replaces everything held for `subject_id`.
    pub fn insert(&self, subject_id: impl Into<String>, records: Vec<ObservationRecord>) {
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(subject_id.into(), records);
    }

    /// Adds `record` as the subject's newest observation.
    pub fn record(&self, subject_id: &str, record: ObservationRecord) {
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(subject_id.to_string())
            .or_default()
            .insert(0, record);
    }

    /// Drops the subject's observations, returning how many there were.
    pub fn erase(&self, subject_id: &str) -> usize {
        self.subjects
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(subject_id)
            .map_or(0, |records| records.len())
    }

    pub fn subjects(&self) -> Vec<String> {
        let mut subjects: Vec<String> = self
            .subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        subjects.sort();
        subjects
    }
}

impl ObservationSource for MemoryObservationSource {
    fn fetch_recent<'a>(
        &'a self,
        subject_id: &'a str,
        limit: usize,
    ) -> BoxFuture<'a, Result<Vec<ObservationRecord>>> {
        let records: Vec<ObservationRecord> = self
            .subjects
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(subject_id)
            .map(|records| records.iter().take(limit).cloned().collect())
            .unwrap_or_default();
        Box::pin(async move { Ok(records) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_memory_source_limits_and_orders() {
        let source = MemoryObservationSource::new();
        source.record("s", ObservationRecord::from_json(json!({"mood": 3})));
        source.record("s", ObservationRecord::from_json(json!({"mood": 4})));
        source.record("s", ObservationRecord::from_json(json!({"mood": 5})));

        let recent = source.fetch_recent("s", 2).await.unwrap();
        assert_eq!(recent.len(), 2);
        assert_eq!(recent[0].get_f64("mood"), Some(5.0));
        assert_eq!(recent[1].get_f64("mood"), Some(4.0));
        assert!(source.fetch_recent("unknown", 10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_erase_removes_subject() {
        let source = MemoryObservationSource::new();
        source.insert("s", vec![ObservationRecord::from_json(json!({"mood": 3})); 4]);
        assert_eq!(source.erase("s"), 4);
        assert_eq!(source.erase("s"), 0);
        assert!(source.fetch_recent("s", 10).await.unwrap().is_empty());
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("observations.json");
        std::fs::write(
            &path,
            json!({"a": [{"mood": 6}, {"mood": 4}], "b": []}).to_string(),
        )
        .unwrap();
        let source = MemoryObservationSource::from_file(&path).unwrap();
        assert_eq!(source.subjects(), vec!["a", "b"]);

        std::fs::write(&path, "[1, 2").unwrap();
        assert!(MemoryObservationSource::from_file(&path).is_err());
    }
}
