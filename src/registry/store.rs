// src/registry/store.rs
use log::debug;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use crate::registry::artifact::{ArtifactError, ModelArtifact};
use crate::utils::constants::ARTIFACT_EXTENSION;

/// Where fitted artifacts live. Both operations may fail; the registry treats any
/// failure as absence.
pub trait ArtifactStore: Send + Sync {
    fn list_names(&self) -> Result<Vec<String>, ArtifactError>;
    fn load(&self, name: &str) -> Result<ModelArtifact, ArtifactError>;
}

/// A directory of `<name>.json` artifacts.
#[derive(Debug, Clone)]
pub struct FsArtifactStore {
    dir: PathBuf,
}

impl FsArtifactStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path_for(&self, name: &str) -> Option<PathBuf> {
        // names are plain identifiers; anything path-like is treated as missing
        if name.is_empty() || name.contains(['/', '\\']) || name.contains("..") {
            return None;
        }
        Some(self.dir.join(format!("{}.{}", name, ARTIFACT_EXTENSION)))
    }
}

impl ArtifactStore for FsArtifactStore {
    fn list_names(&self) -> Result<Vec<String>, ArtifactError> {
        let mut names = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ARTIFACT_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                names.push(stem.to_string());
            }
        }
        names.sort();
        Ok(names)
    }

    fn load(&self, name: &str) -> Result<ModelArtifact, ArtifactError> {
        let path = self
            .path_for(name)
            .ok_or_else(|| ArtifactError::NotFound(name.to_string()))?;
        debug!("Reading artifact '{}' from {}", name, path.display());
        let raw = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ArtifactError::NotFound(name.to_string()),
            _ => ArtifactError::Io(e),
        })?;
        ModelArtifact::from_json(&raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_list_only_json_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("relapse_risk.json"), "{}").unwrap();
        fs::write(dir.path().join("churn_risk.json"), "{}").unwrap();
        fs::write(dir.path().join("README.md"), "notes").unwrap();

        let store = FsArtifactStore::new(dir.path());
        assert_eq!(store.list_names().unwrap(), vec!["churn_risk", "relapse_risk"]);
    }

    #[test]
    fn test_missing_directory_is_an_error() {
        let store = FsArtifactStore::new("/definitely/not/a/model/dir");
        assert!(store.list_names().is_err());
        assert!(matches!(store.load("mood_state"), Err(ArtifactError::NotFound(_))));
    }

    #[test]
    fn test_path_like_names_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsArtifactStore::new(dir.path());
        assert!(matches!(store.load("../secrets"), Err(ArtifactError::NotFound(_))));
        assert!(matches!(store.load(""), Err(ArtifactError::NotFound(_))));
    }
}
