// src/registry/model_registry.rs
use log::{debug, info, warn};
use std::collections::{HashMap, HashSet};
use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use crate::registry::artifact::{ArtifactError, ModelArtifact};
use crate::registry::store::{ArtifactStore, FsArtifactStore};

/// A loaded, immutable model. Owned by the registry for the life of the process.
#[derive(Debug)]
pub struct LoadedModel {
    pub name: String,
    pub artifact: ModelArtifact,
}

impl LoadedModel {
    pub fn version(&self) -> &str {
        &self.artifact.version
    }
}

pub type ModelHandle = Arc<LoadedModel>;

/// Lazily loads named artifacts and keeps them for the rest of the process.
///
/// Already-loaded names are served from a read lock. First loads go through a
/// single load lock with a second check inside it, so concurrent first requests
/// for the same name load the artifact once. Failed loads are remembered the same
/// way until the next `initialize`, so a missing artifact costs one store read.
pub struct ModelRegistry {
    store: Arc<dyn ArtifactStore>,
    loaded: RwLock<HashMap<String, ModelHandle>>,
    unavailable: RwLock<HashSet<String>>,
    load_lock: Mutex<()>,
    available: RwLock<Vec<String>>,
}

impl ModelRegistry {
    pub fn new(store: Arc<dyn ArtifactStore>) -> Self {
        Self {
            store,
            loaded: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(HashSet::new()),
            load_lock: Mutex::new(()),
            available: RwLock::new(Vec::new()),
        }
    }

    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FsArtifactStore::new(dir)))
    }

    /// Lists the store so availability shows up in the logs, and forgets earlier load
    /// failures so newly deployed artifacts are picked up. Nothing is loaded.
    /// Returns how many artifacts were found.
    pub fn initialize(&self) -> usize {
        self.unavailable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        let names = match self.store.list_names() {
            Ok(names) => names,
            Err(e) => {
                warn!(
                    "ModelRegistry: could not list artifacts ({}). All prediction types will use heuristics until artifacts appear.",
                    e
                );
                Vec::new()
            }
        };
        if names.is_empty() {
            info!("ModelRegistry initialized: no model artifacts available");
        } else {
            info!(
                "ModelRegistry initialized: {} artifact(s) available: {}",
                names.len(),
                names.join(", ")
            );
        }
        let count = names.len();
        *self.available.write().unwrap_or_else(PoisonError::into_inner) = names;
        count
    }

    /// `Some(None)` when `name` is known to be unavailable.
    fn lookup(&self, name: &str) -> Option<Option<ModelHandle>> {
        if let Some(handle) = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
        {
            return Some(Some(handle.clone()));
        }
        self.unavailable
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
            .then_some(None)
    }

    /// Returns the model for `name`, loading it on first use. Any load failure is
    /// logged and reported as absence.
    pub fn get(&self, name: &str) -> Option<ModelHandle> {
        if let Some(known) = self.lookup(name) {
            return known;
        }

        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(known) = self.lookup(name) {
            return known;
        }

        match self.store.load(name) {
            Ok(artifact) => {
                if artifact.name != name {
                    debug!(
                        "Artifact stored as '{}' declares name '{}'",
                        name, artifact.name
                    );
                }
                info!(
                    "ModelRegistry: loaded '{}' (version {}, {} features)",
                    name,
                    artifact.version,
                    artifact.feature_count()
                );
                let handle = Arc::new(LoadedModel {
                    name: name.to_string(),
                    artifact,
                });
                self.loaded
                    .write()
                    .unwrap_or_else(PoisonError::into_inner)
                    .insert(name.to_string(), handle.clone());
                Some(handle)
            }
            Err(e) => {
                self.report_failure(name, &e);
                None
            }
        }
    }

    fn report_failure(&self, name: &str, error: &ArtifactError) {
        self.unavailable
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(name.to_string());
        match error {
            ArtifactError::NotFound(_) => {
                info!("ModelRegistry: no artifact for '{}', heuristic fallback will be used", name)
            }
            _ => warn!("ModelRegistry: failed to load '{}': {}", name, error),
        }
    }

    /// Names of loaded models, sorted. Never triggers a load.
    pub fn list(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .loaded
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }

    /// Number of loaded models. Never triggers a load.
    pub fn count(&self) -> usize {
        self.loaded.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Artifact names seen by the last `initialize` scan.
    pub fn available(&self) -> Vec<String> {
        self.available
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}
