// src/registry/mod.rs
//! Model registry: discovers fitted artifacts in a store and loads them on first use.

pub mod artifact;
pub mod model_registry;
pub mod store;

pub use artifact::{ArtifactError, Estimator, ModelArtifact, Stump};
pub use model_registry::{LoadedModel, ModelHandle, ModelRegistry};
pub use store::{ArtifactStore, FsArtifactStore};
