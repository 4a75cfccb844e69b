// src/orchestrator/mod.rs
pub mod observation_source;
pub mod prediction_orchestrator;

pub use observation_source::{MemoryObservationSource, ObservationSource, PgObservationSource};
pub use prediction_orchestrator::PredictionOrchestrator;
