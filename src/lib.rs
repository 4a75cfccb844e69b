// src/lib.rs
pub mod cache;
pub mod explain;
pub mod features;
pub mod heuristics;
pub mod models;
pub mod orchestrator;
pub mod registry;
pub mod utils;

pub use models::prediction_result::{Methodology, PredictionResponse, PredictionResult, RiskLevel};
pub use models::prediction_type::PredictionType;
pub use orchestrator::PredictionOrchestrator;
pub use registry::ModelRegistry;
