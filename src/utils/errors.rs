// src/utils/errors.rs
use thiserror::Error;

/// Errors a caller can see from `PredictionOrchestrator::predict`. Everything that is
/// not a malformed request degrades to a well-formed response instead.
#[derive(Error, Debug)]
pub enum PredictionError {
    #[error("Unknown prediction type '{0}'")]
    UnknownPredictionType(String),

    #[error("Invalid window of {window_days} days; expected 1..={max}")]
    InvalidWindow { window_days: u32, max: u32 },

    #[error("No prediction types requested")]
    EmptyRequest,

    #[error("Failed to read observations: {0:#}")]
    ObservationSource(anyhow::Error),
}
