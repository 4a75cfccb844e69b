// src/models/mod.rs
pub mod observation;
pub mod prediction_result;
pub mod prediction_type;

pub use observation::ObservationRecord;
pub use prediction_result::{
    Explanation, FeatureContribution, Methodology, PredictionResponse, PredictionResult,
    RiskLevel,
};
pub use prediction_type::{PredictionType, RiskBands};
