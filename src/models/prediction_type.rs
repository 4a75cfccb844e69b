// src/models/prediction_type.rs
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::models::prediction_result::RiskLevel;
use crate::utils::errors::PredictionError;

/// The closed set of predictions this service knows how to resolve.
/// Each variant maps to exactly one heuristic scorer and at most one model artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PredictionType {
    MoodState,
    RelapseRisk,
    SuicidalityRisk,
    MedicationAdherenceRisk,
    SleepDisturbanceRisk,
    CrisisRisk3d,
    CrisisRisk7d,
    ImpulsiveBehaviorRisk,
    StateTransition,
    ChurnRisk,
}

/// Cut-points splitting a probability into LOW / MODERATE / HIGH.
/// A probability sitting exactly on a cut-point belongs to the higher band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RiskBands {
    pub moderate: f64,
    pub high: f64,
}

impl RiskBands {
    pub const fn new(moderate: f64, high: f64) -> Self {
        Self { moderate, high }
    }

    pub fn classify(&self, probability: f64) -> RiskLevel {
        if probability >= self.high {
            RiskLevel::High
        } else if probability >= self.moderate {
            RiskLevel::Moderate
        } else {
            RiskLevel::Low
        }
    }
}

impl PredictionType {
    pub const ALL: [PredictionType; 10] = [
        PredictionType::MoodState,
        PredictionType::RelapseRisk,
        PredictionType::SuicidalityRisk,
        PredictionType::MedicationAdherenceRisk,
        PredictionType::SleepDisturbanceRisk,
        PredictionType::CrisisRisk3d,
        PredictionType::CrisisRisk7d,
        PredictionType::ImpulsiveBehaviorRisk,
        PredictionType::StateTransition,
        PredictionType::ChurnRisk,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PredictionType::MoodState => "mood_state",
            PredictionType::RelapseRisk => "relapse_risk",
            PredictionType::SuicidalityRisk => "suicidality_risk",
            PredictionType::MedicationAdherenceRisk => "medication_adherence_risk",
            PredictionType::SleepDisturbanceRisk => "sleep_disturbance_risk",
            PredictionType::CrisisRisk3d => "crisis_risk_3d",
            PredictionType::CrisisRisk7d => "crisis_risk_7d",
            PredictionType::ImpulsiveBehaviorRisk => "impulsive_behavior_risk",
            PredictionType::StateTransition => "state_transition",
            PredictionType::ChurnRisk => "churn_risk",
        }
    }

    /// Name of the artifact the registry is asked for. Artifacts are stored as `<name>.json`.
    pub fn model_name(&self) -> &'static str {
        self.as_str()
    }

    /// Multi-class types produce a label drawn from a fixed label set rather than a band name.
    pub fn is_multiclass(&self) -> bool {
        matches!(self, PredictionType::MoodState | PredictionType::StateTransition)
    }

    pub fn heuristic_bands(&self) -> RiskBands {
        match self {
            PredictionType::MoodState => RiskBands::new(0.4, 0.7),
            PredictionType::RelapseRisk => RiskBands::new(0.5, 0.75),
            PredictionType::SuicidalityRisk => RiskBands::new(0.3, 0.6),
            PredictionType::MedicationAdherenceRisk => RiskBands::new(0.3, 0.6),
            PredictionType::SleepDisturbanceRisk => RiskBands::new(0.35, 0.65),
            PredictionType::CrisisRisk3d => RiskBands::new(0.5, 0.8),
            PredictionType::CrisisRisk7d => RiskBands::new(0.45, 0.75),
            PredictionType::ImpulsiveBehaviorRisk => RiskBands::new(0.4, 0.65),
            PredictionType::StateTransition => RiskBands::new(0.5, 0.7),
            PredictionType::ChurnRisk => RiskBands::new(0.5, 0.8),
        }
    }

    // Model-backed cut-points are tuned separately from the heuristics and are not unified with them.
    pub fn model_bands(&self) -> RiskBands {
        match self {
            PredictionType::MoodState => RiskBands::new(0.5, 0.75),
            PredictionType::RelapseRisk => RiskBands::new(0.4, 0.7),
            PredictionType::SuicidalityRisk => RiskBands::new(0.3, 0.55),
            PredictionType::MedicationAdherenceRisk => RiskBands::new(0.35, 0.65),
            PredictionType::SleepDisturbanceRisk => RiskBands::new(0.4, 0.7),
            PredictionType::CrisisRisk3d => RiskBands::new(0.4, 0.7),
            PredictionType::CrisisRisk7d => RiskBands::new(0.4, 0.7),
            PredictionType::ImpulsiveBehaviorRisk => RiskBands::new(0.45, 0.7),
            PredictionType::StateTransition => RiskBands::new(0.5, 0.7),
            PredictionType::ChurnRisk => RiskBands::new(0.5, 0.75),
        }
    }

    pub fn should_alert(&self, level: RiskLevel) -> bool {
        match self {
            PredictionType::SuicidalityRisk => level >= RiskLevel::Moderate,
            _ => level == RiskLevel::High,
        }
    }

    /// Label used by binary types, where the label is derived from the band.
    pub fn band_label(&self, level: RiskLevel) -> String {
        let subject = match self {
            PredictionType::RelapseRisk => "relapse risk",
            PredictionType::SuicidalityRisk => "suicidality risk",
            PredictionType::MedicationAdherenceRisk => "non-adherence risk",
            PredictionType::SleepDisturbanceRisk => "sleep disturbance risk",
            PredictionType::CrisisRisk3d | PredictionType::CrisisRisk7d => "crisis risk",
            PredictionType::ImpulsiveBehaviorRisk => "impulsivity risk",
            PredictionType::ChurnRisk => "disengagement risk",
            PredictionType::MoodState | PredictionType::StateTransition => "deviation",
        };
        format!("{} {}", level.as_str().to_lowercase(), subject)
    }

    /// Free-text caveat always attached to this type, independent of methodology.
    pub fn standing_caveat(&self) -> Option<&'static str> {
        match self {
            PredictionType::SuicidalityRisk => Some(
                "Screening signal only, not a clinical assessment. If there is immediate danger contact local emergency services.",
            ),
            _ => None,
        }
    }
}

impl fmt::Display for PredictionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PredictionType {
    type Err = PredictionError;

    /// Accepts both `relapse_risk` and `relapse-risk` spellings, case-insensitively.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_lowercase().replace('-', "_");
        PredictionType::ALL
            .iter()
            .copied()
            .find(|t| t.as_str() == normalized)
            .ok_or_else(|| PredictionError::UnknownPredictionType(s.to_string()))
    }
}
