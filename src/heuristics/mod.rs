// src/heuristics/mod.rs
//! Closed-form scorers used whenever no trained model is available for a type.
//!
//! Every scorer reads a small named subset of fields, fills in documented defaults
//! for optional ones, and refuses outright when its critical fields are absent.

mod behavioral;
mod clinical;
mod mood;

use crate::features::HistorySummary;
use crate::models::{Methodology, ObservationRecord, PredictionResult, PredictionType};

/// Everything a scorer may look at for one subject.
pub struct HeuristicContext<'a> {
    pub current: &'a ObservationRecord,
    /// Older observations, most recent first
    pub history: &'a [ObservationRecord],
    pub summary: &'a HistorySummary,
    pub window_days: u32,
}

impl<'a> HeuristicContext<'a> {
    /// Current value of `name`, or `default` when absent or unreadable.
    pub fn value(&self, name: &str, default: f64) -> f64 {
        self.current.get_f64(name).unwrap_or(default)
    }

    pub fn has(&self, name: &str) -> bool {
        self.current.get_f64(name).is_some()
    }

    pub fn has_any_record_with(&self, name: &str) -> bool {
        self.has(name) || self.history.iter().any(|r| r.get_f64(name).is_some())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct HeuristicScore {
    pub probability: f64,
    /// Set by multi-class scorers; binary types derive their label from the band.
    pub label: Option<String>,
}

impl HeuristicScore {
    fn binary(probability: f64) -> Self {
        Self {
            probability: clamp01(probability),
            label: None,
        }
    }

    fn labelled(probability: f64, label: &str) -> Self {
        Self {
            probability: clamp01(probability),
            label: Some(label.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum HeuristicOutcome {
    Scored(HeuristicScore),
    Insufficient { missing: Vec<&'static str> },
}

pub type HeuristicFn = fn(&HeuristicContext<'_>) -> HeuristicOutcome;

pub fn scorer_for(prediction_type: PredictionType) -> HeuristicFn {
    match prediction_type {
        PredictionType::MoodState => mood::mood_state,
        PredictionType::StateTransition => mood::state_transition,
        PredictionType::RelapseRisk => clinical::relapse_risk,
        PredictionType::SuicidalityRisk => clinical::suicidality_risk,
        PredictionType::CrisisRisk3d => clinical::crisis_risk_3d,
        PredictionType::CrisisRisk7d => clinical::crisis_risk_7d,
        PredictionType::ImpulsiveBehaviorRisk => clinical::impulsive_behavior_risk,
        PredictionType::MedicationAdherenceRisk => behavioral::medication_adherence_risk,
        PredictionType::SleepDisturbanceRisk => behavioral::sleep_disturbance_risk,
        PredictionType::ChurnRisk => behavioral::churn_risk,
    }
}

/// Runs the scorer for `prediction_type` and turns its outcome into a tagged result.
pub fn score(prediction_type: PredictionType, ctx: &HeuristicContext<'_>) -> PredictionResult {
    into_result(prediction_type, scorer_for(prediction_type)(ctx))
}

pub fn into_result(prediction_type: PredictionType, outcome: HeuristicOutcome) -> PredictionResult {
    match outcome {
        HeuristicOutcome::Scored(score) => {
            let level = prediction_type.heuristic_bands().classify(score.probability);
            let label = score
                .label
                .unwrap_or_else(|| prediction_type.band_label(level));
            PredictionResult::new(
                prediction_type,
                label,
                score.probability,
                level,
                prediction_type.should_alert(level),
                Methodology::heuristic(),
            )
        }
        HeuristicOutcome::Insufficient { missing } => {
            PredictionResult::insufficient_data(prediction_type, Methodology::heuristic())
                .with_caveat(format!("Missing required field(s): {}.", missing.join(", ")))
        }
    }
}

pub(crate) fn clamp01(v: f64) -> f64 {
    if v.is_nan() {
        0.0
    } else {
        v.clamp(0.0, 1.0)
    }
}

/// Re-expresses a probability over `base_days` as one over `window_days`,
/// assuming a constant hazard.
pub(crate) fn rescale_horizon(p: f64, base_days: f64, window_days: u32) -> f64 {
    let p = clamp01(p);
    if p >= 1.0 {
        return 1.0;
    }
    1.0 - (1.0 - p).powf(window_days as f64 / base_days)
}
