// src/features/catalog.rs
use once_cell::sync::Lazy;
use std::collections::HashMap;

use crate::features::history::{ADHERENCE_RATE, ENTRY_COUNT, MOOD_MEAN, MOOD_SLOPE, MOOD_STD};
use crate::features::schema::{FeatureSchema, FieldSpec};
use crate::models::PredictionType;

const EPISODE_PHASES: &[&str] = &["depressive", "hypomanic", "manic", "mixed"];
const DIAGNOSES: &[&str] = &["bipolar_i", "bipolar_ii", "major_depression", "anxiety_disorder"];

fn episode_phase() -> FieldSpec {
    FieldSpec::categorical("episode_phase", "none", EPISODE_PHASES)
}

fn diagnosis() -> FieldSpec {
    FieldSpec::categorical("diagnosis", "unspecified", DIAGNOSES)
}

fn numeric(names: &[&str]) -> Vec<FieldSpec> {
    names.iter().map(|n| FieldSpec::numeric(n)).collect()
}

fn build(prediction_type: PredictionType) -> FeatureSchema {
    let mut fields = match prediction_type {
        PredictionType::MoodState => numeric(&["mood", "activation", "anxiety", "irritability", "sleep_hours", MOOD_MEAN, MOOD_STD]),
        PredictionType::RelapseRisk => numeric(&["mood", "sleep_hours", "stress", "medication_taken", MOOD_MEAN, MOOD_STD, MOOD_SLOPE, ADHERENCE_RATE]),
        PredictionType::SuicidalityRisk => numeric(&["suicidal_ideation", "hopelessness", "mood", "social_withdrawal", "substance_use", MOOD_SLOPE]),
        PredictionType::MedicationAdherenceRisk => numeric(&["medication_taken", ADHERENCE_RATE, "side_effects", "mood", ENTRY_COUNT]),
        PredictionType::SleepDisturbanceRisk => numeric(&["sleep_hours", "sleep_quality", "anxiety", "activation", "stress"]),
        PredictionType::CrisisRisk3d | PredictionType::CrisisRisk7d => numeric(&["mood", "anxiety", "suicidal_ideation", "sleep_hours", "substance_use", MOOD_MEAN, MOOD_SLOPE]),
        PredictionType::ImpulsiveBehaviorRisk => numeric(&["impulsivity", "activation", "irritability", "substance_use", "sleep_hours"]),
        PredictionType::StateTransition => numeric(&["mood", "activation", MOOD_MEAN, MOOD_STD, MOOD_SLOPE, ENTRY_COUNT]),
        PredictionType::ChurnRisk => numeric(&["days_since_last_entry", "entries_last_7d", ENTRY_COUNT]),
    };

    match prediction_type {
        PredictionType::MoodState | PredictionType::StateTransition | PredictionType::RelapseRisk => {
            fields.push(episode_phase());
            fields.push(diagnosis());
        }
        PredictionType::CrisisRisk3d | PredictionType::CrisisRisk7d | PredictionType::SuicidalityRisk => {
            fields.push(episode_phase());
        }
        _ => {}
    }

    FeatureSchema::from_specs(fields)
}

static SCHEMAS: Lazy<HashMap<PredictionType, FeatureSchema>> = Lazy::new(|| {
    PredictionType::ALL
        .iter()
        .map(|t| (*t, build(*t)))
        .collect()
});

/// The input schema a model artifact for `prediction_type` must be trained against.
pub fn schema_for(prediction_type: PredictionType) -> &'static FeatureSchema {
    &SCHEMAS[&prediction_type]
}
