// src/heuristics/mood.rs
use super::{clamp01, HeuristicContext, HeuristicOutcome, HeuristicScore};
use crate::models::PredictionType;

const DEFAULT_ACTIVATION: f64 = 5.0;

/// Mood and activation are on a 0-10 scale; a combined score above the high band
/// in either direction is a clear departure from baseline.
///
/// Critical: `mood`. Defaults: `activation` = 5.0.
pub(super) fn mood_state(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    if !ctx.has("mood") {
        return HeuristicOutcome::Insufficient { missing: vec!["mood"] };
    }
    let mood = ctx.value("mood", 5.0);
    let activation = ctx.value("activation", DEFAULT_ACTIVATION);

    let elevation = clamp01((mood + activation - 8.0) / 10.0);
    let depression = clamp01(((10.0 - mood) + (10.0 - activation) - 8.0) / 10.0);
    let probability = elevation.max(depression);

    let label = if probability < PredictionType::MoodState.heuristic_bands().moderate {
        "stable"
    } else if elevation >= depression {
        "elevated"
    } else {
        "depressed"
    };
    HeuristicOutcome::Scored(HeuristicScore::labelled(probability, label))
}

/// Direction and strength of the recent mood trend.
///
/// Critical: at least two `mood` readings across current and history.
pub(super) fn state_transition(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    let slope = match ctx.summary.mood_slope {
        Some(slope) if ctx.has("mood") => slope,
        _ => return HeuristicOutcome::Insufficient { missing: vec!["mood"] },
    };
    let volatility = clamp01(ctx.summary.mood_std.unwrap_or(0.0) / 3.0);
    let probability = clamp01(slope.abs() / 2.0 + 0.1 * volatility);

    let label = if probability < PredictionType::StateTransition.heuristic_bands().moderate {
        "stable"
    } else if slope < 0.0 {
        "toward_depressive"
    } else {
        "toward_elevated"
    };
    HeuristicOutcome::Scored(HeuristicScore::labelled(probability, label))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{probability, Fixture};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_neutral_mood_is_stable() {
        let f = Fixture::new(json!({"mood": 5, "activation": 5}), vec![]);
        match mood_state(&f.ctx(7)) {
            HeuristicOutcome::Scored(s) => {
                assert!((s.probability - 0.2).abs() < 1e-12);
                assert_eq!(s.label.as_deref(), Some("stable"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_low_mood_is_depressed() {
        let f = Fixture::new(json!({"mood": 1, "activation": 2}), vec![]);
        match mood_state(&f.ctx(7)) {
            HeuristicOutcome::Scored(s) => {
                assert!((s.probability - 0.9).abs() < 1e-12);
                assert_eq!(s.label.as_deref(), Some("depressed"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_activation_defaults_when_missing() {
        let f = Fixture::new(json!({"mood": 9}), vec![]);
        // (9 + 5 - 8) / 10
        assert!((probability(mood_state(&f.ctx(7))) - 0.6).abs() < 1e-12);
    }

    #[test]
    fn test_transition_needs_two_readings() {
        let f = Fixture::new(json!({"mood": 4}), vec![]);
        assert_eq!(
            state_transition(&f.ctx(7)),
            HeuristicOutcome::Insufficient { missing: vec!["mood"] }
        );

        let f = Fixture::new(json!({"activation": 4}), vec![json!({"mood": 3}), json!({"mood": 6})]);
        assert!(matches!(state_transition(&f.ctx(7)), HeuristicOutcome::Insufficient { .. }));
    }

    #[test]
    fn test_falling_mood_trends_depressive() {
        let f = Fixture::new(json!({"mood": 2}), vec![json!({"mood": 4}), json!({"mood": 6})]);
        match state_transition(&f.ctx(7)) {
            HeuristicOutcome::Scored(s) => {
                assert!(s.probability >= 0.7);
                assert_eq!(s.label.as_deref(), Some("toward_depressive"));
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
