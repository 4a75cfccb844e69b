// src/heuristics/clinical.rs
use super::{clamp01, rescale_horizon, HeuristicContext, HeuristicOutcome, HeuristicScore};

/// Relapse scores describe a 30-day horizon before rescaling to the requested window.
const RELAPSE_BASE_HORIZON_DAYS: f64 = 30.0;
const CRISIS_3D_HORIZON_DAYS: f64 = 3.0;
const CRISIS_7D_HORIZON_DAYS: f64 = 7.0;

fn scale10(v: f64) -> f64 {
    clamp01(v / 10.0)
}

fn sleep_deviation(hours: f64) -> f64 {
    clamp01((hours - 7.5).abs() / 4.0)
}

/// Critical: `mood`. Defaults: `sleep_hours` 7.0, `stress` 5.0, adherence 1.0, mood spread 0.
pub(super) fn relapse_risk(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    if !ctx.has("mood") {
        return HeuristicOutcome::Insufficient { missing: vec!["mood"] };
    }
    let mood = ctx.value("mood", 5.0);
    let sleep = ctx.value("sleep_hours", 7.0);
    let stress = ctx.value("stress", 5.0);
    let adherence = ctx.summary.adherence_rate.unwrap_or(1.0);
    let volatility = clamp01(ctx.summary.mood_std.unwrap_or(0.0) / 3.0);

    let base = 0.35 * scale10(10.0 - mood)
        + 0.2 * sleep_deviation(sleep)
        + 0.25 * (1.0 - adherence)
        + 0.2 * scale10(stress)
        + 0.1 * volatility;

    let probability = rescale_horizon(base, RELAPSE_BASE_HORIZON_DAYS, ctx.window_days);
    HeuristicOutcome::Scored(HeuristicScore::binary(probability))
}

/// Critical: `suicidal_ideation` or `hopelessness`. Defaults: both 0, `mood` 5.0,
/// `social_withdrawal` 0, `substance_use` 0. Strong ideation (>= 7) is never scored
/// below 0.85.
pub(super) fn suicidality_risk(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    if !ctx.has("suicidal_ideation") && !ctx.has("hopelessness") {
        return HeuristicOutcome::Insufficient {
            missing: vec!["suicidal_ideation", "hopelessness"],
        };
    }
    let ideation = ctx.value("suicidal_ideation", 0.0);
    let hopelessness = ctx.value("hopelessness", 0.0);
    let mood = ctx.value("mood", 5.0);
    let withdrawal = ctx.value("social_withdrawal", 0.0);
    let substance = ctx.value("substance_use", 0.0);

    let mut probability = 0.5 * scale10(ideation)
        + 0.2 * scale10(hopelessness)
        + 0.15 * scale10(10.0 - mood)
        + 0.1 * scale10(withdrawal)
        + 0.05 * scale10(substance);
    if ctx.summary.mood_slope.is_some_and(|s| s <= -1.0) {
        probability += 0.05;
    }
    if ideation >= 7.0 {
        probability = probability.max(0.85);
    }
    HeuristicOutcome::Scored(HeuristicScore::binary(probability))
}

fn crisis_hazard(ctx: &HeuristicContext<'_>) -> Option<f64> {
    if !ctx.has("mood") {
        return None;
    }
    let mood = ctx.value("mood", 5.0);
    let anxiety = ctx.value("anxiety", 3.0);
    let ideation = ctx.value("suicidal_ideation", 0.0);
    let sleep = ctx.value("sleep_hours", 7.0);
    let substance = ctx.value("substance_use", 0.0);
    let decline = clamp01(-ctx.summary.mood_slope.unwrap_or(0.0) / 2.0);

    Some(clamp01(
        0.3 * scale10(10.0 - mood)
            + 0.2 * scale10(anxiety)
            + 0.3 * scale10(ideation)
            + 0.1 * sleep_deviation(sleep)
            + 0.1 * scale10(substance)
            + 0.1 * decline,
    ))
}

/// Critical: `mood`. Defaults: `anxiety` 3.0, `suicidal_ideation` 0, `sleep_hours` 7.0,
/// `substance_use` 0, no mood trend.
pub(super) fn crisis_risk_3d(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    match crisis_hazard(ctx) {
        Some(p) => HeuristicOutcome::Scored(HeuristicScore::binary(p)),
        None => HeuristicOutcome::Insufficient { missing: vec!["mood"] },
    }
}

/// Same inputs as the 3-day score, accumulated over seven days.
pub(super) fn crisis_risk_7d(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    match crisis_hazard(ctx) {
        Some(p3) => {
            let p7 = rescale_horizon(p3, CRISIS_3D_HORIZON_DAYS, CRISIS_7D_HORIZON_DAYS as u32);
            HeuristicOutcome::Scored(HeuristicScore::binary(p7))
        }
        None => HeuristicOutcome::Insufficient { missing: vec!["mood"] },
    }
}

/// Critical: `impulsivity` or `activation`. Defaults: `impulsivity` 3.0,
/// `activation` 5.0, `irritability` 3.0, `substance_use` 0, `sleep_hours` 7.0.
pub(super) fn impulsive_behavior_risk(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    if !ctx.has("impulsivity") && !ctx.has("activation") {
        return HeuristicOutcome::Insufficient {
            missing: vec!["impulsivity", "activation"],
        };
    }
    let impulsivity = ctx.value("impulsivity", 3.0);
    let activation = ctx.value("activation", 5.0);
    let irritability = ctx.value("irritability", 3.0);
    let substance = ctx.value("substance_use", 0.0);
    let sleep = ctx.value("sleep_hours", 7.0);

    let probability = 0.4 * scale10(impulsivity)
        + 0.25 * scale10(activation)
        + 0.15 * scale10(irritability)
        + 0.1 * scale10(substance)
        + 0.1 * clamp01((7.0 - sleep) / 4.0);
    HeuristicOutcome::Scored(HeuristicScore::binary(probability))
}

#[cfg(test)]
mod tests {
    use super::super::test_support::{probability, Fixture};
    use super::*;
    use serde_json::json;

    #[test]
    fn test_relapse_rescales_with_window() {
        let f = Fixture::new(json!({"mood": 3, "stress": 8, "sleep_hours": 4}), vec![]);
        let p30 = probability(relapse_risk(&f.ctx(30)));
        let p7 = probability(relapse_risk(&f.ctx(7)));
        let p90 = probability(relapse_risk(&f.ctx(90)));
        assert!(p7 < p30 && p30 < p90);
        // 0.35*0.7 + 0.2*0.875 + 0 + 0.2*0.8 + 0
        assert!((p30 - 0.58).abs() < 1e-12);
    }

    #[test]
    fn test_relapse_counts_missed_medication_history() {
        let adherent = Fixture::new(
            json!({"mood": 5, "medication_taken": true}),
            vec![json!({"medication_taken": true})],
        );
        let missed = Fixture::new(
            json!({"mood": 5, "medication_taken": false}),
            vec![json!({"medication_taken": false})],
        );
        let gap = probability(relapse_risk(&missed.ctx(30))) - probability(relapse_risk(&adherent.ctx(30)));
        assert!((gap - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_strong_ideation_floor() {
        let f = Fixture::new(json!({"suicidal_ideation": 7, "mood": 9}), vec![]);
        assert!((probability(suicidality_risk(&f.ctx(7))) - 0.85).abs() < 1e-12);
    }

    #[test]
    fn test_hopelessness_alone_is_enough_to_score() {
        let f = Fixture::new(json!({"hopelessness": 5}), vec![]);
        // 0.2*0.5 + 0.15*0.5
        assert!((probability(suicidality_risk(&f.ctx(7))) - 0.175).abs() < 1e-12);

        let f = Fixture::new(json!({"mood": 2}), vec![]);
        assert!(matches!(suicidality_risk(&f.ctx(7)), HeuristicOutcome::Insufficient { .. }));
    }

    #[test]
    fn test_seven_day_crisis_never_below_three_day() {
        for mood in [0, 3, 5, 8, 10] {
            let f = Fixture::new(
                json!({"mood": mood, "anxiety": 6, "suicidal_ideation": 2}),
                vec![json!({"mood": 7})],
            );
            let p3 = probability(crisis_risk_3d(&f.ctx(7)));
            let p7 = probability(crisis_risk_7d(&f.ctx(7)));
            assert!(p7 >= p3, "mood {}: p7 {} < p3 {}", mood, p7, p3);
        }
    }

    #[test]
    fn test_impulsivity_uses_activation_when_alone() {
        let f = Fixture::new(json!({"activation": 10}), vec![]);
        // 0.4*0.3 + 0.25*1.0 + 0.15*0.3 + 0 + 0
        assert!((probability(impulsive_behavior_risk(&f.ctx(7))) - 0.415).abs() < 1e-12);
    }
}
