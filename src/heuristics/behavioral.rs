// src/heuristics/behavioral.rs
use super::{clamp01, rescale_horizon, HeuristicContext, HeuristicOutcome, HeuristicScore};

/// Churn scores describe a 14-day horizon before rescaling to the requested window.
const CHURN_BASE_HORIZON_DAYS: f64 = 14.0;

/// Critical: `medication_taken` in at least one record. Defaults: `side_effects` 0.
pub(super) fn medication_adherence_risk(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    let rate = match ctx.summary.adherence_rate {
        Some(rate) if ctx.has_any_record_with("medication_taken") => rate,
        _ => {
            return HeuristicOutcome::Insufficient {
                missing: vec!["medication_taken"],
            }
        }
    };
    let missed_today = match ctx.current.get_f64("medication_taken") {
        Some(taken) if taken < 0.5 => 1.0,
        _ => 0.0,
    };
    let side_effects = clamp01(ctx.value("side_effects", 0.0) / 10.0);

    let probability = 0.7 * (1.0 - rate) + 0.15 * missed_today + 0.15 * side_effects;
    HeuristicOutcome::Scored(HeuristicScore::binary(probability))
}

/// Critical: `sleep_hours`. Defaults: `sleep_quality` 5.0, `anxiety` 3.0.
pub(super) fn sleep_disturbance_risk(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    if !ctx.has("sleep_hours") {
        return HeuristicOutcome::Insufficient {
            missing: vec!["sleep_hours"],
        };
    }
    let hours = ctx.value("sleep_hours", 7.0);
    let quality = ctx.value("sleep_quality", 5.0);
    let anxiety = ctx.value("anxiety", 3.0);

    let probability = 0.55 * clamp01((hours - 8.0).abs() / 4.0)
        + 0.3 * clamp01((10.0 - quality) / 10.0)
        + 0.15 * clamp01(anxiety / 10.0);
    HeuristicOutcome::Scored(HeuristicScore::binary(probability))
}

/// No critical fields: the absence of recent entries is itself the signal.
/// Defaults: `days_since_last_entry` 0, `entries_last_7d` = observed entries (max 7).
pub(super) fn churn_risk(ctx: &HeuristicContext<'_>) -> HeuristicOutcome {
    let days_idle = ctx.value("days_since_last_entry", 0.0).max(0.0);
    let observed = ctx.summary.entry_count.min(7) as f64;
    let recent_entries = ctx.value("entries_last_7d", observed);

    let base = 0.6 * clamp01(days_idle / 14.0) + 0.4 * (1.0 - clamp01(recent_entries / 7.0));
    let probability = rescale_horizon(base, CHURN_BASE_HORIZON_DAYS, ctx.window_days);
    HeuristicOutcome::Scored(HeuristicScore::binary(probability))
}
