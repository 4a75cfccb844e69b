// src/features/history.rs
use crate::models::ObservationRecord;

pub const MOOD_MEAN: &str = "mood_mean";
pub const MOOD_STD: &str = "mood_std";
pub const MOOD_SLOPE: &str = "mood_slope";
pub const ADHERENCE_RATE: &str = "adherence_rate";
pub const ENTRY_COUNT: &str = "entry_count";

/// Aggregates over the current observation plus its history.
/// `history` is most-recent first, as returned by the observation source.
#[derive(Debug, Clone, PartialEq)]
pub struct HistorySummary {
    pub entry_count: usize,
    pub mood_mean: Option<f64>,
    pub mood_std: Option<f64>,
    /// Mood change per entry, oldest to newest. Needs at least two mood readings.
    pub mood_slope: Option<f64>,
    pub adherence_rate: Option<f64>,
}

impl HistorySummary {
    pub fn from_records(current: &ObservationRecord, history: &[ObservationRecord]) -> Self {
        // chronological: oldest first, current last
        let chronological: Vec<&ObservationRecord> =
            history.iter().rev().chain(std::iter::once(current)).collect();

        let moods: Vec<(f64, f64)> = chronological
            .iter()
            .enumerate()
            .filter_map(|(i, r)| r.get_f64("mood").map(|m| (i as f64, m)))
            .collect();

        let mood_mean = mean(moods.iter().map(|(_, m)| *m));
        let mood_std = mood_mean.map(|mu| {
            let var = moods.iter().map(|(_, m)| (m - mu).powi(2)).sum::<f64>() / moods.len() as f64;
            var.sqrt()
        });

        let adherence_rate = mean(
            chronological
                .iter()
                .filter_map(|r| r.get_f64("medication_taken"))
                .map(|v| v.clamp(0.0, 1.0)),
        );

        Self {
            entry_count: chronological.len(),
            mood_mean,
            mood_std,
            mood_slope: least_squares_slope(&moods),
            adherence_rate,
        }
    }

    /// Copies `current` and fills in the aggregate fields it does not already carry.
    pub fn augment(&self, current: &ObservationRecord) -> ObservationRecord {
        let mut record = current.clone();
        let derived = [
            (MOOD_MEAN, self.mood_mean),
            (MOOD_STD, self.mood_std),
            (MOOD_SLOPE, self.mood_slope),
            (ADHERENCE_RATE, self.adherence_rate),
            (ENTRY_COUNT, Some(self.entry_count as f64)),
        ];
        for (name, value) in derived {
            if let Some(v) = value {
                if !record.contains(name) {
                    record.insert(name, v);
                }
            }
        }
        record
    }
}

fn mean(values: impl Iterator<Item = f64>) -> Option<f64> {
    let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
    if n == 0 {
        None
    } else {
        Some(sum / n as f64)
    }
}

fn least_squares_slope(points: &[(f64, f64)]) -> Option<f64> {
    if points.len() < 2 {
        return None;
    }
    let n = points.len() as f64;
    let mean_x = points.iter().map(|(x, _)| x).sum::<f64>() / n;
    let mean_y = points.iter().map(|(_, y)| y).sum::<f64>() / n;
    let sxx: f64 = points.iter().map(|(x, _)| (x - mean_x).powi(2)).sum();
    if sxx == 0.0 {
        return None;
    }
    let sxy: f64 = points.iter().map(|(x, y)| (x - mean_x) * (y - mean_y)).sum();
    Some(sxy / sxx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(v: serde_json::Value) -> ObservationRecord {
        ObservationRecord::from_json(v)
    }

    #[test]
    fn test_summary_over_declining_mood() {
        // most recent first: 3 (current), then 5, 7
        let current = record(json!({"mood": 3, "medication_taken": false}));
        let history = vec![
            record(json!({"mood": 5, "medication_taken": true})),
            record(json!({"mood": 7, "medication_taken": true})),
        ];
        let summary = HistorySummary::from_records(&current, &history);
        assert_eq!(summary.entry_count, 3);
        assert_eq!(summary.mood_mean, Some(5.0));
        assert!((summary.mood_slope.unwrap() + 2.0).abs() < 1e-12);
        assert!((summary.adherence_rate.unwrap() - 2.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_single_entry_has_no_slope() {
        let summary = HistorySummary::from_records(&record(json!({"mood": 4})), &[]);
        assert_eq!(summary.mood_slope, None);
        assert_eq!(summary.mood_std, Some(0.0));
        assert_eq!(summary.adherence_rate, None);
    }

    #[test]
    fn test_augment_keeps_caller_values() {
        let current = record(json!({"mood": 4, "mood_mean": 9.0}));
        let history = vec![record(json!({"mood": 6}))];
        let augmented = HistorySummary::from_records(&current, &history).augment(&current);
        assert_eq!(augmented.get_f64(MOOD_MEAN), Some(9.0));
        assert_eq!(augmented.get_f64(ENTRY_COUNT), Some(2.0));
        assert!(!augmented.contains(ADHERENCE_RATE));
    }
}
