// src/explain/mod.rs
//! Per-feature attribution for model outputs.
//!
//! Linear estimators are explained exactly in logit space: each feature contributes
//! `w_i * (x_i - mean_i)` relative to the prediction at the training means, so a
//! positive contribution always raises risk. Estimators without an additive
//! per-feature decomposition report `Unsupported` and the caller carries on without
//! an explanation.

use thiserror::Error;

use crate::features::NormalizedRow;
use crate::models::prediction_result::{ContributionDirection, Explanation, FeatureContribution};
use crate::registry::{Estimator, ModelArtifact};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExplainError {
    #[error("Attribution is not supported for {0} estimators")]
    Unsupported(&'static str),

    #[error("Row has {got} features but the model expects {expected}")]
    RowLength { expected: usize, got: usize },
}

/// Ranks the `top_n` largest contributions to `model`'s risk on `row`.
///
/// Multi-class risk is the mass outside the first (benign) label, so the attribution
/// is for the log-odds of the most probable non-benign class against the benign one.
pub fn explain(
    model: &ModelArtifact,
    row: &NormalizedRow,
    top_n: usize,
) -> Result<Explanation, ExplainError> {
    let x = row.encoded();
    if x.len() != model.feature_count() {
        return Err(ExplainError::RowLength {
            expected: model.feature_count(),
            got: x.len(),
        });
    }

    let (weights, intercept, means): (Vec<f64>, f64, Option<&[f64]>) = match &model.estimator {
        Estimator::Logistic {
            coefficients,
            intercept,
            feature_means,
        } => (coefficients.clone(), *intercept, feature_means.as_deref()),
        Estimator::Softmax {
            coefficients,
            intercepts,
            feature_means,
            ..
        } => {
            let class = top_risk_class(coefficients, intercepts, x);
            let weights = coefficients[class]
                .iter()
                .zip(&coefficients[0])
                .map(|(w, benign)| w - benign)
                .collect();
            (weights, intercepts[class] - intercepts[0], feature_means.as_deref())
        }
        Estimator::StumpEnsemble { .. } => return Err(ExplainError::Unsupported("stump ensemble")),
    };

    let mean_at = |i: usize| means.map_or(0.0, |m| m[i]);
    let base_value = intercept
        + weights
            .iter()
            .enumerate()
            .map(|(i, w)| w * mean_at(i))
            .sum::<f64>();

    let mut contributions: Vec<FeatureContribution> = weights
        .iter()
        .enumerate()
        .map(|(i, w)| {
            let contribution = w * (x[i] - mean_at(i));
            FeatureContribution {
                feature: model.feature_names[i].clone(),
                value: row.values()[i].clone(),
                contribution,
                direction: if contribution >= 0.0 {
                    ContributionDirection::IncreasesRisk
                } else {
                    ContributionDirection::DecreasesRisk
                },
            }
        })
        .collect();

    contributions.sort_by(|a, b| b.contribution.abs().total_cmp(&a.contribution.abs()));
    contributions.truncate(top_n);

    Ok(Explanation {
        base_value,
        contributions,
    })
}

/// Index of the highest-logit class among all but the benign class at index 0.
fn top_risk_class(coefficients: &[Vec<f64>], intercepts: &[f64], x: &[f64]) -> usize {
    coefficients
        .iter()
        .zip(intercepts)
        .map(|(row, b)| b + row.iter().zip(x).map(|(w, v)| w * v).sum::<f64>())
        .enumerate()
        .skip(1)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(i, _)| i)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::features::{normalize, FeatureSchema, FeatureValue, FieldSpec};
    use crate::models::ObservationRecord;
    use crate::registry::Stump;
    use serde_json::json;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            FieldSpec::numeric("mood"),
            FieldSpec::numeric("anxiety"),
            FieldSpec::numeric("sleep_hours"),
        ])
        .unwrap()
    }

    fn row(value: serde_json::Value) -> NormalizedRow {
        normalize(&ObservationRecord::from_json(value), &schema()).unwrap()
    }

    fn artifact(estimator: Estimator) -> ModelArtifact {
        ModelArtifact {
            name: "relapse_risk".into(),
            version: "2".into(),
            feature_names: vec!["mood".into(), "anxiety".into(), "sleep_hours".into()],
            estimator,
        }
    }

    #[test]
    fn test_logistic_contributions_are_ranked() {
        let model = artifact(Estimator::Logistic {
            coefficients: vec![-0.5, 0.2, 0.1],
            intercept: 0.3,
            feature_means: Some(vec![5.0, 3.0, 7.0]),
        });
        let explanation = explain(&model, &row(json!({"mood": 2, "anxiety": 8, "sleep_hours": 7})), 5).unwrap();

        // 0.3 + (-2.5 + 0.6 + 0.7)
        assert!((explanation.base_value - (-0.9)).abs() < 1e-12);
        let names: Vec<&str> = explanation.contributions.iter().map(|c| c.feature.as_str()).collect();
        assert_eq!(names, vec!["mood", "anxiety", "sleep_hours"]);

        let mood = &explanation.contributions[0];
        assert!((mood.contribution - 1.5).abs() < 1e-12);
        assert_eq!(mood.direction, ContributionDirection::IncreasesRisk);
        assert_eq!(mood.value, FeatureValue::Numeric(2.0));
    }

    #[test]
    fn test_contributions_sum_to_logit() {
        let model = artifact(Estimator::Logistic {
            coefficients: vec![0.4, -0.3, 0.25],
            intercept: -1.0,
            feature_means: Some(vec![5.0, 2.0, 7.5]),
        });
        let r = row(json!({"mood": 9, "anxiety": 1, "sleep_hours": 4}));
        let explanation = explain(&model, &r, 3).unwrap();
        let total: f64 = explanation.contributions.iter().map(|c| c.contribution).sum();
        let logit = -1.0 + 0.4 * 9.0 - 0.3 * 1.0 + 0.25 * 4.0;
        assert!((explanation.base_value + total - logit).abs() < 1e-12);
    }

    #[test]
    fn test_top_n_truncates_and_means_default_to_zero() {
        let model = artifact(Estimator::Logistic {
            coefficients: vec![1.0, -3.0, 0.5],
            intercept: 0.0,
            feature_means: None,
        });
        let explanation = explain(&model, &row(json!({"mood": 1, "anxiety": 1, "sleep_hours": 1})), 1).unwrap();
        assert_eq!(explanation.base_value, 0.0);
        assert_eq!(explanation.contributions.len(), 1);
        assert_eq!(explanation.contributions[0].feature, "anxiety");
        assert_eq!(explanation.contributions[0].direction, ContributionDirection::DecreasesRisk);
    }

    #[test]
    fn test_softmax_explains_risk_class_against_benign() {
        let model = artifact(Estimator::Softmax {
            labels: vec!["stable".into(), "elevated".into()],
            coefficients: vec![vec![0.0, 0.0, 0.0], vec![1.0, 0.0, 0.0]],
            intercepts: vec![0.0, -2.0],
            feature_means: None,
        });
        let explanation = explain(&model, &row(json!({"mood": 9})), 3).unwrap();
        assert_eq!(explanation.base_value, -2.0);
        assert_eq!(explanation.contributions[0].feature, "mood");
        assert!((explanation.contributions[0].contribution - 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_softmax_direction_follows_risk_when_benign_class_wins() {
        let model = artifact(Estimator::Softmax {
            labels: vec!["stable".into(), "elevated".into()],
            coefficients: vec![vec![1.0, 0.0, 0.0], vec![0.0, 0.0, 0.0]],
            intercepts: vec![0.0, 0.0],
            feature_means: None,
        });
        let at = |mood: f64| model.predict_proba(row(json!({"mood": mood})).encoded()).unwrap();
        assert!(at(3.0) < at(2.0));

        let explanation = explain(&model, &row(json!({"mood": 3})), 3).unwrap();
        let mood = &explanation.contributions[0];
        assert_eq!(mood.feature, "mood");
        assert!((mood.contribution + 3.0).abs() < 1e-12);
        assert_eq!(mood.direction, ContributionDirection::DecreasesRisk);
    }

    #[test]
    fn test_softmax_attributes_strongest_non_benign_class() {
        let model = artifact(Estimator::Softmax {
            labels: vec!["stable".into(), "depressed".into(), "elevated".into()],
            coefficients: vec![
                vec![0.5, 0.0, 0.0],
                vec![-1.0, 0.0, 0.0],
                vec![1.0, 0.0, 0.0],
            ],
            intercepts: vec![0.0, 0.0, 0.0],
            feature_means: None,
        });
        let explanation = explain(&model, &row(json!({"mood": 8})), 1).unwrap();
        // elevated vs stable: (1.0 - 0.5) * 8
        assert!((explanation.contributions[0].contribution - 4.0).abs() < 1e-12);
        assert_eq!(explanation.contributions[0].direction, ContributionDirection::IncreasesRisk);
    }

    #[test]
    fn test_stump_ensemble_is_unsupported() {
        let model = artifact(Estimator::StumpEnsemble {
            base_score: 0.0,
            stumps: vec![Stump { feature_index: 0, threshold: 4.0, left: 1.0, right: -1.0 }],
        });
        assert!(matches!(
            explain(&model, &row(json!({"mood": 3})), 5),
            Err(ExplainError::Unsupported(_))
        ));
    }

    #[test]
    fn test_row_length_mismatch() {
        let model = ModelArtifact {
            feature_names: vec!["mood".into()],
            ..artifact(Estimator::Logistic {
                coefficients: vec![1.0],
                intercept: 0.0,
                feature_means: None,
            })
        };
        assert_eq!(
            explain(&model, &row(json!({})), 5),
            Err(ExplainError::RowLength { expected: 1, got: 3 })
        );
    }
}
