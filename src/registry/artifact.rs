// src/registry/artifact.rs
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ArtifactError {
    #[error("Artifact '{0}' not found")]
    NotFound(String),

    #[error("Failed to read artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to deserialize artifact: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Artifact shape is inconsistent: {0}")]
    Shape(String),

    #[error("Model expects {expected} inputs, got {got}")]
    InputLength { expected: usize, got: usize },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Stump {
    pub feature_index: usize,
    pub threshold: f64,
    /// Added to the logit when `x[feature_index] <= threshold`
    pub left: f64,
    pub right: f64,
}

/// The fitted estimator inside an artifact. All variants score on the logit scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Estimator {
    Logistic {
        coefficients: Vec<f64>,
        intercept: f64,
        /// Training means, used as the attribution baseline
        #[serde(default)]
        feature_means: Option<Vec<f64>>,
    },
    /// `labels[0]` is the benign class.
    Softmax {
        labels: Vec<String>,
        coefficients: Vec<Vec<f64>>,
        intercepts: Vec<f64>,
        #[serde(default)]
        feature_means: Option<Vec<f64>>,
    },
    StumpEnsemble {
        base_score: f64,
        stumps: Vec<Stump>,
    },
}

/// A serialized, already-fitted estimator plus the column order it was fitted on.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub name: String,
    pub version: String,
    pub feature_names: Vec<String>,
    pub estimator: Estimator,
}

fn sigmoid(logit: f64) -> f64 {
    1.0 / (1.0 + (-logit).exp())
}

fn dot(weights: &[f64], features: &[f64]) -> f64 {
    weights.iter().zip(features).map(|(w, f)| w * f).sum()
}

fn softmax(logits: &[f64]) -> Vec<f64> {
    let max = logits.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let exps: Vec<f64> = logits.iter().map(|l| (l - max).exp()).collect();
    let total: f64 = exps.iter().sum();
    exps.into_iter().map(|e| e / total).collect()
}

impl ModelArtifact {
    pub fn from_json(raw: &str) -> Result<Self, ArtifactError> {
        let artifact: ModelArtifact = serde_json::from_str(raw)?;
        artifact.validate()?;
        Ok(artifact)
    }

    pub fn feature_count(&self) -> usize {
        self.feature_names.len()
    }

    pub fn validate(&self) -> Result<(), ArtifactError> {
        let n = self.feature_count();
        let check_means = |means: &Option<Vec<f64>>| match means {
            Some(m) if m.len() != n => Err(ArtifactError::Shape(format!(
                "{} feature means for {} features",
                m.len(),
                n
            ))),
            _ => Ok(()),
        };

        match &self.estimator {
            Estimator::Logistic {
                coefficients,
                feature_means,
                ..
            } => {
                if coefficients.len() != n {
                    return Err(ArtifactError::Shape(format!(
                        "{} coefficients for {} features",
                        coefficients.len(),
                        n
                    )));
                }
                check_means(feature_means)?;
            }
            Estimator::Softmax {
                labels,
                coefficients,
                intercepts,
                feature_means,
            } => {
                if labels.len() < 2 {
                    return Err(ArtifactError::Shape("softmax needs at least two labels".into()));
                }
                if coefficients.len() != labels.len() || intercepts.len() != labels.len() {
                    return Err(ArtifactError::Shape(format!(
                        "{} labels, {} coefficient rows, {} intercepts",
                        labels.len(),
                        coefficients.len(),
                        intercepts.len()
                    )));
                }
                if let Some(row) = coefficients.iter().find(|row| row.len() != n) {
                    return Err(ArtifactError::Shape(format!(
                        "coefficient row of length {} for {} features",
                        row.len(),
                        n
                    )));
                }
                check_means(feature_means)?;
            }
            Estimator::StumpEnsemble { stumps, .. } => {
                if let Some(stump) = stumps.iter().find(|s| s.feature_index >= n) {
                    return Err(ArtifactError::Shape(format!(
                        "stump splits on feature {} of {}",
                        stump.feature_index, n
                    )));
                }
            }
        }
        Ok(())
    }

    fn check_input(&self, features: &[f64]) -> Result<(), ArtifactError> {
        if features.len() != self.feature_count() {
            return Err(ArtifactError::InputLength {
                expected: self.feature_count(),
                got: features.len(),
            });
        }
        Ok(())
    }

    /// Probability of the positive class. For multi-class estimators this is the
    /// probability of anything other than the benign class.
    pub fn predict_proba(&self, features: &[f64]) -> Result<f64, ArtifactError> {
        self.check_input(features)?;
        let p = match &self.estimator {
            Estimator::Logistic {
                coefficients,
                intercept,
                ..
            } => sigmoid(intercept + dot(coefficients, features)),
            Estimator::Softmax { .. } => {
                let probs = self.class_probabilities(features)?;
                1.0 - probs[0].1
            }
            Estimator::StumpEnsemble { base_score, stumps } => {
                let logit = base_score
                    + stumps
                        .iter()
                        .map(|s| {
                            if features[s.feature_index] <= s.threshold {
                                s.left
                            } else {
                                s.right
                            }
                        })
                        .sum::<f64>();
                sigmoid(logit)
            }
        };
        Ok(p)
    }

    /// Probability vector over the estimator's label set. Binary estimators report
    /// `negative` / `positive`.
    pub fn class_probabilities(&self, features: &[f64]) -> Result<Vec<(String, f64)>, ArtifactError> {
        self.check_input(features)?;
        match &self.estimator {
            Estimator::Softmax {
                labels,
                coefficients,
                intercepts,
                ..
            } => {
                let logits: Vec<f64> = coefficients
                    .iter()
                    .zip(intercepts)
                    .map(|(row, b)| b + dot(row, features))
                    .collect();
                Ok(labels.iter().cloned().zip(softmax(&logits)).collect())
            }
            _ => {
                let p = self.predict_proba(features)?;
                Ok(vec![("negative".to_string(), 1.0 - p), ("positive".to_string(), p)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn logistic_artifact() -> ModelArtifact {
        ModelArtifact {
            name: "relapse_risk".into(),
            version: "3".into(),
            feature_names: vec!["a".into(), "b".into()],
            estimator: Estimator::Logistic {
                coefficients: vec![1.0, -2.0],
                intercept: 0.5,
                feature_means: Some(vec![0.0, 0.0]),
            },
        }
    }

    #[test]
    fn test_logistic_probability() {
        let artifact = logistic_artifact();
        let p = artifact.predict_proba(&[1.0, 0.25]).unwrap();
        assert!((p - sigmoid(1.0)).abs() < 1e-12);
    }

    #[test]
    fn test_input_length_mismatch() {
        let artifact = logistic_artifact();
        assert!(matches!(
            artifact.predict_proba(&[1.0]),
            Err(ArtifactError::InputLength { expected: 2, got: 1 })
        ));
    }

    #[test]
    fn test_softmax_from_json() {
        let raw = json!({
            "name": "mood_state",
            "version": "7",
            "feature_names": ["mood"],
            "estimator": {
                "type": "softmax",
                "labels": ["stable", "depressed", "elevated"],
                "coefficients": [[0.0], [-1.0], [1.0]],
                "intercepts": [0.0, 0.0, 0.0]
            }
        })
        .to_string();
        let artifact = ModelArtifact::from_json(&raw).unwrap();
        let probs = artifact.class_probabilities(&[0.0]).unwrap();
        assert_eq!(probs.len(), 3);
        for (_, p) in &probs {
            assert!((p - 1.0 / 3.0).abs() < 1e-12);
        }
        let risk = artifact.predict_proba(&[0.0]).unwrap();
        assert!((risk - 2.0 / 3.0).abs() < 1e-12);

        let elevated = artifact.class_probabilities(&[3.0]).unwrap();
        let best = elevated
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap())
            .unwrap();
        assert_eq!(best.0, "elevated");
    }

    #[test]
    fn test_shape_errors_rejected_on_load() {
        let raw = json!({
            "name": "x",
            "version": "1",
            "feature_names": ["a", "b"],
            "estimator": {"type": "logistic", "coefficients": [1.0], "intercept": 0.0}
        })
        .to_string();
        assert!(matches!(ModelArtifact::from_json(&raw), Err(ArtifactError::Shape(_))));

        let raw = json!({
            "name": "x",
            "version": "1",
            "feature_names": ["a"],
            "estimator": {"type": "stump_ensemble", "base_score": 0.0,
                          "stumps": [{"feature_index": 4, "threshold": 0.0, "left": 0.0, "right": 1.0}]}
        })
        .to_string();
        assert!(matches!(ModelArtifact::from_json(&raw), Err(ArtifactError::Shape(_))));
        assert!(matches!(ModelArtifact::from_json("{not json"), Err(ArtifactError::Parse(_))));
    }

    #[test]
    fn test_stump_ensemble() {
        let artifact = ModelArtifact {
            name: "churn_risk".into(),
            version: "1".into(),
            feature_names: vec!["days".into()],
            estimator: Estimator::StumpEnsemble {
                base_score: 0.0,
                stumps: vec![Stump { feature_index: 0, threshold: 7.0, left: -1.0, right: 2.0 }],
            },
        };
        assert!((artifact.predict_proba(&[3.0]).unwrap() - sigmoid(-1.0)).abs() < 1e-12);
        assert!((artifact.predict_proba(&[10.0]).unwrap() - sigmoid(2.0)).abs() < 1e-12);
    }
}
