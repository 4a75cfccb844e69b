// src/models/prediction_result.rs
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;

use crate::features::FeatureValue;
use crate::models::prediction_type::PredictionType;
use crate::utils::constants::{FAILED_LABEL, HEURISTIC_VERSION, INSUFFICIENT_DATA_LABEL};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RiskLevel {
    Low,
    Moderate,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "LOW",
            RiskLevel::Moderate => "MODERATE",
            RiskLevel::High => "HIGH",
        }
    }
}

/// Where a result came from, for downstream trust calibration.
/// Serialized as `MODEL:<artifact version>` or `HEURISTIC:<scorer version>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Methodology {
    Model { version: String },
    Heuristic { version: String },
}

impl Methodology {
    pub fn model(version: impl Into<String>) -> Self {
        Methodology::Model { version: version.into() }
    }

    pub fn heuristic() -> Self {
        Methodology::Heuristic { version: HEURISTIC_VERSION.to_string() }
    }

    pub fn is_model(&self) -> bool {
        matches!(self, Methodology::Model { .. })
    }
}

impl fmt::Display for Methodology {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Methodology::Model { version } => write!(f, "MODEL:{}", version),
            Methodology::Heuristic { version } => write!(f, "HEURISTIC:{}", version),
        }
    }
}

impl From<Methodology> for String {
    fn from(m: Methodology) -> Self {
        m.to_string()
    }
}

impl TryFrom<String> for Methodology {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.split_once(':') {
            Some(("MODEL", version)) => Ok(Methodology::model(version)),
            Some(("HEURISTIC", version)) => Ok(Methodology::Heuristic { version: version.to_string() }),
            _ => Err(format!("unrecognised methodology tag '{}'", value)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContributionDirection {
    IncreasesRisk,
    DecreasesRisk,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureContribution {
    pub feature: String,
    pub value: FeatureValue,
    pub contribution: f64,
    pub direction: ContributionDirection,
}

/// Per-feature attribution of a model output, ranked by absolute contribution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Explanation {
    pub base_value: f64,
    pub contributions: Vec<FeatureContribution>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    #[serde(rename = "type")]
    pub prediction_type: PredictionType,
    pub label: String,
    #[serde(serialize_with = "serialize_probability")]
    pub probability: f64,
    pub risk_level: RiskLevel,
    pub alert: bool,
    pub methodology: Methodology,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub explanation: Option<Explanation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub caveat: Option<String>,
}

impl PredictionResult {
    pub fn new(
        prediction_type: PredictionType,
        label: impl Into<String>,
        probability: f64,
        risk_level: RiskLevel,
        alert: bool,
        methodology: Methodology,
    ) -> Self {
        Self {
            prediction_type,
            label: label.into(),
            probability: sanitize_probability(probability),
            risk_level,
            alert,
            methodology,
            explanation: None,
            caveat: prediction_type.standing_caveat().map(str::to_string),
        }
    }

    pub fn insufficient_data(prediction_type: PredictionType, methodology: Methodology) -> Self {
        Self::new(prediction_type, INSUFFICIENT_DATA_LABEL, 0.0, RiskLevel::Low, false, methodology)
    }

    /// Result substituted when scoring a single type failed. The error text travels in the caveat.
    pub fn failure(prediction_type: PredictionType, methodology: Methodology, error: &str) -> Self {
        Self::new(prediction_type, FAILED_LABEL, 0.0, RiskLevel::Low, false, methodology)
            .with_caveat(format!("Prediction failed: {}", error))
    }

    pub fn with_explanation(mut self, explanation: Option<Explanation>) -> Self {
        self.explanation = explanation;
        self
    }

    /// Appends to any caveat already present.
    pub fn with_caveat(mut self, caveat: impl Into<String>) -> Self {
        let caveat = caveat.into();
        self.caveat = Some(match self.caveat.take() {
            Some(existing) => format!("{} {}", existing, caveat),
            None => caveat,
        });
        self
    }

    pub fn is_insufficient_data(&self) -> bool {
        self.label == INSUFFICIENT_DATA_LABEL
    }
}

/// Full answer for one `predict` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResponse {
    pub subject_id: String,
    pub window_days: u32,
    pub generated_at: DateTime<Utc>,
    pub cached: bool,
    pub predictions: Vec<PredictionResult>,
}

/// Forces a probability into `[0, 1]`. NaN, infinities and values too small to
/// survive a single-precision round trip collapse to exactly `0.0`.
pub fn sanitize_probability(p: f64) -> f64 {
    if !p.is_finite() || p.abs() < f32::MIN_POSITIVE as f64 {
        return 0.0;
    }
    p.clamp(0.0, 1.0)
}

fn serialize_probability<S: Serializer>(p: &f64, serializer: S) -> Result<S::Ok, S::Error> {
    let rounded = (sanitize_probability(*p) * 10_000.0).round() / 10_000.0;
    serializer.serialize_f64(rounded)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_probability() {
        assert_eq!(sanitize_probability(1e-300), 0.0);
        assert_eq!(sanitize_probability(f64::NAN), 0.0);
        assert_eq!(sanitize_probability(f64::INFINITY), 0.0);
        assert_eq!(sanitize_probability(-0.2), 0.0);
        assert_eq!(sanitize_probability(1.7), 1.0);
        assert_eq!(sanitize_probability(0.42), 0.42);
    }

    #[test]
    fn test_constructor_sanitizes() {
        let r = PredictionResult::new(
            PredictionType::ChurnRisk,
            "low disengagement risk",
            1e-300,
            RiskLevel::Low,
            false,
            Methodology::heuristic(),
        );
        assert_eq!(r.probability, 0.0);
    }

    #[test]
    fn test_serialized_shape() {
        let r = PredictionResult::new(
            PredictionType::RelapseRisk,
            "high relapse risk",
            0.812345678,
            RiskLevel::High,
            true,
            Methodology::model("3"),
        );
        let json = serde_json::to_value(&r).unwrap();
        assert_eq!(json["type"], "relapse_risk");
        assert_eq!(json["probability"], 0.8123);
        assert_eq!(json["risk_level"], "HIGH");
        assert_eq!(json["alert"], true);
        assert_eq!(json["methodology"], "MODEL:3");
        assert!(json.get("explanation").is_none());
        assert!(json.get("caveat").is_none());
    }

    #[test]
    fn test_methodology_tag_parsing() {
        assert_eq!(Methodology::try_from("HEURISTIC:v1".to_string()).unwrap(), Methodology::heuristic());
        assert_eq!(Methodology::try_from("MODEL:2024.1".to_string()).unwrap(), Methodology::model("2024.1"));
        assert!(Methodology::try_from("GUESS".to_string()).is_err());
    }

    #[test]
    fn test_failure_carries_error_text() {
        let r = PredictionResult::failure(
            PredictionType::SleepDisturbanceRisk,
            Methodology::model("1"),
            "feature 'sleep_hours' is not numeric",
        );
        assert_eq!(r.label, FAILED_LABEL);
        assert_eq!(r.probability, 0.0);
        assert!(r.caveat.unwrap().contains("sleep_hours"));
    }

    #[test]
    fn test_suicidality_results_keep_safety_caveat() {
        let r = PredictionResult::insufficient_data(PredictionType::SuicidalityRisk, Methodology::heuristic())
            .with_caveat("extra");
        let caveat = r.caveat.unwrap();
        assert!(caveat.starts_with("Screening signal only"));
        assert!(caveat.ends_with("extra"));
    }
}
