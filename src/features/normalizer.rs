// src/features/normalizer.rs
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use crate::features::schema::{FeatureSchema, FieldKind, FieldSpec};
use crate::features::FeatureError;
use crate::models::ObservationRecord;

/// A single typed cell of a normalized row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FeatureValue {
    Numeric(f64),
    Categorical(String),
}

impl FeatureValue {
    fn to_json(&self) -> JsonValue {
        match self {
            FeatureValue::Numeric(v) => JsonValue::from(*v),
            FeatureValue::Categorical(s) => JsonValue::from(s.as_str()),
        }
    }
}

/// The complete, schema-ordered input row handed to a model.
/// `encoded` is the numeric form: numeric cells as-is, categorical cells as their
/// vocabulary index.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedRow {
    columns: Vec<String>,
    values: Vec<FeatureValue>,
    encoded: Vec<f64>,
}

impl NormalizedRow {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[FeatureValue] {
        &self.values
    }

    pub fn encoded(&self) -> &[f64] {
        &self.encoded
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, name: &str) -> Option<&FeatureValue> {
        self.columns
            .iter()
            .position(|c| c == name)
            .map(|i| &self.values[i])
    }

    /// Turns the row back into an observation; normalizing it again yields the same row.
    pub fn to_observation(&self) -> ObservationRecord {
        let mut record = ObservationRecord::new();
        for (name, value) in self.columns.iter().zip(&self.values) {
            record.insert(name.clone(), value.to_json());
        }
        record
    }
}

/// Converts a partial observation into the exact ordered row `schema` describes.
///
/// Every schema field is present in the output, in schema order. Absent fields take
/// their declared default; categorical values outside the vocabulary take the
/// vocabulary default. A value that cannot be read as a number for a numeric field
/// is an error rather than a silent default.
pub fn normalize(
    observation: &ObservationRecord,
    schema: &FeatureSchema,
) -> Result<NormalizedRow, FeatureError> {
    let mut columns = Vec::with_capacity(schema.len());
    let mut values = Vec::with_capacity(schema.len());
    let mut encoded = Vec::with_capacity(schema.len());

    for field in schema.fields() {
        let (value, code) = match &field.kind {
            FieldKind::Numeric { default } => {
                let v = match observation.get(&field.name) {
                    Some(raw) => coerce_numeric(field, raw)?,
                    None => *default,
                };
                (FeatureValue::Numeric(v), v)
            }
            FieldKind::Categorical { vocabulary } => {
                let index = observation
                    .get(&field.name)
                    .and_then(categorical_text)
                    .and_then(|text| vocabulary.iter().position(|v| *v == text))
                    .unwrap_or(0);
                let chosen = vocabulary
                    .get(index)
                    .ok_or_else(|| FeatureError::EmptyVocabulary(field.name.clone()))?;
                (FeatureValue::Categorical(chosen.clone()), index as f64)
            }
        };
        columns.push(field.name.clone());
        values.push(value);
        encoded.push(code);
    }

    Ok(NormalizedRow {
        columns,
        values,
        encoded,
    })
}

fn coerce_numeric(field: &FieldSpec, raw: &JsonValue) -> Result<f64, FeatureError> {
    let parsed = match raw {
        JsonValue::Number(n) => n.as_f64(),
        JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        JsonValue::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    parsed
        .filter(|v| v.is_finite())
        .ok_or_else(|| FeatureError::MalformedNumeric {
            field: field.name.clone(),
            value: raw.to_string(),
        })
}

fn categorical_text(raw: &JsonValue) -> Option<String> {
    match raw {
        JsonValue::String(s) => Some(s.trim().to_string()),
        JsonValue::Number(n) => Some(n.to_string()),
        JsonValue::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn schema() -> FeatureSchema {
        FeatureSchema::new(vec![
            FieldSpec::numeric("mood"),
            FieldSpec::categorical("episode_phase", "none", &["depressive", "manic"]),
            FieldSpec::numeric_with_default("sleep_hours", 7.0),
            FieldSpec::numeric("anxiety"),
        ])
        .unwrap()
    }

    fn observations() -> Vec<ObservationRecord> {
        vec![
            ObservationRecord::new(),
            ObservationRecord::from_json(json!({"anxiety": 3, "mood": 6.5})),
            ObservationRecord::from_json(json!({"episode_phase": "manic", "sleep_hours": "4.5"})),
            ObservationRecord::from_json(json!({"episode_phase": "ecstatic", "unrelated": [1, 2]})),
            ObservationRecord::from_json(json!({"mood": true, "episode_phase": 3, "anxiety": null})),
        ]
    }

    #[test]
    fn test_column_completeness_and_order() {
        let schema = schema();
        for obs in observations() {
            let row = normalize(&obs, &schema).unwrap();
            assert_eq!(row.len(), schema.len());
            assert_eq!(row.encoded().len(), schema.len());
            let names: Vec<&str> = row.columns().iter().map(String::as_str).collect();
            assert_eq!(names, schema.names());
        }
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let schema = schema();
        for obs in observations() {
            let once = normalize(&obs, &schema).unwrap();
            let twice = normalize(&once.to_observation(), &schema).unwrap();
            assert_eq!(once, twice);
        }
    }

    #[test]
    fn test_defaults_and_vocabulary() {
        let schema = schema();
        let row = normalize(&observations()[3], &schema).unwrap();
        assert_eq!(row.get("mood"), Some(&FeatureValue::Numeric(0.0)));
        assert_eq!(row.get("sleep_hours"), Some(&FeatureValue::Numeric(7.0)));
        assert_eq!(
            row.get("episode_phase"),
            Some(&FeatureValue::Categorical("none".to_string()))
        );

        let row = normalize(&observations()[2], &schema).unwrap();
        assert_eq!(row.get("sleep_hours"), Some(&FeatureValue::Numeric(4.5)));
        assert_eq!(row.encoded()[1], 2.0);
    }

    #[test]
    fn test_malformed_numeric_is_an_error() {
        let obs = ObservationRecord::from_json(json!({"mood": "very low"}));
        let err = normalize(&obs, &schema()).unwrap_err();
        assert!(matches!(err, FeatureError::MalformedNumeric { ref field, .. } if field == "mood"));

        let obs = ObservationRecord::from_json(json!({"anxiety": "NaN"}));
        assert!(normalize(&obs, &schema()).is_err());
    }

    #[test]
    fn test_empty_vocabulary_is_an_error_not_a_panic() {
        let schema = FeatureSchema::from_specs(vec![FieldSpec {
            name: "phase".to_string(),
            kind: FieldKind::Categorical { vocabulary: vec![] },
        }]);
        assert_eq!(
            normalize(&ObservationRecord::new(), &schema),
            Err(FeatureError::EmptyVocabulary("phase".to_string()))
        );
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let a = ObservationRecord::from_json(json!({"mood": 4, "anxiety": 2}));
        let b = ObservationRecord::from_json(json!({"anxiety": 2, "mood": 4}));
        assert_eq!(normalize(&a, &schema()).unwrap(), normalize(&b, &schema()).unwrap());
    }
}
