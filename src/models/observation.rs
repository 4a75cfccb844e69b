// src/models/observation.rs
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

/// A caller-supplied bag of field name -> value. Any subset of a feature schema,
/// possibly empty. Explicit JSON nulls count as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ObservationRecord {
    fields: Map<String, JsonValue>,
}

impl ObservationRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_map(fields: Map<String, JsonValue>) -> Self {
        Self { fields }
    }

    /// Builds a record from a JSON value; anything other than an object yields an empty record.
    pub fn from_json(value: JsonValue) -> Self {
        match value {
            JsonValue::Object(fields) => Self { fields },
            _ => Self::default(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&JsonValue> {
        self.fields.get(name).filter(|v| !v.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Lenient numeric read used by the heuristics: numbers, booleans and numeric strings.
    pub fn get_f64(&self, name: &str) -> Option<f64> {
        match self.get(name)? {
            JsonValue::Number(n) => n.as_f64(),
            JsonValue::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
            JsonValue::String(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
        .filter(|v| v.is_finite())
    }

    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<JsonValue>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn is_empty(&self) -> bool {
        self.fields.values().all(JsonValue::is_null)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }
}

impl From<Map<String, JsonValue>> for ObservationRecord {
    fn from(fields: Map<String, JsonValue>) -> Self {
        Self::from_map(fields)
    }
}
