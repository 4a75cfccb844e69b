// src/features/schema.rs
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::features::FeatureError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum FieldKind {
    Numeric { default: f64 },
    /// `vocabulary[0]` is the designated default.
    Categorical { vocabulary: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
}

impl FieldSpec {
    pub fn numeric(name: &str) -> Self {
        Self::numeric_with_default(name, 0.0)
    }

    pub fn numeric_with_default(name: &str, default: f64) -> Self {
        Self {
            name: name.to_string(),
            kind: FieldKind::Numeric { default },
        }
    }

    /// The vocabulary always starts with `default`, so it can never be empty.
    pub fn categorical(name: &str, default: &str, others: &[&str]) -> Self {
        let vocabulary = std::iter::once(default)
            .chain(others.iter().copied().filter(|v| *v != default))
            .map(str::to_string)
            .collect();
        Self {
            name: name.to_string(),
            kind: FieldKind::Categorical { vocabulary },
        }
    }
}

/// Ordered list of fields a model expects. Order is significant: models are
/// order-sensitive, so the normalizer always emits columns in this order.
/// Deserialized schemas go through the same checks as `new`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawSchema")]
pub struct FeatureSchema {
    fields: Vec<FieldSpec>,
}

#[derive(Deserialize)]
struct RawSchema {
    fields: Vec<FieldSpec>,
}

impl TryFrom<RawSchema> for FeatureSchema {
    type Error = FeatureError;

    fn try_from(raw: RawSchema) -> Result<Self, Self::Error> {
        Self::new(raw.fields)
    }
}

impl FeatureSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Result<Self, FeatureError> {
        let mut seen = HashSet::new();
        for field in &fields {
            if !seen.insert(field.name.as_str()) {
                return Err(FeatureError::DuplicateField(field.name.clone()));
            }
            if let FieldKind::Categorical { vocabulary } = &field.kind {
                if vocabulary.is_empty() {
                    return Err(FeatureError::EmptyVocabulary(field.name.clone()));
                }
            }
        }
        Ok(Self { fields })
    }

    /// For the built-in catalog, whose fields come only from the `FieldSpec` constructors.
    pub(crate) fn from_specs(fields: Vec<FieldSpec>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.fields
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.fields.iter().map(|f| f.name.as_str()).collect()
    }
}
