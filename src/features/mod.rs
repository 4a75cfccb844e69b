// src/features/mod.rs
//! Typed feature rows for model inference.
//!
//! Observations arrive as loosely-typed maps. They are normalized here, at the
//! boundary, so everything downstream works on a fixed row shape.

pub mod catalog;
pub mod history;
pub mod normalizer;
pub mod schema;

use thiserror::Error;

pub use catalog::schema_for;
pub use history::HistorySummary;
pub use normalizer::{normalize, FeatureValue, NormalizedRow};
pub use schema::{FeatureSchema, FieldKind, FieldSpec};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum FeatureError {
    #[error("Feature '{field}' is not numeric: {value}")]
    MalformedNumeric { field: String, value: String },

    #[error("Schema declares '{0}' more than once")]
    DuplicateField(String),

    #[error("Categorical feature '{0}' has an empty vocabulary")]
    EmptyVocabulary(String),
}
