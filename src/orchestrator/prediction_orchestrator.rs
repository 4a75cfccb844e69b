// src/orchestrator/prediction_orchestrator.rs
use chrono::Utc;
use log::{debug, info, warn};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

use crate::cache::{CachedBundle, ResultCache};
use crate::explain::explain;
use crate::features::{normalize, schema_for, FeatureError, HistorySummary};
use crate::heuristics::{self, HeuristicContext, HeuristicOutcome};
use crate::models::{
    Methodology, ObservationRecord, PredictionResponse, PredictionResult, PredictionType,
};
use crate::orchestrator::observation_source::ObservationSource;
use crate::registry::{ArtifactError, LoadedModel, ModelRegistry};
use crate::utils::errors::PredictionError;
use crate::utils::serving_config::ServingConfig;

/// Scoring failures confined to a single prediction type.
#[derive(Error, Debug)]
enum ScoringError {
    #[error(transparent)]
    Feature(#[from] FeatureError),

    #[error(transparent)]
    Model(#[from] ArtifactError),

    #[error("model '{model}' was trained on [{trained}] but the {prediction_type} schema is [{expected}]")]
    SchemaMismatch {
        model: String,
        prediction_type: PredictionType,
        trained: String,
        expected: String,
    },
}

/// Resolves prediction requests through cache, model and heuristic, in that order.
pub struct PredictionOrchestrator {
    registry: Arc<ModelRegistry>,
    cache: Arc<ResultCache>,
    config: ServingConfig,
}

impl PredictionOrchestrator {
    pub fn new(registry: Arc<ModelRegistry>, cache: Arc<ResultCache>, config: ServingConfig) -> Self {
        Self {
            registry,
            cache,
            config,
        }
    }

    pub fn cache(&self) -> &ResultCache {
        &self.cache
    }

    pub fn config(&self) -> &ServingConfig {
        &self.config
    }

    /// Parses requested type names, keeping order and duplicates.
    pub fn parse_types<S: AsRef<str>>(requested: &[S]) -> Result<Vec<PredictionType>, PredictionError> {
        if requested.is_empty() {
            return Err(PredictionError::EmptyRequest);
        }
        requested.iter().map(|name| name.as_ref().parse()).collect()
    }

    fn check_window(&self, window_days: u32) -> Result<(), PredictionError> {
        if window_days == 0 || window_days > self.config.max_window_days {
            return Err(PredictionError::InvalidWindow {
                window_days,
                max: self.config.max_window_days,
            });
        }
        Ok(())
    }

    /// Produces one result per requested type, in request order.
    ///
    /// Only a malformed request or an unreadable observation source is an error;
    /// a type that fails to score gets a failure result and its siblings are unaffected.
    pub async fn predict<S: AsRef<str>>(
        &self,
        subject_id: &str,
        window_days: u32,
        requested: &[S],
        source: &dyn ObservationSource,
    ) -> Result<PredictionResponse, PredictionError> {
        let types = Self::parse_types(requested)?;
        self.check_window(window_days)?;
        let start = Instant::now();

        let observations = source
            .fetch_recent(subject_id, self.config.history_limit)
            .await
            .map_err(PredictionError::ObservationSource)?;

        let Some((current, history)) = observations.split_first() else {
            info!("No observations for subject {}, returning insufficient data", subject_id);
            let predictions = types
                .iter()
                .map(|t| {
                    PredictionResult::insufficient_data(*t, Methodology::heuristic())
                        .with_caveat("No observations recorded for this subject.")
                })
                .collect();
            return Ok(PredictionResponse {
                subject_id: subject_id.to_string(),
                window_days,
                generated_at: Utc::now(),
                cached: false,
                predictions,
            });
        };

        if let Some(bundle) = self.cache.get(subject_id, window_days, &types).await {
            if let Some(predictions) = in_request_order(bundle.predictions, &types) {
                debug!("Cache hit for subject {} ({} types)", subject_id, types.len());
                return Ok(PredictionResponse {
                    subject_id: subject_id.to_string(),
                    window_days,
                    generated_at: bundle.generated_at,
                    cached: true,
                    predictions,
                });
            }
            warn!("Cached bundle for subject {} does not cover the request, recomputing", subject_id);
        }

        let summary = HistorySummary::from_records(current, history);
        let ctx = HeuristicContext {
            current,
            history,
            summary: &summary,
            window_days,
        };
        let predictions: Vec<PredictionResult> = types
            .iter()
            .map(|t| self.resolve(subject_id, *t, &ctx))
            .collect();

        let bundle = CachedBundle {
            generated_at: Utc::now(),
            predictions,
        };
        let stored = self
            .cache
            .set(subject_id, window_days, &types, &bundle, self.cache.default_ttl())
            .await;

        let model_backed = bundle
            .predictions
            .iter()
            .filter(|r| r.methodology.is_model())
            .count();
        info!(
            "Predicted {} types for subject {} ({} model, {} heuristic) in {:.2?}{}",
            types.len(),
            subject_id,
            model_backed,
            types.len() - model_backed,
            start.elapsed(),
            if stored { "" } else { " (not cached)" }
        );

        Ok(PredictionResponse {
            subject_id: subject_id.to_string(),
            window_days,
            generated_at: bundle.generated_at,
            cached: false,
            predictions: bundle.predictions,
        })
    }

    /// Drops cached predictions for a subject whose observations were erased.
    pub async fn invalidate(&self, subject_id: &str) -> usize {
        self.cache.invalidate(subject_id).await
    }

    fn resolve(&self, subject_id: &str, prediction_type: PredictionType, ctx: &HeuristicContext<'_>) -> PredictionResult {
        let outcome = heuristics::scorer_for(prediction_type)(ctx);
        if matches!(outcome, HeuristicOutcome::Insufficient { .. }) {
            return heuristics::into_result(prediction_type, outcome);
        }

        let Some(model) = self.registry.get(prediction_type.model_name()) else {
            return heuristics::into_result(prediction_type, outcome);
        };

        match self.score_with_model(prediction_type, &model, ctx) {
            Ok(result) => result,
            Err(e) => {
                warn!(
                    "Scoring {} for subject {} failed: {}",
                    prediction_type, subject_id, e
                );
                PredictionResult::failure(
                    prediction_type,
                    Methodology::model(model.version()),
                    &e.to_string(),
                )
            }
        }
    }

    fn score_with_model(
        &self,
        prediction_type: PredictionType,
        model: &LoadedModel,
        ctx: &HeuristicContext<'_>,
    ) -> Result<PredictionResult, ScoringError> {
        let schema = schema_for(prediction_type);
        let artifact = &model.artifact;
        if !artifact
            .feature_names
            .iter()
            .map(String::as_str)
            .eq(schema.names())
        {
            return Err(ScoringError::SchemaMismatch {
                model: model.name.clone(),
                prediction_type,
                trained: artifact.feature_names.join(", "),
                expected: schema.names().join(", "),
            });
        }

        let row = normalize(&augmented(ctx), schema)?;
        let probability = artifact.predict_proba(row.encoded())?;
        let level = prediction_type.model_bands().classify(probability);

        let label = if prediction_type.is_multiclass() {
            artifact
                .class_probabilities(row.encoded())?
                .into_iter()
                .max_by(|a, b| a.1.total_cmp(&b.1))
                .map(|(label, _)| label)
                .unwrap_or_else(|| prediction_type.band_label(level))
        } else {
            prediction_type.band_label(level)
        };

        let result = PredictionResult::new(
            prediction_type,
            label,
            probability,
            level,
            prediction_type.should_alert(level),
            Methodology::model(model.version()),
        );

        if !self.config.explain_enabled {
            return Ok(result);
        }
        Ok(match explain(artifact, &row, self.config.explain_top_n) {
            Ok(explanation) => result.with_explanation(Some(explanation)),
            Err(e) => {
                debug!("No explanation for {}: {}", prediction_type, e);
                result.with_caveat(format!("Explanation unavailable: {}.", e))
            }
        })
    }
}

fn augmented(ctx: &HeuristicContext<'_>) -> ObservationRecord {
    ctx.summary.augment(ctx.current)
}

/// Lines cached results up with the request. `None` if the bundle lacks any requested type.
fn in_request_order(cached: Vec<PredictionResult>, types: &[PredictionType]) -> Option<Vec<PredictionResult>> {
    let mut pool: Vec<Option<PredictionResult>> = cached.into_iter().map(Some).collect();
    types
        .iter()
        .map(|t| {
            pool.iter_mut()
                .find(|slot| slot.as_ref().is_some_and(|r| r.prediction_type == *t))
                .and_then(Option::take)
        })
        .collect()
}
