//! Admission predictors: pluggable, trait-based strategies behind `predict`.
//!
//! Default: `CatalogPredictor` (deterministic lookup + comparator).
//! Alternate: `LlmPredictor`, which re-scores the catalog result with the
//! model and falls back to it on any upstream failure.
//!
//! `AppState` holds an `Arc<dyn AdmissionPredictor>`, chosen at startup via config.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::resolver::{resolve, Resolution};
use crate::catalog::CatalogReader;
use crate::errors::AppError;
use crate::llm_client::prompts::{GROUNDING_INSTRUCTION, JSON_ONLY_INSTRUCTION};
use crate::llm_client::{LlmClient, LlmError};
use crate::models::applicant::ApplicantSignal;
use crate::prediction::aggregator::{summarize, Prediction, PredictionAggregator, PredictionOutcome};
use crate::prediction::comparator::Tier;
use crate::prediction::observer::EngineObserver;
use crate::prediction::prompts::{PREDICTION_PROMPT_TEMPLATE, PREDICTION_SYSTEM};

#[async_trait]
pub trait AdmissionPredictor: Send + Sync {
    async fn predict(
        &self,
        catalog: &dyn CatalogReader,
        observer: &dyn EngineObserver,
        signal: &ApplicantSignal,
    ) -> Result<PredictionOutcome, AppError>;
}

// ────────────────────────────────────────────────────────────────────────────
// CatalogPredictor
// ────────────────────────────────────────────────────────────────────────────

pub struct CatalogPredictor(pub PredictionAggregator);

#[async_trait]
impl AdmissionPredictor for CatalogPredictor {
    async fn predict(
        &self,
        catalog: &dyn CatalogReader,
        observer: &dyn EngineObserver,
        signal: &ApplicantSignal,
    ) -> Result<PredictionOutcome, AppError> {
        self.0.aggregate(catalog, observer, signal).await
    }
}

// ────────────────────────────────────────────────────────────────────────────
// LlmPredictor
// ────────────────────────────────────────────────────────────────────────────

pub struct LlmPredictor {
    pub llm: LlmClient,
    pub aggregator: PredictionAggregator,
}

#[derive(Debug, Serialize)]
struct Candidate<'a> {
    institution_id: &'a str,
    institution_name: &'a str,
    program: Option<&'a str>,
    location: &'a str,
    cutoff: [i64; 2],
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelPrediction {
    pub institution_id: String,
    #[serde(default)]
    pub program: Option<String>,
    pub tier: Tier,
    pub probability: u32,
    #[serde(default)]
    pub rationale: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ModelResponse {
    pub predictions: Vec<ModelPrediction>,
}

#[async_trait]
impl AdmissionPredictor for LlmPredictor {
    async fn predict(
        &self,
        catalog: &dyn CatalogReader,
        observer: &dyn EngineObserver,
        signal: &ApplicantSignal,
    ) -> Result<PredictionOutcome, AppError> {
        let resolution =
            Arc::new(resolve(catalog, observer, signal.track.code(), &signal.exam).await?);
        let baseline = self
            .aggregator
            .evaluate_resolved(Arc::clone(&resolution), signal, observer)
            .await?;
        if baseline.predictions.is_empty() {
            return Ok(baseline);
        }

        let rescored = self.rescore(signal, &baseline.predictions).await;
        Ok(settle(signal, baseline, rescored, &resolution, observer))
    }
}

/// Accepts the model's answer only when it keeps at least one catalog
/// candidate; otherwise counts an upstream fallback and returns `baseline`.
fn settle(
    signal: &ApplicantSignal,
    baseline: PredictionOutcome,
    rescored: Result<ModelResponse, LlmError>,
    resolution: &Resolution,
    observer: &dyn EngineObserver,
) -> PredictionOutcome {
    match rescored {
        Ok(response) => {
            let predictions = merge_model_predictions(&baseline.predictions, response);
            if predictions.is_empty() {
                warn!(
                    "LLM predictor kept none of {} catalog candidates, using catalog predictions",
                    baseline.predictions.len()
                );
                observer.upstream_fallback();
                return baseline;
            }
            info!(
                "LLM predictor re-scored {} of {} catalog candidates",
                predictions.len(),
                baseline.predictions.len()
            );
            llm_outcome(signal, predictions, resolution)
        }
        Err(e) => {
            warn!("LLM predictor failed, using catalog predictions: {e}");
            observer.upstream_fallback();
            baseline
        }
    }
}

impl LlmPredictor {
    async fn rescore(
        &self,
        signal: &ApplicantSignal,
        baseline: &[Prediction],
    ) -> Result<ModelResponse, LlmError> {
        let candidates: Vec<Candidate<'_>> = baseline
            .iter()
            .map(|p| Candidate {
                institution_id: &p.institution_id,
                institution_name: &p.institution_name,
                program: p.program.as_deref(),
                location: &p.location,
                cutoff: [p.cutoff.min, p.cutoff.max],
            })
            .collect();

        let prompt = build_prompt(signal, &serde_json::to_string_pretty(&candidates)?);
        let system = format!("{PREDICTION_SYSTEM}\n\n{GROUNDING_INSTRUCTION}\n{JSON_ONLY_INSTRUCTION}");
        self.llm.call_json::<ModelResponse>(&prompt, &system).await
    }
}

fn build_prompt(signal: &ApplicantSignal, candidates_json: &str) -> String {
    PREDICTION_PROMPT_TEMPLATE
        .replace("{track}", signal.track.code())
        .replace("{exam}", &signal.exam)
        .replace("{score}", &signal.score.to_string())
        .replace("{category}", signal.category.as_str())
        .replace("{home_state}", signal.home_state.as_deref().unwrap_or("not given"))
        .replace("{candidates}", candidates_json)
}

/// Keeps model predictions that name a baseline candidate, taking identity,
/// cutoff and data quality from the catalog. Probabilities are clamped to 100.
pub fn merge_model_predictions(baseline: &[Prediction], response: ModelResponse) -> Vec<Prediction> {
    let by_key: HashMap<(&str, Option<&str>), &Prediction> = baseline
        .iter()
        .map(|p| ((p.institution_id.as_str(), p.program.as_deref()), p))
        .collect();

    let mut seen = HashSet::new();
    let mut merged: Vec<Prediction> = response
        .predictions
        .into_iter()
        .filter_map(|mp| {
            let key = (mp.institution_id.as_str(), mp.program.as_deref());
            let base = *by_key.get(&key)?;
            if !seen.insert((base.institution_id.clone(), base.program.clone())) {
                return None;
            }
            Some(Prediction {
                tier: mp.tier,
                probability: mp.probability.min(100) as u8,
                rationale: mp
                    .rationale
                    .filter(|r| !r.trim().is_empty())
                    .unwrap_or_else(|| base.rationale.clone()),
                ..base.clone()
            })
        })
        .collect();

    merged.sort_by(|a, b| b.probability.cmp(&a.probability));
    merged
}

fn llm_outcome(
    signal: &ApplicantSignal,
    predictions: Vec<Prediction>,
    resolution: &Resolution,
) -> PredictionOutcome {
    let summary = summarize(signal, &predictions, resolution, "llm");
    PredictionOutcome {
        predictions,
        summary,
    }
}
