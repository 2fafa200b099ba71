//! Axum route handlers for the What-if API.

use std::time::Duration;

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::errors::AppError;
use crate::prediction::aggregator::PredictionAggregator;
use crate::prediction::comparator::ReachPolicy;
use crate::scenarios::sweep::{sweep, validate_scenarios, ScenarioInput, SweepOutcome};
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct WhatIfRequest {
    pub scenarios: Vec<ScenarioInput>,
}

/// POST /api/v1/admissions/what-if
///
/// Re-runs the catalog engine per hypothetical signal. Always deterministic:
/// the LLM predictor is never used for sweeps.
pub async fn handle_what_if(
    State(state): State<AppState>,
    Json(request): Json<WhatIfRequest>,
) -> Result<Json<SweepOutcome>, AppError> {
    let scenarios = validate_scenarios(request.scenarios, state.config.max_scenarios)?;
    let aggregator = PredictionAggregator::new(ReachPolicy::from_flag(state.config.admit_reach_tier));

    let outcome = sweep(
        &aggregator,
        state.catalog.as_ref(),
        state.counters.as_ref(),
        &scenarios,
        Duration::from_millis(state.config.sweep_timeout_ms),
    )
    .await?;
    Ok(Json(outcome))
}
