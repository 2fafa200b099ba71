//! Axum route handlers for the Admissions prediction API.

use axum::{extract::State, Json};

use crate::errors::AppError;
use crate::models::applicant::ApplicantInput;
use crate::prediction::aggregator::TieredPredictions;
use crate::prediction::observer::CounterSnapshot;
use crate::state::AppState;

/// POST /api/v1/admissions/predict
///
/// Tiered admission predictions for one applicant signal. An empty catalog
/// match is a 200 with empty tiers and an explanatory summary.
pub async fn handle_predict(
    State(state): State<AppState>,
    Json(request): Json<ApplicantInput>,
) -> Result<Json<TieredPredictions>, AppError> {
    let signal = request.into_signal()?;
    let outcome = state
        .predictor
        .predict(state.catalog.as_ref(), state.counters.as_ref(), &signal)
        .await?;
    Ok(Json(outcome.into_tiered()))
}

/// GET /api/v1/admissions/diagnostics
///
/// Lookup, fallback and parse-failure counters since startup.
pub async fn handle_diagnostics(State(state): State<AppState>) -> Json<CounterSnapshot> {
    Json(state.counters.snapshot())
}
