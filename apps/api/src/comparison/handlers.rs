//! Axum route handlers for the Comparison API.

use axum::{extract::State, Json};
use serde::Deserialize;

use crate::comparison::engine::{compare, ApplicantContext, ComparisonResult};
use crate::errors::AppError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct CompareRequest {
    pub institution_ids: Vec<String>,
    #[serde(default)]
    pub applicant: ApplicantContext,
}

/// POST /api/v1/admissions/compare
///
/// Compares 2 to 5 institutions on cost, outcomes, ROI and admission chance.
pub async fn handle_compare(
    State(state): State<AppState>,
    Json(request): Json<CompareRequest>,
) -> Result<Json<ComparisonResult>, AppError> {
    let result = compare(
        state.catalog.as_ref(),
        state.counters.as_ref(),
        &request.institution_ids,
        &request.applicant,
    )
    .await?;
    Ok(Json(result))
}
