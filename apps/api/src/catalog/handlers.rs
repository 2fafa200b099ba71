//! Axum route handlers for the read-only Catalog API.

use axum::{
    extract::{Path, State},
    Json,
};
use serde::Serialize;

use crate::catalog::CatalogField;
use crate::errors::AppError;
use crate::models::catalog::Institution;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct DistinctResponse {
    pub field: CatalogField,
    pub values: Vec<String>,
}

/// GET /api/v1/catalog/institutions/:id
pub async fn handle_get_institution(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Institution>, AppError> {
    let institution = state
        .catalog
        .find_by_id(&id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Institution {id} not found")))?;
    Ok(Json(institution))
}

/// GET /api/v1/catalog/distinct/:field
///
/// Distinct tracks, exams, states or institution types, for populating filters.
pub async fn handle_distinct(
    State(state): State<AppState>,
    Path(field): Path<String>,
) -> Result<Json<DistinctResponse>, AppError> {
    let field: CatalogField = field.parse()?;
    let values = state.catalog.distinct(field).await?;
    Ok(Json(DistinctResponse { field, values }))
}
