// Read-only institution catalog.
// The engine only ever reads through `CatalogReader`; no module mutates catalog data.

pub mod handlers;
pub mod memory;
pub mod postgres;
pub mod resolver;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::errors::AppError;
use crate::models::catalog::Institution;

/// Matching strategy for a catalog lookup; also the cascade stage that produced
/// a result.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Exact,
    CaseInsensitive,
    Partial,
}

impl MatchStage {
    /// Cascade order, strictest first.
    pub const CASCADE: [MatchStage; 3] = [
        MatchStage::Exact,
        MatchStage::CaseInsensitive,
        MatchStage::Partial,
    ];

    pub fn describe(&self) -> &'static str {
        match self {
            MatchStage::Exact => "exact",
            MatchStage::CaseInsensitive => "case-insensitive",
            MatchStage::Partial => "partial",
        }
    }

    /// Whether `candidate` satisfies `wanted` under this stage.
    pub fn matches(&self, candidate: &str, wanted: &str) -> bool {
        match self {
            MatchStage::Exact => candidate == wanted,
            MatchStage::CaseInsensitive => candidate.to_lowercase() == wanted.to_lowercase(),
            MatchStage::Partial => candidate.to_lowercase().contains(&wanted.to_lowercase()),
        }
    }
}

/// Fields exposed through `distinct`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CatalogField {
    Tracks,
    Exams,
    States,
    InstitutionTypes,
}

impl std::str::FromStr for CatalogField {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "tracks" => Ok(CatalogField::Tracks),
            "exams" => Ok(CatalogField::Exams),
            "states" => Ok(CatalogField::States),
            "institution_types" => Ok(CatalogField::InstitutionTypes),
            other => Err(AppError::Validation(format!(
                "unknown catalog field '{other}'; expected tracks, exams, states or institution_types"
            ))),
        }
    }
}

/// Catalog read interface. Implement this to back the engine with another store.
///
/// Carried in `AppState` as `Arc<dyn CatalogReader>`.
#[async_trait]
pub trait CatalogReader: Send + Sync {
    async fn find_by_track_and_exam(
        &self,
        track: &str,
        exam: &str,
        stage: MatchStage,
    ) -> Result<Vec<Institution>, AppError>;

    async fn find_by_id(&self, id: &str) -> Result<Option<Institution>, AppError>;

    /// Sorted distinct values of `field`.
    async fn distinct(&self, field: CatalogField) -> Result<Vec<String>, AppError>;
}
