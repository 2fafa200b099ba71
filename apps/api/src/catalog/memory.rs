use std::collections::BTreeSet;
use std::path::Path;

use anyhow::{Context, Result};
use async_trait::async_trait;
use tracing::info;

use crate::catalog::{CatalogField, CatalogReader, MatchStage};
use crate::errors::AppError;
use crate::models::catalog::{Institution, InstitutionType};

/// Catalog snapshot held in memory. Loaded once from a JSON array of
/// institutions; also the backend used throughout the tests.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalog {
    institutions: Vec<Institution>,
}

impl InMemoryCatalog {
    pub fn new(institutions: Vec<Institution>) -> Self {
        Self { institutions }
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read catalog file {}", path.display()))?;
        let institutions: Vec<Institution> = serde_json::from_str(&raw)
            .with_context(|| format!("Catalog file {} is not valid JSON", path.display()))?;
        info!(
            "Loaded {} institutions from {}",
            institutions.len(),
            path.display()
        );
        Ok(Self::new(institutions))
    }

    pub fn len(&self) -> usize {
        self.institutions.len()
    }
}

fn institution_type_label(t: InstitutionType) -> &'static str {
    match t {
        InstitutionType::Government => "government",
        InstitutionType::Private => "private",
        InstitutionType::Deemed => "deemed",
        InstitutionType::Autonomous => "autonomous",
    }
}

#[async_trait]
impl CatalogReader for InMemoryCatalog {
    async fn find_by_track_and_exam(
        &self,
        track: &str,
        exam: &str,
        stage: MatchStage,
    ) -> Result<Vec<Institution>, AppError> {
        Ok(self
            .institutions
            .iter()
            .filter(|inst| {
                stage.matches(&inst.track, track)
                    && inst.exams.iter().any(|e| stage.matches(e, exam))
            })
            .cloned()
            .collect())
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Institution>, AppError> {
        Ok(self.institutions.iter().find(|i| i.id == id).cloned())
    }

    async fn distinct(&self, field: CatalogField) -> Result<Vec<String>, AppError> {
        let values: BTreeSet<String> = match field {
            CatalogField::Tracks => self.institutions.iter().map(|i| i.track.clone()).collect(),
            CatalogField::Exams => self
                .institutions
                .iter()
                .flat_map(|i| i.exams.iter().cloned())
                .collect(),
            CatalogField::States => self.institutions.iter().map(|i| i.state.clone()).collect(),
            CatalogField::InstitutionTypes => self
                .institutions
                .iter()
                .map(|i| institution_type_label(i.institution_type).to_string())
                .collect(),
        };
        Ok(values.into_iter().collect())
    }
}
