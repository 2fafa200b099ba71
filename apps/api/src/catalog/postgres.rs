use anyhow::Result;
use async_trait::async_trait;
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use tracing::{debug, info};

use crate::catalog::{CatalogField, CatalogReader, MatchStage};
use crate::errors::AppError;
use crate::models::catalog::{Institution, InstitutionRow};

const INSTITUTION_COLUMNS: &str = "id, name, track, exams, city, state, institution_type, \
     accreditation, fees, placement_rate, average_package, median_package, \
     cutoff_range, programs, quota_cutoffs";

/// Creates and returns a PostgreSQL connection pool.
pub async fn create_pool(database_url: &str) -> Result<PgPool> {
    info!("Connecting to PostgreSQL...");

    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    info!("PostgreSQL connection pool established");
    Ok(pool)
}

/// Catalog backed by the `institutions` table. Only issues SELECTs.
#[derive(Clone)]
pub struct PgCatalog {
    pool: PgPool,
}

impl PgCatalog {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn where_clause(stage: MatchStage) -> &'static str {
    match stage {
        MatchStage::Exact => "track = $1 AND $2 = ANY(exams)",
        MatchStage::CaseInsensitive => {
            "lower(track) = lower($1) \
             AND EXISTS (SELECT 1 FROM unnest(exams) AS e WHERE lower(e) = lower($2))"
        }
        MatchStage::Partial => {
            "strpos(lower(track), lower($1)) > 0 \
             AND EXISTS (SELECT 1 FROM unnest(exams) AS e WHERE strpos(lower(e), lower($2)) > 0)"
        }
    }
}

fn distinct_query(field: CatalogField) -> &'static str {
    match field {
        CatalogField::Tracks => "SELECT DISTINCT track FROM institutions ORDER BY 1",
        CatalogField::Exams => {
            "SELECT DISTINCT e FROM institutions, unnest(exams) AS e ORDER BY 1"
        }
        CatalogField::States => "SELECT DISTINCT state FROM institutions ORDER BY 1",
        CatalogField::InstitutionTypes => {
            "SELECT DISTINCT institution_type FROM institutions ORDER BY 1"
        }
    }
}

fn into_institutions(rows: Vec<InstitutionRow>) -> Result<Vec<Institution>, AppError> {
    rows.into_iter()
        .map(|row| Institution::try_from(row).map_err(AppError::Internal))
        .collect()
}

#[async_trait]
impl CatalogReader for PgCatalog {
    async fn find_by_track_and_exam(
        &self,
        track: &str,
        exam: &str,
        stage: MatchStage,
    ) -> Result<Vec<Institution>, AppError> {
        let sql = format!(
            "SELECT {INSTITUTION_COLUMNS} FROM institutions WHERE {} ORDER BY id",
            where_clause(stage)
        );
        let rows: Vec<InstitutionRow> = sqlx::query_as(&sql)
            .bind(track)
            .bind(exam)
            .fetch_all(&self.pool)
            .await?;
        debug!(
            "{} catalog lookup for ({track}, {exam}) returned {} rows",
            stage.describe(),
            rows.len()
        );
        into_institutions(rows)
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Institution>, AppError> {
        let sql = format!("SELECT {INSTITUTION_COLUMNS} FROM institutions WHERE id = $1");
        let row: Option<InstitutionRow> = sqlx::query_as(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| Institution::try_from(r).map_err(AppError::Internal))
            .transpose()
    }

    async fn distinct(&self, field: CatalogField) -> Result<Vec<String>, AppError> {
        let values: Vec<String> = sqlx::query_scalar(distinct_query(field))
            .fetch_all(&self.pool)
            .await?;
        Ok(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_where_clause_binds_two_params() {
        for stage in MatchStage::CASCADE {
            let clause = where_clause(stage);
            assert!(clause.contains("$1") && clause.contains("$2"), "{clause}");
        }
    }

    #[test]
    fn test_partial_avoids_like_wildcards() {
        // user input must not be interpreted as a LIKE pattern
        assert!(!where_clause(MatchStage::Partial).contains("LIKE"));
    }
}
