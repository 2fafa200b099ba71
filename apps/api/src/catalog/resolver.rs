use tracing::{debug, info};

use crate::catalog::{CatalogReader, MatchStage};
use crate::errors::AppError;
use crate::models::catalog::Institution;
use crate::prediction::observer::EngineObserver;

/// Institutions found for a (track, exam) pair and the stage that found them.
/// `stage` is `None` when the whole cascade missed, which is a valid empty result.
#[derive(Debug, Clone)]
pub struct Resolution {
    pub institutions: Vec<Institution>,
    pub stage: Option<MatchStage>,
}

/// Runs the lookup cascade (exact, case-insensitive, partial), stopping at the
/// first stage that returns anything.
pub async fn resolve(
    catalog: &dyn CatalogReader,
    observer: &dyn EngineObserver,
    track: &str,
    exam: &str,
) -> Result<Resolution, AppError> {
    for stage in MatchStage::CASCADE {
        let institutions = catalog.find_by_track_and_exam(track, exam, stage).await?;
        if !institutions.is_empty() {
            info!(
                "Resolved {} institutions for ({track}, {exam}) via {} match",
                institutions.len(),
                stage.describe()
            );
            observer.lookup_resolved(Some(stage), institutions.len());
            return Ok(Resolution {
                institutions,
                stage: Some(stage),
            });
        }
        debug!("{} match for ({track}, {exam}) found nothing", stage.describe());
    }

    info!("No catalog entries for ({track}, {exam}) after every lookup stage");
    observer.lookup_resolved(None, 0);
    Ok(Resolution {
        institutions: Vec::new(),
        stage: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::fixtures::*;
    use crate::catalog::memory::InMemoryCatalog;
    use crate::prediction::observer::EngineCounters;

    fn catalog() -> InMemoryCatalog {
        InMemoryCatalog::new(vec![
            institution("exact", "MPC", "JEE Main", aggregate("100-200")),
            institution("folded", "mpc", "JEE MAIN", aggregate("100-200")),
            institution("partial", "MPC (Engg)", "JEE Main 2024", aggregate("100-200")),
        ])
    }

    #[tokio::test]
    async fn test_exact_stage_wins_and_stops_cascade() {
        let counters = EngineCounters::default();
        let res = resolve(&catalog(), &counters, "MPC", "JEE Main").await.unwrap();
        assert_eq!(res.stage, Some(MatchStage::Exact));
        assert_eq!(res.institutions.len(), 1);
        assert_eq!(counters.snapshot().exact_matches, 1);
    }

    #[tokio::test]
    async fn test_falls_back_to_case_insensitive() {
        let res = resolve(&catalog(), &EngineCounters::default(), "Mpc", "jee main")
            .await
            .unwrap();
        assert_eq!(res.stage, Some(MatchStage::CaseInsensitive));
        let ids: Vec<_> = res.institutions.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["exact", "folded"]);
    }

    #[tokio::test]
    async fn test_falls_back_to_partial() {
        let res = resolve(&catalog(), &EngineCounters::default(), "engg", "2024")
            .await
            .unwrap();
        assert_eq!(res.stage, Some(MatchStage::Partial));
        assert_eq!(res.institutions[0].id, "partial");
    }

    #[tokio::test]
    async fn test_total_miss_is_empty_not_error() {
        let counters = EngineCounters::default();
        let res = resolve(&catalog(), &counters, "HEC", "CUET").await.unwrap();
        assert!(res.institutions.is_empty());
        assert_eq!(res.stage, None);
        assert_eq!(counters.snapshot().lookup_misses, 1);
    }
}
