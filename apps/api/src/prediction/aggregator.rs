//! Prediction Aggregator: runs the comparator over every candidate
//! institution/program and builds the tiered, sorted result.
//!
//! Flow: resolve (lookup cascade) → evaluate each institution → stable sort by
//! probability → partition by tier + summary.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::catalog::resolver::{resolve, Resolution};
use crate::catalog::{CatalogReader, MatchStage};
use crate::errors::AppError;
use crate::models::applicant::{ApplicantSignal, Score};
use crate::models::catalog::{CutoffBounds, CutoffData, Institution};
use crate::prediction::comparator::{assess, ReachPolicy, Tier};
use crate::prediction::observer::EngineObserver;
use crate::prediction::range_parser::{
    parse_percentile_range, parse_rank_range, PERCENTILE_FALLBACK, RANK_FALLBACK,
};

/// Candidate lists longer than this are evaluated on the rayon pool.
const PARALLEL_THRESHOLD: usize = 64;

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// Whether the cutoff window behind a prediction came from the catalog or was
/// substituted because the catalog text could not be parsed.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum DataQuality {
    Reported,
    Fallback,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Prediction {
    pub institution_id: String,
    pub institution_name: String,
    pub program: Option<String>,
    pub location: String,
    pub tier: Tier,
    pub probability: u8, // 0 – 100
    pub cutoff: CutoffBounds,
    pub data_quality: DataQuality,
    pub rationale: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TierCounts {
    pub safe: usize,
    pub moderate: usize,
    pub ambitious: usize,
    pub total: usize,
    /// Institutions represented; one institution may contribute several programs.
    pub distinct_institutions: usize,
}

impl TierCounts {
    pub fn from_predictions(predictions: &[Prediction]) -> Self {
        let count = |tier: Tier| predictions.iter().filter(|p| p.tier == tier).count();
        let distinct: HashSet<&str> = predictions
            .iter()
            .map(|p| p.institution_id.as_str())
            .collect();
        Self {
            safe: count(Tier::Safe),
            moderate: count(Tier::Moderate),
            ambitious: count(Tier::Ambitious),
            total: predictions.len(),
            distinct_institutions: distinct.len(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionSummary {
    pub counts: TierCounts,
    pub institutions_found: usize,
    pub matched_by: Option<MatchStage>,
    pub fallback_windows: usize,
    pub backend: String, // "catalog" | "llm"
    pub message: String,
}

/// Sorted predictions plus their summary.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PredictionOutcome {
    pub predictions: Vec<Prediction>,
    pub summary: PredictionSummary,
}

/// Response shape of `predict`: predictions grouped by tier, each group
/// keeping the probability-descending order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TieredPredictions {
    pub safe: Vec<Prediction>,
    pub moderate: Vec<Prediction>,
    pub ambitious: Vec<Prediction>,
    pub summary: PredictionSummary,
}

impl PredictionOutcome {
    pub fn into_tiered(self) -> TieredPredictions {
        let mut safe = Vec::new();
        let mut moderate = Vec::new();
        let mut ambitious = Vec::new();
        for p in self.predictions {
            match p.tier {
                Tier::Safe => safe.push(p),
                Tier::Moderate => moderate.push(p),
                Tier::Ambitious => ambitious.push(p),
            }
        }
        TieredPredictions {
            safe,
            moderate,
            ambitious,
            summary: self.summary,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Aggregation
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default)]
pub struct PredictionAggregator {
    pub reach: ReachPolicy,
}

impl PredictionAggregator {
    pub fn new(reach: ReachPolicy) -> Self {
        Self { reach }
    }

    /// Resolves candidates for the signal and evaluates them.
    pub async fn aggregate(
        &self,
        catalog: &dyn CatalogReader,
        observer: &dyn EngineObserver,
        signal: &ApplicantSignal,
    ) -> Result<PredictionOutcome, AppError> {
        let resolution = resolve(catalog, observer, signal.track.code(), &signal.exam).await?;
        self.evaluate_resolved(Arc::new(resolution), signal, observer).await
    }

    /// Async form of [`evaluate`](Self::evaluate). Candidate lists above
    /// `PARALLEL_THRESHOLD` are evaluated on the blocking pool so the rayon
    /// pass never occupies a runtime worker.
    pub async fn evaluate_resolved(
        &self,
        resolution: Arc<Resolution>,
        signal: &ApplicantSignal,
        observer: &dyn EngineObserver,
    ) -> Result<PredictionOutcome, AppError> {
        if resolution.institutions.len() <= PARALLEL_THRESHOLD {
            return Ok(self.evaluate(&resolution, signal, observer));
        }

        let (score, reach) = (signal.score, self.reach);
        let shared = Arc::clone(&resolution);
        let (predictions, fallbacks) = tokio::task::spawn_blocking(move || {
            let recorder = FallbackRecorder::default();
            let predictions = collect_predictions(&shared.institutions, score, reach, &recorder);
            (predictions, recorder.into_events())
        })
        .await
        .map_err(|e| AppError::Internal(anyhow::anyhow!("prediction task failed: {e}")))?;

        // Replay on the caller's observer, which is not 'static.
        for (institution_id, raw) in &fallbacks {
            observer.parse_fallback(institution_id, raw);
        }
        Ok(finish(predictions, &resolution, signal, observer))
    }

    /// Evaluates already-resolved candidates. Pure apart from observer events.
    pub fn evaluate(
        &self,
        resolution: &Resolution,
        signal: &ApplicantSignal,
        observer: &dyn EngineObserver,
    ) -> PredictionOutcome {
        let predictions =
            collect_predictions(&resolution.institutions, signal.score, self.reach, observer);
        finish(predictions, resolution, signal, observer)
    }
}

/// Evaluates every institution in catalog order, on the rayon pool above
/// `PARALLEL_THRESHOLD`.
fn collect_predictions(
    institutions: &[Institution],
    score: Score,
    reach: ReachPolicy,
    observer: &dyn EngineObserver,
) -> Vec<Prediction> {
    if institutions.len() > PARALLEL_THRESHOLD {
        institutions
            .par_iter()
            .flat_map_iter(|inst| evaluate_institution(inst, score, reach, observer))
            .collect()
    } else {
        institutions
            .iter()
            .flat_map(|inst| evaluate_institution(inst, score, reach, observer))
            .collect()
    }
}

fn finish(
    mut predictions: Vec<Prediction>,
    resolution: &Resolution,
    signal: &ApplicantSignal,
    observer: &dyn EngineObserver,
) -> PredictionOutcome {
    // Stable: equal probabilities keep catalog order.
    predictions.sort_by(|a, b| b.probability.cmp(&a.probability));
    observer.predictions_emitted(predictions.len());

    let summary = summarize(signal, &predictions, resolution, "catalog");
    info!(
        "Predicted {} rows for {} {} ({})",
        predictions.len(),
        signal.track,
        signal.exam,
        signal.score
    );

    PredictionOutcome {
        predictions,
        summary,
    }
}

/// Collects parse fallbacks raised inside a blocking evaluation.
#[derive(Default)]
struct FallbackRecorder {
    events: Mutex<Vec<(String, String)>>,
}

impl FallbackRecorder {
    fn into_events(self) -> Vec<(String, String)> {
        self.events.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl EngineObserver for FallbackRecorder {
    fn lookup_resolved(&self, _stage: Option<MatchStage>, _institutions: usize) {}

    fn parse_fallback(&self, institution_id: &str, raw: &str) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push((institution_id.to_string(), raw.to_string()));
    }

    fn predictions_emitted(&self, _count: usize) {}
    fn upstream_fallback(&self) {}
    fn sweep_truncated(&self, _completed: usize, _requested: usize) {}
}

/// One prediction per in-reach program, or at most one for an aggregate range.
fn evaluate_institution(
    inst: &Institution,
    score: Score,
    reach: ReachPolicy,
    observer: &dyn EngineObserver,
) -> Vec<Prediction> {
    match &inst.cutoff {
        CutoffData::Programs { programs } => programs
            .iter()
            .filter_map(|program| {
                build_prediction(
                    inst,
                    Some(&program.name),
                    program.bounds(),
                    DataQuality::Reported,
                    score,
                    reach,
                )
            })
            .collect(),
        CutoffData::Aggregate { range } => {
            let (bounds, quality) = aggregate_bounds(inst, range, score, observer);
            build_prediction(inst, None, bounds, quality, score, reach)
                .into_iter()
                .collect()
        }
    }
}

/// Parses an aggregate range in the unit of the applicant's score, substituting
/// the fallback window on failure.
pub fn aggregate_bounds(
    inst: &Institution,
    range: &str,
    score: Score,
    observer: &dyn EngineObserver,
) -> (CutoffBounds, DataQuality) {
    let (parsed, fallback) = match score {
        Score::Rank(_) => (parse_rank_range(range), RANK_FALLBACK),
        Score::Percentile(_) => (parse_percentile_range(range), PERCENTILE_FALLBACK),
    };
    match parsed {
        Some(bounds) => (bounds, DataQuality::Reported),
        None => {
            warn!(
                "Unparseable cutoff '{}' for institution {}; using fallback window {}-{}",
                range, inst.id, fallback.min, fallback.max
            );
            observer.parse_fallback(&inst.id, range);
            (fallback, DataQuality::Fallback)
        }
    }
}

fn build_prediction(
    inst: &Institution,
    program: Option<&str>,
    bounds: CutoffBounds,
    data_quality: DataQuality,
    score: Score,
    reach: ReachPolicy,
) -> Option<Prediction> {
    let assessment = assess(score, bounds, reach)?;
    let rationale = rationale(score, bounds, assessment.tier, assessment.probability, data_quality);
    Some(Prediction {
        institution_id: inst.id.clone(),
        institution_name: inst.name.clone(),
        program: program.map(str::to_string),
        location: inst.location(),
        tier: assessment.tier,
        probability: assessment.probability,
        cutoff: bounds,
        data_quality,
        rationale,
    })
}

fn rationale(
    score: Score,
    bounds: CutoffBounds,
    tier: Tier,
    probability: u8,
    quality: DataQuality,
) -> String {
    let mut text = match score {
        Score::Rank(rank) => format!(
            "Your rank {rank} against a closing-rank window of {}-{} (average {:.0}) puts this in the {} tier with an estimated {probability}% chance.",
            bounds.min,
            bounds.max,
            bounds.average(),
            tier.label()
        ),
        Score::Percentile(pct) => format!(
            "Your percentile {pct} against a cutoff window of {}-{} (average {:.1}) puts this in the {} tier with an estimated {probability}% chance.",
            bounds.min,
            bounds.max,
            bounds.average(),
            tier.label()
        ),
    };
    if quality == DataQuality::Fallback {
        text.push_str(" The catalog cutoff was unreadable, so a default window was assumed.");
    }
    text
}

/// Builds the summary for `predictions` produced by `backend` over `resolution`.
pub fn summarize(
    signal: &ApplicantSignal,
    predictions: &[Prediction],
    resolution: &Resolution,
    backend: &str,
) -> PredictionSummary {
    let counts = TierCounts::from_predictions(predictions);
    let fallback_windows = predictions
        .iter()
        .filter(|p| p.data_quality == DataQuality::Fallback)
        .count();
    let found = resolution.institutions.len();

    let mut message = match resolution.stage {
        None => format!(
            "No institutions matched track {} and exam '{}' after exact, case-insensitive and partial lookups.",
            signal.track, signal.exam
        ),
        Some(_) if predictions.is_empty() => format!(
            "Found {found} institutions for {} / {}, but none are within reach for {}.",
            signal.track, signal.exam, signal.score
        ),
        Some(stage) => format!(
            "{} predictions across {} of {found} institutions ({} safe, {} moderate, {} ambitious), matched by {} lookup.",
            counts.total,
            counts.distinct_institutions,
            counts.safe,
            counts.moderate,
            counts.ambitious,
            stage.describe()
        ),
    };
    if fallback_windows > 0 {
        message.push_str(&format!(
            " {fallback_windows} of them use a default cutoff window because the catalog range was unreadable."
        ));
    }

    PredictionSummary {
        counts,
        institutions_found: found,
        matched_by: resolution.stage,
        fallback_windows,
        backend: backend.to_string(),
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::fixtures::*;
    use crate::catalog::memory::InMemoryCatalog;
    use crate::models::applicant::{Category, Track};
    use crate::prediction::observer::{EngineCounters, NoopObserver};

    fn rank_signal(rank: u32) -> ApplicantSignal {
        ApplicantSignal {
            track: Track::Mpc,
            exam: "JEE Main".to_string(),
            score: Score::Rank(rank),
            category: Category::default(),
            home_state: None,
        }
    }

    fn percentile_signal(pct: f64) -> ApplicantSignal {
        ApplicantSignal {
            track: Track::Mec,
            exam: "CAT".to_string(),
            score: Score::Percentile(pct),
            category: Category::default(),
            home_state: None,
        }
    }

    #[tokio::test]
    async fn test_rank_program_scenario() {
        let catalog = InMemoryCatalog::new(vec![institution(
            "iit",
            "MPC",
            "JEE Main",
            programs(&[("CSE", 300, 700)]),
        )]);
        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &NoopObserver, &rank_signal(500))
            .await
            .unwrap();
        assert_eq!(outcome.predictions.len(), 1);
        let p = &outcome.predictions[0];
        assert_eq!(p.tier, Tier::Moderate);
        assert_eq!(p.probability, 70);
        assert_eq!(p.program.as_deref(), Some("CSE"));
        assert_eq!(p.data_quality, DataQuality::Reported);
    }

    #[tokio::test]
    async fn test_percentile_aggregate_scenario() {
        let catalog = InMemoryCatalog::new(vec![institution("iim", "MEC", "CAT", aggregate("85-90"))]);
        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &NoopObserver, &percentile_signal(92.0))
            .await
            .unwrap();
        let p = &outcome.predictions[0];
        assert_eq!(p.tier, Tier::Moderate);
        assert_eq!(p.probability, 70);
        assert!(p.rationale.contains("moderate"));
    }

    #[tokio::test]
    async fn test_empty_catalog_is_explained_not_error() {
        let catalog = InMemoryCatalog::default();
        let tiered = PredictionAggregator::default()
            .aggregate(&catalog, &NoopObserver, &rank_signal(500))
            .await
            .unwrap()
            .into_tiered();
        assert!(tiered.safe.is_empty() && tiered.moderate.is_empty() && tiered.ambitious.is_empty());
        assert_eq!(tiered.summary.matched_by, None);
        assert!(tiered.summary.message.contains("No institutions matched"));
    }

    #[tokio::test]
    async fn test_out_of_reach_programs_are_dropped() {
        let catalog = InMemoryCatalog::new(vec![institution(
            "nit",
            "MPC",
            "JEE Main",
            programs(&[("CSE", 100, 300), ("Civil", 4000, 6000)]),
        )]);
        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &NoopObserver, &rank_signal(2000))
            .await
            .unwrap();
        let names: Vec<_> = outcome
            .predictions
            .iter()
            .map(|p| p.program.as_deref().unwrap())
            .collect();
        assert_eq!(names, vec!["Civil"]);
    }

    #[tokio::test]
    async fn test_distinct_institution_count() {
        let catalog = InMemoryCatalog::new(vec![
            institution(
                "a",
                "MPC",
                "JEE Main",
                programs(&[("CSE", 900, 1100), ("ECE", 1900, 2100), ("ME", 2900, 3100)]),
            ),
            institution("b", "MPC", "JEE Main", aggregate("1,500-2,500")),
        ]);
        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &NoopObserver, &rank_signal(1000))
            .await
            .unwrap();
        assert_eq!(outcome.summary.counts.total, 4);
        assert_eq!(outcome.summary.counts.distinct_institutions, 2);
    }

    #[tokio::test]
    async fn test_sorted_by_probability_descending() {
        let catalog = InMemoryCatalog::new(vec![
            institution("tight", "MPC", "JEE Main", aggregate("900-1100")),
            institution("easy", "MPC", "JEE Main", aggregate("9000-11000")),
            institution("mid", "MPC", "JEE Main", aggregate("1400-1600")),
        ]);
        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &NoopObserver, &rank_signal(1000))
            .await
            .unwrap();
        let probs: Vec<u8> = outcome.predictions.iter().map(|p| p.probability).collect();
        assert_eq!(probs, vec![95, 85, 70]);
        assert_eq!(outcome.predictions[0].institution_id, "easy");
    }

    #[tokio::test]
    async fn test_unparseable_range_is_flagged() {
        let counters = EngineCounters::default();
        let catalog = InMemoryCatalog::new(vec![institution("x", "MPC", "JEE Main", aggregate("N/A"))]);
        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &counters, &rank_signal(6000))
            .await
            .unwrap();
        let p = &outcome.predictions[0];
        assert_eq!(p.data_quality, DataQuality::Fallback);
        assert_eq!(p.cutoff, RANK_FALLBACK);
        assert_eq!(outcome.summary.fallback_windows, 1);
        assert!(outcome.summary.message.contains("default cutoff window"));
        assert_eq!(counters.snapshot().parse_fallbacks, 1);
    }

    #[tokio::test]
    async fn test_predict_is_idempotent() {
        let catalog = InMemoryCatalog::new(vec![
            institution("a", "MPC", "JEE Main", aggregate("900-1100")),
            institution("b", "MPC", "JEE Main", aggregate("900-1100")),
            institution("c", "MPC", "JEE Main", programs(&[("CSE", 800, 1200)])),
        ]);
        let agg = PredictionAggregator::default();
        let first = agg
            .aggregate(&catalog, &NoopObserver, &rank_signal(1000))
            .await
            .unwrap();
        let second = agg
            .aggregate(&catalog, &NoopObserver, &rank_signal(1000))
            .await
            .unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_parallel_path_matches_sequential_order() {
        let institutions: Vec<_> = (0..200)
            .map(|i| {
                let lo = 500 + (i % 17) * 100;
                institution(
                    &format!("inst-{i:03}"),
                    "MPC",
                    "JEE Main",
                    aggregate(&format!("{lo}-{}", lo + 400)),
                )
            })
            .collect();
        let signal = rank_signal(900);
        let resolution = Resolution {
            institutions: institutions.clone(),
            stage: Some(MatchStage::Exact),
        };
        let parallel = PredictionAggregator::default().evaluate(&resolution, &signal, &NoopObserver);

        let mut sequential: Vec<Prediction> = institutions
            .iter()
            .flat_map(|inst| evaluate_institution(inst, signal.score, ReachPolicy::Exclude, &NoopObserver))
            .collect();
        sequential.sort_by(|a, b| b.probability.cmp(&a.probability));

        assert_eq!(parallel.predictions, sequential);
    }

    #[tokio::test]
    async fn test_large_catalog_offloads_and_replays_fallbacks() {
        let institutions: Vec<_> = (0..100)
            .map(|i| {
                let range = if i % 10 == 0 {
                    "TBD".to_string()
                } else {
                    format!("{}-{}", 600 + i * 10, 1200 + i * 10)
                };
                institution(&format!("inst-{i:03}"), "MPC", "JEE Main", aggregate(&range))
            })
            .collect();
        let catalog = InMemoryCatalog::new(institutions.clone());
        let signal = rank_signal(900);
        let counters = EngineCounters::default();

        let outcome = PredictionAggregator::default()
            .aggregate(&catalog, &counters, &signal)
            .await
            .unwrap();

        let resolution = Resolution {
            institutions,
            stage: Some(MatchStage::Exact),
        };
        let inline = PredictionAggregator::default().evaluate(&resolution, &signal, &NoopObserver);
        assert_eq!(outcome.predictions, inline.predictions);
        assert_eq!(outcome.summary.fallback_windows, 10);

        let snapshot = counters.snapshot();
        assert_eq!(snapshot.parse_fallbacks, 10);
        assert_eq!(snapshot.predictions_emitted, outcome.predictions.len() as u64);
    }
}
