//! Scenario Sweep: reruns the aggregator for a list of hypothetical applicant
//! signals and derives cross-scenario insights.
//!
//! The sweep runs under a deadline. When it passes, the remaining scenarios are
//! abandoned and the completed ones are returned with `truncated = true`.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::{timeout_at, Instant};
use tracing::{info, warn};

use crate::catalog::CatalogReader;
use crate::errors::AppError;
use crate::models::applicant::{ApplicantInput, ApplicantSignal};
use crate::prediction::aggregator::{Prediction, PredictionAggregator, PredictionOutcome, TierCounts};
use crate::prediction::comparator::Tier;
use crate::prediction::observer::EngineObserver;

/// Predictions kept per tier in each scenario result.
pub const TOP_PER_TIER: usize = 3;

#[derive(Debug, Clone, Deserialize)]
pub struct ScenarioInput {
    #[serde(default)]
    pub name: Option<String>,
    pub signal: ApplicantInput,
}

#[derive(Debug, Clone)]
pub struct Scenario {
    pub name: String,
    pub signal: ApplicantSignal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScenarioResult {
    pub name: String,
    pub signal: ApplicantSignal,
    pub safe: Vec<Prediction>,
    pub moderate: Vec<Prediction>,
    pub ambitious: Vec<Prediction>,
    pub counts: TierCounts,
    pub summary: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SweepOutcome {
    pub scenarios: Vec<ScenarioResult>,
    pub insights: Vec<String>,
    pub requested: usize,
    pub truncated: bool,
}

/// Validates raw scenario inputs. Unnamed scenarios are numbered from 1.
pub fn validate_scenarios(
    inputs: Vec<ScenarioInput>,
    max_scenarios: usize,
) -> Result<Vec<Scenario>, AppError> {
    if inputs.is_empty() {
        return Err(AppError::Validation(
            "at least one scenario is required".to_string(),
        ));
    }
    if inputs.len() > max_scenarios {
        return Err(AppError::Validation(format!(
            "at most {max_scenarios} scenarios are allowed, got {}",
            inputs.len()
        )));
    }

    inputs
        .into_iter()
        .enumerate()
        .map(|(i, input)| {
            let name = input
                .name
                .map(|n| n.trim().to_string())
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| format!("Scenario {}", i + 1));
            let signal = input.signal.into_signal().map_err(|e| match e {
                AppError::Validation(msg) => AppError::Validation(format!("{name}: {msg}")),
                other => other,
            })?;
            Ok(Scenario { name, signal })
        })
        .collect()
}

impl ScenarioResult {
    fn from_outcome(name: &str, signal: &ApplicantSignal, outcome: PredictionOutcome) -> Self {
        let counts = outcome.summary.counts.clone();
        let top = |tier: Tier| -> Vec<Prediction> {
            outcome
                .predictions
                .iter()
                .filter(|p| p.tier == tier)
                .take(TOP_PER_TIER)
                .cloned()
                .collect()
        };
        Self {
            name: name.to_string(),
            signal: signal.clone(),
            safe: top(Tier::Safe),
            moderate: top(Tier::Moderate),
            ambitious: top(Tier::Ambitious),
            counts,
            summary: outcome.summary.message,
        }
    }
}

/// Runs every scenario in order, independently, until `budget` is spent.
/// Catalog errors fail the whole sweep; running out of time does not.
pub async fn sweep(
    aggregator: &PredictionAggregator,
    catalog: &dyn CatalogReader,
    observer: &dyn EngineObserver,
    scenarios: &[Scenario],
    budget: Duration,
) -> Result<SweepOutcome, AppError> {
    let deadline = Instant::now() + budget;
    let mut results = Vec::with_capacity(scenarios.len());
    let mut truncated = false;

    for scenario in scenarios {
        match timeout_at(deadline, aggregator.aggregate(catalog, observer, &scenario.signal)).await {
            Ok(outcome) => {
                results.push(ScenarioResult::from_outcome(
                    &scenario.name,
                    &scenario.signal,
                    outcome?,
                ));
            }
            Err(_) => {
                warn!(
                    "Scenario sweep hit its {}ms budget after {} of {} scenarios",
                    budget.as_millis(),
                    results.len(),
                    scenarios.len()
                );
                observer.sweep_truncated(results.len(), scenarios.len());
                truncated = true;
                break;
            }
        }
    }

    let mut insights = derive_insights(&results);
    if truncated {
        insights.push(format!(
            "Stopped after {} of {} scenarios because the time budget ran out.",
            results.len(),
            scenarios.len()
        ));
    }
    info!("Swept {} scenarios", results.len());

    Ok(SweepOutcome {
        scenarios: results,
        insights,
        requested: scenarios.len(),
        truncated,
    })
}

fn options(n: i64) -> &'static str {
    if n == 1 {
        "option"
    } else {
        "options"
    }
}

fn delta_insight(first: &ScenarioResult, second: &ScenarioResult, word: &str, a: usize, b: usize) -> String {
    let delta = b as i64 - a as i64;
    match delta.signum() {
        1 => format!(
            "'{}' opens {delta} more {word} {} than '{}'.",
            second.name,
            options(delta),
            first.name
        ),
        -1 => format!(
            "'{}' has {} fewer {word} {} than '{}'.",
            second.name,
            -delta,
            options(-delta),
            first.name
        ),
        _ => format!(
            "'{}' and '{}' have the same number of {word} options ({a}).",
            first.name, second.name
        ),
    }
}

/// Cross-scenario insights. The ambitious/safe deltas compare the first two
/// scenarios and only exist when there are at least two.
pub fn derive_insights(results: &[ScenarioResult]) -> Vec<String> {
    let mut insights = Vec::new();

    if let [first, second, ..] = results {
        insights.push(delta_insight(
            first,
            second,
            "ambitious",
            first.counts.ambitious,
            second.counts.ambitious,
        ));
        insights.push(delta_insight(
            first,
            second,
            "safe",
            first.counts.safe,
            second.counts.safe,
        ));
    }

    for r in results.iter().filter(|r| r.counts.total == 0) {
        insights.push(format!("'{}' has no institutions within reach.", r.name));
    }

    insights
}
