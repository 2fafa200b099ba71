//! Comparison Engine: side-by-side cost, outcome, ROI and admission chance for
//! a small fixed set of institutions.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::CatalogReader;
use crate::comparison::rules::pros_and_cons;
use crate::errors::AppError;
use crate::models::applicant::{Category, ComparatorMode, Score, Track};
use crate::models::catalog::{CutoffBounds, CutoffData, Institution, InstitutionType};
use crate::prediction::aggregator::{aggregate_bounds, DataQuality};
use crate::prediction::comparator::probability_for;
use crate::prediction::observer::EngineObserver;

pub const MIN_INSTITUTIONS: usize = 2;
pub const MAX_INSTITUTIONS: usize = 5;

pub const CATEGORY_BOOST: f64 = 1.10;
pub const HOME_STATE_BOOST: f64 = 1.15;
/// Boosted probabilities never exceed this.
pub const BOOSTED_PROBABILITY_CAP: f64 = 95.0;

/// Probability below which a recommendation warns that the option is a reach.
const REACH_WARNING_PROBABILITY: u8 = 40;

// ────────────────────────────────────────────────────────────────────────────
// Request / Response types
// ────────────────────────────────────────────────────────────────────────────

/// Applicant details for a comparison. All optional: without a score the
/// comparison still reports cost and outcomes, just no admission chance.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicantContext {
    pub track: Option<String>,
    pub exam: Option<String>,
    pub rank: Option<i64>,
    pub percentile: Option<f64>,
    pub category: Option<String>,
    pub home_state: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum CutoffSource {
    HomeStateQuota,
    OpenQuota,
    InstitutionWindow,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CutoffBasis {
    pub source: CutoffSource,
    pub bounds: CutoffBounds,
    pub data_quality: DataQuality,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonRow {
    pub institution_id: String,
    pub name: String,
    pub location: String,
    pub institution_type: InstitutionType,
    pub accreditation: String,
    pub annual_fees: i64,
    pub total_cost: i64,
    pub placement_rate: f64,
    pub average_package: i64,
    pub median_package: i64,
    /// average_package / total_cost, as a percentage.
    pub roi_percent: Option<f64>,
    pub admission_probability: Option<u8>,
    pub cutoff_basis: Option<CutoffBasis>,
    pub pros: Vec<String>,
    pub cons: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComparisonResult {
    pub rows: Vec<ComparisonRow>,
    pub summary: String,
    pub best_roi: Option<String>,
    pub most_affordable: Option<String>,
    pub recommendations: Vec<String>,
}

/// Validated form of [`ApplicantContext`].
#[derive(Debug, Clone)]
struct Applicant {
    track: Option<Track>,
    exam: Option<String>,
    rank: Option<i64>,
    percentile: Option<f64>,
    category: Category,
    home_state: Option<String>,
}

impl Applicant {
    fn from_context(ctx: &ApplicantContext) -> Result<Self, AppError> {
        let track = ctx
            .track
            .as_deref()
            .filter(|t| !t.trim().is_empty())
            .map(str::parse::<Track>)
            .transpose()?;
        // Range-check both scores up front, whichever mode ends up applying.
        Score::for_mode(ComparatorMode::Rank, ctx.rank, None)?;
        Score::for_mode(ComparatorMode::Percentile, None, ctx.percentile)?;

        Ok(Self {
            track,
            exam: ctx.exam.clone().filter(|e| !e.trim().is_empty()),
            rank: ctx.rank,
            percentile: ctx.percentile,
            category: ctx.category.clone().map(Category::new).unwrap_or_default(),
            home_state: ctx.home_state.clone().filter(|s| !s.trim().is_empty()),
        })
    }

    /// The applicant's score in the unit that applies to `inst`.
    fn score_for(&self, inst: &Institution) -> Option<Score> {
        let mode = self
            .track
            .or_else(|| inst.track.parse::<Track>().ok())
            .map(|t| t.mode())
            .or_else(|| match (self.rank, self.percentile) {
                (Some(_), None) => Some(ComparatorMode::Rank),
                (None, Some(_)) => Some(ComparatorMode::Percentile),
                _ => None,
            })?;
        Score::for_mode(mode, self.rank, self.percentile).ok().flatten()
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Engine
// ────────────────────────────────────────────────────────────────────────────

/// Applies category and home-state multipliers, capped at
/// [`BOOSTED_PROBABILITY_CAP`].
pub fn boosted_probability(base: f64, reserved_category: bool, home_state_quota: bool) -> u8 {
    let mut p = base;
    if reserved_category {
        p *= CATEGORY_BOOST;
    }
    if home_state_quota {
        p *= HOME_STATE_BOOST;
    }
    p.clamp(0.0, BOOSTED_PROBABILITY_CAP).round() as u8
}

pub fn roi_percent(average_package: i64, total_cost: i64) -> Option<f64> {
    if total_cost <= 0 {
        return None;
    }
    let roi = average_package as f64 / total_cost as f64 * 100.0;
    Some((roi * 10.0).round() / 10.0)
}

pub async fn compare(
    catalog: &dyn CatalogReader,
    observer: &dyn EngineObserver,
    institution_ids: &[String],
    ctx: &ApplicantContext,
) -> Result<ComparisonResult, AppError> {
    if !(MIN_INSTITUTIONS..=MAX_INSTITUTIONS).contains(&institution_ids.len()) {
        return Err(AppError::Validation(format!(
            "institution_ids must contain between {MIN_INSTITUTIONS} and {MAX_INSTITUTIONS} ids, got {}",
            institution_ids.len()
        )));
    }
    let unique: HashSet<&str> = institution_ids.iter().map(String::as_str).collect();
    if unique.len() != institution_ids.len() {
        return Err(AppError::Validation(
            "institution_ids must not contain duplicates".to_string(),
        ));
    }

    let applicant = Applicant::from_context(ctx)?;

    let mut institutions = Vec::with_capacity(institution_ids.len());
    for id in institution_ids {
        let inst = catalog
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::Validation(format!("institution '{id}' does not exist")))?;
        institutions.push(inst);
    }

    let rows: Vec<ComparisonRow> = institutions
        .iter()
        .map(|inst| build_row(inst, &applicant, observer))
        .collect();

    info!("Compared {} institutions", rows.len());
    Ok(finish(rows, &applicant))
}

fn build_row(inst: &Institution, applicant: &Applicant, observer: &dyn EngineObserver) -> ComparisonRow {
    let total_cost = inst.fees.total_cost();
    let (pros, cons) = pros_and_cons(inst, total_cost, applicant.home_state.as_deref());

    let (admission_probability, cutoff_basis) = match applicant.score_for(inst) {
        Some(score) => {
            let basis = select_cutoff(inst, applicant, score, observer);
            let base = probability_for(score, basis.bounds) as f64;
            let p = boosted_probability(
                base,
                !applicant.category.is_general(),
                basis.source == CutoffSource::HomeStateQuota,
            );
            (Some(p), Some(basis))
        }
        None => (None, None),
    };

    ComparisonRow {
        institution_id: inst.id.clone(),
        name: inst.name.clone(),
        location: inst.location(),
        institution_type: inst.institution_type,
        accreditation: inst.accreditation.clone(),
        annual_fees: inst.fees.annual_cost(),
        total_cost,
        placement_rate: inst.placement_rate,
        average_package: inst.average_package,
        median_package: inst.median_package,
        roi_percent: roi_percent(inst.average_package, total_cost),
        admission_probability,
        cutoff_basis,
        pros,
        cons,
    }
}

/// Picks the cutoff window relevant to the applicant: a category quota for
/// their home state, then an open category quota, then the institution's own
/// window (aggregate range, or the span of its programs).
fn select_cutoff(
    inst: &Institution,
    applicant: &Applicant,
    score: Score,
    observer: &dyn EngineObserver,
) -> CutoffBasis {
    let relevant: Vec<_> = inst
        .quota_cutoffs
        .iter()
        .filter(|q| applicant.category.matches(&q.category))
        .filter(|q| {
            applicant
                .exam
                .as_deref()
                .map_or(true, |exam| q.exam.eq_ignore_ascii_case(exam))
        })
        .collect();

    let home_state = relevant.iter().find(|q| {
        matches!(
            (q.state_quota.as_deref(), applicant.home_state.as_deref()),
            (Some(quota), Some(home)) if quota.eq_ignore_ascii_case(home)
        )
    });
    if let Some(q) = home_state {
        return CutoffBasis {
            source: CutoffSource::HomeStateQuota,
            bounds: q.bounds(),
            data_quality: DataQuality::Reported,
        };
    }

    if let Some(q) = relevant.iter().find(|q| q.state_quota.is_none()) {
        return CutoffBasis {
            source: CutoffSource::OpenQuota,
            bounds: q.bounds(),
            data_quality: DataQuality::Reported,
        };
    }

    let (bounds, data_quality) = match &inst.cutoff {
        CutoffData::Programs { programs } if !programs.is_empty() => {
            let span = programs
                .iter()
                .map(|p| p.bounds())
                .reduce(|acc, b| acc.span(&b))
                .unwrap_or_else(|| programs[0].bounds());
            (span, DataQuality::Reported)
        }
        CutoffData::Programs { .. } => aggregate_bounds(inst, "", score, observer),
        CutoffData::Aggregate { range } => aggregate_bounds(inst, range, score, observer),
    };
    CutoffBasis {
        source: CutoffSource::InstitutionWindow,
        bounds,
        data_quality,
    }
}

fn finish(rows: Vec<ComparisonRow>, applicant: &Applicant) -> ComparisonResult {
    let best_roi = rows
        .iter()
        .filter_map(|r| r.roi_percent.map(|roi| (r, roi)))
        .fold(None::<(&ComparisonRow, f64)>, |best, (r, roi)| match best {
            Some((_, best_roi)) if best_roi >= roi => best,
            _ => Some((r, roi)),
        });
    let most_affordable = rows
        .iter()
        .filter(|r| r.total_cost > 0)
        .min_by_key(|r| r.total_cost);

    let mut summary = format!("Compared {} institutions.", rows.len());
    if let Some((row, roi)) = best_roi {
        summary.push_str(&format!(" Best ROI: {} ({roi:.1}%).", row.name));
    }
    if let Some(row) = most_affordable {
        summary.push_str(&format!(
            " Most affordable: {} (₹{} in total).",
            row.name, row.total_cost
        ));
    }

    let recommendations = recommendations(&rows, applicant);

    ComparisonResult {
        best_roi: best_roi.map(|(r, _)| r.institution_id.clone()),
        most_affordable: most_affordable.map(|r| r.institution_id.clone()),
        rows,
        summary,
        recommendations,
    }
}

fn recommendations(rows: &[ComparisonRow], applicant: &Applicant) -> Vec<String> {
    let mut out = Vec::new();

    let scored: Vec<(&ComparisonRow, u8)> = rows
        .iter()
        .filter_map(|r| r.admission_probability.map(|p| (r, p)))
        .collect();

    if scored.is_empty() {
        if applicant.rank.is_none() && applicant.percentile.is_none() {
            out.push("Add your rank or percentile to see admission chances.".to_string());
        }
    } else {
        // first maximum wins ties
        let (top, p) = scored
            .iter()
            .fold(scored[0], |best, &(r, p)| if p > best.1 { (r, p) } else { best });
        out.push(format!("Highest admission chance: {} ({p}%).", top.name));
        for (row, p) in &scored {
            if *p < REACH_WARNING_PROBABILITY {
                out.push(format!(
                    "{} is a reach at {p}%; keep a safer option alongside it.",
                    row.name
                ));
            }
        }
    }

    if let Some(best_outcome) = rows.iter().max_by_key(|r| r.median_package) {
        if best_outcome.median_package > 0 {
            out.push(format!(
                "Strongest graduate outcomes: {} (median package ₹{}).",
                best_outcome.name, best_outcome.median_package
            ));
        }
    }

    out
}
