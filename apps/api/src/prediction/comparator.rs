//! Rank and percentile comparators: pure mappings from an applicant score and
//! a cutoff window to an admission tier and probability.
//!
//! All thresholds are multiples of the window average and live in one
//! calibration table per comparator.

use serde::{Deserialize, Serialize};

use crate::models::applicant::Score;
use crate::models::catalog::CutoffBounds;

// ────────────────────────────────────────────────────────────────────────────
// Output types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Safe,
    Moderate,
    Ambitious,
}

impl Tier {
    pub fn label(&self) -> &'static str {
        match self {
            Tier::Safe => "safe",
            Tier::Moderate => "moderate",
            Tier::Ambitious => "ambitious",
        }
    }
}

/// What the comparator concluded for one cutoff window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    pub tier: Tier,
    pub probability: u8,
}

/// Whether scores beyond the ambitious threshold are dropped or shown as a
/// low-probability reach band.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ReachPolicy {
    #[default]
    Exclude,
    Include,
}

impl ReachPolicy {
    pub fn from_flag(admit_reach_tier: bool) -> Self {
        if admit_reach_tier {
            ReachPolicy::Include
        } else {
            ReachPolicy::Exclude
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Calibration tables
// ────────────────────────────────────────────────────────────────────────────

/// Probability ladder shared by both comparators, strongest band first.
#[derive(Debug, Clone, Copy)]
pub struct ProbabilityLadder {
    pub excellent: u8,
    pub strong: u8,
    pub at_average: u8,
    pub borderline: u8,
    pub stretch: u8,
    pub reach: u8,
}

pub const PROBABILITIES: ProbabilityLadder = ProbabilityLadder {
    excellent: 95,
    strong: 85,
    at_average: 70,
    borderline: 55,
    stretch: 35,
    reach: 20,
};

/// Lower is better: each factor is an upper bound on `rank / avg`, expressed
/// as a percentage of the window average.
#[derive(Debug, Clone, Copy)]
pub struct RankCalibration {
    pub excellent: u32,
    pub safe: u32,
    pub at_average: u32,
    pub moderate: u32,
    pub ambitious: u32,
    /// Outer limit of the reach band when [`ReachPolicy::Include`] is active.
    pub reach: u32,
}

pub const RANK_CALIBRATION: RankCalibration = RankCalibration {
    excellent: 50,
    safe: 80,
    at_average: 100,
    moderate: 120,
    ambitious: 150,
    reach: 200,
};

/// Higher is better: each factor is a lower bound on `percentile / avg`, as a
/// percentage of the window average.
#[derive(Debug, Clone, Copy)]
pub struct PercentileCalibration {
    pub excellent: u32,
    pub safe: u32,
    pub at_average: u32,
    pub moderate: u32,
    pub ambitious: u32,
    pub reach: u32,
}

pub const PERCENTILE_CALIBRATION: PercentileCalibration = PercentileCalibration {
    excellent: 120,
    safe: 110,
    at_average: 100,
    moderate: 90,
    ambitious: 75,
    reach: 60,
};

/// `factor_pct% * avg`, scaled by 200 so it stays an integer:
/// `score <= factor_pct / 100 * (min + max) / 2` iff `score * 200 <= factor_pct * (min + max)`.
fn scaled_threshold(factor_pct: u32, bounds: CutoffBounds) -> i128 {
    factor_pct as i128 * bounds.sum()
}

fn rank_within(rank: u32, factor_pct: u32, bounds: CutoffBounds) -> bool {
    rank as i128 * 200 <= scaled_threshold(factor_pct, bounds)
}

fn percentile_at_least(percentile: f64, factor_pct: u32, bounds: CutoffBounds) -> bool {
    percentile * 200.0 >= scaled_threshold(factor_pct, bounds) as f64
}

// ────────────────────────────────────────────────────────────────────────────
// Rank comparator
// ────────────────────────────────────────────────────────────────────────────

pub fn categorize_by_rank(rank: u32, bounds: CutoffBounds, reach: ReachPolicy) -> Option<Tier> {
    let cal = &RANK_CALIBRATION;
    let within = |factor| rank_within(rank, factor, bounds);

    if within(cal.safe) {
        Some(Tier::Safe)
    } else if within(cal.moderate) {
        Some(Tier::Moderate)
    } else if within(cal.ambitious) {
        Some(Tier::Ambitious)
    } else if reach == ReachPolicy::Include && within(cal.reach) {
        Some(Tier::Ambitious)
    } else {
        None
    }
}

pub fn rank_probability(rank: u32, bounds: CutoffBounds) -> u8 {
    let cal = &RANK_CALIBRATION;
    let p = &PROBABILITIES;
    let within = |factor| rank_within(rank, factor, bounds);

    if within(cal.excellent) {
        p.excellent
    } else if within(cal.safe) {
        p.strong
    } else if within(cal.at_average) {
        p.at_average
    } else if within(cal.moderate) {
        p.borderline
    } else if within(cal.ambitious) {
        p.stretch
    } else {
        p.reach
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Percentile comparator
// ────────────────────────────────────────────────────────────────────────────

pub fn percentile_probability(percentile: f64, bounds: CutoffBounds) -> u8 {
    let cal = &PERCENTILE_CALIBRATION;
    let p = &PROBABILITIES;
    let at_least = |factor| percentile_at_least(percentile, factor, bounds);

    if at_least(cal.excellent) {
        p.excellent
    } else if at_least(cal.safe) {
        p.strong
    } else if at_least(cal.at_average) {
        p.at_average
    } else if at_least(cal.moderate) {
        p.borderline
    } else if at_least(cal.ambitious) {
        p.stretch
    } else {
        p.reach
    }
}

pub fn categorize_by_percentile(
    percentile: f64,
    bounds: CutoffBounds,
    reach: ReachPolicy,
) -> (Option<Tier>, u8) {
    let cal = &PERCENTILE_CALIBRATION;
    let at_least = |factor| percentile_at_least(percentile, factor, bounds);

    let tier = if at_least(cal.safe) {
        Some(Tier::Safe)
    } else if at_least(cal.moderate) {
        Some(Tier::Moderate)
    } else if at_least(cal.ambitious) {
        Some(Tier::Ambitious)
    } else if reach == ReachPolicy::Include && at_least(cal.reach) {
        Some(Tier::Ambitious)
    } else {
        None
    };

    (tier, percentile_probability(percentile, bounds))
}

// ────────────────────────────────────────────────────────────────────────────
// Dispatch
// ────────────────────────────────────────────────────────────────────────────

/// Applies the comparator matching the score's mode. `None` means the window
/// is out of reach and the institution/program is dropped.
pub fn assess(score: Score, bounds: CutoffBounds, reach: ReachPolicy) -> Option<Assessment> {
    match score {
        Score::Rank(rank) => categorize_by_rank(rank, bounds, reach).map(|tier| Assessment {
            tier,
            probability: rank_probability(rank, bounds),
        }),
        Score::Percentile(pct) => {
            let (tier, probability) = categorize_by_percentile(pct, bounds, reach);
            tier.map(|tier| Assessment { tier, probability })
        }
    }
}

/// Probability alone, without tier gating.
pub fn probability_for(score: Score, bounds: CutoffBounds) -> u8 {
    match score {
        Score::Rank(rank) => rank_probability(rank, bounds),
        Score::Percentile(pct) => percentile_probability(pct, bounds),
    }
}
