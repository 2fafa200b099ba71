use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::errors::AppError;

/// Comparison regime for an applicant score.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum ComparatorMode {
    /// Lower is better (ordinal exam rank).
    Rank,
    /// Higher is better.
    Percentile,
}

/// The five academic streams the catalog is organised by.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum Track {
    #[serde(rename = "MPC")]
    Mpc,
    #[serde(rename = "BiPC")]
    Bipc,
    #[serde(rename = "MEC")]
    Mec,
    #[serde(rename = "CEC")]
    Cec,
    #[serde(rename = "HEC")]
    Hec,
}

impl Track {
    pub const ALL: [Track; 5] = [Track::Mpc, Track::Bipc, Track::Mec, Track::Cec, Track::Hec];

    pub fn code(&self) -> &'static str {
        match self {
            Track::Mpc => "MPC",
            Track::Bipc => "BiPC",
            Track::Mec => "MEC",
            Track::Cec => "CEC",
            Track::Hec => "HEC",
        }
    }

    /// Fixed track → comparator binding. Engineering and medical streams are
    /// ranked; commerce and humanities streams report percentiles.
    pub fn mode(&self) -> ComparatorMode {
        match self {
            Track::Mpc | Track::Bipc => ComparatorMode::Rank,
            Track::Mec | Track::Cec | Track::Hec => ComparatorMode::Percentile,
        }
    }
}

impl fmt::Display for Track {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Track {
    type Err = AppError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        Track::ALL
            .into_iter()
            .find(|t| t.code().eq_ignore_ascii_case(trimmed))
            .ok_or_else(|| {
                AppError::Validation(format!(
                    "track '{trimmed}' is invalid; expected one of MPC, BiPC, MEC, CEC, HEC"
                ))
            })
    }
}

/// Applicant aptitude signal. Exactly one variant exists per applicant, chosen
/// by the track's mode.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Score {
    Rank(u32),
    Percentile(f64),
}

impl Score {
    /// Picks the score demanded by `mode` out of the loosely-typed request fields.
    pub fn for_mode(
        mode: ComparatorMode,
        rank: Option<i64>,
        percentile: Option<f64>,
    ) -> Result<Option<Score>, AppError> {
        match mode {
            ComparatorMode::Rank => match rank {
                None => Ok(None),
                Some(r) if r < 1 || r > u32::MAX as i64 => Err(AppError::Validation(format!(
                    "rank must be a positive integer, got {r}"
                ))),
                Some(r) => Ok(Some(Score::Rank(r as u32))),
            },
            ComparatorMode::Percentile => match percentile {
                None => Ok(None),
                Some(p) if !p.is_finite() || !(0.0..=100.0).contains(&p) => Err(
                    AppError::Validation(format!("percentile must be within 0-100, got {p}")),
                ),
                Some(p) => Ok(Some(Score::Percentile(p))),
            },
        }
    }
}

impl fmt::Display for Score {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Score::Rank(r) => write!(f, "rank {r}"),
            Score::Percentile(p) => write!(f, "percentile {p}"),
        }
    }
}

const DEFAULT_CATEGORY_ALIASES: &[&str] = &["general", "gen", "open", "ur"];

/// Reservation category. Anything other than the general aliases is a
/// reserved category and earns the comparison boost.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(transparent)]
pub struct Category(String);

impl Category {
    pub fn new(raw: impl Into<String>) -> Self {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            Self::default()
        } else {
            Self(trimmed.to_string())
        }
    }

    pub fn is_general(&self) -> bool {
        DEFAULT_CATEGORY_ALIASES
            .iter()
            .any(|alias| self.0.eq_ignore_ascii_case(alias))
    }

    /// Two categories match when they are equal ignoring case, or both are
    /// spellings of the general category.
    pub fn matches(&self, other: &str) -> bool {
        let other = Category::new(other);
        self.0.eq_ignore_ascii_case(&other.0) || (self.is_general() && other.is_general())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for Category {
    fn default() -> Self {
        Self("General".to_string())
    }
}

/// A validated applicant signal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplicantSignal {
    pub track: Track,
    pub exam: String,
    pub score: Score,
    #[serde(default)]
    pub category: Category,
    #[serde(default)]
    pub home_state: Option<String>,
}

/// Loosely-typed applicant input as it arrives over HTTP. Every field is
/// optional so missing values produce a field-naming validation error instead
/// of a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ApplicantInput {
    pub track: Option<String>,
    pub exam: Option<String>,
    pub rank: Option<i64>,
    pub percentile: Option<f64>,
    pub category: Option<String>,
    pub home_state: Option<String>,
}

impl ApplicantInput {
    pub fn into_signal(self) -> Result<ApplicantSignal, AppError> {
        let track_raw = self
            .track
            .filter(|t| !t.trim().is_empty())
            .ok_or_else(|| AppError::Validation("track is required".to_string()))?;
        let track: Track = track_raw.parse()?;

        let exam = self
            .exam
            .map(|e| e.trim().to_string())
            .filter(|e| !e.is_empty())
            .ok_or_else(|| AppError::Validation("exam is required".to_string()))?;

        let score = Score::for_mode(track.mode(), self.rank, self.percentile)?.ok_or_else(|| {
            let field = match track.mode() {
                ComparatorMode::Rank => "rank",
                ComparatorMode::Percentile => "percentile",
            };
            AppError::Validation(format!("{field} is required for track {track}"))
        })?;

        Ok(ApplicantSignal {
            track,
            exam,
            score,
            category: self.category.map(Category::new).unwrap_or_default(),
            home_state: self
                .home_state
                .map(|s| s.trim().to_string())
                .filter(|s| !s.is_empty()),
        })
    }
}
