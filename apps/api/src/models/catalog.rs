use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

/// Numeric closing-score window. `average()` is the pivot both comparators use.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct CutoffBounds {
    pub min: i64,
    pub max: i64,
}

impl CutoffBounds {
    /// Builds a window, swapping the ends if the catalog stored them inverted.
    pub fn new(a: i64, b: i64) -> Self {
        if a <= b {
            Self { min: a, max: b }
        } else {
            Self { min: b, max: a }
        }
    }

    /// `min + max`, twice the average. Widened so extreme catalog values
    /// cannot overflow.
    pub fn sum(&self) -> i128 {
        self.min as i128 + self.max as i128
    }

    pub fn average(&self) -> f64 {
        self.sum() as f64 / 2.0
    }

    /// Smallest window covering both `self` and `other`.
    pub fn span(&self, other: &CutoffBounds) -> CutoffBounds {
        CutoffBounds {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Program {
    pub name: String,
    pub cutoff_min: i64,
    pub cutoff_max: i64,
}

impl Program {
    pub fn bounds(&self) -> CutoffBounds {
        CutoffBounds::new(self.cutoff_min, self.cutoff_max)
    }
}

/// Cutoff granularity of an institution: a single raw range string, or one
/// numeric window per program.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CutoffData {
    Aggregate { range: String },
    Programs { programs: Vec<Program> },
}

/// Category- (and optionally state-) specific closing window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuotaCutoff {
    pub exam: String,
    pub category: String,
    /// `None` for an open/all-state quota.
    #[serde(default)]
    pub state_quota: Option<String>,
    pub opening: i64,
    pub closing: i64,
}

impl QuotaCutoff {
    pub fn bounds(&self) -> CutoffBounds {
        CutoffBounds::new(self.opening, self.closing)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum InstitutionType {
    Government,
    Private,
    Deemed,
    Autonomous,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct FeeStructure {
    pub tuition_per_year: i64,
    #[serde(default)]
    pub hostel_per_year: i64,
    #[serde(default)]
    pub other_per_year: i64,
    pub duration_years: u8,
}

impl FeeStructure {
    pub fn annual_cost(&self) -> i64 {
        self.tuition_per_year
            .saturating_add(self.hostel_per_year)
            .saturating_add(self.other_per_year)
    }

    pub fn total_cost(&self) -> i64 {
        self.annual_cost().saturating_mul(self.duration_years as i64)
    }
}

/// A catalog institution. Read-only from the engine's point of view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Institution {
    pub id: String,
    pub name: String,
    /// Track as stored in the catalog; casing and spelling are not guaranteed.
    pub track: String,
    pub exams: Vec<String>,
    pub city: String,
    pub state: String,
    pub institution_type: InstitutionType,
    pub accreditation: String,
    pub fees: FeeStructure,
    /// Percent of the graduating cohort placed.
    pub placement_rate: f64,
    pub average_package: i64,
    pub median_package: i64,
    pub cutoff: CutoffData,
    #[serde(default)]
    pub quota_cutoffs: Vec<QuotaCutoff>,
}

impl Institution {
    pub fn location(&self) -> String {
        format!("{}, {}", self.city, self.state)
    }
}

/// Row shape of the `institutions` table.
#[derive(Debug, Clone, FromRow)]
pub struct InstitutionRow {
    pub id: String,
    pub name: String,
    pub track: String,
    pub exams: Vec<String>,
    pub city: String,
    pub state: String,
    pub institution_type: String,
    pub accreditation: String,
    pub fees: Json<FeeStructure>,
    pub placement_rate: f64,
    pub average_package: i64,
    pub median_package: i64,
    pub cutoff_range: Option<String>,
    pub programs: Json<Vec<Program>>,
    pub quota_cutoffs: Json<Vec<QuotaCutoff>>,
}

impl TryFrom<InstitutionRow> for Institution {
    type Error = anyhow::Error;

    fn try_from(row: InstitutionRow) -> Result<Self, Self::Error> {
        let institution_type: InstitutionType =
            serde_json::from_value(serde_json::Value::String(row.institution_type.clone()))
                .map_err(|_| {
                    anyhow::anyhow!(
                        "institution {} has unknown type '{}'",
                        row.id,
                        row.institution_type
                    )
                })?;

        let programs = row.programs.0;
        let cutoff = if programs.is_empty() {
            CutoffData::Aggregate {
                range: row.cutoff_range.unwrap_or_default(),
            }
        } else {
            CutoffData::Programs { programs }
        };

        Ok(Institution {
            id: row.id,
            name: row.name,
            track: row.track,
            exams: row.exams,
            city: row.city,
            state: row.state,
            institution_type,
            accreditation: row.accreditation,
            fees: row.fees.0,
            placement_rate: row.placement_rate,
            average_package: row.average_package,
            median_package: row.median_package,
            cutoff,
            quota_cutoffs: row.quota_cutoffs.0,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounds_are_normalised() {
        let b = CutoffBounds::new(700, 300);
        assert_eq!(b, CutoffBounds { min: 300, max: 700 });
        assert_eq!(b.average(), 500.0);
    }

    #[test]
    fn test_fractional_average() {
        assert_eq!(CutoffBounds::new(85, 90).average(), 87.5);
    }

    #[test]
    fn test_total_cost_spans_duration() {
        let fees = FeeStructure {
            tuition_per_year: 150_000,
            hostel_per_year: 80_000,
            other_per_year: 20_000,
            duration_years: 4,
        };
        assert_eq!(fees.total_cost(), 1_000_000);
    }

    #[test]
    fn test_extreme_values_do_not_overflow() {
        let b = CutoffBounds::new(i64::MAX, i64::MAX);
        assert_eq!(b.sum(), 2 * i64::MAX as i128);
        assert!(b.average() > 9.0e18);

        let fees = FeeStructure {
            tuition_per_year: i64::MAX,
            hostel_per_year: 1,
            other_per_year: 0,
            duration_years: 5,
        };
        assert_eq!(fees.annual_cost(), i64::MAX);
        assert_eq!(fees.total_cost(), i64::MAX);
    }

    #[test]
    fn test_row_without_programs_uses_aggregate_range() {
        let row = InstitutionRow {
            id: "inst-1".to_string(),
            name: "Test College".to_string(),
            track: "MPC".to_string(),
            exams: vec!["JEE Main".to_string()],
            city: "Pune".to_string(),
            state: "Maharashtra".to_string(),
            institution_type: "private".to_string(),
            accreditation: "NAAC A".to_string(),
            fees: Json(FeeStructure::default()),
            placement_rate: 80.0,
            average_package: 600_000,
            median_package: 550_000,
            cutoff_range: Some("1000-5000".to_string()),
            programs: Json(vec![]),
            quota_cutoffs: Json(vec![]),
        };
        let inst = Institution::try_from(row).unwrap();
        assert_eq!(inst.institution_type, InstitutionType::Private);
        assert_eq!(
            inst.cutoff,
            CutoffData::Aggregate {
                range: "1000-5000".to_string()
            }
        );
    }

    #[test]
    fn test_cutoff_data_json_shape() {
        let json = r#"{"kind":"programs","programs":[{"name":"CSE","cutoff_min":300,"cutoff_max":700}]}"#;
        let data: CutoffData = serde_json::from_str(json).unwrap();
        match data {
            CutoffData::Programs { programs } => assert_eq!(programs[0].bounds().average(), 500.0),
            other => panic!("unexpected {other:?}"),
        }
    }
}
