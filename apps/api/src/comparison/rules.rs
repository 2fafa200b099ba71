use crate::models::catalog::{Institution, InstitutionType};

/// Each list is capped at this many entries.
pub const MAX_POINTS: usize = 3;

const HIGH_PLACEMENT_RATE: f64 = 85.0;
const LOW_PLACEMENT_RATE: f64 = 60.0;
/// Total programme cost, in rupees.
const AFFORDABLE_TOTAL_COST: i64 = 500_000;
const EXPENSIVE_TOTAL_COST: i64 = 1_500_000;

/// Extracts a NAAC-style grade (`A++`, `A+`, `A`, `B++`, ..., `C`) from free text.
pub fn accreditation_grade(accreditation: &str) -> Option<String> {
    accreditation
        .split(|c: char| c.is_whitespace() || matches!(c, ',' | '(' | ')' | ':' | '-'))
        .map(|token| token.trim().to_uppercase())
        .find(|token| {
            let letter = token.trim_end_matches('+');
            let pluses = token.len() - letter.len();
            matches!(letter, "A" | "B" | "C") && pluses <= 2
        })
}

/// Fixed-threshold pros and cons for one institution.
pub fn pros_and_cons(
    inst: &Institution,
    total_cost: i64,
    home_state: Option<&str>,
) -> (Vec<String>, Vec<String>) {
    let mut pros = Vec::new();
    let mut cons = Vec::new();

    match accreditation_grade(&inst.accreditation).as_deref() {
        Some(grade @ ("A++" | "A+")) => pros.push(format!("Top-tier accreditation ({grade})")),
        Some(grade) if grade.starts_with('B') || grade.starts_with('C') => {
            cons.push(format!("Lower accreditation grade ({grade})"))
        }
        _ => {}
    }

    if inst.placement_rate >= HIGH_PLACEMENT_RATE {
        pros.push(format!("Strong placement record ({:.0}%)", inst.placement_rate));
    } else if inst.placement_rate < LOW_PLACEMENT_RATE {
        cons.push(format!("Weak placement record ({:.0}%)", inst.placement_rate));
    }

    if total_cost > 0 && total_cost <= AFFORDABLE_TOTAL_COST {
        pros.push("Affordable total fees".to_string());
    } else if total_cost >= EXPENSIVE_TOTAL_COST {
        cons.push("High total fees".to_string());
    }

    if home_state.is_some_and(|s| s.eq_ignore_ascii_case(&inst.state)) {
        pros.push("Located in your home state".to_string());
    }

    match inst.institution_type {
        InstitutionType::Government => pros.push("Government institution".to_string()),
        InstitutionType::Private => cons.push("Private institution, fees may rise".to_string()),
        InstitutionType::Deemed | InstitutionType::Autonomous => {}
    }

    pros.truncate(MAX_POINTS);
    cons.truncate(MAX_POINTS);
    (pros, cons)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::memory::fixtures::*;

    #[test]
    fn test_grade_extraction() {
        assert_eq!(accreditation_grade("NAAC A++").as_deref(), Some("A++"));
        assert_eq!(accreditation_grade("naac a+ (2022)").as_deref(), Some("A+"));
        assert_eq!(accreditation_grade("NAAC: B").as_deref(), Some("B"));
        assert_eq!(accreditation_grade("NBA accredited"), None);
        assert_eq!(accreditation_grade(""), None);
    }

    #[test]
    fn test_strong_government_institution() {
        let mut inst = with_type(
            institution("g", "MPC", "JEE Main", aggregate("1-2")),
            InstitutionType::Government,
        );
        inst.accreditation = "NAAC A++".to_string();
        inst.placement_rate = 92.0;
        let (pros, cons) = pros_and_cons(&inst, 300_000, Some("telangana"));
        assert_eq!(pros.len(), MAX_POINTS, "capped: {pros:?}");
        assert_eq!(pros[0], "Top-tier accreditation (A++)");
        assert!(cons.is_empty());
    }

    #[test]
    fn test_weak_private_institution() {
        let mut inst = institution("p", "MPC", "JEE Main", aggregate("1-2"));
        inst.accreditation = "NAAC B+".to_string();
        inst.placement_rate = 40.0;
        let (pros, cons) = pros_and_cons(&inst, 2_000_000, None);
        assert!(pros.is_empty());
        assert_eq!(cons.len(), 3);
        assert!(cons[0].contains("B+"));
    }

    #[test]
    fn test_middle_of_the_road_has_no_points() {
        let inst = with_type(
            institution("m", "MPC", "JEE Main", aggregate("1-2")),
            InstitutionType::Deemed,
        );
        let (pros, cons) = pros_and_cons(&inst, 1_000_000, Some("Kerala"));
        assert!(pros.is_empty());
        assert!(cons.is_empty());
    }
}
