//! Turns heterogeneous catalog cutoff strings into numeric windows.
//!
//! Parsing never fails a request: callers fall back to [`RANK_FALLBACK`] /
//! [`PERCENTILE_FALLBACK`] and flag the prediction as fallback data.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::catalog::CutoffBounds;

/// Substituted when a rank range cannot be parsed.
pub const RANK_FALLBACK: CutoffBounds = CutoffBounds {
    min: 5_000,
    max: 15_000,
};

/// Substituted when a percentile range cannot be parsed.
pub const PERCENTILE_FALLBACK: CutoffBounds = CutoffBounds { min: 85, max: 95 };

/// First `<int>[.frac] <sep> <int>` pair, where sep is an ASCII hyphen or an en-dash.
static PERCENTILE_RANGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(\d+)(?:\.\d+)?\s*[-\x{2013}]\s*(\d+)").expect("percentile range pattern is valid")
});

/// Parses a rank range such as `"150-1,000"` or `"Rank 1200 - 3400"`.
///
/// Everything except digits and hyphens is stripped, then the text is split
/// on the first hyphen.
pub fn parse_rank_range(text: &str) -> Option<CutoffBounds> {
    let cleaned: String = text
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '-')
        .collect();
    let (lo, hi) = cleaned.split_once('-')?;
    let lo: i64 = lo.parse().ok()?;
    let hi: i64 = hi.parse().ok()?;
    Some(CutoffBounds::new(lo, hi))
}

/// Parses a percentile range such as `"85-90"` or `"97–99 percentile"`.
pub fn parse_percentile_range(text: &str) -> Option<CutoffBounds> {
    let caps = PERCENTILE_RANGE.captures(text)?;
    let lo: i64 = caps.get(1)?.as_str().parse().ok()?;
    let hi: i64 = caps.get(2)?.as_str().parse().ok()?;
    Some(CutoffBounds::new(lo, hi))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rank_range_with_thousands_separator() {
        assert_eq!(
            parse_rank_range("150-1,000"),
            Some(CutoffBounds { min: 150, max: 1000 })
        );
    }

    #[test]
    fn test_rank_range_with_labels() {
        assert_eq!(
            parse_rank_range("Rank 1200 - 3400"),
            Some(CutoffBounds { min: 1200, max: 3400 })
        );
    }

    #[test]
    fn test_rank_range_inverted_is_normalised() {
        assert_eq!(
            parse_rank_range("9000-4500"),
            Some(CutoffBounds { min: 4500, max: 9000 })
        );
    }

    #[test]
    fn test_rank_range_malformed() {
        assert_eq!(parse_rank_range(""), None);
        assert_eq!(parse_rank_range("1500"), None);
        assert_eq!(parse_rank_range("N/A"), None);
        assert_eq!(parse_rank_range("-500"), None);
        assert_eq!(parse_rank_range("100-200-300"), None);
    }

    #[test]
    fn test_percentile_range_ascii_hyphen() {
        assert_eq!(
            parse_percentile_range("85-90"),
            Some(CutoffBounds { min: 85, max: 90 })
        );
    }

    #[test]
    fn test_percentile_range_en_dash() {
        assert_eq!(
            parse_percentile_range("97–99"),
            Some(CutoffBounds { min: 97, max: 99 })
        );
    }

    #[test]
    fn test_percentile_range_embedded_in_text() {
        assert_eq!(
            parse_percentile_range("CAT percentile 92.5 – 97.1 (general)"),
            Some(CutoffBounds { min: 92, max: 97 })
        );
    }

    #[test]
    fn test_percentile_range_malformed() {
        assert_eq!(parse_percentile_range("above 90"), None);
        assert_eq!(parse_percentile_range(""), None);
    }
}
