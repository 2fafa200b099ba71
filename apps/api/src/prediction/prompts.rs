// Prompts for the LLM admission predictor.
// The model only re-scores candidates the catalog engine already found.

pub const PREDICTION_SYSTEM: &str = "You are an admissions counsellor for Indian higher \
education. You estimate an applicant's chance of admission to specific institutions from \
historical closing cutoffs. Tiers: \"safe\" (very likely), \"moderate\" (around the cutoff), \
\"ambitious\" (a stretch). Probabilities are integers between 0 and 100.";

/// Placeholders: {track}, {exam}, {score}, {category}, {home_state}, {candidates}
pub const PREDICTION_PROMPT_TEMPLATE: &str = r#"Applicant:
- Track: {track}
- Exam: {exam}
- Score: {score}
- Category: {category}
- Home state: {home_state}

Candidates (JSON array; `cutoff` is the historical closing window in the exam's unit):
{candidates}

Return:
{"predictions": [{"institution_id": "...", "program": "... or null", "tier": "safe|moderate|ambitious", "probability": 0-100, "rationale": "one sentence"}]}"#;
