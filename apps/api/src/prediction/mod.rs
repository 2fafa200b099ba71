// Admission-probability engine.
// Implements: cutoff range parsing, rank/percentile comparators, prediction
// aggregation, pluggable predictors and the observability hook.
// All LLM calls go through llm_client, never directly from here.

pub mod aggregator;
pub mod comparator;
pub mod handlers;
pub mod observer;
pub mod predictor;
pub mod prompts;
pub mod range_parser;
