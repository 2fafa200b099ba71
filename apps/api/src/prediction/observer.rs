//! Structured observability hook for the admission engine.
//!
//! The engine reports events to an `EngineObserver` the caller passes in;
//! `EngineCounters` is the shared implementation carried in `AppState`.

use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

use crate::catalog::MatchStage;

pub trait EngineObserver: Send + Sync {
    /// A lookup cascade finished. `stage` is `None` when every stage missed.
    fn lookup_resolved(&self, stage: Option<MatchStage>, institutions: usize);
    /// A cutoff string could not be parsed and the fallback window was used.
    fn parse_fallback(&self, institution_id: &str, raw: &str);
    fn predictions_emitted(&self, count: usize);
    /// The alternate (LLM) predictor failed and the catalog engine answered.
    fn upstream_fallback(&self);
    /// A scenario sweep hit its deadline and returned partial results.
    fn sweep_truncated(&self, completed: usize, requested: usize);
}

/// Observer that discards every event.
#[cfg(test)]
pub struct NoopObserver;

#[cfg(test)]
impl EngineObserver for NoopObserver {
    fn lookup_resolved(&self, _stage: Option<MatchStage>, _institutions: usize) {}
    fn parse_fallback(&self, _institution_id: &str, _raw: &str) {}
    fn predictions_emitted(&self, _count: usize) {}
    fn upstream_fallback(&self) {}
    fn sweep_truncated(&self, _completed: usize, _requested: usize) {}
}

#[derive(Debug, Default)]
pub struct EngineCounters {
    exact_matches: AtomicU64,
    case_insensitive_matches: AtomicU64,
    partial_matches: AtomicU64,
    lookup_misses: AtomicU64,
    parse_fallbacks: AtomicU64,
    predictions_emitted: AtomicU64,
    upstream_fallbacks: AtomicU64,
    sweeps_truncated: AtomicU64,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct CounterSnapshot {
    pub exact_matches: u64,
    pub case_insensitive_matches: u64,
    pub partial_matches: u64,
    pub lookup_misses: u64,
    pub parse_fallbacks: u64,
    pub predictions_emitted: u64,
    pub upstream_fallbacks: u64,
    pub sweeps_truncated: u64,
}

impl EngineCounters {
    pub fn snapshot(&self) -> CounterSnapshot {
        CounterSnapshot {
            exact_matches: self.exact_matches.load(Ordering::Relaxed),
            case_insensitive_matches: self.case_insensitive_matches.load(Ordering::Relaxed),
            partial_matches: self.partial_matches.load(Ordering::Relaxed),
            lookup_misses: self.lookup_misses.load(Ordering::Relaxed),
            parse_fallbacks: self.parse_fallbacks.load(Ordering::Relaxed),
            predictions_emitted: self.predictions_emitted.load(Ordering::Relaxed),
            upstream_fallbacks: self.upstream_fallbacks.load(Ordering::Relaxed),
            sweeps_truncated: self.sweeps_truncated.load(Ordering::Relaxed),
        }
    }
}

impl EngineObserver for EngineCounters {
    fn lookup_resolved(&self, stage: Option<MatchStage>, _institutions: usize) {
        let counter = match stage {
            Some(MatchStage::Exact) => &self.exact_matches,
            Some(MatchStage::CaseInsensitive) => &self.case_insensitive_matches,
            Some(MatchStage::Partial) => &self.partial_matches,
            None => &self.lookup_misses,
        };
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn parse_fallback(&self, _institution_id: &str, _raw: &str) {
        self.parse_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn predictions_emitted(&self, count: usize) {
        self.predictions_emitted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    fn upstream_fallback(&self) {
        self.upstream_fallbacks.fetch_add(1, Ordering::Relaxed);
    }

    fn sweep_truncated(&self, _completed: usize, _requested: usize) {
        self.sweeps_truncated.fetch_add(1, Ordering::Relaxed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_bucket_by_stage() {
        let counters = EngineCounters::default();
        counters.lookup_resolved(Some(MatchStage::Exact), 3);
        counters.lookup_resolved(Some(MatchStage::Partial), 1);
        counters.lookup_resolved(None, 0);
        counters.parse_fallback("inst-1", "N/A");
        counters.predictions_emitted(4);

        let snap = counters.snapshot();
        assert_eq!(snap.exact_matches, 1);
        assert_eq!(snap.partial_matches, 1);
        assert_eq!(snap.case_insensitive_matches, 0);
        assert_eq!(snap.lookup_misses, 1);
        assert_eq!(snap.parse_fallbacks, 1);
        assert_eq!(snap.predictions_emitted, 4);
    }
}
