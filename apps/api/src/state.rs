use std::sync::Arc;

use crate::catalog::CatalogReader;
use crate::config::Config;
use crate::prediction::observer::EngineCounters;
use crate::prediction::predictor::AdmissionPredictor;

/// Shared application state injected into all route handlers via Axum extractors.
#[derive(Clone)]
pub struct AppState {
    /// Read-only catalog. Postgres in production, an in-memory snapshot otherwise.
    pub catalog: Arc<dyn CatalogReader>,
    /// Pluggable predictor. Default: CatalogPredictor. Swap via ENABLE_LLM_PREDICTOR.
    pub predictor: Arc<dyn AdmissionPredictor>,
    pub counters: Arc<EngineCounters>,
    pub config: Config,
}
