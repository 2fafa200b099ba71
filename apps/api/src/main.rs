mod catalog;
mod comparison;
mod config;
mod errors;
mod llm_client;
mod models;
mod prediction;
mod routes;
mod scenarios;
mod state;

use anyhow::Result;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::catalog::memory::InMemoryCatalog;
use crate::catalog::postgres::{create_pool, PgCatalog};
use crate::catalog::CatalogReader;
use crate::config::{CatalogSource, Config};
use crate::llm_client::LlmClient;
use crate::prediction::aggregator::PredictionAggregator;
use crate::prediction::comparator::ReachPolicy;
use crate::prediction::observer::EngineCounters;
use crate::prediction::predictor::{AdmissionPredictor, CatalogPredictor, LlmPredictor};
use crate::routes::build_router;
use crate::state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // Load configuration first (fails on missing required env vars)
    let config = Config::from_env()?;

    // Initialize structured logging
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("pathway_api={}", &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting Pathway API v{}", env!("CARGO_PKG_VERSION"));

    let catalog = build_catalog(&config).await?;

    let reach = ReachPolicy::from_flag(config.admit_reach_tier);
    let aggregator = PredictionAggregator::new(reach);
    info!("Reach policy: {reach:?}");

    // CatalogPredictor by default; swap via ENABLE_LLM_PREDICTOR
    let predictor: Arc<dyn AdmissionPredictor> =
        match (config.enable_llm_predictor, &config.anthropic_api_key) {
            (true, Some(key)) => {
                let llm = LlmClient::new(key.clone())?;
                info!("LLM predictor enabled (model: {})", llm_client::MODEL);
                Arc::new(LlmPredictor { llm, aggregator })
            }
            _ => Arc::new(CatalogPredictor(aggregator)),
        };

    let state = AppState {
        catalog,
        predictor,
        counters: Arc::new(EngineCounters::default()),
        config: config.clone(),
    };

    let app = build_router(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive()); // TODO: restrict CORS origins once the frontend host is fixed

    let addr: SocketAddr = format!("0.0.0.0:{}", config.port).parse()?;
    info!("Listening on {addr}");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Opens the configured catalog: Postgres, or a JSON snapshot for local runs.
async fn build_catalog(config: &Config) -> Result<Arc<dyn CatalogReader>> {
    match &config.catalog {
        CatalogSource::Postgres { database_url } => {
            let pool = create_pool(database_url).await?;
            info!("Catalog: PostgreSQL");
            Ok(Arc::new(PgCatalog::new(pool)))
        }
        CatalogSource::File { path } => {
            let catalog = InMemoryCatalog::from_json_file(path)?;
            info!(
                "Catalog: {} institutions loaded from {}",
                catalog.len(),
                path.display()
            );
            Ok(Arc::new(catalog))
        }
    }
}
