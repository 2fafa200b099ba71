use std::path::PathBuf;

use anyhow::{Context, Result};

/// Where the read-only institution catalog comes from.
#[derive(Debug, Clone)]
pub enum CatalogSource {
    Postgres { database_url: String },
    File { path: PathBuf },
}

/// Application configuration loaded from environment variables.
/// Fails at startup if required variables are missing or malformed.
#[derive(Debug, Clone)]
pub struct Config {
    pub catalog: CatalogSource,
    pub port: u16,
    pub rust_log: String,
    /// Admit a visible 20% reach band instead of dropping far-off institutions.
    pub admit_reach_tier: bool,
    pub sweep_timeout_ms: u64,
    pub max_scenarios: usize,
    pub enable_llm_predictor: bool,
    pub anthropic_api_key: Option<String>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing

        let catalog = match std::env::var("CATALOG_PATH") {
            Ok(path) if !path.trim().is_empty() => CatalogSource::File {
                path: PathBuf::from(path),
            },
            _ => CatalogSource::Postgres {
                database_url: require_env("DATABASE_URL")?,
            },
        };

        let enable_llm_predictor = parse_env("ENABLE_LLM_PREDICTOR", false)?;
        let anthropic_api_key = std::env::var("ANTHROPIC_API_KEY")
            .ok()
            .filter(|k| !k.trim().is_empty());
        if enable_llm_predictor && anthropic_api_key.is_none() {
            anyhow::bail!("ENABLE_LLM_PREDICTOR is set but ANTHROPIC_API_KEY is missing");
        }

        Ok(Config {
            catalog,
            port: parse_env("PORT", 8080).context("PORT must be a valid port number")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            admit_reach_tier: parse_env("ADMIT_REACH_TIER", false)?,
            sweep_timeout_ms: parse_env("SWEEP_TIMEOUT_MS", 5_000)?,
            max_scenarios: parse_env("MAX_SCENARIOS", 10)?,
            enable_llm_predictor,
            anthropic_api_key,
        })
    }
}

fn require_env(key: &str) -> Result<String> {
    std::env::var(key).with_context(|| format!("Required environment variable '{key}' is not set"))
}

fn parse_env<T>(key: &str, default: T) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value '{raw}'")),
        _ => Ok(default),
    }
}

#[cfg(test)]
impl Config {
    /// Configuration used by handler tests; never reads the environment.
    pub fn for_tests() -> Self {
        Config {
            catalog: CatalogSource::File {
                path: PathBuf::from("catalog.json"),
            },
            port: 0,
            rust_log: "debug".to_string(),
            admit_reach_tier: false,
            sweep_timeout_ms: 5_000,
            max_scenarios: 10,
            enable_llm_predictor: false,
            anthropic_api_key: None,
        }
    }
}
