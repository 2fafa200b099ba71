pub mod health;

use axum::{
    routing::{get, post},
    Router,
};

use crate::catalog::handlers as catalog;
use crate::comparison::handlers as comparison;
use crate::prediction::handlers as prediction;
use crate::scenarios::handlers as scenarios;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health::health_handler))
        // Admissions API
        .route(
            "/api/v1/admissions/predict",
            post(prediction::handle_predict),
        )
        .route(
            "/api/v1/admissions/compare",
            post(comparison::handle_compare),
        )
        .route(
            "/api/v1/admissions/what-if",
            post(scenarios::handle_what_if),
        )
        .route(
            "/api/v1/admissions/diagnostics",
            get(prediction::handle_diagnostics),
        )
        // Catalog API (read-only)
        .route(
            "/api/v1/catalog/institutions/:id",
            get(catalog::handle_get_institution),
        )
        .route(
            "/api/v1/catalog/distinct/:field",
            get(catalog::handle_distinct),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use axum::body::{to_bytes, Body};
    use axum::http::{Request, StatusCode};
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::catalog::memory::{fixtures::*, InMemoryCatalog};
    use crate::config::Config;
    use crate::prediction::aggregator::PredictionAggregator;
    use crate::prediction::comparator::ReachPolicy;
    use crate::prediction::observer::EngineCounters;
    use crate::prediction::predictor::CatalogPredictor;

    fn test_state() -> AppState {
        let catalog = InMemoryCatalog::new(vec![
            institution("a", "MPC", "JEE Main", aggregate("1000-3000")),
            institution("b", "MPC", "JEE Main", aggregate("4000-8000")),
            institution("c", "BiPC", "NEET", aggregate("90-99")),
        ]);
        AppState {
            catalog: Arc::new(catalog),
            predictor: Arc::new(CatalogPredictor(PredictionAggregator::new(
                ReachPolicy::Exclude,
            ))),
            counters: Arc::new(EngineCounters::default()),
            config: Config::for_tests(),
        }
    }

    async fn send(app: Router, request: Request<Body>) -> (StatusCode, Value) {
        let response = app.oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }

    fn post_json(uri: &str, body: Value) -> Request<Body> {
        Request::post(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_req(uri: &str) -> Request<Body> {
        Request::get(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = send(build_router(test_state()), get_req("/health")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["service"], "pathway-api");
    }

    #[tokio::test]
    async fn test_predict_returns_tiers() {
        let request = post_json(
            "/api/v1/admissions/predict",
            json!({ "track": "MPC", "exam": "JEE Main", "rank": 1900 }),
        );
        let (status, body) = send(build_router(test_state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["counts"]["total"], 2);
        assert_eq!(body["safe"].as_array().map(Vec::len), Some(1));
        assert_eq!(body["moderate"].as_array().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_predict_missing_rank_is_validation_error() {
        let request = post_json(
            "/api/v1/admissions/predict",
            json!({ "track": "MPC", "exam": "JEE Main" }),
        );
        let (status, body) = send(build_router(test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["code"], "VALIDATION_ERROR");
    }

    #[tokio::test]
    async fn test_predict_unmatched_exam_is_empty_success() {
        let request = post_json(
            "/api/v1/admissions/predict",
            json!({ "track": "MPC", "exam": "BITSAT", "rank": 1500 }),
        );
        let (status, body) = send(build_router(test_state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["summary"]["counts"]["total"], 0);
        assert!(body["summary"]["message"].is_string());
    }

    #[tokio::test]
    async fn test_diagnostics_counts_lookups() {
        let state = test_state();
        let request = post_json(
            "/api/v1/admissions/predict",
            json!({ "track": "MPC", "exam": "jee main", "rank": 1500 }),
        );
        send(build_router(state.clone()), request).await;
        let (status, body) = send(
            build_router(state),
            get_req("/api/v1/admissions/diagnostics"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["case_insensitive_matches"], 1);
    }

    #[tokio::test]
    async fn test_compare_requires_two_institutions() {
        let request = post_json(
            "/api/v1/admissions/compare",
            json!({ "institution_ids": ["a"] }),
        );
        let (status, _) = send(build_router(test_state()), request).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_compare_two_institutions() {
        let request = post_json(
            "/api/v1/admissions/compare",
            json!({
                "institution_ids": ["a", "b"],
                "applicant": { "track": "MPC", "exam": "JEE Main", "rank": 2000 }
            }),
        );
        let (status, body) = send(build_router(test_state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["rows"].as_array().map(Vec::len), Some(2));
    }

    #[tokio::test]
    async fn test_what_if_sweep() {
        let request = post_json(
            "/api/v1/admissions/what-if",
            json!({ "scenarios": [
                { "name": "current", "signal": { "track": "MPC", "exam": "JEE Main", "rank": 1500 } },
                { "name": "stretch", "signal": { "track": "MPC", "exam": "JEE Main", "rank": 5000 } }
            ]}),
        );
        let (status, body) = send(build_router(test_state()), request).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["scenarios"].as_array().map(Vec::len), Some(2));
        assert_eq!(body["truncated"], false);
    }

    #[tokio::test]
    async fn test_catalog_lookup_and_distinct() {
        let (status, body) = send(
            build_router(test_state()),
            get_req("/api/v1/catalog/institutions/c"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["track"], "BiPC");

        let (status, _) = send(
            build_router(test_state()),
            get_req("/api/v1/catalog/institutions/missing"),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, body) = send(
            build_router(test_state()),
            get_req("/api/v1/catalog/distinct/exams"),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["values"], json!(["JEE Main", "NEET"]));
    }

    #[tokio::test]
    async fn test_unknown_distinct_field_is_rejected() {
        let (status, _) = send(
            build_router(test_state()),
            get_req("/api/v1/catalog/distinct/fees"),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
