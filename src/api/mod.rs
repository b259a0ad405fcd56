use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

use crate::config::AggregatorConfig;
use crate::engine::AggregationEngine;
use crate::error::AggregateError;
use crate::models::{AggregateResult, ExploreParams, PageRequest};

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<AggregationEngine>,
    pub config: Arc<AggregatorConfig>,
}

impl AppState {
    pub fn new(engine: Arc<AggregationEngine>, config: AggregatorConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    fn aggregate_timeout(&self) -> Duration {
        self.config.aggregate_timeout()
    }
}

/// Create the API router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/api/explore", get(explore))
        .with_state(state)
}

// ===== Route Handlers =====

async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        cached_pages: state.engine.cache().len(),
    })
}

/// One virtual page of the combined catalog
async fn explore(
    State(state): State<AppState>,
    Query(params): Query<ExploreParams>,
) -> Result<Json<AggregateResult>, ApiError> {
    let request = PageRequest::from_params(&params, &state.config);
    let result = state
        .engine
        .aggregate_with_timeout(&request, state.aggregate_timeout())
        .await
        .map_err(|err| ApiError::Upstream {
            page: request.virtual_page,
            err,
        })?;
    Ok(Json(result))
}

// ===== Response Types =====

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: String,
    version: String,
    cached_pages: usize,
}

// ===== Error Handling =====

#[derive(Debug)]
enum ApiError {
    /// Aggregation failed for the requested virtual page.
    Upstream { page: u32, err: AggregateError },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match &self {
            ApiError::Upstream { page, err } => {
                tracing::error!(page, "Catalog aggregation failed: {}", err);
                let body = Json(json!({
                    "error": "Failed to fetch catalog",
                    "message": err.message(),
                    "result": err.degraded_result(*page),
                }));
                (StatusCode::BAD_GATEWAY, body).into_response()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::PageCache;
    use crate::error::FetchError;
    use crate::models::{Kind, UpstreamPageResult};
    use crate::sort::NativeSort;
    use crate::sources::{CatalogSource, ListingFilter};
    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::http::Request;
    use serde_json::Value;
    use tower::ServiceExt;

    struct FixedSource {
        kind: Kind,
        fail: bool,
    }

    #[async_trait]
    impl CatalogSource for FixedSource {
        fn kind(&self) -> Kind {
            self.kind
        }

        async fn fetch_page(
            &self,
            _page: u32,
            _sort: &NativeSort,
            _filter: &ListingFilter,
        ) -> Result<UpstreamPageResult, FetchError> {
            if self.fail {
                return Err(FetchError::status(500, "boom"));
            }
            let base = if self.kind == Kind::Movie { 100.0 } else { 50.0 };
            Ok(UpstreamPageResult {
                raw_items: vec![
                    json!({"id": 1, "popularity": base, "vote_average": 7.0}),
                    json!({"id": 2, "popularity": base - 1.0, "vote_average": 6.0}),
                ],
                total_items: 2,
                total_pages: 1,
            })
        }
    }

    fn app(fail: bool) -> Router {
        let engine = AggregationEngine::new(Arc::new(PageCache::new(Duration::from_secs(60))))
            .with_source(Arc::new(FixedSource { kind: Kind::Movie, fail }))
            .with_source(Arc::new(FixedSource { kind: Kind::Tv, fail }));
        create_router(AppState::new(Arc::new(engine), AggregatorConfig::default()))
    }

    async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
        let response = app
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = response.status();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_health() {
        let (status, body) = get_json(app(false), "/health").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
    }

    #[tokio::test]
    async fn test_explore_merges_kinds() {
        let (status, body) = get_json(app(false), "/api/explore?page=1").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["virtual_page"], 1);
        assert_eq!(body["total_items_estimate"], 4);

        let items = body["items"].as_array().unwrap();
        assert_eq!(items.len(), 4);
        assert_eq!(items[0]["kind"], "movie");
        assert_eq!(items[2]["kind"], "tv");
    }

    #[tokio::test]
    async fn test_explore_single_kind() {
        let uri = "/api/explore?tv=false&sort=vote_average.asc";
        let (status, body) = get_json(app(false), uri).await;
        assert_eq!(status, StatusCode::OK);
        let items = body["items"].as_array().unwrap();
        assert!(items.iter().all(|i| i["kind"] == "movie"));
    }

    #[tokio::test]
    async fn test_explore_upstream_failure_is_bad_gateway() {
        let (status, body) = get_json(app(true), "/api/explore?page=4").await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["error"], "Failed to fetch catalog");
        assert!(body["message"].as_str().unwrap().contains("boom"));

        // empty page the client can render in place of the listing
        assert_eq!(body["result"]["virtual_page"], 4);
        assert_eq!(body["result"]["items"].as_array().unwrap().len(), 0);
        assert_eq!(body["result"]["total_pages_estimate"], 0);
    }

    #[tokio::test]
    async fn test_explore_no_kinds_is_empty() {
        let (status, body) = get_json(app(true), "/api/explore?movies=false&tv=false").await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["items"].as_array().unwrap().len(), 0);
    }
}
