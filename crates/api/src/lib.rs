mod error;

use std::env;
use std::sync::Arc;

use anyhow::Result;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Json, Path, Query, State};
use axum::http::{header, HeaderValue, Method, Request, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{body::Body, Router};
use chrono::{Duration, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use wayfare_agents::{BudgetPlanner, EstimateAgent, RatingCache, DEFAULT_RATING_CACHE_CAPACITY};
use wayfare_core::{
    BudgetRequest, Business, BusinessCategory, ResponseEnvelope, TierName, TripParameters,
};
use wayfare_observability::{AppMetrics, MetricsSnapshot};
use wayfare_search::{LlmRatingService, QueryBackend, RatingBackend, SearchConfig};
use wayfare_storage::Store;

pub use error::ApiError;

const DEFAULT_API_KEY: &str = "dev-wayfare-key";
const DEFAULT_HISTORY_LIMIT: usize = 20;
const MAX_HISTORY_LIMIT: usize = 200;
const MAX_RECOMMENDATIONS: usize = 50;
const MAX_BODY_BYTES: usize = 256 * 1024;

/// Settings read once at startup.
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub api_key: String,
    pub allowed_origins: Vec<String>,
    pub database_url: Option<String>,
    pub search: SearchConfig,
    pub rating_cache_capacity: usize,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            api_key: DEFAULT_API_KEY.to_string(),
            allowed_origins: default_allowed_origins(),
            database_url: None,
            search: SearchConfig::default(),
            rating_cache_capacity: DEFAULT_RATING_CACHE_CAPACITY,
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            api_key: env::var("WAYFARE_API_KEY").unwrap_or_else(|_| DEFAULT_API_KEY.to_string()),
            allowed_origins: parse_allowed_origins(),
            database_url: env::var("WAYFARE_DATABASE_URL")
                .ok()
                .filter(|value| !value.trim().is_empty()),
            search: SearchConfig::from_env(),
            rating_cache_capacity: env::var("WAYFARE_RATING_CACHE_CAPACITY")
                .ok()
                .and_then(|value| value.parse::<usize>().ok())
                .unwrap_or(DEFAULT_RATING_CACHE_CAPACITY),
        }
    }
}

#[derive(Clone)]
pub struct ApiState {
    pub agent: Arc<EstimateAgent<QueryBackend, Store>>,
    pub planner: Arc<BudgetPlanner<RatingBackend, Store>>,
    pub metrics: Arc<AppMetrics>,
    pub api_key: String,
    pub allowed_origins: Arc<Vec<String>>,
    pub capabilities: HealthCapabilities,
}

#[derive(Debug, Clone, Serialize)]
pub struct HealthCapabilities {
    pub search_backend: &'static str,
    pub search_configured: bool,
    pub rating_backend: &'static str,
    pub store: &'static str,
    pub rating_cache_capacity: usize,
}

#[derive(Debug, Serialize)]
struct HealthResponse {
    status: &'static str,
    timestamp_utc: String,
    metrics: MetricsSnapshot,
    capabilities: HealthCapabilities,
    rating_cache_entries: usize,
}

#[derive(Debug, Deserialize)]
struct RecommendationRequest {
    category: BusinessCategory,
    tier: TierName,
    allocation: f64,
    #[serde(default)]
    candidates: Vec<Business>,
    #[serde(default, alias = "maxResults")]
    max_results: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct HistoryQuery {
    limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct PurgeQuery {
    older_than_days: u32,
}

#[derive(Debug, Serialize)]
struct PurgeResponse {
    removed: u64,
}

/// Builds the router from environment configuration, with live search and
/// rating backends.
pub async fn build_app() -> Result<Router> {
    let config = ApiConfig::from_env();
    let backend = QueryBackend::from_config(&config.search)?;
    let ratings = RatingBackend::Llm(LlmRatingService::new(backend.clone()));
    build_app_with(config, backend, ratings).await
}

/// Builds the router around explicit backends; used by tests and offline runs.
pub async fn build_app_with(
    config: ApiConfig,
    backend: QueryBackend,
    ratings: RatingBackend,
) -> Result<Router> {
    let store = match config.database_url.as_deref() {
        Some(database_url) => Store::sqlite(database_url).await?,
        None => Store::memory(),
    };

    let metrics = AppMetrics::shared();
    let capabilities = HealthCapabilities {
        search_backend: backend.name(),
        search_configured: backend.is_configured(),
        rating_backend: ratings.name(),
        store: store.name(),
        rating_cache_capacity: config.rating_cache_capacity,
    };
    let store = Arc::new(store);

    let agent = Arc::new(EstimateAgent::new(
        Arc::new(backend),
        store.clone(),
        metrics.clone(),
    ));
    let planner = Arc::new(BudgetPlanner::new(
        Arc::new(ratings),
        store,
        RatingCache::new(config.rating_cache_capacity),
        metrics.clone(),
    ));

    info!(
        search_backend = capabilities.search_backend,
        rating_backend = capabilities.rating_backend,
        store = capabilities.store,
        "wayfare api state ready"
    );

    let state = ApiState {
        agent,
        planner,
        metrics,
        api_key: config.api_key,
        allowed_origins: Arc::new(config.allowed_origins),
        capabilities,
    };

    Ok(build_router(state))
}

pub fn build_router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/v1/travel/:request_type", post(travel_estimate))
        .route("/v1/budget/optimize", post(budget_optimize))
        .route("/v1/budget/recommendations", post(budget_recommendations))
        .route(
            "/v1/estimates/history",
            get(estimates_history).delete(estimates_purge),
        )
        .layer(build_cors_layer(&state.allowed_origins))
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(RequestBodyLimitLayer::new(MAX_BODY_BYTES))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api_key_middleware,
        ))
        .with_state(state)
}

async fn health(State(state): State<ApiState>) -> impl IntoResponse {
    let payload = HealthResponse {
        status: "ok",
        timestamp_utc: Utc::now().to_rfc3339(),
        metrics: state.metrics.snapshot(),
        capabilities: state.capabilities.clone(),
        rating_cache_entries: state.planner.cache().len(),
    };
    (StatusCode::OK, Json(payload))
}

async fn travel_estimate(
    State(state): State<ApiState>,
    Path(request_type): Path<String>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let params: TripParameters = parse_body(body)?;
    let envelope = state
        .agent
        .handle_travel_request(&request_type, params)
        .await?;
    Ok((StatusCode::OK, Json(envelope)).into_response())
}

async fn budget_optimize(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request: BudgetRequest = parse_body(body)?;
    let plan = state.planner.calculate_optimal_budget(request).await?;
    Ok((StatusCode::OK, Json(ResponseEnvelope::ok(plan))).into_response())
}

async fn budget_recommendations(
    State(state): State<ApiState>,
    body: Result<Json<Value>, JsonRejection>,
) -> Result<Response, ApiError> {
    let request: RecommendationRequest = parse_body(body)?;
    if !request.allocation.is_finite() || request.allocation < 0.0 {
        return Err(ApiError::MalformedBody(
            "allocation must be a non-negative number".to_string(),
        ));
    }

    let recommended = state
        .planner
        .recommended_businesses(
            request.category,
            request.tier,
            request.allocation,
            &request.candidates,
            request
                .max_results
                .map(|limit| limit.min(MAX_RECOMMENDATIONS)),
        )
        .await;

    Ok((StatusCode::OK, Json(ResponseEnvelope::ok(recommended))).into_response())
}

async fn estimates_history(
    State(state): State<ApiState>,
    Query(query): Query<HistoryQuery>,
) -> Result<Response, ApiError> {
    let limit = query
        .limit
        .unwrap_or(DEFAULT_HISTORY_LIMIT)
        .clamp(1, MAX_HISTORY_LIMIT);
    let records = state.agent.recent_estimates(limit).await?;
    Ok((StatusCode::OK, Json(ResponseEnvelope::ok(records))).into_response())
}

async fn estimates_purge(
    State(state): State<ApiState>,
    Query(query): Query<PurgeQuery>,
) -> Result<Response, ApiError> {
    let cutoff = Utc::now() - Duration::days(i64::from(query.older_than_days));
    let removed = state.agent.purge_history_before(cutoff).await?;
    info!(removed, older_than_days = query.older_than_days, "estimate history purged");
    Ok((StatusCode::OK, Json(ResponseEnvelope::ok(PurgeResponse { removed }))).into_response())
}

fn parse_body<T: DeserializeOwned>(
    body: Result<Json<Value>, JsonRejection>,
) -> Result<T, ApiError> {
    let Json(body) = body?;
    serde_json::from_value(body).map_err(|error| ApiError::MalformedBody(error.to_string()))
}

async fn api_key_middleware(
    State(state): State<ApiState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    if request.method() == Method::OPTIONS || is_public_endpoint(request.uri().path()) {
        return next.run(request).await;
    }

    let header_key = request
        .headers()
        .get("x-api-key")
        .and_then(|value| value.to_str().ok())
        .unwrap_or_default();

    if header_key != state.api_key {
        return (
            StatusCode::UNAUTHORIZED,
            Json(ResponseEnvelope::<()>::failure("missing or invalid x-api-key")),
        )
            .into_response();
    }

    next.run(request).await
}

fn is_public_endpoint(path: &str) -> bool {
    matches!(path, "/health")
}

fn default_allowed_origins() -> Vec<String> {
    [
        "http://localhost:5173",
        "http://127.0.0.1:5173",
        "http://localhost:3000",
        "http://127.0.0.1:3000",
    ]
    .into_iter()
    .map(ToString::to_string)
    .collect()
}

fn parse_allowed_origins() -> Vec<String> {
    env::var("WAYFARE_ALLOWED_ORIGINS")
        .ok()
        .map(|value| {
            value
                .split(',')
                .map(|origin| origin.trim().trim_end_matches('/').to_string())
                .filter(|origin| !origin.is_empty())
                .collect::<Vec<_>>()
        })
        .filter(|origins| !origins.is_empty())
        .unwrap_or_else(default_allowed_origins)
}

fn build_cors_layer(allowed_origins: &Arc<Vec<String>>) -> CorsLayer {
    let origins = allowed_origins
        .iter()
        .filter_map(|origin| HeaderValue::from_str(origin).ok())
        .collect::<Vec<_>>();
    let origins = if origins.is_empty() {
        vec![HeaderValue::from_static("http://localhost:5173")]
    } else {
        origins
    };

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET, Method::POST, Method::DELETE, Method::OPTIONS])
        .allow_headers([
            header::CONTENT_TYPE,
            header::HeaderName::from_static("x-api-key"),
        ])
}
