use std::sync::Arc;

use axum::Router;
use axum::extract::{Query, State};
use axum::http::{HeaderValue, Method};
use axum::routing::get;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use scrapegate_core::error::AppError;
use scrapegate_core::models::{MAX_MACHINE, MIN_MACHINE};
use scrapegate_core::traits::SessionManager;

use crate::dto::{HealthResponse, JobsQuery, JobsResponse};
use crate::error::ApiError;
use crate::openapi::ApiDoc;
use crate::state::AppState;

/// Router plus the cross-cutting layers: CORS restricted to `origins`,
/// request tracing, and a panic guard answering 500.
pub fn app<S>(state: Arc<AppState<S>>, origins: &[String]) -> Result<Router, AppError>
where
    S: SessionManager + 'static,
{
    Ok(router(state)
        .layer(cors_layer(origins)?)
        .layer(TraceLayer::new_for_http())
        .layer(CatchPanicLayer::new()))
}

fn cors_layer(origins: &[String]) -> Result<CorsLayer, AppError> {
    let origins = origins
        .iter()
        .map(|o| {
            HeaderValue::from_str(o)
                .map_err(|_| AppError::ConfigError(format!("Invalid CORS origin '{o}'")))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::list(origins))
        .allow_methods([Method::GET]))
}

/// Build the bare router with all routes.
pub fn router<S>(state: Arc<AppState<S>>) -> Router
where
    S: SessionManager + 'static,
{
    Router::new()
        .route("/api/scrape-performance", get(scrape_performance::<S>))
        .route("/api/scrape-jobs", get(scrape_jobs::<S>))
        .route("/health", get(health::<S>))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Scrape
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/api/scrape-performance",
    responses(
        (status = 200, description = "KPI numbers in dashboard order", body = Vec<String>),
        (status = 401, description = "Dashboard rejected the credentials", body = crate::dto::ErrorResponse),
        (status = 500, description = "Scrape failed", body = crate::dto::ErrorResponse),
    ),
    tag = "scrape"
)]
pub async fn scrape_performance<S>(
    State(state): State<Arc<AppState<S>>>,
) -> Result<axum::Json<Vec<String>>, ApiError>
where
    S: SessionManager + 'static,
{
    let numbers = state
        .service
        .performance()
        .await
        .map_err(ApiError::performance)?;

    Ok(axum::Json(numbers))
}

#[utoipa::path(
    get,
    path = "/api/scrape-jobs",
    params(JobsQuery),
    responses(
        (status = 200, description = "Job groups keyed by PDF file", body = JobsResponse),
        (status = 400, description = "Missing or invalid machine number", body = crate::dto::ErrorResponse),
        (status = 500, description = "Scrape failed", body = crate::dto::ErrorResponse),
    ),
    tag = "scrape"
)]
pub async fn scrape_jobs<S>(
    State(state): State<Arc<AppState<S>>>,
    Query(query): Query<JobsQuery>,
) -> Result<axum::Json<JobsResponse>, ApiError>
where
    S: SessionManager + 'static,
{
    let raw = query.machine.ok_or_else(|| {
        ApiError::jobs(AppError::Validation(format!(
            "machine is required ({MIN_MACHINE}-{MAX_MACHINE})"
        )))
    })?;

    let groups = state.service.jobs(&raw).await.map_err(ApiError::jobs)?;

    Ok(axum::Json(JobsResponse {
        extracted_data: groups.into_iter().map(Into::into).collect(),
    }))
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[utoipa::path(
    get,
    path = "/health",
    responses(
        (status = 200, description = "Service is up", body = HealthResponse),
    ),
    tag = "system"
)]
pub async fn health<S>(State(state): State<Arc<AppState<S>>>) -> axum::Json<HealthResponse>
where
    S: SessionManager + 'static,
{
    let browser = if state.service.sessions().is_running().await {
        "running"
    } else {
        "idle"
    };

    axum::Json(HealthResponse {
        status: "ok",
        browser,
        cached_entries: state.service.cached_entries(),
    })
}
