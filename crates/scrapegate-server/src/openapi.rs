use utoipa::OpenApi;

#[derive(OpenApi)]
#[openapi(
    info(
        title = "scrapegate API",
        version = "0.3.0",
        description = "Headless-browser scrapes of the performance dashboard and device job tables."
    ),
    paths(
        crate::routes::scrape_performance,
        crate::routes::scrape_jobs,
        crate::routes::health,
    ),
    components(schemas(
        crate::dto::JobsResponse,
        crate::dto::JobGroupResponse,
        crate::dto::HealthResponse,
        crate::dto::ErrorResponse,
    )),
    tags(
        (name = "scrape", description = "Dashboard and device scrapes"),
        (name = "system", description = "Health and system status"),
    )
)]
pub struct ApiDoc;
