use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::http::{Request, Response};
use http_body_util::BodyExt;
use tower::ServiceExt;

use scrapegate_client::{JobTableExtractor, TraceNumberExtractor};
use scrapegate_core::ScrapeService;
use scrapegate_core::testutil::{MockSessions, make_test_targets};
use scrapegate_server::routes;
use scrapegate_server::state::AppState;

pub const TEST_ORIGIN: &str = "http://localhost:3000";

/// Rendered page served by the mock browser: the dashboard's KPI text nodes
/// and a device job table, so both endpoints run their real extractors.
pub const TEST_PAGE: &str = r#"
<html><body>
  <svg><g class="trace">
    <text class="text number">1,204</text>
    <text class="text number">87.5%</text>
  </g></svg>
  <table>
    <tr><th>File</th><th>Status</th></tr>
    <tr><td><b>order-1.pdf</b></td><td>queued</td></tr>
    <tr><td>1</td><td>Alice</td></tr>
    <tr><td>2</td><td>Bob</td></tr>
    <tr><td><b>order-2.pdf</b></td><td>printing</td></tr>
    <tr><td>3</td><td>Carol</td></tr>
  </table>
</body></html>"#;

pub struct TestApp {
    pub router: Router,
    pub sessions: MockSessions,
}

pub fn setup_test_app() -> TestApp {
    setup_test_app_with_windows(Duration::from_secs(60), Duration::from_secs(120))
}

pub fn setup_test_app_with_windows(performance: Duration, jobs: Duration) -> TestApp {
    let sessions = MockSessions::new(TEST_PAGE);
    let (performance_target, jobs_target) = make_test_targets();

    let service = ScrapeService::new(
        sessions.clone(),
        TraceNumberExtractor::new(),
        JobTableExtractor::new(),
        performance_target.with_cache_window(performance),
        jobs_target.with_cache_window(jobs),
    );
    let state = Arc::new(AppState::new(service));
    let router = routes::app(state, &[TEST_ORIGIN.to_string()]).unwrap();

    TestApp { router, sessions }
}

pub async fn get(router: &Router, uri: &str) -> Response<Body> {
    router
        .clone()
        .oneshot(Request::get(uri).body(Body::empty()).unwrap())
        .await
        .unwrap()
}

pub async fn body_json(response: Response<Body>) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}
