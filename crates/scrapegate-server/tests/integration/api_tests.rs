use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use tower::ServiceExt;

use scrapegate_core::AppError;
use scrapegate_core::testutil::FailStage;

use crate::integration::common::{
    TEST_ORIGIN, body_json, get, setup_test_app, setup_test_app_with_windows,
};

// ---------------------------------------------------------------------------
// /api/scrape-performance
// ---------------------------------------------------------------------------

#[tokio::test]
async fn performance_returns_numbers() {
    let app = setup_test_app();

    let response = get(&app.router, "/api/scrape-performance").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!(["1,204", "87.5%"]));

    let log = app.sessions.log.lock().unwrap();
    assert_eq!(log.navigations[0].0, "https://dashboard.test/performance");
    assert_eq!(log.ready_selectors, vec![".text.number"]);
}

#[tokio::test]
async fn performance_is_served_from_cache() {
    let app = setup_test_app();

    let first = body_json(get(&app.router, "/api/scrape-performance").await).await;
    app.sessions.set_html("<html><body></body></html>");
    let second = body_json(get(&app.router, "/api/scrape-performance").await).await;

    assert_eq!(first, second);
    assert_eq!(app.sessions.opened(), 1);
}

#[tokio::test]
async fn performance_refetches_after_window() {
    let app = setup_test_app_with_windows(Duration::from_millis(50), Duration::from_secs(120));

    get(&app.router, "/api/scrape-performance").await;
    tokio::time::sleep(Duration::from_millis(80)).await;
    get(&app.router, "/api/scrape-performance").await;

    assert_eq!(app.sessions.opened(), 2);
}

#[tokio::test]
async fn performance_auth_failure_returns_401() {
    let app = setup_test_app();
    app.sessions.fail_next(
        FailStage::WaitReady,
        AppError::Authentication("upstream rejected credentials".into()),
    );

    let response = get(&app.router, "/api/scrape-performance").await;

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["error"], "Authentication failed");
}

#[tokio::test]
async fn performance_failure_returns_opaque_500() {
    let app = setup_test_app();
    app.sessions.fail_next(
        FailStage::Navigate,
        AppError::Navigation("net::ERR_CONNECTION_REFUSED".into()),
    );

    let response = get(&app.router, "/api/scrape-performance").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({ "error": "Failed to scrape data" }));
    assert_eq!(app.sessions.closed(), 1);
}

#[tokio::test]
async fn performance_failure_is_not_cached() {
    let app = setup_test_app();
    app.sessions
        .fail_next(FailStage::Navigate, AppError::NavigationTimeout(30));

    let failed = get(&app.router, "/api/scrape-performance").await;
    let retried = get(&app.router, "/api/scrape-performance").await;

    assert_eq!(failed.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(retried.status(), StatusCode::OK);
    assert_eq!(app.sessions.opened(), 2);
}

// ---------------------------------------------------------------------------
// /api/scrape-jobs
// ---------------------------------------------------------------------------

#[tokio::test]
async fn jobs_returns_grouped_rows() {
    let app = setup_test_app();

    let response = get(&app.router, "/api/scrape-jobs?machine=72").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(
        json,
        serde_json::json!({
            "extractedData": [
                { "pdfFile": "order-1.pdf", "dataRows": [["1", "Alice"], ["2", "Bob"]] },
                { "pdfFile": "order-2.pdf", "dataRows": [["3", "Carol"]] },
            ]
        })
    );

    let log = app.sessions.log.lock().unwrap();
    assert_eq!(log.navigations[0].0, "http://10.0.0.72/jobs");
}

#[tokio::test]
async fn jobs_cache_is_per_machine() {
    let app = setup_test_app();

    get(&app.router, "/api/scrape-jobs?machine=72").await;
    get(&app.router, "/api/scrape-jobs?machine=72").await;
    get(&app.router, "/api/scrape-jobs?machine=73").await;

    assert_eq!(app.sessions.opened(), 2);
}

#[tokio::test]
async fn jobs_rejects_bad_machine_numbers() {
    let app = setup_test_app();

    for uri in [
        "/api/scrape-jobs",
        "/api/scrape-jobs?machine=",
        "/api/scrape-jobs?machine=abc",
        "/api/scrape-jobs?machine=70",
        "/api/scrape-jobs?machine=111",
        "/api/scrape-jobs?machine=-72",
    ] {
        let response = get(&app.router, uri).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");

        let json = body_json(response).await;
        assert_eq!(json["error"], "Invalid machine number (71-110).", "{uri}");
    }

    assert_eq!(app.sessions.open_attempts(), 0);
}

#[tokio::test]
async fn jobs_accepts_range_bounds() {
    let app = setup_test_app();

    for machine in [71, 110] {
        let response = get(&app.router, &format!("/api/scrape-jobs?machine={machine}")).await;
        assert_eq!(response.status(), StatusCode::OK, "machine {machine}");
    }
}

#[tokio::test]
async fn jobs_failure_returns_opaque_500() {
    let app = setup_test_app();
    app.sessions.fail_next(
        FailStage::WaitReady,
        AppError::ReadinessTimeout {
            selector: "table".into(),
            secs: 30,
        },
    );

    let response = get(&app.router, "/api/scrape-jobs?machine=90").await;

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json, serde_json::json!({ "error": "Failed to scrape job data" }));
    assert_eq!(app.sessions.closed(), 1);
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[tokio::test]
async fn health_reports_idle_browser() {
    let app = setup_test_app();

    let response = get(&app.router, "/health").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["browser"], "idle");
    assert!(json["cached_entries"].is_u64());
}

#[tokio::test]
async fn health_reports_running_browser_after_scrape() {
    let app = setup_test_app();

    get(&app.router, "/api/scrape-performance").await;
    let json = body_json(get(&app.router, "/health").await).await;

    assert_eq!(json["browser"], "running");
}

#[tokio::test]
async fn openapi_document_is_served() {
    let app = setup_test_app();

    let response = get(&app.router, "/api-docs/openapi.json").await;

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert!(json["paths"]["/api/scrape-jobs"].is_object());
}

#[tokio::test]
async fn cors_allows_configured_origin_only() {
    let app = setup_test_app();

    let allowed = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, TEST_ORIGIN)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        allowed.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        TEST_ORIGIN
    );

    let denied = app
        .router
        .clone()
        .oneshot(
            Request::get("/health")
                .header(header::ORIGIN, "https://evil.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert!(
        denied
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .is_none()
    );
}
