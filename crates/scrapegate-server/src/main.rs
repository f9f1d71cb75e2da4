use std::sync::Arc;

use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use scrapegate_client::{BrowserSessions, JobTableExtractor, TraceNumberExtractor};
use scrapegate_core::{ScrapeConfig, ScrapeService};
use scrapegate_server::routes;
use scrapegate_server::state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("scrapegate=info".parse()?))
        .with_target(false)
        .init();

    // Panics inside handlers are answered by CatchPanicLayer; this gets
    // them into the log too.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("panic: {info}");
    }));

    let config = ScrapeConfig::from_env()?;
    let addr = format!("0.0.0.0:{}", config.port);

    let sessions = BrowserSessions::new();
    let service = ScrapeService::new(
        sessions.clone(),
        TraceNumberExtractor::new(),
        JobTableExtractor::new(),
        config.performance_target(),
        config.jobs_target(),
    );
    let state = Arc::new(AppState::new(service));

    let app = routes::app(state, &config.allowed_origins)?;

    tracing::info!("Starting server on {addr}");
    let listener = TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sessions.shutdown().await;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install CTRL+C handler: {e}");
        std::future::pending::<()>().await;
    }
    tracing::info!("Shutdown signal received");
}
