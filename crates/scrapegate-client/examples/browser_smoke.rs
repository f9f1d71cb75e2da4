/// Smoke-test for `BrowserSessions`.
///
/// Launches a headless Chromium, renders <https://example.com> in a fresh
/// tab, and checks the `<h1>` survives in the serialized DOM.
///
/// Run with:
///   cargo run -p scrapegate-client --example browser_smoke
use std::time::Duration;

use scrapegate_client::BrowserSessions;
use scrapegate_core::ScrapeTarget;
use scrapegate_core::target::WaitPolicy;
use scrapegate_core::traits::{PageContext, SessionManager};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let url = "https://example.com";
    let target = ScrapeTarget::performance(url);
    let sessions = BrowserSessions::new();

    println!("Launching headless browser…");
    let mut page = sessions.open_page(&target).await?;

    println!("Rendering {url} …");
    page.navigate(url, WaitPolicy::Load, Duration::from_secs(30)).await?;
    page.wait_for_ready("h1", Duration::from_secs(10)).await?;
    let html = page.content().await?;
    page.close().await;

    assert!(
        html.contains("<h1>Example Domain</h1>"),
        "Expected <h1> not found in rendered HTML"
    );
    assert!(sessions.is_running().await, "browser should still be up");

    println!("OK: got {} bytes of rendered HTML", html.len());
    sessions.shutdown().await;
    Ok(())
}
