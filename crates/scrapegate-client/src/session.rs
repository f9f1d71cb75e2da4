use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chromiumoxide::cdp::browser_protocol::fetch::{
    AuthChallengeResponse, AuthChallengeResponseResponse, ContinueRequestParams,
    ContinueWithAuthParams, EnableParams, EventAuthRequired, EventRequestPaused,
    FailRequestParams, RequestId, RequestPattern,
};
use chromiumoxide::cdp::browser_protocol::network::{ErrorReason, ResourceType};
use chromiumoxide::cdp::browser_protocol::page::{
    EventLifecycleEvent, NavigateParams, SetLifecycleEventsEnabledParams,
};
use chromiumoxide::{Browser, BrowserConfig, Page};
use futures::StreamExt;
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;

use scrapegate_core::error::AppError;
use scrapegate_core::target::{Credentials, ScrapeTarget, WaitPolicy};
use scrapegate_core::traits::{PageContext, SessionManager};

const LAUNCH_TIMEOUT: Duration = Duration::from_secs(30);
const READY_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// A launched browser plus the liveness flag its CDP handler task maintains.
struct Session {
    browser: Arc<Browser>,
    alive: Arc<AtomicBool>,
}

/// Lazily launched, long-lived headless Chromium shared by every request.
///
/// The browser starts on first demand and is reused until its CDP connection
/// drops (or it is [invalidated](SessionManager::invalidate)); each request
/// gets its own tab through [`SessionManager::open_page`]. The optional
/// session sits behind a `tokio::sync::Mutex`, so concurrent cold-start
/// callers launch at most one browser.
///
/// # Example
///
/// ```rust,no_run
/// use scrapegate_client::BrowserSessions;
/// use scrapegate_core::ScrapeTarget;
/// use scrapegate_core::traits::{PageContext, SessionManager};
///
/// # async fn run() -> Result<(), Box<dyn std::error::Error>> {
/// let sessions = BrowserSessions::new();
/// let target = ScrapeTarget::performance("https://example.com");
/// let mut page = sessions.open_page(&target).await?;
/// page.navigate("https://example.com", target.wait_policy, target.navigation_timeout).await?;
/// let html = page.content().await?;
/// page.close().await;
/// println!("{}", &html[..200]);
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct BrowserSessions {
    inner: Arc<Mutex<Option<Session>>>,
    /// Liveness flag of the current session, readable without waiting on a
    /// launch in progress.
    liveness: Arc<watch::Sender<Option<Arc<AtomicBool>>>>,
}

impl Default for BrowserSessions {
    fn default() -> Self {
        Self {
            inner: Arc::new(Mutex::new(None)),
            liveness: Arc::new(watch::Sender::new(None)),
        }
    }
}

impl BrowserSessions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the live browser, launching one if none exists or the last
    /// one died.
    pub async fn acquire(&self) -> Result<Arc<Browser>, AppError> {
        self.acquire_session().await.map(|(browser, _)| browser)
    }

    async fn acquire_session(&self) -> Result<(Arc<Browser>, Arc<AtomicBool>), AppError> {
        let mut guard = self.inner.lock().await;

        if let Some(session) = guard.as_ref() {
            if session.alive.load(Ordering::Acquire) {
                return Ok((Arc::clone(&session.browser), Arc::clone(&session.alive)));
            }
            tracing::warn!("Browser connection lost, relaunching");
        }

        let session = tokio::time::timeout(LAUNCH_TIMEOUT, Self::launch())
            .await
            .map_err(|_| {
                AppError::Browser(format!(
                    "Browser launch timed out after {} seconds",
                    LAUNCH_TIMEOUT.as_secs()
                ))
            })??;

        let browser = Arc::clone(&session.browser);
        let alive = Arc::clone(&session.alive);
        self.liveness.send_replace(Some(Arc::clone(&alive)));
        *guard = Some(session);
        Ok((browser, alive))
    }

    /// Closes the browser if no page still holds it. Used on shutdown.
    pub async fn shutdown(&self) {
        let session = self.take_session().await;
        if let Some(session) = session {
            Self::close_session(session).await;
        }
    }

    async fn launch() -> Result<Session, AppError> {
        let mut builder = BrowserConfig::builder().no_sandbox().disable_default_args();

        if let Some(bin) = find_chrome_binary() {
            tracing::info!("Using Chrome binary: {}", bin.display());
            builder = builder.chrome_executable(bin);
        }

        // Sized for small containers: no sandbox, one process, no GPU.
        let config = builder
            .arg("--headless=new")
            .arg("--disable-setuid-sandbox")
            .arg("--single-process")
            .arg("--disable-gpu")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-extensions")
            .arg("--no-first-run")
            .build()
            .map_err(|e| AppError::Browser(format!("Browser config error: {e}")))?;

        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| AppError::Browser(format!("Failed to launch browser: {e}")))?;

        let alive = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&alive);

        // The CDP handler must be polled continuously for the connection to
        // work; the stream ends when the browser goes away.
        tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    tracing::debug!("Browser CDP handler error: {e}");
                }
            }
            flag.store(false, Ordering::Release);
            tracing::warn!("Browser CDP handler stopped");
        });

        tracing::info!("Headless browser launched");
        Ok(Session {
            browser: Arc::new(browser),
            alive,
        })
    }

    async fn take_session(&self) -> Option<Session> {
        let session = self.inner.lock().await.take();
        self.liveness.send_replace(None);
        session
    }

    async fn close_session(session: Session) {
        match Arc::try_unwrap(session.browser) {
            Ok(mut browser) => {
                if let Err(e) = browser.close().await {
                    tracing::warn!("Browser close error: {e}");
                }
                let _ = browser.wait().await;
            }
            // In-flight pages still hold it; it is dropped with the last one.
            Err(_) => tracing::debug!("Browser still in use, deferring close"),
        }
    }
}

impl SessionManager for BrowserSessions {
    type Page = BrowserPage;

    async fn open_page(&self, target: &ScrapeTarget) -> Result<BrowserPage, AppError> {
        let (browser, alive) = self.acquire_session().await?;

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| tab_error(alive.load(Ordering::Acquire), e))?;

        let auth_rejected = Arc::new(AtomicBool::new(false));
        let interceptor = if target.block_resources || target.credentials.is_some() {
            let policy = Interception {
                block_resources: target.block_resources,
                credentials: target.credentials.clone(),
                auth_rejected: Arc::clone(&auth_rejected),
            };
            match policy.install(&page).await {
                Ok(task) => Some(task),
                Err(e) => {
                    let _ = page.close().await;
                    return Err(e);
                }
            }
        } else {
            None
        };

        tracing::debug!(kind = %target.kind, "Page opened");
        Ok(BrowserPage {
            page: Some(page),
            interceptor,
            auth_rejected,
        })
    }

    async fn invalidate(&self) {
        let session = self.take_session().await;
        if let Some(session) = session {
            tracing::info!("Browser session invalidated");
            Self::close_session(session).await;
        }
    }

    async fn is_running(&self) -> bool {
        self.liveness
            .borrow()
            .as_ref()
            .is_some_and(|alive| alive.load(Ordering::Acquire))
    }
}

/// A failed `new_page` only condemns the shared browser once its CDP
/// connection is gone; otherwise other requests' pages stay untouched.
fn tab_error(browser_alive: bool, error: impl std::fmt::Display) -> AppError {
    if browser_alive {
        AppError::Page(format!("Failed to open page: {error}"))
    } else {
        AppError::Browser(format!("Failed to open page: {error}"))
    }
}

// ---------------------------------------------------------------------------
// Request interception
// ---------------------------------------------------------------------------

/// Per-page Fetch-domain policy: resource blocking and auth challenges.
struct Interception {
    block_resources: bool,
    credentials: Option<Credentials>,
    auth_rejected: Arc<AtomicBool>,
}

fn is_blocked(resource: &ResourceType) -> bool {
    matches!(
        resource,
        ResourceType::Image | ResourceType::Stylesheet | ResourceType::Font
    )
}

impl Interception {
    /// Auth challenges are always routed to us: without credentials they are
    /// cancelled and flagged rather than left to render an error page.
    fn enable_params(&self) -> EnableParams {
        EnableParams::builder()
            .pattern(RequestPattern::builder().url_pattern("*").build())
            .handle_auth_requests(true)
            .build()
    }

    /// Subscribes to paused requests and auth challenges, enables the Fetch
    /// domain, and spawns the task answering them.
    async fn install(self, page: &Page) -> Result<JoinHandle<()>, AppError> {
        let mut paused = page
            .event_listener::<EventRequestPaused>()
            .await
            .map_err(|e| AppError::Page(format!("Failed to subscribe to requests: {e}")))?;
        let mut challenges = page
            .event_listener::<EventAuthRequired>()
            .await
            .map_err(|e| AppError::Page(format!("Failed to subscribe to auth: {e}")))?;

        page.execute(self.enable_params())
            .await
            .map_err(|e| AppError::Page(format!("Failed to enable interception: {e}")))?;

        let page = page.clone();
        Ok(tokio::spawn(async move {
            let mut attempted: HashSet<RequestId> = HashSet::new();
            loop {
                tokio::select! {
                    Some(event) = paused.next() => {
                        let id = event.request_id.clone();
                        let reply = if self.block_resources && is_blocked(&event.resource_type) {
                            page.execute(FailRequestParams::new(id, ErrorReason::BlockedByClient))
                                .await
                                .map(|_| ())
                        } else {
                            page.execute(ContinueRequestParams::new(id)).await.map(|_| ())
                        };
                        if let Err(e) = reply {
                            tracing::debug!("Interception reply failed: {e}");
                        }
                    }
                    Some(event) = challenges.next() => {
                        let id = event.request_id.clone();
                        let response = self.answer_challenge(attempted.insert(id.clone()));
                        let reply = ContinueWithAuthParams::new(id, response);
                        if let Err(e) = page.execute(reply).await {
                            tracing::debug!("Auth reply failed: {e}");
                        }
                    }
                    else => break,
                }
            }
        }))
    }

    /// First challenge for a request gets the credentials; a repeat means
    /// they were rejected.
    fn answer_challenge(&self, first_attempt: bool) -> AuthChallengeResponse {
        match (&self.credentials, first_attempt) {
            (Some(creds), true) => AuthChallengeResponse {
                response: AuthChallengeResponseResponse::ProvideCredentials,
                username: Some(creds.username.clone()),
                password: Some(creds.password.clone()),
            },
            _ => {
                self.auth_rejected.store(true, Ordering::Release);
                if self.credentials.is_some() {
                    tracing::warn!("Upstream rejected the configured credentials");
                } else {
                    tracing::warn!("Upstream requires credentials but none are configured");
                }
                AuthChallengeResponse {
                    response: AuthChallengeResponseResponse::CancelAuth,
                    username: None,
                    password: None,
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// BrowserPage
// ---------------------------------------------------------------------------

/// One request's tab.
///
/// [`PageContext::close`] is the normal release path. If the owning future
/// is dropped first (for example when the HTTP client disconnects), `Drop`
/// spawns the close so the tab still does not leak.
pub struct BrowserPage {
    page: Option<Page>,
    interceptor: Option<JoinHandle<()>>,
    auth_rejected: Arc<AtomicBool>,
}

impl BrowserPage {
    fn page(&self) -> Result<&Page, AppError> {
        self.page
            .as_ref()
            .ok_or_else(|| AppError::Page("page already closed".into()))
    }

    /// Any failure after the upstream refused our credentials is reported
    /// as an authentication failure.
    fn classify(&self, error: AppError) -> AppError {
        if self.auth_rejected.load(Ordering::Acquire) {
            AppError::Authentication(format!("upstream rejected credentials ({error})"))
        } else {
            error
        }
    }

    async fn navigate_inner(
        &self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<(), AppError> {
        let page = self.page()?;

        let mut lifecycle = page
            .event_listener::<EventLifecycleEvent>()
            .await
            .map_err(|e| AppError::Page(format!("Failed to subscribe to lifecycle: {e}")))?;
        page.execute(SetLifecycleEventsEnabledParams::new(true))
            .await
            .map_err(|e| AppError::Page(format!("Failed to enable lifecycle events: {e}")))?;

        let wanted = wait.lifecycle_event();
        let navigation = async {
            let response = page
                .execute(NavigateParams::new(url))
                .await
                .map_err(|e| AppError::Navigation(format!("{url}: {e}")))?;

            if let Some(error) = response.result.error_text.as_ref() {
                return Err(AppError::Navigation(format!("{url}: {error}")));
            }

            let loader = response.result.loader_id.clone();
            while let Some(event) = lifecycle.next().await {
                if event.name == wanted && loader.as_ref().is_none_or(|id| *id == event.loader_id)
                {
                    return Ok(());
                }
            }
            Err(AppError::Page("page closed during navigation".into()))
        };

        match tokio::time::timeout(timeout, navigation).await {
            Ok(result) => result,
            Err(_) => Err(AppError::NavigationTimeout(timeout.as_secs())),
        }
    }

    async fn wait_for_ready_inner(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<(), AppError> {
        let poll = async {
            loop {
                // A refused challenge never yields the selector; stop early.
                if self.auth_rejected.load(Ordering::Acquire) {
                    return Err(AppError::Authentication(
                        "upstream refused access while waiting for content".into(),
                    ));
                }
                if self.page()?.find_element(selector).await.is_ok() {
                    return Ok(());
                }
                tokio::time::sleep(READY_POLL_INTERVAL).await;
            }
        };

        tokio::time::timeout(timeout, poll)
            .await
            .map_err(|_| AppError::ReadinessTimeout {
                selector: selector.to_string(),
                secs: timeout.as_secs(),
            })?
    }
}

impl PageContext for BrowserPage {
    async fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> Result<(), AppError> {
        self.navigate_inner(url, wait, timeout)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn wait_for_ready(&mut self, selector: &str, timeout: Duration) -> Result<(), AppError> {
        self.wait_for_ready_inner(selector, timeout)
            .await
            .map_err(|e| self.classify(e))
    }

    async fn content(&mut self) -> Result<String, AppError> {
        self.page()?
            .content()
            .await
            .map_err(|e| AppError::Page(format!("Failed to read page content: {e}")))
    }

    async fn close(mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        if let Some(page) = self.page.take()
            && let Err(e) = page.close().await
        {
            tracing::warn!("Page close error: {e}");
        }
    }
}

impl Drop for BrowserPage {
    fn drop(&mut self) {
        if let Some(task) = self.interceptor.take() {
            task.abort();
        }
        if let Some(page) = self.page.take()
            && let Ok(runtime) = tokio::runtime::Handle::try_current()
        {
            runtime.spawn(async move {
                if let Err(e) = page.close().await {
                    tracing::warn!("Deferred page close failed: {e}");
                }
            });
        }
    }
}

/// Tries to locate a Chrome/Chromium binary.
///
/// `CHROME_BIN` wins when it points at an existing file. Otherwise the real
/// binary inside a snap is preferred over the `/snap/bin` wrapper (which
/// strips headless flags), then common system paths. `None` lets
/// chromiumoxide do its own lookup.
fn find_chrome_binary() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("CHROME_BIN") {
        let path = PathBuf::from(p);
        if path.exists() {
            return Some(path);
        }
    }

    [
        "/snap/chromium/current/usr/lib/chromium-browser/chrome",
        "/var/lib/flatpak/exports/bin/org.chromium.Chromium",
        "/usr/bin/google-chrome-stable",
        "/usr/bin/google-chrome",
        "/usr/bin/chromium",
        "/usr/bin/chromium-browser",
    ]
    .iter()
    .map(PathBuf::from)
    .find(|p| p.exists())
}
