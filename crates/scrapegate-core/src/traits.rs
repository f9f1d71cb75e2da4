use std::future::Future;
use std::time::Duration;

use crate::error::AppError;
use crate::target::{ScrapeTarget, WaitPolicy};

/// Owns the long-lived browser session and hands out per-request pages.
pub trait SessionManager: Send + Sync {
    type Page: PageContext;

    /// Opens a fresh page context on the shared session, launching the
    /// session first if needed. Resource blocking and credentials from
    /// `target` are installed before this returns.
    fn open_page(
        &self,
        target: &ScrapeTarget,
    ) -> impl Future<Output = Result<Self::Page, AppError>> + Send;

    /// Drops the current session so the next `open_page` relaunches it.
    fn invalidate(&self) -> impl Future<Output = ()> + Send;

    /// Whether a live session currently exists.
    fn is_running(&self) -> impl Future<Output = bool> + Send;
}

/// A single request's browsing context. Never shared between requests.
pub trait PageContext: Send {
    fn navigate(
        &mut self,
        url: &str,
        wait: WaitPolicy,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    fn wait_for_ready(
        &mut self,
        selector: &str,
        timeout: Duration,
    ) -> impl Future<Output = Result<(), AppError>> + Send;

    /// Rendered DOM serialized as HTML.
    fn content(&mut self) -> impl Future<Output = Result<String, AppError>> + Send;

    /// Releases the page. Consumes the context so it cannot be closed twice.
    fn close(self) -> impl Future<Output = ()> + Send;
}

/// Maps rendered HTML into domain records.
pub trait Extractor: Send + Sync {
    type Output: Clone + Send + Sync + 'static;

    fn extract(&self, html: &str) -> Result<Self::Output, AppError>;
}
